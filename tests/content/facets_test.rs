//! Link facet extraction over UTF-8 byte offsets.

use overheard::content::{extract_links, LinkFacet};

#[test]
fn finds_single_link_with_byte_offsets() {
    let text = "check this out http://example.com/x neat";
    let facets = extract_links(text);

    assert_eq!(
        facets,
        vec![LinkFacet {
            url: "http://example.com/x".to_owned(),
            byte_start: 15,
            byte_end: 35,
        }]
    );
    assert_eq!(&text[15..35], "http://example.com/x");
}

#[test]
fn offsets_count_bytes_not_characters() {
    let text = "héllo 👋 https://bsky.app/profile/x";
    let facets = extract_links(text);

    assert_eq!(facets.len(), 1);
    let facet = &facets[0];
    // "héllo " is 7 bytes, the wave is 4 more plus a space.
    assert_eq!(facet.byte_start, 12);
    assert_eq!(facet.byte_end, text.len());
    assert_eq!(&text[facet.byte_start..facet.byte_end], facet.url);
}

#[test]
fn links_end_at_whitespace() {
    let text = "a https://one.example\tb http://two.example/p?q=1\nc https://three.example\r\n";
    let urls: Vec<String> = extract_links(text).into_iter().map(|f| f.url).collect();

    assert_eq!(
        urls,
        vec![
            "https://one.example",
            "http://two.example/p?q=1",
            "https://three.example",
        ]
    );
}

#[test]
fn trailing_punctuation_stays_in_the_link() {
    let facets = extract_links("see https://example.com/page.");
    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0].url, "https://example.com/page.");
}

#[test]
fn facets_are_ordered_and_disjoint() {
    let text = "http://a.example http://b.example http://c.example";
    let facets = extract_links(text);

    assert_eq!(facets.len(), 3);
    for pair in facets.windows(2) {
        assert!(pair[0].byte_end <= pair[1].byte_start);
    }
}

#[test]
fn no_links_means_no_facets() {
    assert!(extract_links("").is_empty());
    assert!(extract_links("nothing to see here").is_empty());
    assert!(extract_links("ftp://files.example is not http").is_empty());
}
