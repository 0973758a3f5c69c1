//! Post assembly from message attachments.

use overheard::content::compress::ImageLimits;
use overheard::content::{assemble, AspectRatio, AssembleError, AssemblyLimits, PostMedia};
use overheard::platform::SourceMessage;

use crate::support::{attachment, noise_png, source, FakeStore, AUTHOR};

fn message_with(text: &str, attachments: Vec<overheard::platform::Attachment>) -> SourceMessage {
    let mut message = source(42, AUTHOR, text);
    message.attachments = attachments;
    message
}

#[tokio::test]
async fn text_only_message_keeps_links() {
    let store = FakeStore::new();
    let message = message_with("look https://example.com", Vec::new());

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");

    assert_eq!(post.text, "look https://example.com");
    assert_eq!(post.facets.len(), 1);
    assert!(matches!(post.media, PostMedia::None));
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn clean_text_is_posted_not_raw_content() {
    let store = FakeStore::new();
    let mut message = message_with("hi @alice", Vec::new());
    message.content = "hi <@12345>".to_owned();

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");
    assert_eq!(post.text, "hi @alice");
}

#[tokio::test]
async fn unsupported_first_attachment_posts_text_only() {
    let store = FakeStore::new();
    let message = message_with(
        "see attached",
        vec![
            attachment("https://cdn/report.pdf", Some("application/pdf"), 10),
            attachment("https://cdn/a.png", Some("image/png"), 10),
        ],
    );

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");
    assert!(matches!(post.media, PostMedia::None));
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn missing_content_type_posts_text_only() {
    let store = FakeStore::new();
    let message = message_with("mystery", vec![attachment("https://cdn/blob", None, 10)]);

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");
    assert!(matches!(post.media, PostMedia::None));
}

#[tokio::test]
async fn video_first_uses_only_that_video() {
    let store = FakeStore::new();
    store.insert("https://cdn/clip.mp4", vec![7; 64]);
    let message = message_with(
        "clip",
        vec![
            attachment("https://cdn/clip.mp4", Some("video/mp4"), 64),
            attachment("https://cdn/a.png", Some("image/png"), 10),
        ],
    );

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");

    let PostMedia::Video(video) = post.media else {
        panic!("expected a video post");
    };
    assert_eq!(video.data, vec![7; 64]);
    assert_eq!(video.mime, "video/mp4");
    assert_eq!(
        video.aspect_ratio,
        Some(AspectRatio {
            width: 1200,
            height: 800
        })
    );
    assert_eq!(store.reads(), 1);
}

#[tokio::test]
async fn images_are_capped_at_four_in_order() {
    let store = FakeStore::new();
    let mut attachments = Vec::new();
    for i in 0..6_u8 {
        let url = format!("https://cdn/{i}.png");
        store.insert(&url, vec![i; 16]);
        attachments.push(attachment(&url, Some("image/png"), 16));
        if i == 2 {
            attachments.push(attachment("https://cdn/notes.txt", Some("text/plain"), 4));
        }
    }
    let message = message_with("gallery", attachments);

    let post = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect("assemble");

    let PostMedia::Images(images) = post.media else {
        panic!("expected an image post");
    };
    let firsts: Vec<u8> = images.iter().map(|img| img.data[0]).collect();
    assert_eq!(firsts, vec![0, 1, 2, 3]);
    assert!(images.iter().all(|img| img.mime == "image/png"));
    assert_eq!(store.reads(), 4);
}

#[tokio::test]
async fn oversized_image_is_recompressed() {
    let png = noise_png(128, 128);
    let img = image::load_from_memory(&png).expect("decode");
    let low = overheard::content::compress::encode_jpeg(&img, 25)
        .expect("encode")
        .len();
    assert!(low < png.len());
    let ceiling = low + (png.len() - low) / 2;

    let store = FakeStore::new();
    store.insert("https://cdn/big.png", png.clone());
    let message = message_with(
        "big one",
        vec![attachment("https://cdn/big.png", Some("image/png"), 0)],
    );
    let limits = AssemblyLimits {
        image: ImageLimits {
            max_bytes: ceiling,
            ..ImageLimits::default()
        },
        ..AssemblyLimits::default()
    };

    let post = assemble(&message, &store, &limits).await.expect("assemble");

    let PostMedia::Images(images) = post.media else {
        panic!("expected an image post");
    };
    assert_eq!(images.len(), 1);
    assert!(images[0].data.len() <= ceiling);
    assert_eq!(images[0].mime, "image/jpeg");
}

#[tokio::test]
async fn incompressible_image_fails_the_post() {
    let store = FakeStore::new();
    store.insert("https://cdn/big.png", noise_png(128, 128));
    let message = message_with(
        "too big",
        vec![attachment("https://cdn/big.png", Some("image/png"), 0)],
    );
    let limits = AssemblyLimits {
        image: ImageLimits {
            max_bytes: 100,
            ..ImageLimits::default()
        },
        ..AssemblyLimits::default()
    };

    let err = assemble(&message, &store, &limits)
        .await
        .expect_err("should not fit");
    match err {
        AssembleError::Image { filename, .. } => assert_eq!(filename, "big.png"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn download_failure_names_the_attachment() {
    let store = FakeStore::new();
    let message = message_with(
        "gone",
        vec![attachment("https://cdn/missing.jpg", Some("image/jpeg"), 10)],
    );

    let err = assemble(&message, &store, &AssemblyLimits::default())
        .await
        .expect_err("missing attachment");
    assert!(matches!(err, AssembleError::AttachmentFetch { ref filename, .. } if filename == "missing.jpg"));
    assert!(err.to_string().contains("missing.jpg"));
}
