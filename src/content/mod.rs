//! Content pipeline: turns a chat message into an outbound post.
//!
//! - [`facets`]: byte-offset link detection
//! - [`compress`]: image recompression under the size ceiling
//! - [`assemble`]: attachment classification and payload building

pub mod assemble;
pub mod compress;
pub mod facets;

pub use assemble::{assemble, AssembleError, AssemblyLimits};
pub use facets::{extract_links, LinkFacet};

/// Maximum number of images a single post may carry.
pub const MAX_IMAGES: usize = 4;

/// Width/height pair used by clients to lay out media before loading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    /// Width in pixels (any positive unit works).
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl AspectRatio {
    /// Build from declared dimensions; `None` if either is missing or zero.
    pub fn from_declared(width: Option<u32>, height: Option<u32>) -> Option<Self> {
        match (width, height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Self {
                width: w,
                height: h,
            }),
            _ => None,
        }
    }
}

/// One image ready for upload.
#[derive(Debug, Clone)]
pub struct PostImage {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime: String,
    /// Alt text.
    pub alt: String,
    /// Declared aspect ratio, if known.
    pub aspect_ratio: Option<AspectRatio>,
}

/// A video ready for upload.
#[derive(Debug, Clone)]
pub struct PostVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime: String,
    /// Declared aspect ratio, if known.
    pub aspect_ratio: Option<AspectRatio>,
}

/// Media payload of a post.
#[derive(Debug, Clone, Default)]
pub enum PostMedia {
    /// Text-only post.
    #[default]
    None,
    /// One to [`MAX_IMAGES`] images, in order.
    Images(Vec<PostImage>),
    /// Exactly one video.
    Video(PostVideo),
}

/// A post assembled from a chat message. Built per publish, never stored.
#[derive(Debug, Clone)]
pub struct OutboundPost {
    /// Clean post text.
    pub text: String,
    /// Link spans over `text`; empty means "send no facets".
    pub facets: Vec<LinkFacet>,
    /// Attached media.
    pub media: PostMedia,
}

impl OutboundPost {
    /// Text-only post with links faceted.
    pub fn text_only(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            facets: extract_links(text),
            media: PostMedia::None,
        }
    }
}
