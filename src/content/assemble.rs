//! Builds an [`OutboundPost`] from a [`SourceMessage`].
//!
//! The first attachment decides the post kind:
//! - `video/*`: a video post with that attachment only
//! - `image/*`: every image attachment, in order, up to the image cap
//! - anything else (or nothing): a text-only post
//!
//! Unsupported attachments are dropped silently. Rewriting the text to point
//! at them would change its length after the length check already passed.

use tracing::{debug, info};

use super::compress::{self, CompressError, ImageLimits, COMPRESSED_MIME};
use super::{AspectRatio, OutboundPost, PostImage, PostMedia, PostVideo, MAX_IMAGES};
use crate::platform::{Attachment, AttachmentStore, PlatformError, SourceMessage};

/// Limits applied while assembling a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyLimits {
    /// Per-image recompression limits.
    pub image: ImageLimits,
    /// Maximum number of images per post.
    pub max_images: usize,
}

impl Default for AssemblyLimits {
    fn default() -> Self {
        Self {
            image: ImageLimits::default(),
            max_images: MAX_IMAGES,
        }
    }
}

/// Errors raised while assembling a post.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// An attachment could not be downloaded.
    #[error("could not download {filename}: {source}")]
    AttachmentFetch {
        /// Attachment file name.
        filename: String,
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },
    /// An image could not be brought under the size ceiling.
    #[error("{filename}: {source}")]
    Image {
        /// Attachment file name.
        filename: String,
        /// Underlying compression error.
        #[source]
        source: CompressError,
    },
    /// The blocking compression task panicked or was cancelled.
    #[error("image compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Build the outbound post for `message`.
///
/// # Errors
///
/// Returns [`AssembleError`] when an attachment cannot be fetched or an
/// image cannot be decoded or compressed. A single bad image fails the
/// whole post.
pub async fn assemble(
    message: &SourceMessage,
    store: &dyn AttachmentStore,
    limits: &AssemblyLimits,
) -> Result<OutboundPost, AssembleError> {
    let text = message.clean_text.as_str();

    let Some(first) = message.attachments.first() else {
        return Ok(OutboundPost::text_only(text));
    };

    if first.has_type_prefix("video/") {
        let video = fetch_video(first, store).await?;
        return Ok(OutboundPost {
            media: PostMedia::Video(video),
            ..OutboundPost::text_only(text)
        });
    }

    if first.has_type_prefix("image/") {
        let mut images = Vec::new();
        for attachment in message
            .attachments
            .iter()
            .filter(|a| a.has_type_prefix("image/"))
            .take(limits.max_images)
        {
            images.push(fetch_image(attachment, store, &limits.image).await?);
        }
        return Ok(OutboundPost {
            media: PostMedia::Images(images),
            ..OutboundPost::text_only(text)
        });
    }

    debug!(
        message_id = %message.id(),
        content_type = ?first.content_type,
        "unsupported attachment type, posting text only"
    );
    Ok(OutboundPost::text_only(text))
}

async fn read(attachment: &Attachment, store: &dyn AttachmentStore) -> Result<Vec<u8>, AssembleError> {
    store
        .read(attachment)
        .await
        .map_err(|source| AssembleError::AttachmentFetch {
            filename: attachment.filename.clone(),
            source,
        })
}

async fn fetch_video(
    attachment: &Attachment,
    store: &dyn AttachmentStore,
) -> Result<PostVideo, AssembleError> {
    let data = read(attachment, store).await?;
    Ok(PostVideo {
        data,
        mime: attachment
            .content_type
            .clone()
            .unwrap_or_else(|| "video/mp4".to_owned()),
        aspect_ratio: AspectRatio::from_declared(attachment.width, attachment.height),
    })
}

async fn fetch_image(
    attachment: &Attachment,
    store: &dyn AttachmentStore,
    limits: &ImageLimits,
) -> Result<PostImage, AssembleError> {
    let raw = read(attachment, store).await?;
    let aspect_ratio = AspectRatio::from_declared(attachment.width, attachment.height);

    if raw.len() <= limits.max_bytes {
        return Ok(PostImage {
            data: raw,
            mime: attachment
                .content_type
                .clone()
                .unwrap_or_else(|| COMPRESSED_MIME.to_owned()),
            alt: String::new(),
            aspect_ratio,
        });
    }

    let original = raw.len();
    let limits = *limits;
    let compressed = tokio::task::spawn_blocking(move || compress::compress(&raw, &limits))
        .await?
        .map_err(|source| AssembleError::Image {
            filename: attachment.filename.clone(),
            source,
        })?;

    info!(
        filename = %attachment.filename,
        original,
        compressed = compressed.data.len(),
        quality = compressed.quality,
        "image recompressed for upload"
    );

    Ok(PostImage {
        data: compressed.data,
        mime: COMPRESSED_MIME.to_owned(),
        alt: String::new(),
        aspect_ratio,
    })
}
