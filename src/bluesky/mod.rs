//! Bluesky publishing: the [`Publisher`] capability, AT URI handling, and
//! the XRPC client that implements it.

use async_trait::async_trait;

use crate::content::{LinkFacet, OutboundPost, PostImage, PostMedia, PostVideo};

pub mod client;
pub mod record;

pub use client::BlueskyClient;

/// Default web host used to build links to published posts.
pub const DEFAULT_WEB_HOST: &str = "bsky.app";

/// Errors returned by the publish capability.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// HTTP transport failure.
    #[error("bluesky request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with an XRPC error.
    #[error("bluesky rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// XRPC error name (e.g. `ExpiredToken`), when provided.
        error: Option<String>,
        /// Human-readable message from the server.
        message: String,
    },
    /// The response did not have the expected shape.
    #[error("bluesky response parse error: {0}")]
    Parse(String),
    /// An AT URI did not have the `at://<did>/<collection>/<rkey>` shape.
    #[error("invalid AT URI: {0}")]
    InvalidUri(String),
    /// The client has no usable session.
    #[error("bluesky session unavailable: {0}")]
    Session(String),
}

impl PublishError {
    /// Message suitable for showing to the message author.
    ///
    /// Server rejections carry their own explanation; everything else falls
    /// back to the error's display form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this is the server telling us the access token expired.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, Self::Rejected { error: Some(e), .. } if e == "ExpiredToken")
    }
}

/// A parsed `at://<did>/<collection>/<rkey>` record URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUri {
    /// Repository DID.
    pub did: String,
    /// Record collection NSID.
    pub collection: String,
    /// Record key.
    pub rkey: String,
}

impl PostUri {
    /// Parse an AT URI.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidUri`] unless the URI has exactly three
    /// non-empty path segments after `at://`.
    pub fn parse(uri: &str) -> Result<Self, PublishError> {
        let rest = uri
            .strip_prefix("at://")
            .ok_or_else(|| PublishError::InvalidUri(uri.to_owned()))?;
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [did, collection, rkey]
                if !did.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(Self {
                    did: (*did).to_owned(),
                    collection: (*collection).to_owned(),
                    rkey: (*rkey).to_owned(),
                })
            }
            _ => Err(PublishError::InvalidUri(uri.to_owned())),
        }
    }

    /// Public web link for the post, e.g.
    /// `https://bsky.app/profile/<did>/post/<rkey>`.
    pub fn web_url(&self, host: &str) -> String {
        format!("https://{host}/profile/{}/post/{}", self.did, self.rkey)
    }
}

/// Social publish capability.
///
/// Empty `facets` slices mean "no facets": implementations must omit the
/// field rather than send an empty list.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a text post.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the post cannot be created.
    async fn publish_text(&self, text: &str, facets: &[LinkFacet])
        -> Result<PostUri, PublishError>;

    /// Publish a post with up to four images.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if an upload or the post itself fails.
    async fn publish_images(
        &self,
        text: &str,
        facets: &[LinkFacet],
        images: &[PostImage],
    ) -> Result<PostUri, PublishError>;

    /// Publish a post with one video.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the upload or the post itself fails.
    async fn publish_video(
        &self,
        text: &str,
        facets: &[LinkFacet],
        video: &PostVideo,
    ) -> Result<PostUri, PublishError>;

    /// Publish an assembled post, dispatching on its media payload.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] from the underlying call.
    async fn publish(&self, post: &OutboundPost) -> Result<PostUri, PublishError> {
        match &post.media {
            PostMedia::None => self.publish_text(&post.text, &post.facets).await,
            PostMedia::Images(images) => {
                self.publish_images(&post.text, &post.facets, images).await
            }
            PostMedia::Video(video) => self.publish_video(&post.text, &post.facets, video).await,
        }
    }
}
