//! Wire types for `app.bsky.feed.post` records and their embeds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{AspectRatio, LinkFacet};

/// Collection NSID for posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// A post record as sent to `com.atproto.repo.createRecord`.
#[derive(Debug, Clone, Serialize)]
pub struct PostRecord {
    /// Record type marker.
    #[serde(rename = "$type")]
    pub record_type: &'static str,
    /// Post text.
    pub text: String,
    /// RFC 3339 creation time.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// Rich-text facets; omitted entirely when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
    /// Media embed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    /// BCP-47 language tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
}

impl PostRecord {
    /// Build a record for `text`, converting link facets to wire facets.
    pub fn new(text: &str, links: &[LinkFacet], embed: Option<Embed>, langs: &[String]) -> Self {
        Self {
            record_type: POST_COLLECTION,
            text: text.to_owned(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            facets: links.iter().map(Facet::link).collect(),
            embed,
            langs: langs.to_vec(),
        }
    }
}

/// Byte range a facet applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteSlice {
    /// Inclusive start.
    #[serde(rename = "byteStart")]
    pub byte_start: usize,
    /// Exclusive end.
    #[serde(rename = "byteEnd")]
    pub byte_end: usize,
}

/// A facet feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    /// Hyperlink.
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link {
        /// Link target.
        uri: String,
    },
}

/// A rich-text facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    /// Span covered.
    pub index: ByteSlice,
    /// Features applied to the span.
    pub features: Vec<FacetFeature>,
}

impl Facet {
    /// Link facet from an extracted link span.
    pub fn link(link: &LinkFacet) -> Self {
        Self {
            index: ByteSlice {
                byte_start: link.byte_start,
                byte_end: link.byte_end,
            },
            features: vec![FacetFeature::Link {
                uri: link.url.clone(),
            }],
        }
    }
}

/// Aspect ratio as serialized in embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireAspectRatio {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl From<AspectRatio> for WireAspectRatio {
    fn from(ratio: AspectRatio) -> Self {
        Self {
            width: ratio.width,
            height: ratio.height,
        }
    }
}

/// One image inside an images embed.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    /// Alt text.
    pub alt: String,
    /// Blob reference returned by `uploadBlob`.
    pub image: Value,
    /// Layout hint.
    #[serde(rename = "aspectRatio", skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<WireAspectRatio>,
}

/// Post embed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "$type")]
pub enum Embed {
    /// Image set.
    #[serde(rename = "app.bsky.embed.images")]
    Images {
        /// Images in display order.
        images: Vec<EmbedImage>,
    },
    /// Single video.
    #[serde(rename = "app.bsky.embed.video")]
    Video {
        /// Blob reference returned by `uploadBlob`.
        video: Value,
        /// Layout hint.
        #[serde(rename = "aspectRatio", skip_serializing_if = "Option::is_none")]
        aspect_ratio: Option<WireAspectRatio>,
    },
}

/// Body of `com.atproto.repo.createRecord`.
#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a> {
    /// Repository DID.
    pub repo: &'a str,
    /// Collection NSID.
    pub collection: &'a str,
    /// The record.
    pub record: &'a PostRecord,
}

/// Response of `com.atproto.repo.createRecord`.
#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    /// AT URI of the new record.
    pub uri: String,
    /// Content hash.
    pub cid: String,
}

/// Response of `com.atproto.repo.uploadBlob`.
#[derive(Debug, Deserialize)]
pub struct UploadBlobResponse {
    /// Blob reference to embed in records.
    pub blob: Value,
}

/// Body of `com.atproto.server.createSession`.
#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    /// Handle or email.
    pub identifier: &'a str,
    /// App password.
    pub password: &'a str,
}

/// Response of `createSession` and `refreshSession`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    /// Short-lived access token.
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    /// Long-lived refresh token.
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
    /// Account handle.
    pub handle: String,
    /// Account DID.
    pub did: String,
}

/// XRPC error body.
#[derive(Debug, Deserialize)]
pub struct XrpcErrorBody {
    /// Error name.
    pub error: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}
