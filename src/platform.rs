//! Chat-platform boundary: message identities, reaction events, and the
//! capabilities the export flow needs from the platform.
//!
//! The export flow never holds live platform handles. Everything it keeps
//! is keyed by [`MessageId`], and every side effect goes through the
//! [`ChatPlatform`] and [`AttachmentStore`] traits.

use std::fmt;

use async_trait::async_trait;

/// Platform-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

/// Platform-assigned channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

/// Platform-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a message: the channel it lives in plus its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Channel holding the message.
    pub channel_id: ChannelId,
    /// Message identifier.
    pub id: MessageId,
}

impl MessageRef {
    /// Build a reference from raw ids.
    pub fn new(channel_id: u64, id: u64) -> Self {
        Self {
            channel_id: ChannelId(channel_id),
            id: MessageId(id),
        }
    }
}

/// A media item attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type reported by the platform, if any.
    pub content_type: Option<String>,
    /// Declared size in bytes.
    pub size: u64,
    /// Download location, resolved by an [`AttachmentStore`].
    pub url: String,
    /// Original file name.
    pub filename: String,
    /// Declared width (images and video only).
    pub width: Option<u32>,
    /// Declared height (images and video only).
    pub height: Option<u32>,
}

impl Attachment {
    /// Whether the declared content type starts with `prefix` (e.g. `"image/"`).
    pub fn has_type_prefix(&self, prefix: &str) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with(prefix))
    }
}

/// Snapshot of a chat message as seen when a reaction arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    /// Where the message lives.
    pub reference: MessageRef,
    /// Author of the message.
    pub author_id: UserId,
    /// Visible content as sent (markup and raw mentions included).
    pub content: String,
    /// Clean rendering: mentions resolved to display names, no raw markup.
    pub clean_text: String,
    /// Attachments in their original order.
    pub attachments: Vec<Attachment>,
}

impl SourceMessage {
    /// Message id shorthand.
    pub fn id(&self) -> MessageId {
        self.reference.id
    }
}

/// A "reaction added" event delivered by the platform.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    /// User who added the reaction.
    pub reactor_id: UserId,
    /// Reaction glyph (unicode emoji or platform-specific custom emoji string).
    pub glyph: String,
    /// Current number of reactions with this glyph on the message.
    pub reaction_count: u64,
    /// The message that was reacted to.
    pub message: SourceMessage,
}

/// Errors returned by chat-platform operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The platform API rejected or failed the call.
    #[error("chat platform request failed: {0}")]
    Api(String),
    /// Downloading an attachment failed at the HTTP layer.
    #[error("attachment download failed: {0}")]
    Download(#[from] reqwest::Error),
    /// Attachment download returned a non-success status.
    #[error("attachment download returned status {status} for {url}")]
    DownloadStatus {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },
}

/// Chat-platform capabilities used by the export flow.
///
/// Implementations must be `Send + Sync`: the gateway dispatches reaction
/// handlers concurrently.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The bot's own user id.
    fn bot_user_id(&self) -> UserId;

    /// Render a mention of `user` in the platform's markup.
    fn mention(&self, user: UserId) -> String;

    /// Reply to `to` with `text`, returning the new message.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the message cannot be sent.
    async fn reply(
        &self,
        to: &MessageRef,
        text: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef, PlatformError>;

    /// Add `glyph` as the bot's reaction on `message`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the reaction cannot be added.
    async fn add_reaction(&self, message: &MessageRef, glyph: &str) -> Result<(), PlatformError>;

    /// Replace the content of a message the bot authored.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the edit is rejected.
    async fn edit_content(
        &self,
        message: &MessageRef,
        text: &str,
        suppress_embeds: bool,
    ) -> Result<(), PlatformError>;

    /// List users who reacted to `message` with `glyph`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the reaction list cannot be fetched.
    async fn list_reactors(
        &self,
        message: &MessageRef,
        glyph: &str,
    ) -> Result<Vec<UserId>, PlatformError>;
}

/// Byte-stream accessor for attachments.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Read the full contents of `attachment`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the bytes cannot be fetched.
    async fn read(&self, attachment: &Attachment) -> Result<Vec<u8>, PlatformError>;
}

/// [`AttachmentStore`] that downloads attachment URLs over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpAttachmentStore {
    client: reqwest::Client,
}

impl HttpAttachmentStore {
    /// Create a store with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttachmentStore for HttpAttachmentStore {
    async fn read(&self, attachment: &Attachment) -> Result<Vec<u8>, PlatformError> {
        let response = self.client.get(&attachment.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::DownloadStatus {
                status: status.as_u16(),
                url: attachment.url.clone(),
            });
        }
        let bytes = response.bytes().await?;
        tracing::debug!(
            filename = %attachment.filename,
            declared = attachment.size,
            actual = bytes.len(),
            "attachment downloaded"
        );
        Ok(bytes.to_vec())
    }
}
