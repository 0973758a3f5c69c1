//! Consent-gated export flow.
//!
//! [`ExportFlow::handle_reaction`] is the single entry point. A trigger
//! reaction on an ordinary message produces a confirmation prompt; the
//! author's consent reaction on that prompt publishes the message and
//! annotates the prompt with the result.
//!
//! Per source message: `Idle -> Prompted -> Published | Rejected | Abandoned`.
//! `Published` is recorded on the platform itself: the bot's own trigger
//! reaction on the source message survives restarts and is the
//! authoritative "already posted" check. Prompts that never get an answer
//! stay pending for the life of the process.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bluesky::{PublishError, Publisher, DEFAULT_WEB_HOST};
use crate::content::{self, AssembleError, AssemblyLimits};
use crate::platform::{
    AttachmentStore, ChatPlatform, MessageId, PlatformError, ReactionEvent, SourceMessage,
};

pub mod pending;

pub use pending::{PendingConfirmation, PendingConfirmations, TooLongRegistry};

/// Reaction that nominates a message for export.
pub const TRIGGER_GLYPH: &str = "📤";

/// Reaction the author uses to consent.
pub const CONSENT_GLYPH: &str = "✅";

/// Trigger reactions needed before a prompt is sent.
pub const TRIGGER_THRESHOLD: u64 = 1;

/// Longest clean text, in bytes, that may be published.
pub const MAX_TEXT_LEN: usize = 300;

/// Reply sent once to messages over [`MAX_TEXT_LEN`].
pub const TOO_LONG_NOTICE: &str = "❌ This message is too long to post on Bluesky.";

/// Behavioural settings for the export flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Trigger reaction glyph.
    pub trigger_glyph: String,
    /// Consent reaction glyph.
    pub consent_glyph: String,
    /// Minimum trigger reaction count.
    pub trigger_threshold: u64,
    /// Maximum clean-text length in bytes.
    pub max_text_len: usize,
    /// Host used for links to published posts.
    pub web_host: String,
    /// Profile link shown in prompts, if any.
    pub profile_url: Option<String>,
    /// Label for the profile link.
    pub account_label: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            trigger_glyph: TRIGGER_GLYPH.to_owned(),
            consent_glyph: CONSENT_GLYPH.to_owned(),
            trigger_threshold: TRIGGER_THRESHOLD,
            max_text_len: MAX_TEXT_LEN,
            web_host: DEFAULT_WEB_HOST.to_owned(),
            profile_url: None,
            account_label: "Bluesky account".to_owned(),
        }
    }
}

/// Why a reaction did not change any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The bot reacted itself.
    OwnReaction,
    /// Someone other than the author reacted to a prompt.
    NotAuthor,
    /// The author reacted to a prompt with something other than consent.
    NotConsent,
    /// Consent arrived for a prompt another handler already claimed.
    AlreadyClaimed,
    /// The glyph is not the trigger glyph.
    NotTrigger,
    /// Not enough trigger reactions yet.
    BelowThreshold,
    /// A prompt for this message already exists.
    AlreadyPending,
    /// The bot's marker reaction shows the message was already posted.
    AlreadyPublished,
}

/// What handling a reaction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No state change.
    Ignored(IgnoreReason),
    /// A confirmation prompt was sent.
    Prompted {
        /// Id of the new prompt message.
        prompt_id: MessageId,
    },
    /// The message is too long to publish.
    TooLong {
        /// Whether a notice was sent this time (only the first time).
        notified: bool,
    },
    /// The message was published.
    Published {
        /// Web link to the new post.
        url: String,
    },
    /// Publishing failed; the prompt shows the reason.
    PublishFailed {
        /// User-facing failure message.
        message: String,
    },
}

/// Errors raised on the consent path. Always reported on the prompt, never
/// propagated out of [`ExportFlow::handle_reaction`].
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Building the post failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    /// The publish capability failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ExportError {
    /// Message suitable for showing to the author.
    pub fn user_message(&self) -> String {
        match self {
            Self::Assemble(e) => e.to_string(),
            Self::Publish(e) => e.user_message(),
        }
    }
}

/// The reaction-driven export state machine.
pub struct ExportFlow {
    platform: Arc<dyn ChatPlatform>,
    attachments: Arc<dyn AttachmentStore>,
    publisher: Arc<dyn Publisher>,
    settings: ExportSettings,
    limits: AssemblyLimits,
    pending: PendingConfirmations,
    too_long: TooLongRegistry,
}

impl ExportFlow {
    /// Create a flow with empty registries.
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        attachments: Arc<dyn AttachmentStore>,
        publisher: Arc<dyn Publisher>,
        settings: ExportSettings,
        limits: AssemblyLimits,
    ) -> Self {
        Self {
            platform,
            attachments,
            publisher,
            settings,
            limits,
            pending: PendingConfirmations::new(),
            too_long: TooLongRegistry::new(),
        }
    }

    /// Live confirmation prompts.
    pub fn pending(&self) -> &PendingConfirmations {
        &self.pending
    }

    /// Messages that already got a "too long" notice.
    pub fn too_long(&self) -> &TooLongRegistry {
        &self.too_long
    }

    /// Active settings.
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Handle a "reaction added" event.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when a chat-platform call outside the
    /// consent path fails (sending a prompt, listing reactors) or when the
    /// result could not be written back after publishing. Publishing
    /// failures themselves are reported on the prompt and returned as
    /// [`Outcome::PublishFailed`].
    pub async fn handle_reaction(&self, event: ReactionEvent) -> Result<Outcome, PlatformError> {
        if event.reactor_id == self.platform.bot_user_id() {
            return Ok(Outcome::Ignored(IgnoreReason::OwnReaction));
        }

        let message_id = event.message.id();
        if let Some(author_id) = self.pending.author_of(message_id) {
            if event.reactor_id != author_id {
                debug!(prompt_id = %message_id, reactor = %event.reactor_id, "non-author reacted to prompt");
                return Ok(Outcome::Ignored(IgnoreReason::NotAuthor));
            }
            if event.glyph != self.settings.consent_glyph {
                return Ok(Outcome::Ignored(IgnoreReason::NotConsent));
            }
            let Some(pending) = self.pending.claim(message_id) else {
                return Ok(Outcome::Ignored(IgnoreReason::AlreadyClaimed));
            };
            return self.consent(pending, &event.message).await;
        }

        self.consider_trigger(&event).await
    }

    async fn consider_trigger(&self, event: &ReactionEvent) -> Result<Outcome, PlatformError> {
        let message = &event.message;
        let trigger = self.settings.trigger_glyph.as_str();

        if event.glyph != trigger {
            return Ok(Outcome::Ignored(IgnoreReason::NotTrigger));
        }
        if event.reaction_count < self.settings.trigger_threshold {
            return Ok(Outcome::Ignored(IgnoreReason::BelowThreshold));
        }
        if self.pending.is_source_active(message.id()) {
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyPending));
        }

        let reactors = self.platform.list_reactors(&message.reference, trigger).await?;
        if reactors.contains(&self.platform.bot_user_id()) {
            debug!(message_id = %message.id(), "message already posted");
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyPublished));
        }

        if message.clean_text.len() > self.settings.max_text_len {
            return self.reject_too_long(message).await;
        }

        if !self.pending.reserve(message.id()) {
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyPending));
        }

        let text = self.prompt_text(message);
        let prompt = match self.platform.reply(&message.reference, &text, true).await {
            Ok(prompt) => prompt,
            Err(e) => {
                self.pending.release(message.id());
                return Err(e);
            }
        };
        self.pending.register(prompt, message.clone());
        info!(
            message_id = %message.id(),
            prompt_id = %prompt.id,
            author = %message.author_id,
            "confirmation prompt sent"
        );

        if let Err(e) = self
            .platform
            .add_reaction(&prompt, &self.settings.consent_glyph)
            .await
        {
            warn!(prompt_id = %prompt.id, error = %e, "failed to add consent reaction to prompt");
        }

        Ok(Outcome::Prompted {
            prompt_id: prompt.id,
        })
    }

    async fn reject_too_long(&self, message: &SourceMessage) -> Result<Outcome, PlatformError> {
        if !self.too_long.mark(message.id()) {
            return Ok(Outcome::TooLong { notified: false });
        }
        if let Err(e) = self
            .platform
            .reply(&message.reference, TOO_LONG_NOTICE, true)
            .await
        {
            self.too_long.forget(message.id());
            return Err(e);
        }
        info!(
            message_id = %message.id(),
            len = message.clean_text.len(),
            limit = self.settings.max_text_len,
            "message too long to post"
        );
        Ok(Outcome::TooLong { notified: true })
    }

    /// Publish the claimed source message and write the result back.
    ///
    /// The prompt edit and registry cleanup happen whether or not
    /// publishing succeeded.
    async fn consent(
        &self,
        pending: PendingConfirmation,
        prompt: &SourceMessage,
    ) -> Result<Outcome, PlatformError> {
        info!(
            message_id = %pending.source_message_id(),
            prompt_id = %pending.prompt.id,
            waited_secs = chrono::Utc::now()
                .signed_duration_since(pending.created_at)
                .num_seconds(),
            "author consented, publishing"
        );

        let result = self.publish_source(&pending.source).await;

        let (suffix, outcome) = match result {
            Ok(url) => (
                format!("\nEdit: [posted](<{url}>)"),
                Outcome::Published { url },
            ),
            Err(e) => {
                warn!(
                    message_id = %pending.source_message_id(),
                    error = %e,
                    "publishing failed"
                );
                let message = e.user_message().replace('`', "'");
                (
                    format!("\nEdit: `{message}` 🙁"),
                    Outcome::PublishFailed { message },
                )
            }
        };

        let edited = format!("{}{suffix}", prompt.content);
        let edit = self
            .platform
            .edit_content(&pending.prompt, &edited, true)
            .await;

        let marker = if matches!(outcome, Outcome::Published { .. }) {
            self.platform
                .add_reaction(&pending.source.reference, &self.settings.trigger_glyph)
                .await
        } else {
            Ok(())
        };

        self.pending.finish(pending.source_message_id());

        edit?;
        marker?;
        Ok(outcome)
    }

    async fn publish_source(&self, source: &SourceMessage) -> Result<String, ExportError> {
        let post = content::assemble(source, self.attachments.as_ref(), &self.limits).await?;
        let uri = self.publisher.publish(&post).await?;
        let url = uri.web_url(&self.settings.web_host);
        info!(message_id = %source.id(), %url, "message published");
        Ok(url)
    }

    fn prompt_text(&self, message: &SourceMessage) -> String {
        let target = match &self.settings.profile_url {
            Some(url) => format!("a [{}](<{url}>)", self.settings.account_label),
            None => format!("a {}", self.settings.account_label),
        };
        format!(
            "{} are you okay with your msg being posted publicly to {target}? Click the {} if so.",
            self.platform.mention(message.author_id),
            self.settings.consent_glyph
        )
    }
}
