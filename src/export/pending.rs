//! In-memory bookkeeping for confirmation prompts.
//!
//! [`PendingConfirmations`] maps prompt ids to the source message awaiting
//! consent, with a reverse index by source id that enforces at most one
//! live prompt per source message. A source slot moves through
//! `Reserved -> Prompted -> Publishing` and is freed when the consent path
//! finishes (or the prompt could not be sent).
//!
//! Both registries use a sync [`Mutex`]: critical sections are plain map
//! operations and never span an await.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::platform::{MessageId, MessageRef, SourceMessage, UserId};

/// A prompt waiting for the source author's consent.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// The confirmation prompt message.
    pub prompt: MessageRef,
    /// Snapshot of the message to publish.
    pub source: SourceMessage,
    /// The only user whose consent counts.
    pub author_id: UserId,
    /// When the prompt was registered.
    pub created_at: DateTime<Utc>,
}

impl PendingConfirmation {
    /// Id of the message awaiting consent.
    pub fn source_message_id(&self) -> MessageId {
        self.source.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceSlot {
    /// A prompt is being sent for this source.
    Reserved,
    /// A live prompt exists.
    Prompted(MessageId),
    /// Consent was given and the post is being published.
    Publishing,
}

#[derive(Debug, Default)]
struct Inner {
    by_prompt: HashMap<MessageId, PendingConfirmation>,
    by_source: HashMap<MessageId, SourceSlot>,
}

/// Live confirmation prompts, keyed by prompt id and by source id.
#[derive(Debug, Default)]
pub struct PendingConfirmations {
    inner: Mutex<Inner>,
}

impl PendingConfirmations {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Author whose consent the prompt `prompt_id` waits for, if it is a
    /// live prompt.
    pub fn author_of(&self, prompt_id: MessageId) -> Option<UserId> {
        self.lock().by_prompt.get(&prompt_id).map(|p| p.author_id)
    }

    /// Whether `source_id` has a reserved, live, or publishing prompt.
    pub fn is_source_active(&self, source_id: MessageId) -> bool {
        self.lock().by_source.contains_key(&source_id)
    }

    /// Reserve `source_id` before sending a prompt for it.
    ///
    /// Returns `false` if the source already has an active slot.
    pub fn reserve(&self, source_id: MessageId) -> bool {
        let mut inner = self.lock();
        if inner.by_source.contains_key(&source_id) {
            return false;
        }
        inner.by_source.insert(source_id, SourceSlot::Reserved);
        true
    }

    /// Drop a reservation whose prompt was never sent.
    pub fn release(&self, source_id: MessageId) {
        let mut inner = self.lock();
        if inner.by_source.get(&source_id) == Some(&SourceSlot::Reserved) {
            inner.by_source.remove(&source_id);
        }
    }

    /// Register a sent prompt for `source`.
    pub fn register(&self, prompt: MessageRef, source: SourceMessage) -> PendingConfirmation {
        let pending = PendingConfirmation {
            prompt,
            author_id: source.author_id,
            source,
            created_at: Utc::now(),
        };
        let mut inner = self.lock();
        inner
            .by_source
            .insert(pending.source_message_id(), SourceSlot::Prompted(prompt.id));
        inner.by_prompt.insert(prompt.id, pending.clone());
        pending
    }

    /// Take the prompt `prompt_id` for publishing.
    ///
    /// Returns `None` if it is not live (never registered, or already
    /// claimed). The source slot stays occupied until [`Self::finish`].
    pub fn claim(&self, prompt_id: MessageId) -> Option<PendingConfirmation> {
        let mut inner = self.lock();
        let pending = inner.by_prompt.remove(&prompt_id)?;
        inner
            .by_source
            .insert(pending.source_message_id(), SourceSlot::Publishing);
        Some(pending)
    }

    /// Free the source slot after the consent path has finished.
    pub fn finish(&self, source_id: MessageId) {
        self.lock().by_source.remove(&source_id);
    }

    /// Prompt id of the live prompt for `source_id`, if any.
    pub fn prompt_for(&self, source_id: MessageId) -> Option<MessageId> {
        match self.lock().by_source.get(&source_id) {
            Some(SourceSlot::Prompted(prompt_id)) => Some(*prompt_id),
            _ => None,
        }
    }

    /// Number of live prompts.
    pub fn len(&self) -> usize {
        self.lock().by_prompt.len()
    }

    /// Whether no prompt is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source messages that already got a "too long" notice.
///
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct TooLongRegistry {
    notified: Mutex<HashSet<MessageId>>,
}

impl TooLongRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<MessageId>> {
        self.notified.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `id`. Returns `true` if it was not recorded before.
    pub fn mark(&self, id: MessageId) -> bool {
        self.lock().insert(id)
    }

    /// Remove `id` again (the notice could not be delivered).
    pub fn forget(&self, id: MessageId) {
        self.lock().remove(&id);
    }

    /// Whether `id` already got a notice.
    pub fn contains(&self, id: MessageId) -> bool {
        self.lock().contains(&id)
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
