//! In-memory fakes for the chat platform, attachment store, and publisher.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use overheard::bluesky::{PostUri, PublishError, Publisher};
use overheard::content::{LinkFacet, PostImage, PostVideo};
use overheard::platform::{
    Attachment, AttachmentStore, ChatPlatform, MessageId, MessageRef, PlatformError,
    ReactionEvent, SourceMessage, UserId,
};

pub const CHANNEL: u64 = 10;
pub const BOT: UserId = UserId(1);
pub const AUTHOR: UserId = UserId(100);
pub const BYSTANDER: UserId = UserId(200);

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn source(id: u64, author: UserId, text: &str) -> SourceMessage {
    SourceMessage {
        reference: MessageRef::new(CHANNEL, id),
        author_id: author,
        content: text.to_owned(),
        clean_text: text.to_owned(),
        attachments: Vec::new(),
    }
}

pub fn attachment(url: &str, content_type: Option<&str>, size: u64) -> Attachment {
    Attachment {
        content_type: content_type.map(str::to_owned),
        size,
        url: url.to_owned(),
        filename: url.rsplit('/').next().unwrap_or(url).to_owned(),
        width: Some(1200),
        height: Some(800),
    }
}

pub fn reaction(reactor: UserId, glyph: &str, count: u64, message: &SourceMessage) -> ReactionEvent {
    ReactionEvent {
        reactor_id: reactor,
        glyph: glyph.to_owned(),
        reaction_count: count,
        message: message.clone(),
    }
}

/// Deterministic noise image; compresses poorly as PNG, well as JPEG.
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let b = state.to_be_bytes();
        image::Rgb([b[0], b[1], b[2]])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encoding should succeed");
    out.into_inner()
}

// ---------------------------------------------------------------------------
// Chat platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reply {
        to: MessageRef,
        text: String,
        suppress_link_preview: bool,
        sent: MessageRef,
    },
    AddReaction {
        message: MessageRef,
        glyph: String,
    },
    Edit {
        message: MessageRef,
        text: String,
        suppress_embeds: bool,
    },
}

pub struct FakePlatform {
    next_id: AtomicU64,
    fail_replies: AtomicBool,
    calls: Mutex<Vec<Call>>,
    reactions: Mutex<HashMap<(MessageId, String), Vec<UserId>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(5000),
            fail_replies: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            reactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn replies(&self) -> Vec<(MessageRef, String, MessageRef)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reply { to, text, sent, .. } => Some((to, text, sent)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageRef, String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit {
                    message,
                    text,
                    suppress_embeds,
                } => Some((message, text, suppress_embeds)),
                _ => None,
            })
            .collect()
    }

    /// Reactions the bot added, as `(message, glyph)`.
    pub fn bot_reactions(&self) -> Vec<(MessageRef, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddReaction { message, glyph } => Some((message, glyph)),
                _ => None,
            })
            .collect()
    }

    /// Record a user's reaction so `list_reactors` reports it.
    pub fn react_as(&self, message: &SourceMessage, glyph: &str, user: UserId) {
        self.reactions
            .lock()
            .expect("lock")
            .entry((message.id(), glyph.to_owned()))
            .or_default()
            .push(user);
    }

    /// The prompt message as it would be delivered in a reaction event.
    pub fn prompt_message(&self, prompt: MessageRef) -> SourceMessage {
        let text = self
            .replies()
            .into_iter()
            .find(|(_, _, sent)| *sent == prompt)
            .map(|(_, text, _)| text)
            .expect("prompt should have been sent");
        SourceMessage {
            reference: prompt,
            author_id: BOT,
            content: text.clone(),
            clean_text: text,
            attachments: Vec::new(),
        }
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn bot_user_id(&self) -> UserId {
        BOT
    }

    fn mention(&self, user: UserId) -> String {
        format!("<@{user}>")
    }

    async fn reply(
        &self,
        to: &MessageRef,
        text: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef, PlatformError> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(PlatformError::Api("missing permissions".to_owned()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sent = MessageRef::new(to.channel_id.0, id);
        self.calls.lock().expect("lock").push(Call::Reply {
            to: *to,
            text: text.to_owned(),
            suppress_link_preview,
            sent,
        });
        Ok(sent)
    }

    async fn add_reaction(&self, message: &MessageRef, glyph: &str) -> Result<(), PlatformError> {
        self.calls.lock().expect("lock").push(Call::AddReaction {
            message: *message,
            glyph: glyph.to_owned(),
        });
        self.reactions
            .lock()
            .expect("lock")
            .entry((message.id, glyph.to_owned()))
            .or_default()
            .push(BOT);
        Ok(())
    }

    async fn edit_content(
        &self,
        message: &MessageRef,
        text: &str,
        suppress_embeds: bool,
    ) -> Result<(), PlatformError> {
        self.calls.lock().expect("lock").push(Call::Edit {
            message: *message,
            text: text.to_owned(),
            suppress_embeds,
        });
        Ok(())
    }

    async fn list_reactors(
        &self,
        message: &MessageRef,
        glyph: &str,
    ) -> Result<Vec<UserId>, PlatformError> {
        Ok(self
            .reactions
            .lock()
            .expect("lock")
            .get(&(message.id, glyph.to_owned()))
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Attachment store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    reads: AtomicU64,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, data: Vec<u8>) {
        self.files.lock().expect("lock").insert(url.to_owned(), data);
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentStore for FakeStore {
    async fn read(&self, attachment: &Attachment) -> Result<Vec<u8>, PlatformError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .expect("lock")
            .get(&attachment.url)
            .cloned()
            .ok_or_else(|| PlatformError::Api(format!("404 for {}", attachment.url)))
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    None,
    Images(usize),
    Video,
}

#[derive(Debug, Clone)]
pub struct Published {
    pub text: String,
    pub facets: Vec<LinkFacet>,
    pub media: Media,
    pub image_sizes: Vec<usize>,
}

pub struct FakePublisher {
    uri: String,
    failure: Mutex<Option<PublishError>>,
    posts: Mutex<Vec<Published>>,
}

impl FakePublisher {
    pub fn returning(uri: &str) -> Self {
        Self {
            uri: uri.to_owned(),
            failure: Mutex::new(None),
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next publish with `error`.
    pub fn fail_next(&self, error: PublishError) {
        *self.failure.lock().expect("lock") = Some(error);
    }

    pub fn posts(&self) -> Vec<Published> {
        self.posts.lock().expect("lock").clone()
    }

    fn record(&self, post: Published) -> Result<PostUri, PublishError> {
        if let Some(error) = self.failure.lock().expect("lock").take() {
            return Err(error);
        }
        self.posts.lock().expect("lock").push(post);
        PostUri::parse(&self.uri)
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish_text(
        &self,
        text: &str,
        facets: &[LinkFacet],
    ) -> Result<PostUri, PublishError> {
        self.record(Published {
            text: text.to_owned(),
            facets: facets.to_vec(),
            media: Media::None,
            image_sizes: Vec::new(),
        })
    }

    async fn publish_images(
        &self,
        text: &str,
        facets: &[LinkFacet],
        images: &[PostImage],
    ) -> Result<PostUri, PublishError> {
        self.record(Published {
            text: text.to_owned(),
            facets: facets.to_vec(),
            media: Media::Images(images.len()),
            image_sizes: images.iter().map(|i| i.data.len()).collect(),
        })
    }

    async fn publish_video(
        &self,
        text: &str,
        facets: &[LinkFacet],
        _video: &PostVideo,
    ) -> Result<PostUri, PublishError> {
        self.record(Published {
            text: text.to_owned(),
            facets: facets.to_vec(),
            media: Media::Video,
            image_sizes: Vec::new(),
        })
    }
}
