//! Overheard: a consent-gated Discord to Bluesky cross-poster.
//!
//! Someone reacts to a chat message with the export glyph; the bot asks the
//! author for consent in a threaded reply; on consent the message (text,
//! links, images, or video) is published to Bluesky and the prompt is
//! edited to link to the new post.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod platform;

pub mod bluesky;
pub mod content;
pub mod export;

pub mod discord;
