//! [`ChatPlatform`] implementation backed by serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    Attachment as DiscordAttachment, Cache, ChannelId as DiscordChannelId, CreateMessage,
    EditMessage, GuildId, Http, Mentionable, Message, MessageFlags,
    MessageId as DiscordMessageId, ReactionType, User, UserId as DiscordUserId,
};
use serenity::utils::{content_safe, ContentSafeOptions};
use tracing::info;

use crate::platform::{
    Attachment, ChatPlatform, MessageRef, PlatformError, SourceMessage, UserId,
};

/// Page size for reaction user listing (Discord's maximum).
const REACTORS_PAGE: u8 = 100;

/// Discord REST access for the export flow.
pub struct DiscordPlatform {
    http: Arc<Http>,
    bot_user_id: UserId,
}

impl DiscordPlatform {
    /// Create the REST client and resolve the bot's own user id.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Api`] if the token is rejected.
    pub async fn connect(token: &str) -> Result<Self, PlatformError> {
        let http = Arc::new(Http::new(token));
        let me = http.get_current_user().await.map_err(api)?;
        info!(bot = %me.name, id = %me.id, "discord bot identity resolved");
        Ok(Self {
            http,
            bot_user_id: UserId(me.id.get()),
        })
    }
}

fn api(e: serenity::Error) -> PlatformError {
    PlatformError::Api(e.to_string())
}

fn reaction_type(glyph: &str) -> Result<ReactionType, PlatformError> {
    ReactionType::try_from(glyph)
        .map_err(|e| PlatformError::Api(format!("invalid reaction {glyph:?}: {e}")))
}

fn ids(message: &MessageRef) -> (DiscordChannelId, DiscordMessageId) {
    (
        DiscordChannelId::new(message.channel_id.0),
        DiscordMessageId::new(message.id.0),
    )
}

/// Convert a Discord attachment.
pub fn to_attachment(attachment: &DiscordAttachment) -> Attachment {
    Attachment {
        content_type: attachment.content_type.clone(),
        size: u64::from(attachment.size),
        url: attachment.url.clone(),
        filename: attachment.filename.clone(),
        width: attachment.width,
        height: attachment.height,
    }
}

/// Snapshot a Discord message, rendering its clean text through `cache`.
///
/// Messages fetched over REST carry no guild id, so the guild the reaction
/// arrived in is passed separately.
pub fn to_source_message(
    message: &Message,
    cache: &Arc<Cache>,
    guild_id: Option<GuildId>,
) -> SourceMessage {
    SourceMessage {
        reference: MessageRef::new(message.channel_id.get(), message.id.get()),
        author_id: UserId(message.author.id.get()),
        content: message.content.clone(),
        clean_text: clean_text(message, cache, guild_id.or(message.guild_id)),
        attachments: message.attachments.iter().map(to_attachment).collect(),
    }
}

/// Render `message` the way members see it: user mentions become
/// `@display name`, role and channel mentions become names, and
/// `@everyone`/`@here` are defused.
pub fn clean_text(message: &Message, cache: &Arc<Cache>, guild_id: Option<GuildId>) -> String {
    let mut content = message.content.clone();
    for user in &message.mentions {
        let name = format!("@{}", display_name(user, cache, guild_id));
        content = content
            .replace(&format!("<@{}>", user.id), &name)
            .replace(&format!("<@!{}>", user.id), &name);
    }

    let mut options = ContentSafeOptions::new().clean_user(false);
    if let Some(guild_id) = guild_id {
        options = options.display_as_member_from(guild_id);
    }
    content_safe(cache, content, &options, &message.mentions)
}

/// Server nickname, then global display name, then account name.
fn display_name(user: &User, cache: &Arc<Cache>, guild_id: Option<GuildId>) -> String {
    if let Some(nick) = user.member.as_ref().and_then(|member| member.nick.clone()) {
        return nick;
    }
    let cached = guild_id.and_then(|guild_id| {
        cache
            .guild(guild_id)
            .and_then(|guild| guild.members.get(&user.id).map(|m| m.display_name().to_owned()))
    });
    cached
        .or_else(|| user.global_name.clone())
        .unwrap_or_else(|| user.name.clone())
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    fn mention(&self, user: UserId) -> String {
        DiscordUserId::new(user.0).mention().to_string()
    }

    async fn reply(
        &self,
        to: &MessageRef,
        text: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef, PlatformError> {
        let (channel_id, message_id) = ids(to);
        let mut builder = CreateMessage::new()
            .content(text)
            .reference_message((channel_id, message_id));
        if suppress_link_preview {
            builder = builder.flags(MessageFlags::SUPPRESS_EMBEDS);
        }
        let sent = channel_id
            .send_message(&self.http, builder)
            .await
            .map_err(api)?;
        Ok(MessageRef::new(sent.channel_id.get(), sent.id.get()))
    }

    async fn add_reaction(&self, message: &MessageRef, glyph: &str) -> Result<(), PlatformError> {
        let (channel_id, message_id) = ids(message);
        channel_id
            .create_reaction(&self.http, message_id, reaction_type(glyph)?)
            .await
            .map_err(api)
    }

    async fn edit_content(
        &self,
        message: &MessageRef,
        text: &str,
        suppress_embeds: bool,
    ) -> Result<(), PlatformError> {
        let (channel_id, message_id) = ids(message);
        let builder = EditMessage::new()
            .content(text)
            .suppress_embeds(suppress_embeds);
        channel_id
            .edit_message(&self.http, message_id, builder)
            .await
            .map_err(api)?;
        Ok(())
    }

    async fn list_reactors(
        &self,
        message: &MessageRef,
        glyph: &str,
    ) -> Result<Vec<UserId>, PlatformError> {
        let (channel_id, message_id) = ids(message);
        let reaction = reaction_type(glyph)?;
        let mut reactors = Vec::new();
        let mut after: Option<DiscordUserId> = None;

        loop {
            let page = channel_id
                .reaction_users(
                    &self.http,
                    message_id,
                    reaction.clone(),
                    Some(REACTORS_PAGE),
                    after,
                )
                .await
                .map_err(api)?;
            let full = page.len() >= usize::from(REACTORS_PAGE);
            after = page.last().map(|user| user.id);
            reactors.extend(page.iter().map(|user| UserId(user.id.get())));
            if !full || after.is_none() {
                break;
            }
        }

        Ok(reactors)
    }
}
