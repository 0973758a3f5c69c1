//! Configuration loading and validation.
//!
//! Everything lives in one optional `config.toml`; every section and field
//! has a default, so an empty file (or no file) is a valid configuration.
//! Secrets never live here: the config only names the environment
//! variables that hold them (see [`crate::credentials`]).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::bluesky::client::DEFAULT_SERVICE;
use crate::bluesky::DEFAULT_WEB_HOST;
use crate::content::compress::{
    ImageLimits, IMAGE_MAX_RESOLUTION, IMAGE_MAX_SIZE, MAX_QUALITY, MIN_QUALITY,
};
use crate::content::{AssemblyLimits, MAX_IMAGES};
use crate::export::{
    ExportSettings, CONSENT_GLYPH, MAX_TEXT_LEN, TRIGGER_GLYPH, TRIGGER_THRESHOLD,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord connection settings.
    pub discord: DiscordConfig,
    /// Bluesky account settings.
    pub bluesky: BlueskyConfig,
    /// Export flow behaviour.
    pub export: ExportConfig,
    /// Media limits.
    pub media: MediaConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Environment variable holding the bot token.
    pub token_env: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: "DISCORD_TOKEN".to_owned(),
        }
    }
}

/// Bluesky account settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    /// PDS entryway URL.
    pub service: String,
    /// Environment variable holding the account handle.
    pub username_env: String,
    /// Environment variable holding the app password.
    pub password_env: String,
    /// Host used for links to published posts.
    pub web_host: String,
    /// Profile link shown in confirmation prompts.
    pub profile_url: Option<String>,
    /// Label for the profile link.
    pub account_label: String,
    /// Language tags attached to every post.
    pub langs: Vec<String>,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_owned(),
            username_env: "BLUESKY_USERNAME".to_owned(),
            password_env: "BLUESKY_APP_PASSWORD".to_owned(),
            web_host: DEFAULT_WEB_HOST.to_owned(),
            profile_url: None,
            account_label: "Bluesky account".to_owned(),
            langs: Vec::new(),
        }
    }
}

/// Export flow behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Reaction that nominates a message.
    pub trigger_glyph: String,
    /// Reaction the author consents with.
    pub consent_glyph: String,
    /// Trigger reactions required before prompting.
    pub trigger_threshold: u64,
    /// Longest publishable clean text, in bytes.
    pub max_text_len: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            trigger_glyph: TRIGGER_GLYPH.to_owned(),
            consent_glyph: CONSENT_GLYPH.to_owned(),
            trigger_threshold: TRIGGER_THRESHOLD,
            max_text_len: MAX_TEXT_LEN,
        }
    }
}

/// Media limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Per-image size ceiling in bytes.
    pub image_max_bytes: usize,
    /// Per-image resolution ceiling in pixels.
    pub image_max_resolution: u32,
    /// Lowest JPEG quality tried.
    pub min_quality: u8,
    /// Highest JPEG quality tried.
    pub max_quality: u8,
    /// Images per post.
    pub max_images: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_max_bytes: IMAGE_MAX_SIZE,
            image_max_resolution: IMAGE_MAX_RESOLUTION,
            min_quality: MIN_QUALITY,
            max_quality: MAX_QUALITY,
            max_images: MAX_IMAGES,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Directory for rotated JSON logs; defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.export.trigger_glyph.is_empty() || self.export.consent_glyph.is_empty() {
            anyhow::bail!("export glyphs must not be empty");
        }
        if self.export.trigger_glyph == self.export.consent_glyph {
            anyhow::bail!("trigger and consent glyphs must differ");
        }
        if self.media.min_quality == 0 || self.media.min_quality > self.media.max_quality {
            anyhow::bail!(
                "invalid quality bounds [{}, {}]",
                self.media.min_quality,
                self.media.max_quality
            );
        }
        if self.media.max_quality > 100 {
            anyhow::bail!("max_quality must be at most 100");
        }
        if self.media.max_images == 0 || self.media.max_images > MAX_IMAGES {
            anyhow::bail!("max_images must be between 1 and {MAX_IMAGES}");
        }
        if self.media.image_max_resolution == 0 {
            anyhow::bail!("image_max_resolution must be positive");
        }
        url::Url::parse(&self.bluesky.service)
            .map_err(|e| anyhow::anyhow!("invalid bluesky.service {:?}: {e}", self.bluesky.service))?;
        Ok(())
    }

    /// Settings for the export state machine.
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            trigger_glyph: self.export.trigger_glyph.clone(),
            consent_glyph: self.export.consent_glyph.clone(),
            trigger_threshold: self.export.trigger_threshold,
            max_text_len: self.export.max_text_len,
            web_host: self.bluesky.web_host.clone(),
            profile_url: self.bluesky.profile_url.clone(),
            account_label: self.bluesky.account_label.clone(),
        }
    }

    /// Limits for the content assembler.
    pub fn assembly_limits(&self) -> AssemblyLimits {
        AssemblyLimits {
            image: ImageLimits {
                max_bytes: self.media.image_max_bytes,
                max_resolution: self.media.image_max_resolution,
                min_quality: self.media.min_quality,
                max_quality: self.media.max_quality,
            },
            max_images: self.media.max_images,
        }
    }
}

/// Load and validate a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Load `<config dir>/config.toml`, falling back to defaults when it does
/// not exist.
///
/// # Errors
///
/// Returns an error if the home directory cannot be resolved or an existing
/// file is invalid.
pub fn load_default_config() -> anyhow::Result<Config> {
    let path = config_dir()?.join("config.toml");
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file found, using defaults");
        return Ok(Config::default());
    }
    load_config(&path)
}

/// Resolve the default config directory (`~/.overheard/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".overheard"))
}
