//! Coverage for config parsing, validation, and path resolution.

use std::fs;

use overheard::config::{config_dir, load_config, Config};

fn parse(toml_text: &str) -> Config {
    match toml::from_str::<Config>(toml_text) {
        Ok(config) => config,
        Err(err) => panic!("config should parse: {err}"),
    }
}

#[test]
fn empty_file_uses_defaults() {
    let config = parse("");
    assert!(config.validate().is_ok());

    assert_eq!(config.discord.token_env, "DISCORD_TOKEN");
    assert_eq!(config.bluesky.service, "https://bsky.social");
    assert_eq!(config.bluesky.username_env, "BLUESKY_USERNAME");
    assert_eq!(config.bluesky.password_env, "BLUESKY_APP_PASSWORD");
    assert_eq!(config.export.trigger_glyph, "📤");
    assert_eq!(config.export.consent_glyph, "✅");
    assert_eq!(config.export.trigger_threshold, 1);
    assert_eq!(config.export.max_text_len, 300);
    assert_eq!(config.media.image_max_bytes, 1_000_000);
    assert_eq!(config.media.image_max_resolution, 2000);
    assert_eq!(config.media.max_images, 4);
    assert!(config.logging.level.is_none());
}

#[test]
fn sections_override_defaults() {
    let config = parse(
        r#"
[bluesky]
web_host = "staging.bsky.app"
profile_url = "https://bsky.app/profile/club.example"
account_label = "club account"
langs = ["en"]

[export]
trigger_glyph = "🦋"
trigger_threshold = 3

[media]
max_images = 2
min_quality = 40

[logging]
level = "debug"
"#,
    );
    assert!(config.validate().is_ok());

    let settings = config.export_settings();
    assert_eq!(settings.trigger_glyph, "🦋");
    assert_eq!(settings.consent_glyph, "✅");
    assert_eq!(settings.trigger_threshold, 3);
    assert_eq!(settings.web_host, "staging.bsky.app");
    assert_eq!(
        settings.profile_url.as_deref(),
        Some("https://bsky.app/profile/club.example")
    );
    assert_eq!(settings.account_label, "club account");

    let limits = config.assembly_limits();
    assert_eq!(limits.max_images, 2);
    assert_eq!(limits.image.min_quality, 40);
    assert_eq!(limits.image.max_quality, 96);

    assert_eq!(config.bluesky.langs, vec!["en".to_owned()]);
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
}

#[test]
fn identical_glyphs_are_rejected() {
    let config = parse("[export]\ntrigger_glyph = \"✅\"\n");
    assert!(config.validate().is_err());
}

#[test]
fn inverted_quality_bounds_are_rejected() {
    let config = parse("[media]\nmin_quality = 90\nmax_quality = 50\n");
    assert!(config.validate().is_err());

    let config = parse("[media]\nmax_quality = 101\n");
    assert!(config.validate().is_err());
}

#[test]
fn image_cap_is_bounded() {
    assert!(parse("[media]\nmax_images = 0\n").validate().is_err());
    assert!(parse("[media]\nmax_images = 5\n").validate().is_err());
}

#[test]
fn bad_service_url_is_rejected() {
    let config = parse("[bluesky]\nservice = \"not a url\"\n");
    assert!(config.validate().is_err());
}

#[test]
fn load_config_reads_and_validates() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("config.toml");

    let write = fs::write(&path, "[export]\nmax_text_len = 280\n");
    assert!(write.is_ok());
    let loaded = load_config(&path);
    let config = match loaded {
        Ok(config) => config,
        Err(err) => panic!("config should load: {err}"),
    };
    assert_eq!(config.export.max_text_len, 280);

    let write = fs::write(&path, "[media]\nmax_images = 9\n");
    assert!(write.is_ok());
    assert!(load_config(&path).is_err());

    assert!(load_config(&tmp.path().join("missing.toml")).is_err());
}

#[test]
fn config_dir_resolves() {
    let dir = config_dir();
    assert!(dir.is_ok());
    let path = match dir {
        Ok(path) => path,
        Err(err) => panic!("config dir should resolve: {err}"),
    };
    assert!(path.ends_with(".overheard"));
}
