//! Credential loading from a `.env` file and the process environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::config::Config;

/// Secrets needed to run the bot.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns a required, non-empty credential.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is missing or blank.
    pub fn require(&self, key: &str) -> anyhow::Result<String> {
        self.vars
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required credential: {key}"))
    }

    /// Overlay values from `env` for the given keys. Process environment
    /// wins over the `.env` file.
    pub fn merge_env(&mut self, keys: &[&str], env: impl Fn(&str) -> Option<String>) {
        for key in keys {
            if let Some(value) = env(key) {
                self.vars.insert((*key).to_owned(), value);
            }
        }
    }
}

/// Environment variable names the config refers to.
pub fn credential_keys(config: &Config) -> [&str; 3] {
    [
        config.discord.token_env.as_str(),
        config.bluesky.username_env.as_str(),
        config.bluesky.password_env.as_str(),
    ]
}

/// Load credentials from a specific `.env` path.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials { vars })
}

/// Load credentials for `config`: the optional `.env` file at `env_file`,
/// overlaid with the process environment.
///
/// # Errors
///
/// Returns an error if an existing `.env` file is unreadable or too
/// permissive.
pub fn load_for(config: &Config, env_file: &Path) -> anyhow::Result<Credentials> {
    let mut credentials = if env_file.exists() {
        load_credentials(env_file)?
    } else {
        Credentials::default()
    };
    credentials.merge_env(&credential_keys(config), |key| std::env::var(key).ok());
    Ok(credentials)
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
