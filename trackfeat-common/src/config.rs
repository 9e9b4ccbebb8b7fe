//! Configuration loading for trackfeat
//!
//! Resolution priority for credentials: environment variable, then TOML
//! config file. A missing config file is not fatal: the engine starts with
//! defaults (ReccoBeats search, all save fields enabled) and logs a warning.

use crate::error::{Error, Result};
use crate::types::Provider;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the Spotify client id
pub const ENV_SPOTIFY_CLIENT_ID: &str = "TRACKFEAT_SPOTIFY_CLIENT_ID";
/// Environment variable overriding the Spotify client secret
pub const ENV_SPOTIFY_CLIENT_SECRET: &str = "TRACKFEAT_SPOTIFY_CLIENT_SECRET";

/// Spotify client-credentials pair
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl SpotifyCredentials {
    /// Both halves present and non-whitespace
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

/// Which audio-feature fields the save stage writes back into tags
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveFields {
    pub bpm: bool,
    pub initial_key: bool,
    pub danceability: bool,
    pub energy: bool,
    pub valence: bool,
    pub acousticness: bool,
    pub instrumentalness: bool,
    pub comment: bool,
}

impl Default for SaveFields {
    fn default() -> Self {
        // All fields enabled by default, matching the plugin's first-run state
        Self {
            bpm: true,
            initial_key: true,
            danceability: true,
            energy: true,
            valence: true,
            acousticness: true,
            instrumentalness: true,
            comment: true,
        }
    }
}

impl SaveFields {
    /// At least one custom (0..1-valued) field enabled; the comment legend
    /// only makes sense when one of these is written
    pub fn any_custom_field(&self) -> bool {
        self.danceability
            || self.energy
            || self.valence
            || self.acousticness
            || self.instrumentalness
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which provider performs the track search
    pub search_provider: ProviderChoice,
    pub spotify: SpotifyCredentials,
    pub save_fields: SaveFields,
    pub logging: LoggingConfig,
}

/// Serde-friendly provider selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    #[default]
    Reccobeats,
    Spotify,
}

impl From<ProviderChoice> for Provider {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Reccobeats => Provider::ReccoBeats,
            ProviderChoice::Spotify => Provider::Spotify,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist. Environment variables override the TOML
    /// credentials.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("read {} failed: {e}", path.display())))?;
            let parsed: EngineConfig = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("parse {} failed: {e}", path.display())))?;
            info!(path = %path.display(), "Loaded configuration");
            parsed
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            EngineConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables take priority over TOML values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var(ENV_SPOTIFY_CLIENT_ID) {
            if !id.trim().is_empty() {
                self.spotify.client_id = id;
            }
        }
        if let Ok(secret) = std::env::var(ENV_SPOTIFY_CLIENT_SECRET) {
            if !secret.trim().is_empty() {
                self.spotify.client_secret = secret;
            }
        }
    }
}

/// Initialize the global tracing subscriber from `LoggingConfig`.
///
/// `RUST_LOG` takes priority over the configured level. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_enable_all_save_fields() {
        let config = EngineConfig::default();
        assert_eq!(config.search_provider, ProviderChoice::Reccobeats);
        assert!(config.save_fields.bpm);
        assert!(config.save_fields.comment);
        assert!(!config.spotify.is_complete());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            search_provider = "spotify"

            [spotify]
            client_id = "abc"
            client_secret = "def"

            [save_fields]
            valence = false
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.search_provider, ProviderChoice::Spotify);
        assert!(config.spotify.is_complete());
        assert!(!config.save_fields.valence);
        // Unlisted fields keep their defaults
        assert!(config.save_fields.bpm);
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml_credentials() {
        std::env::set_var(ENV_SPOTIFY_CLIENT_ID, "env-id");
        std::env::set_var(ENV_SPOTIFY_CLIENT_SECRET, "env-secret");

        let mut config = EngineConfig::default();
        config.spotify.client_id = "toml-id".into();
        config.apply_env_overrides();

        assert_eq!(config.spotify.client_id, "env-id");
        assert_eq!(config.spotify.client_secret, "env-secret");

        std::env::remove_var(ENV_SPOTIFY_CLIENT_ID);
        std::env::remove_var(ENV_SPOTIFY_CLIENT_SECRET);
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        std::env::remove_var(ENV_SPOTIFY_CLIENT_ID);
        std::env::remove_var(ENV_SPOTIFY_CLIENT_SECRET);

        let config = EngineConfig::load(Path::new("/nonexistent/trackfeat.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_load_reads_toml_file() {
        std::env::remove_var(ENV_SPOTIFY_CLIENT_ID);
        std::env::remove_var(ENV_SPOTIFY_CLIENT_SECRET);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trackfeat.toml");
        std::fs::write(
            &path,
            r#"
                [logging]
                level = "debug"

                [spotify]
                client_id = "file-id"
                client_secret = "file-secret"
            "#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.spotify.client_id, "file-id");

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "search_provider = ").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_any_custom_field() {
        let mut fields = SaveFields::default();
        assert!(fields.any_custom_field());
        fields.danceability = false;
        fields.energy = false;
        fields.valence = false;
        fields.acousticness = false;
        fields.instrumentalness = false;
        assert!(!fields.any_custom_field());
    }
}
