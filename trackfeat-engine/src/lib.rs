//! trackfeat-engine: track resolution and audio-feature retrieval
//!
//! The engine takes the host player's selected tracks, resolves each one
//! against a remote metadata provider, fetches per-track audio feature
//! vectors in batches, and plans the tag writes for the save stage. The
//! host player integration (track list, dialog, tag storage) stays outside;
//! it talks to the engine through [`FeatureSession`] and the
//! [`tags::TagSink`] trait.

pub mod services;
pub mod tags;

use services::resolver::{TrackResolver, TrackSearcher};
use services::{ReccoBeatsClient, SpotifyClient};
use trackfeat_common::config::{EngineConfig, SaveFields};
use trackfeat_common::types::{Provider, ResolutionSummary, TrackQuery, TrackResult};
use trackfeat_common::Result;

/// One resolution session over a selection of tracks.
///
/// Owns the provider clients for the session lifetime. ReccoBeats is always
/// constructed since it serves audio features regardless of which provider
/// performs the search; Spotify is constructed only when selected and
/// configured. Selecting Spotify without complete credentials falls back to
/// ReccoBeats search with a warning instead of failing.
pub struct FeatureSession {
    reccobeats: ReccoBeatsClient,
    spotify: Option<SpotifyClient>,
    search_provider: Provider,
    save_fields: SaveFields,
}

impl FeatureSession {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let reccobeats = ReccoBeatsClient::new()?;

        let mut search_provider = Provider::from(config.search_provider);
        let spotify = if search_provider == Provider::Spotify {
            if config.spotify.is_complete() {
                Some(SpotifyClient::new(config.spotify.clone())?)
            } else {
                tracing::warn!(
                    "Spotify search selected but credentials are incomplete, \
                     falling back to ReccoBeats"
                );
                search_provider = Provider::ReccoBeats;
                None
            }
        } else {
            None
        };

        Ok(Self {
            reccobeats,
            spotify,
            search_provider,
            save_fields: config.save_fields.clone(),
        })
    }

    /// Provider actually performing the searches, after credential fallback
    pub fn search_provider(&self) -> Provider {
        self.search_provider
    }

    /// Resolve every query and attach audio features.
    ///
    /// Clears the session cache first so no catalog data leaks in from a
    /// previous run, and authenticates Spotify up front when it is the
    /// search provider so credential problems surface before the first
    /// track instead of mid-batch.
    pub async fn run(&self, queries: &[TrackQuery]) -> Result<Vec<TrackResult>> {
        self.reccobeats.clear_cache().await;

        tracing::info!(
            tracks = queries.len(),
            provider = self.search_provider.display_name(),
            "Starting resolution session"
        );

        let searcher: &dyn TrackSearcher = match &self.spotify {
            Some(spotify) => {
                spotify.authenticate().await?;
                spotify
            }
            None => &self.reccobeats,
        };

        let resolver = TrackResolver::new(searcher, &self.reccobeats);
        let results = resolver.resolve_all(queries).await?;

        let summary = TrackResolver::summary(&results);
        tracing::info!(
            processed = summary.processed,
            resolved = summary.resolved,
            with_features = summary.with_features,
            errors = summary.errors,
            "Resolution session complete"
        );

        Ok(results)
    }

    /// Aggregate counts for the UI's summary panel
    pub fn summary(results: &[TrackResult]) -> ResolutionSummary {
        TrackResolver::summary(results)
    }

    /// Commit the configured fields of every successful result through the
    /// host player's tag sink
    pub async fn save(
        &self,
        sink: &mut dyn tags::TagSink,
        results: &[TrackResult],
    ) -> tags::SaveOutcome {
        tags::apply(sink, results, &self.save_fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackfeat_common::config::ProviderChoice;

    #[test]
    fn test_spotify_without_credentials_falls_back() {
        let mut config = EngineConfig::default();
        config.search_provider = ProviderChoice::Spotify;

        let session = FeatureSession::new(&config).unwrap();
        assert_eq!(session.search_provider(), Provider::ReccoBeats);
        assert!(session.spotify.is_none());
    }

    #[test]
    fn test_spotify_with_credentials_is_selected() {
        let mut config = EngineConfig::default();
        config.search_provider = ProviderChoice::Spotify;
        config.spotify.client_id = "id".into();
        config.spotify.client_secret = "secret".into();

        let session = FeatureSession::new(&config).unwrap();
        assert_eq!(session.search_provider(), Provider::Spotify);
        assert!(session.spotify.is_some());
    }

    #[test]
    fn test_default_config_uses_reccobeats() {
        let session = FeatureSession::new(&EngineConfig::default()).unwrap();
        assert_eq!(session.search_provider(), Provider::ReccoBeats);
    }
}
