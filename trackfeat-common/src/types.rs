//! Domain types shared between the resolution engine and the UI/save layer

use serde::{Deserialize, Serialize};

/// Which remote metadata service a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Primary provider: open catalog, no credentials, batch feature endpoint
    ReccoBeats,
    /// Secondary provider: requires client-credentials OAuth
    Spotify,
}

impl Provider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::ReccoBeats => "ReccoBeats",
            Provider::Spotify => "Spotify",
        }
    }
}

/// One input track as supplied by the host player's selection
///
/// `artist` may encode multiple artists separated by `;`. `source_index` is
/// the track's position in the host's track list and is carried through to
/// the save stage unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackQuery {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub source_index: usize,
}

/// A provider-native track record unified across both providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTrack {
    pub source_index: usize,
    /// Provider-native track identifier
    pub track_id: String,
    pub title: String,
    /// Artist display names in listing order
    pub artist_names: Vec<String>,
    pub album_name: Option<String>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<u32>,
    pub provider: Provider,
    /// Provider resource URL when the API reports one
    pub href: Option<String>,
}

/// Derived acoustic descriptors for one track
///
/// All fields other than `id` are optional: providers omit descriptors they
/// have no data for. `key` uses the 0-11 major / 12-23 minor code space
/// (see `crate::keys`); negative values mean unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFeatureVector {
    pub id: String,
    pub href: Option<String>,
    pub tempo: Option<f64>,
    pub key: Option<i32>,
    pub mode: Option<i32>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub speechiness: Option<f64>,
    pub loudness: Option<f64>,
}

/// Per-input-track outcome, one per `TrackQuery` in input order
///
/// Invariant: `error.is_some()` implies both `resolved` and `features` are
/// `None`. A track that resolved but has no feature data keeps `error: None`
/// with `features: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResult {
    pub query: TrackQuery,
    pub resolved: Option<ResolvedTrack>,
    pub features: Option<AudioFeatureVector>,
    pub error: Option<String>,
}

impl TrackResult {
    pub fn failed(query: TrackQuery, error: impl Into<String>) -> Self {
        Self {
            query,
            resolved: None,
            features: None,
            error: Some(error.into()),
        }
    }

    pub fn resolved(query: TrackQuery, resolved: ResolvedTrack) -> Self {
        Self {
            query,
            resolved: Some(resolved),
            features: None,
            error: None,
        }
    }

    /// True when the track has feature data and no error
    pub fn is_success(&self) -> bool {
        self.features.is_some() && self.error.is_none()
    }
}

/// Aggregate counts for the UI layer's summary panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub processed: usize,
    pub resolved: usize,
    pub with_features: usize,
    pub errors: usize,
}

impl ResolutionSummary {
    pub fn from_results(results: &[TrackResult]) -> Self {
        Self {
            processed: results.len(),
            resolved: results.iter().filter(|r| r.resolved.is_some()).count(),
            with_features: results.iter().filter(|r| r.is_success()).count(),
            errors: results.iter().filter(|r| r.error.is_some()).count(),
        }
    }
}
