//! Per-track search orchestration
//!
//! Resolves each input query to a provider-native track, records per-track
//! failures without aborting siblings, then fetches audio features for all
//! resolved ids in one batch pass and distributes the vectors back by
//! position. Authentication failures are the exception: they abort the
//! session, since no further search on that provider can succeed.

use crate::services::batch_fetcher::{BatchFeatureFetcher, FeatureSource};
use async_trait::async_trait;
use trackfeat_common::normalize::{first_artist, matches};
use trackfeat_common::types::{ResolutionSummary, ResolvedTrack, TrackQuery, TrackResult};
use trackfeat_common::{Error, Result};

/// Provider-facing search seam; implemented by both provider clients
#[async_trait]
pub trait TrackSearcher: Send + Sync {
    async fn search_track(
        &self,
        source_index: usize,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<ResolvedTrack>;
}

/// Decide whether the album may scope the search for `query`.
///
/// Compilation/sampler albums carry an album artist different from the
/// track artist; scoping the search by album would then wrongly narrow or
/// miss. The album is included only when the album artist's first segment
/// equals the track artist's first segment.
pub fn album_scope(query: &TrackQuery) -> Option<&str> {
    let album = query.album.as_deref().filter(|a| !a.trim().is_empty())?;
    let album_artist = query.album_artist.as_deref().filter(|a| !a.trim().is_empty())?;

    if matches(&first_artist(album_artist), &first_artist(&query.artist), true) {
        Some(album)
    } else {
        None
    }
}

/// Resolves a batch of track queries against one searcher and one feature
/// source
pub struct TrackResolver<'a> {
    searcher: &'a dyn TrackSearcher,
    features: &'a dyn FeatureSource,
}

impl<'a> TrackResolver<'a> {
    pub fn new(searcher: &'a dyn TrackSearcher, features: &'a dyn FeatureSource) -> Self {
        Self { searcher, features }
    }

    /// Resolve every query to a terminal state, then batch-fetch features.
    ///
    /// Output has exactly one `TrackResult` per input query, in input
    /// order. Per-track `NotFound`/transport/format errors land in that
    /// track's `error` field; only `Auth` errors escalate.
    pub async fn resolve_all(&self, queries: &[TrackQuery]) -> Result<Vec<TrackResult>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<TrackResult> = Vec::with_capacity(queries.len());

        for (position, query) in queries.iter().enumerate() {
            tracing::debug!(
                position = position + 1,
                total = queries.len(),
                artist = %query.artist,
                title = %query.title,
                "Searching track"
            );

            let album = album_scope(query);
            match self
                .searcher
                .search_track(query.source_index, &query.artist, &query.title, album)
                .await
            {
                Ok(resolved) => {
                    results.push(TrackResult::resolved(query.clone(), resolved));
                }
                Err(Error::Auth(message)) => {
                    tracing::error!(error = %message, "Authentication failed, aborting session");
                    return Err(Error::Auth(message));
                }
                Err(e) => {
                    tracing::info!(
                        artist = %query.artist,
                        title = %query.title,
                        error = %e,
                        "Track search failed"
                    );
                    results.push(TrackResult::failed(query.clone(), e.to_string()));
                }
            }
        }

        self.attach_features(&mut results).await;
        Ok(results)
    }

    /// Fetch features for all resolved ids in one batch pass and distribute
    /// them back by position. A resolved track with no feature data is not
    /// an error.
    async fn attach_features(&self, results: &mut [TrackResult]) {
        let mut ids = Vec::new();
        let mut positions = Vec::new();

        for (position, result) in results.iter().enumerate() {
            if let Some(resolved) = &result.resolved {
                ids.push(resolved.track_id.clone());
                positions.push(position);
            }
        }

        if ids.is_empty() {
            return;
        }

        tracing::debug!(count = ids.len(), "Loading audio features");

        let fetched = BatchFeatureFetcher::new(self.features).fetch_all(&ids).await;
        for (features, &position) in fetched.into_iter().zip(positions.iter()) {
            results[position].features = features;
        }
    }

    /// Aggregate counts for the UI's summary panel
    pub fn summary(results: &[TrackResult]) -> ResolutionSummary {
        ResolutionSummary::from_results(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(artist: &str, title: &str, album: Option<&str>, album_artist: Option<&str>) -> TrackQuery {
        TrackQuery {
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.map(str::to_string),
            album_artist: album_artist.map(str::to_string),
            source_index: 0,
        }
    }

    #[test]
    fn test_album_excluded_when_album_artist_differs() {
        let q = query("A; B", "Track", Some("Best Of 2020"), Some("C"));
        assert_eq!(album_scope(&q), None);
    }

    #[test]
    fn test_album_included_when_first_artists_match() {
        let q = query("A; B", "Track", Some("Debut"), Some("A"));
        assert_eq!(album_scope(&q), Some("Debut"));
    }

    #[test]
    fn test_album_excluded_without_album_artist() {
        let q = query("A", "Track", Some("Debut"), None);
        assert_eq!(album_scope(&q), None);

        let q = query("A", "Track", None, Some("A"));
        assert_eq!(album_scope(&q), None);
    }

    #[test]
    fn test_album_artist_comparison_is_normalized() {
        let q = query("headhunterz; Sian Evans", "Orange Heart", Some("Orange Heart"), Some(" HEADHUNTERZ "));
        assert_eq!(album_scope(&q), Some("Orange Heart"));
    }
}
