//! ReccoBeats API client
//!
//! Primary metadata provider: open catalog, no credentials. Exposes
//! paginated artist/album/track search plus single and batch audio-feature
//! retrieval. The batch endpoint also accepts Spotify track ids and reports
//! the matching Spotify URL in `href`, which is what makes cross-provider
//! feature lookup work.
//!
//! Search results are memoized per session in a [`SessionCache`] owned by
//! this client; call [`ReccoBeatsClient::clear_cache`] when a new resolution
//! session starts.

use crate::services::batch_fetcher::{BatchFeatureFetcher, FeatureSource};
use crate::services::resolver::TrackSearcher;
use crate::services::session_cache::SessionCache;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use trackfeat_common::normalize::{first_artist, matches};
use trackfeat_common::types::{AudioFeatureVector, Provider, ResolvedTrack};
use trackfeat_common::{Error, Result};

const RECCOBEATS_BASE_URL: &str = "https://api.reccobeats.com";
const USER_AGENT: &str = "trackfeat/0.1.0 (https://github.com/trackfeat/trackfeat)";
/// Search endpoints page size
const PAGE_SIZE: usize = 50;
/// Courtesy spacing between requests; the API documents no hard limit
const RATE_LIMIT_MS: u64 = 250;

/// Paginated search response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RbPage<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
}

/// ReccoBeats artist record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RbArtist {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
}

/// ReccoBeats album record
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RbAlbum {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
    pub album_type: Option<String>,
    pub total_tracks: Option<u32>,
}

/// ReccoBeats track record
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RbTrack {
    pub id: String,
    pub track_title: String,
    #[serde(default)]
    pub artists: Vec<RbArtist>,
    pub duration_ms: Option<u64>,
    /// Spotify web URL for the same track, when the catalog knows it
    pub href: Option<String>,
    pub popularity: Option<u32>,
}

/// A matched track together with the artist/album the search went through
#[derive(Debug, Clone)]
pub struct RbTrackInfo {
    pub track: RbTrack,
    pub artist: Option<RbArtist>,
    pub album: Option<RbAlbum>,
}

/// Rate limiter spacing requests by a minimum interval
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("ReccoBeats rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// ReccoBeats API client
pub struct ReccoBeatsClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter,
    cache: SessionCache,
}

impl ReccoBeatsClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(RECCOBEATS_BASE_URL)
    }

    /// Client pointed at an alternate API endpoint; tests route this at a
    /// local mock server
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::transport(base_url.clone(), e))?;

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
            cache: SessionCache::new(),
        })
    }

    /// Empty all cached artist/album lookups; called at session start so
    /// one session never sees another's catalog snapshot
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.rate_limiter.wait().await;

        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "Querying ReccoBeats API");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(&url, status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Format(format!("{url}: {e}")))
    }

    /// Accumulate every page of a paginated listing until a short page or
    /// the reported total-pages boundary
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        base_query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        self.find_in_pages(path, base_query, |content: Vec<T>| {
            items.extend(content);
            None
        })
        .await?;
        Ok(items)
    }

    /// Walk a paginated listing page by page, stopping early when `pick`
    /// yields a hit. Owns the short-page/total-pages boundary logic for
    /// every paged endpoint.
    async fn find_in_pages<T, P>(
        &self,
        path: &str,
        base_query: &[(&str, String)],
        mut pick: P,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: FnMut(Vec<T>) -> Option<T>,
    {
        let mut page: u32 = 0;

        loop {
            let mut query = base_query.to_vec();
            query.push(("page", page.to_string()));
            query.push(("size", PAGE_SIZE.to_string()));

            let response: RbPage<T> = self.get_json(path, &query).await?;

            let short_page = response.content.len() < PAGE_SIZE;
            if let Some(hit) = pick(response.content) {
                return Ok(Some(hit));
            }

            if short_page || page + 1 >= response.total_pages {
                return Ok(None);
            }
            page += 1;
        }
    }

    /// Search artists by name, accumulating all result pages.
    ///
    /// Multi-artist fields are reduced to their first artist before the
    /// search. With `exact` the accumulated list is filtered down to
    /// normalized-equal names. Cache hit returns without paging.
    pub async fn search_artist(&self, artist_field: &str, exact: bool) -> Result<Vec<RbArtist>> {
        let first = first_artist(artist_field);
        if first.is_empty() {
            return Err(Error::Validation("artist name is required".into()));
        }

        let cache_key = SessionCache::artist_key(&first, exact);
        if let Some(hit) = self.cache.get_artists(&cache_key).await {
            tracing::debug!(artist = %first, "Using cached artist results");
            return Ok(hit);
        }

        let all: Vec<RbArtist> = self
            .get_all_pages("/v1/artist/search", &[("searchText", first.clone())])
            .await?;

        let results: Vec<RbArtist> = if exact {
            all.into_iter()
                .filter(|a| matches(&a.name, &first, true))
                .collect()
        } else {
            all
        };

        if results.is_empty() {
            let match_type = if exact { "exact match" } else { "search results" };
            return Err(Error::NotFound(format!(
                "artist '{first}' not found in ReccoBeats ({match_type})"
            )));
        }

        self.cache.put_artists(cache_key, results.clone()).await;
        Ok(results)
    }

    /// Search an artist's albums by name; multiple editions may match.
    pub async fn search_artist_album(&self, artist_id: &str, album: &str) -> Result<Vec<RbAlbum>> {
        if artist_id.is_empty() || album.trim().is_empty() {
            return Err(Error::Validation("artist id and album are required".into()));
        }

        if let Some(hit) = self.cache.get_albums(artist_id, album).await {
            tracing::debug!(artist_id = %artist_id, album = %album, "Using cached album results");
            return Ok(hit);
        }

        let listing: Vec<RbAlbum> = self
            .get_all_pages(&format!("/v1/artist/{artist_id}/album"), &[])
            .await?;
        let matching: Vec<RbAlbum> = listing
            .into_iter()
            .filter(|a| matches(&a.name, album, true))
            .collect();

        if matching.is_empty() {
            return Err(Error::NotFound(format!(
                "album '{album}' not found for artist id '{artist_id}' in ReccoBeats"
            )));
        }

        self.cache.put_albums(artist_id, album, matching.clone()).await;
        Ok(matching)
    }

    /// Search a track across every album of every exact-matching artist.
    ///
    /// Artists and pages are tried in listing order and the first
    /// normalized-title hit wins. This is a deliberately imprecise
    /// first-plausible-match policy, not a best-match ranking.
    pub async fn search_track_by_artist(&self, artist_field: &str, title: &str) -> Result<RbTrack> {
        if artist_field.trim().is_empty() || title.trim().is_empty() {
            return Err(Error::Validation("artist name and track title are required".into()));
        }

        let first = first_artist(artist_field);
        let candidates = self.search_artist(&first, true).await?;

        for candidate in &candidates {
            let hit = self
                .find_in_pages(
                    &format!("/v1/artist/{}/track", candidate.id),
                    &[],
                    |tracks: Vec<RbTrack>| {
                        tracks
                            .into_iter()
                            .find(|t| matches(&t.track_title, title, true))
                    },
                )
                .await?;

            if let Some(track) = hit {
                tracing::info!(
                    artist = %candidate.name,
                    title = %track.track_title,
                    id = %track.id,
                    "Found ReccoBeats track"
                );
                return Ok(track);
            }
        }

        Err(Error::NotFound(format!(
            "track '{title}' not found for any artist named '{first}' in ReccoBeats"
        )))
    }

    /// Album-scoped track search: candidate artists are narrowed to albums
    /// matching `album` before their track listings are scanned. An artist
    /// without a matching album does not abort the search; the next
    /// candidate is tried.
    pub async fn search_track_by_artist_album(
        &self,
        artist_field: &str,
        album: &str,
        title: &str,
    ) -> Result<RbTrackInfo> {
        if artist_field.trim().is_empty() || album.trim().is_empty() || title.trim().is_empty() {
            return Err(Error::Validation(
                "artist name, album and track title are required".into(),
            ));
        }

        let first = first_artist(artist_field);
        let candidates = self.search_artist(&first, true).await?;

        for candidate in &candidates {
            let albums = match self.search_artist_album(&candidate.id, album).await {
                Ok(albums) => albums,
                Err(Error::NotFound(_)) => {
                    tracing::debug!(
                        artist = %candidate.name,
                        album = %album,
                        "Album not found for candidate artist, trying next"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            for found_album in &albums {
                let hit = self
                    .find_in_pages(
                        &format!("/v1/album/{}/track", found_album.id),
                        &[],
                        |tracks: Vec<RbTrack>| {
                            tracks
                                .into_iter()
                                .find(|t| matches(&t.track_title, title, true))
                        },
                    )
                    .await?;

                if let Some(track) = hit {
                    return Ok(RbTrackInfo {
                        track,
                        artist: Some(candidate.clone()),
                        album: Some(found_album.clone()),
                    });
                }
            }
        }

        Err(Error::NotFound(format!(
            "track '{title}' not found in any album named '{album}' by any artist named '{first}' in ReccoBeats"
        )))
    }

    /// Dispatch to the album-scoped or artist-only search depending on
    /// whether an album name is supplied
    pub async fn search_track(
        &self,
        artist_field: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<RbTrackInfo> {
        match album.filter(|a| !a.trim().is_empty()) {
            Some(album) => self.search_track_by_artist_album(artist_field, album, title).await,
            None => {
                let track = self.search_track_by_artist(artist_field, title).await?;
                Ok(RbTrackInfo {
                    track,
                    artist: None,
                    album: None,
                })
            }
        }
    }

    /// Fetch audio features for one track by ReccoBeats id
    pub async fn get_audio_features(&self, id: &str) -> Result<AudioFeatureVector> {
        if id.is_empty() {
            return Err(Error::Validation("track id is required".into()));
        }
        self.get_json(&format!("/v1/track/{id}/audio-features"), &[]).await
    }

    /// One raw batch call for up to one chunk of ids; the response order is
    /// not guaranteed to follow the request order
    async fn get_audio_features_chunk(&self, ids: &[String]) -> Result<Vec<AudioFeatureVector>> {
        let response: RbPage<AudioFeatureVector> = self
            .get_json("/v1/audio-features", &[("ids", ids.join(","))])
            .await?;
        Ok(response.content)
    }

    /// Fetch audio features for many tracks by ReccoBeats or Spotify ids.
    ///
    /// Chunked, order-preserving, with per-item fallback on chunk failure;
    /// see [`BatchFeatureFetcher`] for the algorithm. The output always has
    /// one entry per input id, `None` meaning "no feature data".
    pub async fn get_audio_features_batch(
        &self,
        ids: &[String],
    ) -> Vec<Option<AudioFeatureVector>> {
        BatchFeatureFetcher::new(self).fetch_all(ids).await
    }

    /// Track API URL for a ReccoBeats track id
    pub fn track_url(&self, track_id: &str) -> Result<String> {
        if track_id.is_empty() {
            return Err(Error::Validation("track id is required".into()));
        }
        Ok(format!("{}/v1/track/{track_id}", self.base_url))
    }

    /// Audio-features API URL for a ReccoBeats track id
    pub fn audio_features_url(&self, track_id: &str) -> Result<String> {
        if track_id.is_empty() {
            return Err(Error::Validation("track id is required".into()));
        }
        Ok(format!("{}/v1/track/{track_id}/audio-features", self.base_url))
    }
}

#[async_trait]
impl FeatureSource for ReccoBeatsClient {
    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<AudioFeatureVector>> {
        self.get_audio_features_chunk(ids).await
    }

    async fn fetch_single(&self, id: &str) -> Result<AudioFeatureVector> {
        self.get_audio_features(id).await
    }
}

#[async_trait]
impl TrackSearcher for ReccoBeatsClient {
    async fn search_track(
        &self,
        source_index: usize,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<ResolvedTrack> {
        let info = ReccoBeatsClient::search_track(self, artist, title, album).await?;

        let mut artist_names: Vec<String> =
            info.track.artists.iter().map(|a| a.name.clone()).collect();
        if artist_names.is_empty() {
            if let Some(matched) = &info.artist {
                artist_names.push(matched.name.clone());
            }
        }

        Ok(ResolvedTrack {
            source_index,
            track_id: info.track.id,
            title: info.track.track_title,
            artist_names,
            album_name: info.album.map(|a| a.name),
            duration_ms: info.track.duration_ms,
            popularity: info.track.popularity,
            provider: Provider::ReccoBeats,
            href: info.track.href,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(ReccoBeatsClient::new().is_ok());
    }

    #[test]
    fn test_url_builders() {
        let client = ReccoBeatsClient::new().unwrap();
        assert_eq!(
            client.track_url("eb5f88c9-107a-4839-a18e-aa068184beaa").unwrap(),
            "https://api.reccobeats.com/v1/track/eb5f88c9-107a-4839-a18e-aa068184beaa"
        );
        assert_eq!(
            client.audio_features_url("eb5f88c9-107a-4839-a18e-aa068184beaa").unwrap(),
            "https://api.reccobeats.com/v1/track/eb5f88c9-107a-4839-a18e-aa068184beaa/audio-features"
        );
    }

    #[test]
    fn test_url_builders_reject_empty_id() {
        let client = ReccoBeatsClient::new().unwrap();
        assert!(matches!(client.track_url(""), Err(Error::Validation(_))));
        assert!(matches!(client.audio_features_url(""), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_artist_rejects_empty_field() {
        let client = ReccoBeatsClient::new().unwrap();
        assert!(matches!(
            client.search_artist("", true).await,
            Err(Error::Validation(_))
        ));
        // A field that collapses to nothing after splitting is also invalid
        assert!(matches!(
            client.search_artist("   ; Other", true).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_audio_features_rejects_empty_id() {
        let client = ReccoBeatsClient::new().unwrap();
        assert!(matches!(
            client.get_audio_features("").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_album_rejects_missing_arguments() {
        let client = ReccoBeatsClient::new().unwrap();
        assert!(matches!(
            client.search_artist_album("", "Album").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            client.search_artist_album("a1", "  ").await,
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_page_deserializes_with_missing_fields() {
        let page: RbPage<RbArtist> = serde_json::from_str("{}").unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_track_deserializes_camel_case() {
        let json = r#"{
            "id": "eb5f88c9",
            "trackTitle": "Orange Heart",
            "artists": [{"id": "167e1b8b", "name": "Headhunterz", "href": null}],
            "durationMs": 222000,
            "href": "https://open.spotify.com/track/2Ch7LmS7r6PZZAAMEBO79T",
            "popularity": 55
        }"#;
        let track: RbTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.track_title, "Orange Heart");
        assert_eq!(track.duration_ms, Some(222_000));
        assert_eq!(track.artists[0].name, "Headhunterz");
    }

    fn artist_json(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({"id": id, "name": name, "href": null})
    }

    #[tokio::test]
    async fn test_artist_search_is_cached_until_cleared() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "content": [artist_json("a1", "Headhunterz")],
            "totalPages": 1
        })
        .to_string();

        // Two identical searches share one fetch; clear_cache forces the
        // second fetch
        let mock = server
            .mock("GET", "/v1/artist/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(2)
            .create_async()
            .await;

        let client = ReccoBeatsClient::with_base_url(server.url()).unwrap();

        let first = client.search_artist("Headhunterz", true).await.unwrap();
        let second = client.search_artist(" HEADHUNTERZ ", true).await.unwrap();
        assert_eq!(first[0].id, "a1");
        assert_eq!(second[0].id, "a1");

        client.clear_cache().await;
        client.search_artist("Headhunterz", true).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_artist_search_accumulates_pages() {
        let mut server = mockito::Server::new_async().await;
        let full: Vec<serde_json::Value> = (0..PAGE_SIZE)
            .map(|i| artist_json(&format!("a{i}"), "Headhunterz"))
            .collect();

        let page0 = server
            .mock("GET", "/v1/artist/search")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "0".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({"content": full, "totalPages": 2}).to_string())
            .create_async()
            .await;
        let page1 = server
            .mock("GET", "/v1/artist/search")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "content": [artist_json("a50", "Headhunterz")],
                    "totalPages": 2
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ReccoBeatsClient::with_base_url(server.url()).unwrap();
        let results = client.search_artist("Headhunterz", true).await.unwrap();

        assert_eq!(results.len(), PAGE_SIZE + 1);
        page0.assert_async().await;
        page1.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first_elapsed = start.elapsed();

        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed.as_millis() < 50);
        assert!(second_elapsed.as_millis() >= 100);
    }
}
