//! Spotify Web API client
//!
//! Secondary metadata provider. Requires a client-credentials OAuth
//! exchange; the token is cached with its expiry so repeated searches in
//! one session authenticate at most once. Only the search endpoint is
//! modeled; audio features always come from the primary provider, which
//! resolves Spotify ids cross-provider.

use crate::services::resolver::TrackSearcher;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use trackfeat_common::config::SpotifyCredentials;
use trackfeat_common::types::{Provider, ResolvedTrack};
use trackfeat_common::{Error, Result};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const WEB_URL: &str = "https://open.spotify.com";
const USER_AGENT: &str = "trackfeat/0.1.0 (https://github.com/trackfeat/trackfeat)";
const SEARCH_LIMIT: u32 = 20;
const SEARCH_MARKET: &str = "DE";
/// Renew this long before the reported expiry to avoid racing the clock
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<SpPage>,
}

#[derive(Debug, Deserialize)]
struct SpPage {
    #[serde(default)]
    items: Vec<SpTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpArtist>,
    pub album: Option<SpAlbum>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<u32>,
    pub external_urls: Option<SpExternalUrls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpAlbum {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpExternalUrls {
    pub spotify: Option<String>,
}

/// Spotify API client with cached client-credentials token
pub struct SpotifyClient {
    http_client: reqwest::Client,
    credentials: SpotifyCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Result<Self> {
        if !credentials.is_complete() {
            return Err(Error::Validation(
                "Spotify client id and secret are required".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::transport(TOKEN_URL, e))?;

        Ok(Self {
            http_client,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Client-credentials exchange with token caching.
    ///
    /// A call with an unexpired cached token returns immediately without a
    /// network round trip. Any non-2xx response from the token endpoint is
    /// an `Auth` error, which blocks all further searches on this provider.
    pub async fn authenticate(&self) -> Result<()> {
        let mut token = self.token.lock().await;

        if let Some(cached) = token.as_ref() {
            if Utc::now() < cached.expires_at {
                return Ok(());
            }
        }

        let basic = BASE64.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        tracing::debug!("Requesting Spotify client-credentials token");

        let response = self
            .http_client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed token response: {e}")))?;

        let expires_at = Utc::now()
            + ChronoDuration::seconds((parsed.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0));

        tracing::info!(expires_at = %expires_at, "Spotify token acquired");

        *token = Some(CachedToken {
            access_token: parsed.access_token,
            expires_at,
        });

        Ok(())
    }

    async fn bearer_token(&self) -> Result<String> {
        self.authenticate().await?;
        let token = self.token.lock().await;
        token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| Error::Auth("no access token after authentication".into()))
    }

    /// Field-qualified track search; the first item of the first page wins.
    pub async fn search_first_track(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<SpTrack> {
        if artist.trim().is_empty() && title.trim().is_empty() {
            return Err(Error::Validation("artist or track title must be specified".into()));
        }

        let mut query = match (artist.trim().is_empty(), title.trim().is_empty()) {
            (false, false) => format!("artist:{artist} track:{title}"),
            (false, true) => format!("artist:{artist}"),
            (true, false) => format!("track:{title}"),
            (true, true) => unreachable!("validated above"),
        };
        if let Some(album) = album.filter(|a| !a.trim().is_empty()) {
            query.push_str(&format!(" album:{album}"));
        }

        let bearer = self.bearer_token().await?;

        tracing::debug!(query = %query, "Searching Spotify");

        let response = self
            .http_client
            .get(SEARCH_URL)
            .bearer_auth(bearer)
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", &SEARCH_LIMIT.to_string()),
                ("market", SEARCH_MARKET),
            ])
            .send()
            .await
            .map_err(|e| Error::transport(SEARCH_URL, e))?;

        let status = response.status();
        if status == 401 {
            return Err(Error::Auth("Spotify rejected the access token".into()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(SEARCH_URL, status.as_u16(), body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Format(format!("{SEARCH_URL}: {e}")))?;

        parsed
            .tracks
            .and_then(|page| page.items.into_iter().next())
            .ok_or_else(|| {
                Error::NotFound(format!("no Spotify track found for '{artist} - {title}'"))
            })
    }

    /// Spotify web URL for a track id
    pub fn track_url(&self, track_id: &str) -> Result<String> {
        if track_id.is_empty() {
            return Err(Error::Validation("track id is required".into()));
        }
        Ok(format!("{WEB_URL}/track/{track_id}"))
    }
}

#[async_trait]
impl TrackSearcher for SpotifyClient {
    async fn search_track(
        &self,
        source_index: usize,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<ResolvedTrack> {
        let track = self.search_first_track(artist, title, album).await?;

        Ok(ResolvedTrack {
            source_index,
            track_id: track.id,
            title: track.name,
            artist_names: track.artists.iter().map(|a| a.name.clone()).collect(),
            album_name: track.album.map(|a| a.name),
            duration_ms: track.duration_ms,
            popularity: track.popularity,
            provider: Provider::Spotify,
            href: track.external_urls.and_then(|u| u.spotify),
        })
    }
}
