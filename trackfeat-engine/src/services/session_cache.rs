//! Per-session memoization of artist and album searches
//!
//! Tracks in one batch frequently share an artist or album; without this
//! cache every track would re-run the same paginated search. Entries live
//! for one resolution session only and are dropped by `clear` when a new
//! session starts, so stale cross-session catalog data is never reused.
//!
//! The cache is owned by a single provider client and is never shared
//! across provider instances. The mutex serializes read-then-insert so a
//! future parallel resolver cannot issue duplicate fetches for one key.

use crate::services::reccobeats_client::{RbAlbum, RbArtist};
use std::collections::HashMap;
use tokio::sync::Mutex;
use trackfeat_common::normalize::normalize;

#[derive(Default)]
struct CacheInner {
    artists: HashMap<String, Vec<RbArtist>>,
    albums: HashMap<(String, String), Vec<RbAlbum>>,
}

/// Session-scoped artist/album lookup cache
#[derive(Default)]
pub struct SessionCache {
    inner: Mutex<CacheInner>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for an artist search: normalized name plus the exact-match
    /// flag, since exact and fuzzy searches return different result sets
    pub fn artist_key(first_artist: &str, exact: bool) -> String {
        format!("{}:{}", normalize(first_artist), exact)
    }

    pub async fn get_artists(&self, key: &str) -> Option<Vec<RbArtist>> {
        self.inner.lock().await.artists.get(key).cloned()
    }

    pub async fn put_artists(&self, key: String, artists: Vec<RbArtist>) {
        self.inner.lock().await.artists.insert(key, artists);
    }

    pub async fn get_albums(&self, artist_id: &str, album: &str) -> Option<Vec<RbAlbum>> {
        self.inner
            .lock()
            .await
            .albums
            .get(&(artist_id.to_string(), normalize(album)))
            .cloned()
    }

    pub async fn put_albums(&self, artist_id: &str, album: &str, albums: Vec<RbAlbum>) {
        self.inner
            .lock()
            .await
            .albums
            .insert((artist_id.to_string(), normalize(album)), albums);
    }

    /// Drop everything; called at the start of a new resolution session
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.artists.clear();
        inner.albums.clear();
    }

    #[cfg(test)]
    pub async fn len(&self) -> (usize, usize) {
        let inner = self.inner.lock().await;
        (inner.artists.len(), inner.albums.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: &str, name: &str) -> RbArtist {
        RbArtist {
            id: id.to_string(),
            name: name.to_string(),
            href: None,
        }
    }

    #[test]
    fn test_artist_key_includes_exact_flag() {
        assert_eq!(SessionCache::artist_key(" Headhunterz ", true), "headhunterz:true");
        assert_ne!(
            SessionCache::artist_key("Headhunterz", true),
            SessionCache::artist_key("Headhunterz", false)
        );
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let cache = SessionCache::new();
        let key = SessionCache::artist_key("Headhunterz", true);

        assert!(cache.get_artists(&key).await.is_none());
        cache
            .put_artists(key.clone(), vec![artist("a1", "Headhunterz")])
            .await;

        let hit = cache.get_artists(&key).await.unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, "a1");
    }

    #[tokio::test]
    async fn test_album_key_is_normalized() {
        let cache = SessionCache::new();
        cache
            .put_albums(
                "a1",
                "Orange Heart",
                vec![RbAlbum {
                    id: "alb1".to_string(),
                    name: "Orange Heart".to_string(),
                    href: None,
                    album_type: None,
                    total_tracks: None,
                }],
            )
            .await;

        assert!(cache.get_albums("a1", "  ORANGE HEART ").await.is_some());
        assert!(cache.get_albums("a2", "Orange Heart").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_empties_both_maps() {
        let cache = SessionCache::new();
        cache
            .put_artists(SessionCache::artist_key("X", true), vec![artist("a1", "X")])
            .await;
        cache.put_albums("a1", "Album", Vec::new()).await;
        assert_eq!(cache.len().await, (1, 1));

        cache.clear().await;
        assert_eq!(cache.len().await, (0, 0));
    }
}
