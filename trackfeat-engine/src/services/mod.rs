//! Provider clients and resolution services

pub mod batch_fetcher;
pub mod reccobeats_client;
pub mod resolver;
pub mod session_cache;
pub mod spotify_client;

pub use batch_fetcher::{BatchFeatureFetcher, FeatureSource, MAX_BATCH_SIZE};
pub use reccobeats_client::ReccoBeatsClient;
pub use resolver::{TrackResolver, TrackSearcher};
pub use session_cache::SessionCache;
pub use spotify_client::SpotifyClient;
