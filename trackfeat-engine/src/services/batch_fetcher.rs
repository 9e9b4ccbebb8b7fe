//! Chunked batch audio-feature retrieval
//!
//! Providers cap the batch endpoint at a fixed number of ids, and a single
//! malformed chunk must not cost the whole set. The fetcher therefore runs
//! an explicit two-step algorithm: batch call per chunk with positional
//! reconciliation, then a sequential per-item fallback for any chunk whose
//! batch call failed. The output always has exactly one entry per input id.

use async_trait::async_trait;
use trackfeat_common::types::AudioFeatureVector;
use trackfeat_common::Result;

/// Provider-defined maximum ids per batch request
pub const MAX_BATCH_SIZE: usize = 40;

/// Low-level feature endpoint operations the fetcher drives
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// One batch request for up to [`MAX_BATCH_SIZE`] ids; the response may
    /// be in any order and may omit ids with no data
    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<AudioFeatureVector>>;

    /// Single-item fetch used as the fallback path
    async fn fetch_single(&self, id: &str) -> Result<AudioFeatureVector>;
}

/// Order-preserving batch fetcher over a [`FeatureSource`]
pub struct BatchFeatureFetcher<'a> {
    source: &'a dyn FeatureSource,
    chunk_size: usize,
}

impl<'a> BatchFeatureFetcher<'a> {
    pub fn new(source: &'a dyn FeatureSource) -> Self {
        Self {
            source,
            chunk_size: MAX_BATCH_SIZE,
        }
    }

    /// Override the chunk limit; values below 1 are clamped to 1
    pub fn with_chunk_size(source: &'a dyn FeatureSource, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fetch features for all `ids`, preserving positions.
    ///
    /// `output[i]` always corresponds to `ids[i]`; `None` means "no feature
    /// data for that id". The output length equals the input length even
    /// under total failure; errors never propagate past this boundary.
    pub async fn fetch_all(&self, ids: &[String]) -> Vec<Option<AudioFeatureVector>> {
        let mut results = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(self.chunk_size) {
            match self.source.fetch_batch(chunk).await {
                Ok(items) => {
                    results.extend(reconcile(chunk, &items));
                }
                Err(e) => {
                    tracing::warn!(
                        chunk_len = chunk.len(),
                        error = %e,
                        "Batch feature request failed, falling back to per-item fetches"
                    );
                    for id in chunk {
                        match self.source.fetch_single(id).await {
                            Ok(features) => results.push(Some(features)),
                            Err(e) => {
                                tracing::debug!(id = %id, error = %e, "Single feature fetch failed");
                                results.push(None);
                            }
                        }
                    }
                }
            }
        }

        results
    }
}

/// Map each requested id to its response item, independent of response
/// order. An item matches by native id equality, or by carrying the
/// requested id inside its secondary `href` (cross-provider lookup, where
/// the request used a Spotify id but the response is keyed natively).
fn reconcile(
    requested: &[String],
    items: &[AudioFeatureVector],
) -> Vec<Option<AudioFeatureVector>> {
    requested
        .iter()
        .map(|id| {
            items
                .iter()
                .find(|item| {
                    item.id == *id
                        || item
                            .href
                            .as_deref()
                            .map(|href| href.contains(id.as_str()))
                            .unwrap_or(false)
                })
                .cloned()
        })
        .collect()
}
