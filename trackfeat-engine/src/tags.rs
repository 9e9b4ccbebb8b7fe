//! Mapping of fetched audio features to tag writes
//!
//! The host player owns the actual tag storage; this module only plans the
//! writes and drives them through a [`TagSink`]. Planning is pure so the
//! field formatting (rounded BPM, key names, 3-decimal custom fields, the
//! comment legend block) is testable without a sink.

use async_trait::async_trait;
use trackfeat_common::config::SaveFields;
use trackfeat_common::keys::key_to_string;
use trackfeat_common::types::TrackResult;
use trackfeat_common::Result;

/// Delimiter line bracketing the feature legend inside the comment tag
pub const COMMENT_DELIMITER: &str = "##############################";

/// Tag fields the save stage can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Bpm,
    InitialKey,
    Custom1,
    Custom2,
    Custom3,
    Custom4,
    Custom5,
    Comment,
}

/// One planned write against the host player's tag storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWrite {
    pub source_index: usize,
    pub field: TagField,
    pub value: String,
}

/// Host-player boundary for committing tag writes
#[async_trait]
pub trait TagSink: Send + Sync {
    /// Current comment tag content for the track, if any
    async fn existing_comment(&self, source_index: usize) -> Result<Option<String>>;

    async fn write(&mut self, write: &TagWrite) -> Result<()>;

    /// Persist all writes issued for this track
    async fn commit(&mut self, source_index: usize) -> Result<()>;
}

/// Counts reported back to the UI after a save run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved: usize,
    pub errors: usize,
}

/// Plan the tag writes for one result.
///
/// Returns an empty plan when the track has no feature vector. A field is
/// written only when its flag is enabled and the feature value is present.
/// The comment legend names the custom-field mapping; any previous legend
/// block in `existing_comment` is stripped before the new one is appended.
pub fn plan_writes(
    result: &TrackResult,
    fields: &SaveFields,
    existing_comment: Option<&str>,
) -> Vec<TagWrite> {
    let Some(features) = &result.features else {
        return Vec::new();
    };
    let source_index = result.query.source_index;
    let mut writes = Vec::new();

    let mut push = |field: TagField, value: String| {
        writes.push(TagWrite {
            source_index,
            field,
            value,
        });
    };

    if fields.bpm {
        if let Some(tempo) = features.tempo {
            push(TagField::Bpm, format!("{}", tempo.round() as i64));
        }
    }
    if fields.initial_key {
        if let Some(name) = features.key.and_then(key_to_string) {
            push(TagField::InitialKey, name.to_string());
        }
    }
    if fields.danceability {
        if let Some(v) = features.danceability {
            push(TagField::Custom1, format!("{v:.3}"));
        }
    }
    if fields.energy {
        if let Some(v) = features.energy {
            push(TagField::Custom2, format!("{v:.3}"));
        }
    }
    if fields.valence {
        if let Some(v) = features.valence {
            push(TagField::Custom3, format!("{v:.3}"));
        }
    }
    if fields.acousticness {
        if let Some(v) = features.acousticness {
            push(TagField::Custom4, format!("{v:.3}"));
        }
    }
    if fields.instrumentalness {
        if let Some(v) = features.instrumentalness {
            push(TagField::Custom5, format!("{v:.3}"));
        }
    }

    if fields.comment {
        if let Some(comment) = build_comment(fields, existing_comment) {
            push(TagField::Comment, comment);
        }
    }

    writes
}

/// Rebuild the comment tag with the current legend block, or `None` when no
/// custom field is enabled (a legend for nothing would only add noise)
fn build_comment(fields: &SaveFields, existing: Option<&str>) -> Option<String> {
    let mut legend = Vec::new();
    if fields.danceability {
        legend.push("* Custom1: Danceability");
    }
    if fields.energy {
        legend.push("* Custom2: Energy");
    }
    if fields.valence {
        legend.push("* Custom3: Valence");
    }
    if fields.acousticness {
        legend.push("* Custom4: Acousticness");
    }
    if fields.instrumentalness {
        legend.push("* Custom5: Instrumentalness");
    }
    if legend.is_empty() {
        return None;
    }

    let block = format!(
        "{COMMENT_DELIMITER}\nAudioFeatures:\n{}\n{COMMENT_DELIMITER}",
        legend.join("\n")
    );

    let remainder = strip_legend_block(existing.unwrap_or(""));
    if remainder.is_empty() {
        Some(block)
    } else {
        Some(format!("{remainder}\n{block}"))
    }
}

/// Remove every previously written legend block so repeated saves do not
/// accumulate copies. Delimited text that is not a legend is kept and
/// scanned past, wherever it sits relative to the legend.
fn strip_legend_block(comment: &str) -> String {
    let mut remaining = comment.to_string();
    let mut from = 0;

    while let Some(found) = remaining[from..].find(COMMENT_DELIMITER) {
        let start = from + found;
        let after_open = start + COMMENT_DELIMITER.len();
        let body = &remaining[after_open..];
        if !body.trim_start().starts_with("AudioFeatures:") {
            from = after_open;
            continue;
        }
        match body.find(COMMENT_DELIMITER) {
            Some(close) => {
                let end = after_open + close + COMMENT_DELIMITER.len();
                remaining.replace_range(start..end, "");
                from = start;
            }
            None => {
                // Unterminated block, drop through to the end
                remaining.truncate(start);
            }
        }
    }

    remaining.trim().to_string()
}

/// Write and commit every result's plan, isolating failures per track.
///
/// Results without features are skipped and counted in neither bucket.
pub async fn apply(
    sink: &mut dyn TagSink,
    results: &[TrackResult],
    fields: &SaveFields,
) -> SaveOutcome {
    let mut outcome = SaveOutcome::default();

    for result in results {
        if result.features.is_none() {
            continue;
        }
        let source_index = result.query.source_index;

        match save_one(sink, result, fields).await {
            Ok(()) => {
                outcome.saved += 1;
                tracing::debug!(source_index, "Saved audio features to tags");
            }
            Err(e) => {
                outcome.errors += 1;
                tracing::warn!(source_index, error = %e, "Tag save failed");
            }
        }
    }

    tracing::info!(
        saved = outcome.saved,
        errors = outcome.errors,
        "Tag save run complete"
    );
    outcome
}

async fn save_one(
    sink: &mut dyn TagSink,
    result: &TrackResult,
    fields: &SaveFields,
) -> Result<()> {
    let source_index = result.query.source_index;
    let existing = if fields.comment {
        sink.existing_comment(source_index).await?
    } else {
        None
    };

    for write in plan_writes(result, fields, existing.as_deref()) {
        sink.write(&write).await?;
    }
    sink.commit(source_index).await
}
