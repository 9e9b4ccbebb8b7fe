//! String normalization and matching for fuzzy provider comparisons
//!
//! Provider catalogs disagree with local tags on case and stray whitespace,
//! so every comparison in the engine goes through `normalize`. Multi-artist
//! tag fields ("Artist 1; Artist 2") are reduced to their first artist
//! before searching, since provider search works better with one name.

/// Lowercase + trim. Empty input stays empty.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Compare two strings after normalization.
///
/// With `exact` the normalized forms must be equal; otherwise substring
/// containment in either direction counts as a match.
pub fn matches(a: &str, b: &str, exact: bool) -> bool {
    let na = normalize(a);
    let nb = normalize(b);

    if exact {
        na == nb
    } else {
        na.contains(&nb) || nb.contains(&na)
    }
}

/// Extract the first artist from a semicolon-separated artist field.
///
/// Returns `""` for empty input. Idempotent once the input carries no
/// further `;` separators.
pub fn first_artist(artist_field: &str) -> String {
    artist_field
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}
