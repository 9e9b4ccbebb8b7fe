//! Key code mapping and duration formatting for tag fields
//!
//! The player stores musical keys as strings ("C", "Gbm"); audio-feature
//! vectors carry a numeric code where 0-11 are the major keys and 12-23 the
//! corresponding minor keys. Negative or out-of-range codes mean unknown.

const KEY_NAMES: [&str; 24] = [
    // Major keys (0-11)
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
    // Minor keys (12-23)
    "Cm", "Dbm", "Dm", "Ebm", "Em", "Fm", "Gbm", "Gm", "Abm", "Am", "Bbm", "Bm",
];

/// Convert a numeric key code to its tag string, `None` when unknown.
pub fn key_to_string(key: i32) -> Option<&'static str> {
    if key < 0 {
        return None;
    }
    KEY_NAMES.get(key as usize).copied()
}

/// Reverse mapping from tag string to numeric code.
pub fn key_from_string(key: &str) -> Option<i32> {
    let trimmed = key.trim();
    KEY_NAMES.iter().position(|&k| k == trimmed).map(|i| i as i32)
}

/// Format a duration in milliseconds as `m:ss`, carrying 60 s rounds.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let minutes = duration_ms / 60_000;
    let seconds = ((duration_ms % 60_000) as f64 / 1000.0).round() as u64;

    if seconds == 60 {
        format!("{}:00", minutes + 1)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_and_minor_keys() {
        assert_eq!(key_to_string(0), Some("C"));
        assert_eq!(key_to_string(11), Some("B"));
        assert_eq!(key_to_string(12), Some("Cm"));
        assert_eq!(key_to_string(23), Some("Bm"));
    }

    #[test]
    fn test_unknown_keys() {
        assert_eq!(key_to_string(-1), None);
        assert_eq!(key_to_string(24), None);
    }

    #[test]
    fn test_round_trip() {
        for code in 0..24 {
            let name = key_to_string(code).unwrap();
            assert_eq!(key_from_string(name), Some(code));
        }
        assert_eq!(key_from_string("  Gbm "), Some(18));
        assert_eq!(key_from_string("H"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(0), "0:00");
        assert_eq!(format_duration_ms(185_000), "3:05");
        // 59.7s rounds up into the next minute
        assert_eq!(format_duration_ms(179_700), "3:00");
    }
}
