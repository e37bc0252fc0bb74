//! Extraction of [`NowPlaying`] and the station list from the now-playing
//! document:
//!
//! ```text
//! { "stations": { "<id>": {...}, ... },
//!   "extended": { "<id>": { "artist": "", "title": "",
//!                           "program": { "title": "" },
//!                           "album_art": { "320": "<url>" } } } }
//! ```
//!
//! Any missing or mistyped path degrades to an empty string for that field
//! only; partial data is still valid data.

use serde_json::Value;

use crate::protocol::NowPlaying;

fn text(v: &Value) -> String {
    v.as_str().map(str::to_string).unwrap_or_default()
}

pub fn extract(doc: &Value, station: &str) -> NowPlaying {
    let ext = &doc["extended"][station];
    NowPlaying {
        station: station.to_string(),
        program: text(&ext["program"]["title"]),
        artist: text(&ext["artist"]),
        title: text(&ext["title"]),
        album_art_url: text(&ext["album_art"]["320"]),
    }
}

/// Station ids under `stations`, sorted lexicographically.
pub fn station_ids(doc: &Value) -> Vec<String> {
    let mut ids: Vec<String> = doc["stations"]
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let doc = json!({
            "extended": {
                "kink": {
                    "artist": "A",
                    "title": "T",
                    "program": { "title": "P" },
                    "album_art": { "320": "https://img/a.jpg", "640": "ignored" }
                }
            }
        });
        let np = extract(&doc, "kink");
        assert_eq!(
            np,
            NowPlaying {
                station: "kink".into(),
                program: "P".into(),
                artist: "A".into(),
                title: "T".into(),
                album_art_url: "https://img/a.jpg".into(),
            }
        );
    }

    #[test]
    fn test_missing_paths_degrade_per_field() {
        let doc = json!({
            "extended": {
                "kink-dna": { "artist": "A", "program": "not an object", "album_art": null }
            }
        });
        let np = extract(&doc, "kink-dna");
        assert_eq!(np.artist, "A");
        assert_eq!(np.title, "");
        assert_eq!(np.program, "");
        assert_eq!(np.album_art_url, "");
        assert_eq!(np.station, "kink-dna");
    }

    #[test]
    fn test_unknown_station_and_garbage_documents() {
        assert_eq!(extract(&json!({}), "kink"), NowPlaying::empty_for("kink"));
        assert_eq!(extract(&json!([1, 2]), "kink"), NowPlaying::empty_for("kink"));
        assert_eq!(
            extract(&json!({"extended": {"kink": {"artist": 42}}}), "kink"),
            NowPlaying::empty_for("kink")
        );
    }

    #[test]
    fn test_station_ids_sorted() {
        let doc = json!({
            "stations": { "kink-indie": {}, "kink": {}, "kink-distortion": {}, "kink-dna": {} }
        });
        assert_eq!(
            station_ids(&doc),
            vec!["kink", "kink-distortion", "kink-dna", "kink-indie"]
        );
        assert!(station_ids(&json!({"stations": []})).is_empty());
    }
}
