//! Session options
//!
//! Options are kept as a `serde_json` map rather than a closed struct:
//! unrecognized keys pass through to the native library unvalidated, so the
//! shape must stay open.

use serde_json::{Map, Value};

/// The default option map.
///
/// Recognized keys and their defaults:
/// - `user_agent`: `"Chorus"`
/// - `settings_path`: `"tmp"`
/// - `cache_path`: `""`
/// - `load_playlists`: `true`
/// - `compress_playlists`: `true`
/// - `cache_playlist_metadata`: `true`
pub fn default_options() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("user_agent".to_string(), Value::from("Chorus"));
    defaults.insert("settings_path".to_string(), Value::from("tmp"));
    defaults.insert("cache_path".to_string(), Value::from(""));
    defaults.insert("load_playlists".to_string(), Value::from(true));
    defaults.insert("compress_playlists".to_string(), Value::from(true));
    defaults.insert("cache_playlist_metadata".to_string(), Value::from(true));
    defaults
}

/// Merge overrides into the defaults.
///
/// The result contains every default key, replaced wherever `overrides`
/// supplies a value; unknown override keys are copied through unchanged. No
/// validation happens at this layer.
pub fn merge_defaults(overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = default_options();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// The `user_agent` value of a merged option map
pub fn user_agent(options: &Map<String, Value>) -> &str {
    options
        .get("user_agent")
        .and_then(Value::as_str)
        .unwrap_or("Chorus")
}

/// The `settings_path` value of a merged option map
pub fn settings_path(options: &Map<String, Value>) -> &str {
    options
        .get("settings_path")
        .and_then(Value::as_str)
        .unwrap_or("tmp")
}

/// The `cache_path` value of a merged option map
pub fn cache_path(options: &Map<String, Value>) -> &str {
    options
        .get("cache_path")
        .and_then(Value::as_str)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_overrides_yields_the_defaults() {
        assert_eq!(merge_defaults(&Map::new()), default_options());
    }

    #[test]
    fn typed_accessors_read_the_merged_map() {
        let mut overrides = Map::new();
        overrides.insert("user_agent".to_string(), Value::from("Cow"));

        let merged = merge_defaults(&overrides);
        assert_eq!(user_agent(&merged), "Cow");
        assert_eq!(settings_path(&merged), "tmp");
        assert_eq!(cache_path(&merged), "");
    }

    #[test]
    fn overrides_replace_only_their_key() {
        let mut overrides = Map::new();
        overrides.insert("user_agent".to_string(), Value::from("Cow"));

        let merged = merge_defaults(&overrides);
        assert_eq!(merged["user_agent"], Value::from("Cow"));

        for (key, value) in default_options() {
            if key != "user_agent" {
                assert_eq!(merged[&key], value, "key {key} should keep its default");
            }
        }
    }

    #[test]
    fn unknown_keys_pass_through() {
        let mut overrides = Map::new();
        overrides.insert("proxy".to_string(), Value::from("socks5://localhost"));

        let merged = merge_defaults(&overrides);
        assert_eq!(merged["proxy"], Value::from("socks5://localhost"));
        assert_eq!(merged.len(), default_options().len() + 1);
    }

    #[test]
    fn defaults_include_playlist_settings() {
        let defaults = default_options();
        assert_eq!(defaults["load_playlists"], Value::from(true));
        assert_eq!(defaults["compress_playlists"], Value::from(true));
        assert_eq!(defaults["cache_playlist_metadata"], Value::from(true));
    }
}
