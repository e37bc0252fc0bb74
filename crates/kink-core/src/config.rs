//! Flat key/value settings store.
//!
//! The file is TOML with a single reserved `[kink]` table whose values are all
//! strings.  Every key the application reads has a compiled-in default; a key
//! missing from the file is written back the first time it is read, so the
//! file documents itself as the application grows new settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub const SECTION: &str = "kink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Site,
    StreamKink,
    StreamDna,
    StreamIndie,
    StreamDistortion,
    Json,
    Station,
    Wait,
    NotificationTimeout,
    Autostart,
    Autoplay,
    Transport,
}

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        SettingKey::Site,
        SettingKey::StreamKink,
        SettingKey::StreamDna,
        SettingKey::StreamIndie,
        SettingKey::StreamDistortion,
        SettingKey::Json,
        SettingKey::Station,
        SettingKey::Wait,
        SettingKey::NotificationTimeout,
        SettingKey::Autostart,
        SettingKey::Autoplay,
        SettingKey::Transport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::StreamKink => "stream_kink",
            Self::StreamDna => "stream_dna",
            Self::StreamIndie => "stream_indie",
            Self::StreamDistortion => "stream_distortion",
            Self::Json => "json",
            Self::Station => "station",
            Self::Wait => "wait",
            Self::NotificationTimeout => "show_notification",
            Self::Autostart => "autostart",
            Self::Autoplay => "autoplay",
            Self::Transport => "transport",
        }
    }

    /// Older spellings still honoured when reading a hand-edited file.
    fn legacy_names(self) -> &'static [&'static str] {
        match self {
            Self::NotificationTimeout => &["notification_timeout"],
            _ => &[],
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            Self::Site => "https://kink.nl",
            Self::StreamKink => "https://playerservices.streamtheworld.com/pls/KINK.pls",
            Self::StreamDna => "http://playerservices.streamtheworld.com/pls/KINK_DNA.pls",
            Self::StreamIndie => "https://playerservices.streamtheworld.com/pls/KINKINDIE.pls",
            Self::StreamDistortion => {
                "https://playerservices.streamtheworld.com/pls/KINK_DISTORTION.pls"
            }
            Self::Json => "https://api.kink.nl/static/now-radio.json",
            Self::Station => "kink",
            Self::Wait => "10",
            Self::NotificationTimeout => "10",
            Self::Autostart => "false",
            Self::Autoplay => "true",
            Self::Transport => "pause",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Site => "Station web site, opened from the menu",
            Self::StreamKink => "Playlist for the main station",
            Self::StreamDna => "Playlist for stations containing 'dna'",
            Self::StreamIndie => "Playlist for every other station",
            Self::StreamDistortion => "Playlist for stations containing 'distortion'",
            Self::Json => "Now-playing metadata endpoint",
            Self::Station => "Last selected station",
            Self::Wait => "Seconds between metadata polls and request timeout (minimum 1)",
            Self::NotificationTimeout => "Seconds a track notification stays up (0 disables them)",
            Self::Autostart => "Start on login (true/false)",
            Self::Autoplay => "Start playing on launch (true/false)",
            Self::Transport => "Play button behaviour: pause or stop",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name || k.legacy_names().contains(&name))
            .ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a [`ConfigStore::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: String,
    /// The key was missing and its default has just been written to the file.
    pub materialized: bool,
}

pub struct ConfigStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Open the settings file, creating it with every default on first run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
            }
            std::fs::write(&path, default_file()).map_err(|e| ConfigError::io(&path, e))?;
            info!("Created settings file {:?}", path);
        }

        let mut store = Self {
            path,
            values: BTreeMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file into memory.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        self.values = parse_section(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        debug!("Loaded {} settings from {:?}", self.values.len(), self.path);
        Ok(())
    }

    fn lookup(&self, key: SettingKey) -> Option<&String> {
        self.values.get(key.name()).or_else(|| {
            key.legacy_names()
                .iter()
                .find_map(|legacy| self.values.get(*legacy))
        })
    }

    /// Read a setting.  A missing key falls back to its default, which is also
    /// appended to the file and merged into memory, so a second read finds it.
    pub fn get(&mut self, key: SettingKey) -> Lookup {
        if let Some(value) = self.lookup(key) {
            return Lookup {
                value: value.clone(),
                materialized: false,
            };
        }

        let value = key.default_value().to_string();
        info!("Setting '{}' missing, writing default {:?}", key, value);
        if let Err(e) = self.write_entry(key.name(), &value) {
            warn!("Could not persist default for '{}': {}", key, e);
        }
        if let Err(e) = self.reload() {
            warn!("Could not reload settings after adding '{}': {}", key, e);
        }
        // Keep the default in memory even when the file could not be written.
        self.values
            .entry(key.name().to_string())
            .or_insert_with(|| value.clone());

        Lookup {
            value,
            materialized: true,
        }
    }

    pub fn value(&mut self, key: SettingKey) -> String {
        self.get(key).value
    }

    /// Write-through update of one key.  The value is stored as a string.
    pub fn set(&mut self, key: SettingKey, value: impl ToString) -> Result<(), ConfigError> {
        let value = value.to_string();
        self.write_entry(key.name(), &value)?;
        self.reload()?;
        info!("Saved setting {} = {:?}", key, value);
        Ok(())
    }

    /// Replace the `name = ...` line of the reserved table, or append one.
    /// Comments and unknown keys are left in place.
    fn write_entry(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };
        let updated = upsert_line(&content, name, value);
        // Never persist a document we could not read back.
        let written = parse_section(&updated).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        if written.get(name).map(String::as_str) != Some(value) {
            return Err(ConfigError::Misplaced {
                path: self.path.clone(),
                key: name.to_string(),
            });
        }
        std::fs::write(&self.path, updated).map_err(|e| ConfigError::io(&self.path, e))
    }
}

fn entry_line(name: &str, value: &str) -> String {
    format!("{} = {}", name, toml::Value::String(value.to_string()))
}

/// `line` up to a `#` that is not inside a quoted string.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return &line[..i],
            None => {}
        }
    }
    line
}

fn header_name(line: &str) -> Option<&str> {
    let t = strip_comment(line).trim();
    if t.starts_with("[[") {
        return Some(t.trim_start_matches('[').trim_end_matches(']').trim());
    }
    t.strip_prefix('[')?
        .strip_suffix(']')
        .map(|name| name.trim().trim_matches('"'))
}

fn line_key(line: &str) -> Option<&str> {
    let (k, _) = strip_comment(line).split_once('=')?;
    Some(k.trim().trim_matches('"'))
}

fn upsert_line(content: &str, name: &str, value: &str) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    // Locate the reserved table: [start, end) spans its body.
    let start = lines
        .iter()
        .position(|l| header_name(l) == Some(SECTION))
        .map(|i| i + 1);

    let Some(start) = start else {
        if !lines.is_empty() && !lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("[{SECTION}]"));
        lines.push(entry_line(name, value));
        return lines.join("\n") + "\n";
    };

    let end = lines[start..]
        .iter()
        .position(|l| header_name(l).is_some())
        .map(|i| start + i)
        .unwrap_or(lines.len());

    if let Some(i) = (start..end).find(|&i| line_key(&lines[i]) == Some(name)) {
        lines[i] = entry_line(name, value);
    } else {
        // Insert after the last non-blank line of the table.
        let mut at = end;
        while at > start && lines[at - 1].trim().is_empty() {
            at -= 1;
        }
        lines.insert(at, entry_line(name, value));
    }
    lines.join("\n") + "\n"
}

fn parse_section(content: &str) -> Result<BTreeMap<String, String>, toml::de::Error> {
    let doc: toml::Table = content.parse()?;
    let mut values = BTreeMap::new();
    let Some(toml::Value::Table(section)) = doc.get(SECTION) else {
        return Ok(values);
    };
    for (k, v) in section {
        let s = match v {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            other => {
                warn!("Ignoring non-scalar setting '{}' = {}", k, other);
                continue;
            }
        };
        values.insert(k.clone(), s);
    }
    Ok(values)
}

fn default_file() -> String {
    let mut out = format!("# {} settings\n\n[{SECTION}]\n", crate::APP_NAME);
    for key in SettingKey::ALL {
        out.push_str(&format!("# {}\n", key.description()));
        out.push_str(&entry_line(key.name(), key.default_value()));
        out.push('\n');
    }
    out
}

// ── value coercion ────────────────────────────────────────────────────────────

/// Integer setting; an unparsable value falls back to the key's default.
pub fn parse_int(key: SettingKey, raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or_else(|_| {
        warn!("Setting '{}' = {:?} is not an integer, using default", key, raw);
        key.default_value().parse().unwrap_or(0)
    })
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

/// Poll interval and request timeout: `max(wait, 1)` seconds.
pub fn wait_interval(raw: &str) -> Duration {
    Duration::from_secs(parse_int(SettingKey::Wait, raw).max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(content: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, content).unwrap();
        let store = ConfigStore::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn test_every_key_round_trips_its_name() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.name()).unwrap(), key);
            assert!(!key.default_value().is_empty());
        }
        assert_eq!(
            SettingKey::from_name("notification_timeout").unwrap(),
            SettingKey::NotificationTimeout
        );
        assert!(matches!(
            SettingKey::from_name("volume"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_first_run_writes_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut store = ConfigStore::open(&path).unwrap();
        for key in SettingKey::ALL {
            let lookup = store.get(key);
            assert_eq!(lookup.value, key.default_value());
            assert!(!lookup.materialized, "{key} should already be in the file");
        }
    }

    #[test]
    fn test_missing_key_is_materialized_once() {
        let (_dir, mut store) = store_with("[kink]\nstation = \"kink-dna\"\n");

        let first = store.get(SettingKey::Wait);
        assert_eq!(first.value, "10");
        assert!(first.materialized);

        let second = store.get(SettingKey::Wait);
        assert_eq!(second.value, "10");
        assert!(!second.materialized);

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("wait = ").count(), 1);
        assert!(content.contains("station = \"kink-dna\""));
    }

    #[test]
    fn test_missing_section_is_created() {
        let (_dir, mut store) = store_with("# just a comment\n");
        assert!(store.get(SettingKey::Station).materialized);
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("# just a comment\n"));
        assert!(content.contains("[kink]\nstation = \"kink\""));
    }

    #[test]
    fn test_key_lands_in_reserved_table_not_a_later_one() {
        let (_dir, mut store) = store_with("[kink]\nsite = \"x\"\n\n[other]\nwait = \"99\"\n");
        assert_eq!(store.value(SettingKey::Wait), "10");
        store.reload().unwrap();
        assert_eq!(store.value(SettingKey::Wait), "10");
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("[other]\nwait = \"99\""));
    }

    #[test]
    fn test_set_replaces_in_place_and_keeps_comments() {
        let (_dir, mut store) =
            store_with("[kink]\n# my station\nstation = \"kink\"\nwait = 5\n");
        store.set(SettingKey::Station, "kink-distortion").unwrap();
        store.set(SettingKey::Autoplay, false).unwrap();

        assert_eq!(store.value(SettingKey::Station), "kink-distortion");
        assert_eq!(store.value(SettingKey::Autoplay), "false");
        assert_eq!(store.value(SettingKey::Wait), "5");

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("# my station\nstation = \"kink-distortion\""));
        assert_eq!(content.matches("station =").count(), 1);
    }

    #[test]
    fn test_commented_header_is_reused_for_missing_key() {
        let (_dir, mut store) = store_with("[kink] # my settings\nstation = \"kink\"\n");

        let lookup = store.get(SettingKey::Wait);
        assert_eq!(lookup.value, "10");
        assert!(lookup.materialized);

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("[kink]").count(), 1);
        assert!(content.starts_with("[kink] # my settings\nstation = \"kink\"\nwait = \"10\""));

        store.reload().unwrap();
        store.set(SettingKey::Station, "kink-dna").unwrap();
        let mut reopened = ConfigStore::open(store.path()).unwrap();
        assert_eq!(reopened.value(SettingKey::Station), "kink-dna");
        assert!(!reopened.get(SettingKey::Wait).materialized);
    }

    #[test]
    fn test_trailing_comments_on_keys_and_quoted_hashes() {
        let (_dir, mut store) = store_with(
            "[\"kink\"]\nsite = \"https://kink.nl/#live\" # home\nwait = 4 # seconds\n",
        );
        assert_eq!(store.value(SettingKey::Site), "https://kink.nl/#live");
        store.set(SettingKey::Wait, 6).unwrap();
        assert_eq!(store.value(SettingKey::Wait), "6");

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("wait =").count(), 1);
        assert!(content.contains("site = \"https://kink.nl/#live\" # home"));
    }

    #[test]
    fn test_unwritable_layout_leaves_file_untouched() {
        // An inline table cannot be extended line by line.
        let original = "kink = { station = \"kink\" }\n";
        let (_dir, mut store) = store_with(original);

        assert_eq!(store.value(SettingKey::Station), "kink");
        assert!(store.set(SettingKey::Wait, 3).is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn test_non_string_scalars_are_coerced() {
        let (_dir, mut store) = store_with("[kink]\nwait = 3\nautoplay = false\n");
        assert_eq!(store.value(SettingKey::Wait), "3");
        assert_eq!(store.value(SettingKey::Autoplay), "false");
    }

    #[test]
    fn test_legacy_notification_key_is_read() {
        let (_dir, mut store) = store_with("[kink]\nnotification_timeout = \"4\"\n");
        let lookup = store.get(SettingKey::NotificationTimeout);
        assert_eq!(lookup.value, "4");
        assert!(!lookup.materialized);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[kink\nstation = ").unwrap();
        assert!(matches!(
            ConfigStore::open(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_wait_is_clamped_to_one_second() {
        for (raw, secs) in [("0", 1), ("-5", 1), ("1", 1), ("7", 7), ("junk", 10)] {
            assert_eq!(wait_interval(raw), Duration::from_secs(secs), "wait={raw}");
        }
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" Yes "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
