//! Master configuration file - `key=value` lines with `//` comments

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::error::{FleetError, Result};

/// Prefix marking a comment line
pub const COMMENT_PREFIX: &str = "//";

/// Ordered `key -> value` view of a configuration file.
///
/// Entries keep the order in which keys first appear in the file. Comment
/// and blank lines are not part of the mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MasterConfig {
    entries: Vec<(String, String)>,
}

impl MasterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, keeping the key's original position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MasterConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (k, v) in iter {
            config.insert(k, v);
        }
        config
    }
}

fn is_setting_line(line: &str) -> bool {
    !line.starts_with(COMMENT_PREFIX) && !line.trim().is_empty()
}

/// Parse configuration text. `path` is only used for error reporting.
pub fn parse(path: &Path, text: &str) -> Result<MasterConfig> {
    let mut config = MasterConfig::new();
    for (idx, line) in text.lines().enumerate() {
        if !is_setting_line(line) {
            continue;
        }
        let line = line.trim();
        let (key, value) = line.split_once('=').ok_or_else(|| FleetError::ConfigFormat {
            path: path.to_path_buf(),
            line: idx + 1,
            content: line.to_string(),
        })?;
        config.insert(key, value);
    }
    Ok(config)
}

/// Read a configuration file; a missing file yields an empty mapping.
///
/// Whitespace around each line is trimmed, so a value never ends in
/// whitespace.
pub fn read(path: &Path) -> Result<MasterConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No configuration at {:?}, using empty mapping", path);
            return Ok(MasterConfig::new());
        }
        Err(e) => return Err(FleetError::io(path, e)),
    };
    parse(path, &text)
}

/// Rewrite the values of matching keys, leaving every other byte untouched.
///
/// Keys in `updates` that do not occur in `text` are dropped.
pub fn apply_updates(text: &str, updates: &MasterConfig) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let replacement = if is_setting_line(body) {
            body.split_once('=')
                .and_then(|(key, _)| updates.get(key).map(|value| (key, value)))
        } else {
            None
        };
        match replacement {
            Some((key, value)) => {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push_str(ending);
            }
            None => out.push_str(line),
        }
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Apply `updates` to the file at `path` in place.
///
/// The new content is written to a sibling file carrying the original's
/// permissions and renamed over the original. The sibling is removed if
/// that fails.
pub fn write(path: &Path, updates: &MasterConfig) -> Result<()> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(FleetError::ConfigMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(FleetError::io(path, e)),
    };

    let updated = apply_updates(&text, updates);

    let permissions = fs::metadata(path)
        .map_err(|e| FleetError::io(path, e))?
        .permissions();

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let replaced = fs::write(&tmp, updated)
        .and_then(|()| fs::set_permissions(&tmp, permissions))
        .map_err(|e| FleetError::io(&tmp, e))
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| FleetError::io(path, e)));
    if let Err(e) = replaced {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!("Failed to remove {:?}: {}", tmp, cleanup);
            }
        }
        return Err(e);
    }

    debug!("Updated {} key(s) in {:?}", updates.len(), path);
    Ok(())
}

#[cfg(test)]
#[path = "config_store_property_tests.rs"]
mod property_tests;
