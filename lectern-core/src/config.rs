use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::LecternError;

/// Viewer settings read from `config.toml`. Every field has a default, so a partial or
/// missing file is fine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub search: SearchConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
    pub bookmarks: BookmarkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub case_insensitive: bool,
    /// Queries longer than this are shortened in the "nothing found" summary.
    pub summary_width: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            summary_width: 17,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub sidebar_width: u16,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            sidebar_width: 32,
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookmarkConfig {
    pub name_prefix: String,
}

impl Default for BookmarkConfig {
    fn default() -> Self {
        Self {
            name_prefix: "New Bookmark".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Loads `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, LecternError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| LecternError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| LecternError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ViewerConfig::load(&dir.path().join("config.toml")).unwrap();

        assert!(config.search.case_insensitive);
        assert_eq!(config.search.summary_width, 17);
        assert_eq!(config.ui.sidebar_width, 32);
        assert_eq!(config.ui.poll_interval, Duration::from_millis(100));
        assert_eq!(config.bookmarks.name_prefix, "New Bookmark");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[search]\ncase_insensitive = false\n\n[ui]\npoll_interval = 250\n",
        )
        .unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert!(!config.search.case_insensitive);
        assert_eq!(config.search.summary_width, 17);
        assert_eq!(config.ui.poll_interval, Duration::from_millis(250));
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search\n").unwrap();

        match ViewerConfig::load(&path) {
            Err(LecternError::ConfigParse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempdir().unwrap();

        match ViewerConfig::load(dir.path()) {
            Err(LecternError::ConfigRead { path: reported, .. }) => {
                assert_eq!(reported, dir.path())
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
