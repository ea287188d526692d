//! Store configuration.

use std::path::PathBuf;

/// Configuration for opening a [`crate::DocumentStore`].
///
/// The single user-facing knob is `base_dir`: when set, the store persists
/// through a WAL and snapshot in that directory; when `None`, the store is
/// purely in-memory and never touches the filesystem.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for persistence. `None` disables persistence.
    pub base_dir: Option<PathBuf>,

    /// Whether to create the base directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the WAL after each appended record (safer but slower).
    pub sync_on_append: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: None,
            create_if_missing: true,
            sync_on_append: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base directory for persistence.
    #[must_use]
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Sets whether to create the base directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync the WAL after each record.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.base_dir.is_none());
        assert!(config.create_if_missing);
        assert!(config.sync_on_append);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .base_dir("/tmp/vellum")
            .create_if_missing(false)
            .sync_on_append(false);

        assert_eq!(config.base_dir, Some(PathBuf::from("/tmp/vellum")));
        assert!(!config.create_if_missing);
        assert!(!config.sync_on_append);
    }
}
