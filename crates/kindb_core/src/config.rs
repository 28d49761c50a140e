//! Store configuration.

use kindb_codec::Serializer;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Physical engine used for a persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Ordered key-value engine (`redb`).
    #[default]
    Kv,
    /// Relational engine (SQLite).
    Sqlite,
}

impl BackendKind {
    /// Name recorded in the store directory.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kv => "kv",
            Self::Sqlite => "sqlite",
        }
    }

    /// Engine file name inside the store directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Kv => "kindb.redb",
            Self::Sqlite => "sqlite.db",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kv" | "redb" => Ok(Self::Kv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(CoreError::invalid_format(format!("unknown backend '{other}'"))),
        }
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine for newly created stores. Existing stores keep their own.
    pub backend: BackendKind,

    /// Payload format for newly created stores.
    pub serializer: Serializer,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Open without a lock and refuse every write.
    pub read_only: bool,

    /// Permit destructive in-place schema upgrades on open.
    pub allow_upgrade: bool,

    /// Locale used for sorted listings and the surname list.
    pub locale: String,

    /// Maximum number of transactions kept for undo (0 = unbounded).
    pub undo_depth: usize,

    /// Minimum time between progress callbacks.
    pub progress_interval: Duration,

    /// Minimum percentage change between progress callbacks.
    pub progress_step: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Kv,
            serializer: Serializer::Blob,
            create_if_missing: true,
            read_only: false,
            allow_upgrade: false,
            locale: String::from("en_US"),
            undo_depth: 1000,
            progress_interval: Duration::from_millis(250),
            progress_step: 1,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine for new stores.
    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the payload format for new stores.
    #[must_use]
    pub const fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Opens the store read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Confirms that older schemas may be upgraded in place.
    #[must_use]
    pub const fn allow_upgrade(mut self, value: bool) -> Self {
        self.allow_upgrade = value;
        self
    }

    /// Sets the collation locale.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the undo history depth.
    #[must_use]
    pub const fn undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Sets progress throttling.
    #[must_use]
    pub const fn progress(mut self, interval: Duration, step: u8) -> Self {
        self.progress_interval = interval;
        self.progress_step = step;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Kv);
        assert_eq!(config.serializer, Serializer::Blob);
        assert!(config.create_if_missing);
        assert!(!config.read_only);
        assert!(!config.allow_upgrade);
        assert_eq!(config.undo_depth, 1000);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .backend(BackendKind::Sqlite)
            .serializer(Serializer::Json)
            .read_only(true)
            .allow_upgrade(true)
            .locale("sv_SE")
            .undo_depth(5);

        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.serializer, Serializer::Json);
        assert!(config.read_only);
        assert!(config.allow_upgrade);
        assert_eq!(config.locale, "sv_SE");
        assert_eq!(config.undo_depth, 5);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("kv".parse::<BackendKind>().unwrap(), BackendKind::Kv);
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("bsddb".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Sqlite.to_string(), "sqlite");
    }
}
