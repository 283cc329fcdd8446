//! Engine configuration.
//!
//! # Env Var Contract
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `TABULA_DEBOUNCE_MS` | `500` | Quiet period before a persistence write |
//! | `TABULA_PAGE_SIZE` | `10` | Page size when neither caller nor store sets one |
//! | `TABULA_PERSIST` | `true` | `false`/`0`/`off` disables persistence writes |
//!
//! Unparseable values keep the default and log a warning.

use std::env;
use std::time::Duration;

use crate::pagination::ROWS_PER_PAGE_OPTIONS;
use crate::state::DEFAULT_PAGE_SIZE;

/// Default persistence debounce.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Tunables of a [`TableEngine`](crate::TableEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period before the persisted slice is written.
    pub debounce: Duration,
    /// Page size used when no other source sets one.
    pub default_page_size: usize,
    /// Choices offered by the rows-per-page selector.
    pub page_size_options: Vec<usize>,
    /// Whether view state is written to the store.
    pub persist: bool,
    /// Rows are one server-supplied page; the page count comes from the host.
    pub manual_pagination: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            default_page_size: DEFAULT_PAGE_SIZE,
            page_size_options: ROWS_PER_PAGE_OPTIONS.to_vec(),
            persist: true,
            manual_pagination: false,
        }
    }
}

impl EngineConfig {
    /// Read overrides from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup` (env-like key -> value).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("TABULA_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.debounce = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "invalid TABULA_DEBOUNCE_MS, using default"),
            }
        }

        if let Some(raw) = lookup("TABULA_PAGE_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.default_page_size = n,
                _ => tracing::warn!(value = %raw, "invalid TABULA_PAGE_SIZE, using default"),
            }
        }

        if let Some(raw) = lookup("TABULA_PERSIST") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => config.persist = false,
                "1" | "true" | "on" | "yes" | "" => config.persist = true,
                _ => tracing::warn!(value = %raw, "invalid TABULA_PERSIST, using default"),
            }
        }

        config
    }

    /// Persistence debounce.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Default page size (clamped to at least 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    /// Rows-per-page choices.
    #[must_use]
    pub fn with_page_size_options(mut self, options: impl IntoIterator<Item = usize>) -> Self {
        self.page_size_options = options.into_iter().filter(|&n| n > 0).collect();
        self
    }

    /// Enable or disable persistence writes.
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Host-driven pagination.
    #[must_use]
    pub fn with_manual_pagination(mut self, manual: bool) -> Self {
        self.manual_pagination = manual;
        self
    }
}
