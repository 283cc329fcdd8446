//! Keys and the save/restore contract for persistable view state.
//!
//! # Design Invariants
//!
//! 1. **Round-trip fidelity**: `restore_state(save_state())` must produce an
//!    equivalent observable view. Derived data (projections, row caches) may
//!    differ, user-facing choices (sort, filters, page size) must not.
//! 2. **Key uniqueness**: two tables sharing one store must produce distinct
//!    [`StateKey`] values or they will overwrite each other.
//! 3. **No side effects**: `save_state` is a pure read; `restore_state` only
//!    mutates `self`.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Fallback |
//! |---------|-------|----------|
//! | Deserialization error | Schema drift, corrupt data | Keep current state |
//! | Missing state | First mount, key changed | Keep current state |

use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage key for a persisted value.
///
/// Keys follow the console's conventions: `tableState:<table>` for table view
/// state and `lastKnown_<context>` for small caches kept by collaborating
/// components (for example the last namespace selection of a page).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StateKey {
    /// Convention prefix including its separator.
    pub prefix: &'static str,
    /// Instance identifier.
    pub instance_id: String,
}

impl StateKey {
    /// Prefix used for table view state.
    pub const TABLE_PREFIX: &'static str = "tableState:";
    /// Prefix used for last-known caches.
    pub const LAST_KNOWN_PREFIX: &'static str = "lastKnown_";

    /// Key for the view state of the table named `table`.
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            prefix: Self::TABLE_PREFIX,
            instance_id: table.into(),
        }
    }

    /// Key for a last-known cache scoped to `context`.
    #[must_use]
    pub fn last_known(context: impl Into<String>) -> Self {
        Self {
            prefix: Self::LAST_KNOWN_PREFIX,
            instance_id: context.into(),
        }
    }

    /// Canonical string form, e.g. `tableState:Commands`.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}{}", self.prefix, self.instance_id)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.instance_id)
    }
}

/// Opt-in contract for components whose user-facing state is persisted.
pub trait Stateful {
    /// The persisted form. `Default` is what a first mount starts from.
    type State: Default + Serialize + DeserializeOwned;

    /// Unique key identifying this instance.
    fn state_key(&self) -> StateKey;

    /// Extract the current state. Must be a pure read.
    fn save_state(&self) -> Self::State;

    /// Apply a restored state.
    ///
    /// Implementations should sanitize restored values (unknown ids, zero
    /// sizes) rather than trusting stored data.
    fn restore_state(&mut self, state: Self::State);
}
