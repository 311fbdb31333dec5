//! Constants for the quovol runtime
//!
//! Driver-wide naming and option keys live in `quovol_shared::constants`;
//! this module only holds what the host-side runtime needs on top.

pub use quovol_shared::constants::{bootstrap, defaults, driver, info_keys, records, request};

pub mod envs {
    /// Overrides the default storage root (`~/.quovol`).
    pub const QUOVOL_ROOT: &str = "QUOVOL_ROOT";
}

/// File naming patterns
pub mod filenames {
    /// Lock file name
    pub const LOCK_FILE: &str = ".lock";

    /// Rolling log file name (under `logs/`)
    pub const LOG_FILE: &str = "quovol.log";
}
