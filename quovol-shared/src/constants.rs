//! Driver-wide constants.
//!
//! Record file names and option keys are part of the on-disk and host-facing
//! contract. Changing them orphans existing records.

/// Driver identity.
pub mod driver {
    /// Name reported to the host framework.
    pub const NAME: &str = "quobyte";

    /// Filesystem type passed to the mount executor.
    pub const FS_TYPE: &str = "quobyte";
}

/// Persisted record naming.
///
/// Every record file is `prefix + id + suffix`, so a prefix/suffix scan of the
/// storage root enumerates exactly the records of one type.
pub mod records {
    /// Manager configuration: `quobyte.cfg` (empty id).
    pub const CONFIG_PREFIX: &str = "quobyte";
    pub const CONFIG_SUFFIX: &str = ".cfg";

    /// Volume records: `quobyte_volume_<name>.json`.
    pub const VOLUME_PREFIX: &str = "quobyte_volume_";
    pub const VOLUME_SUFFIX: &str = ".json";
}

/// Bootstrap option keys (host-supplied string map).
pub mod bootstrap {
    pub const API_URL: &str = "quobyte.apiurl";
    pub const API_USER: &str = "quobyte.apiuser";
    pub const API_PASSWORD: &str = "quobyte.apipassword";
    pub const REGISTRIES: &str = "quobyte.registries";
    pub const DEFAULT_USER: &str = "quobyte.defaultuser";
    pub const DEFAULT_GROUP: &str = "quobyte.defaultgroup";
    pub const DEFAULT_VOLUME_CONFIG: &str = "quobyte.defaultvolumeconfig";

    /// Timeout for remote create/delete calls, whole seconds.
    pub const REMOTE_TIMEOUT: &str = "quobyte.remotetimeout";

    /// Timeout for mount/unmount calls, whole seconds.
    pub const MOUNT_TIMEOUT: &str = "quobyte.mounttimeout";
}

/// Per-request option keys.
pub mod request {
    /// Delete only the local record, keep the remote volume.
    pub const REFERENCE_ONLY: &str = "reference-only";

    /// Requested mount point.
    pub const MOUNT_POINT: &str = "mount-point";
}

/// Defaults applied when bootstrap options leave a field unset.
pub mod defaults {
    pub const API_USER: &str = "admin";
    pub const API_PASSWORD: &str = "quobyte";
    pub const USER: &str = "root";
    pub const GROUP: &str = "nfsnobody";
    pub const VOLUME_CONFIG: &str = "BASE";

    pub const REMOTE_TIMEOUT_SECS: u64 = 60;
    pub const MOUNT_TIMEOUT_SECS: u64 = 30;
}

/// Keys of the info maps returned to the host.
pub mod info_keys {
    pub const MOUNT_POINT: &str = "MountPoint";
    pub const ID: &str = "ID";
    pub const VOLUME_NAME: &str = "VolumeName";
    pub const USER: &str = "User";
    pub const GROUP: &str = "Group";
    pub const CONFIG: &str = "Config";

    pub const ROOT: &str = "Root";
    pub const REGISTRIES: &str = "Registries";
    pub const VOLUME_CONFIG: &str = "VolumeConfig";
}
