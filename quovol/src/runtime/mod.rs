pub mod constants;
pub mod layout;
pub mod lock;
pub mod options;
pub mod types;

mod core;
pub use core::VolumeManager;
