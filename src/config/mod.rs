//! Configuration for Stagebox.
//!
//! Provides `Settings` (top-level config), sub-configs for each subsystem,
//! `AppPaths` for the platform config directory, TOML persistence via
//! `Settings::load` / `Settings::save`, and environment overrides
//! (`STAGEBOX_*`, `DROPBOX_TOKEN`, `API_TOKEN`) applied on top of whatever
//! the file provides — the box is usually configured through its unit-file
//! environment rather than an editor on the device.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ApiConfig, AudioConfig, LogConfig, LogTarget, PathsConfig, Settings, StorageConfig,
};
