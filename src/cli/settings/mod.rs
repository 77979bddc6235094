//! Settings management for CLI set/unset commands.
//!
//! Each configuration key has a [`SettingHandler`]. Handlers come in a few
//! shapes:
//!
//! - Text settings (e.g., `base-url`, `tts-voice`)
//! - Boolean settings (e.g., `markdown`, `syntax`)
//! - Command settings (`audio-player`)

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use crate::core::config::data::Config;

/// Trait for handling a configuration setting.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Set the configuration value from the words after the key. Returns the
    /// message to print.
    fn set(&self, args: &[String]) -> Result<String, SettingError>;

    /// Clear the value so the default applies again.
    fn unset(&self) -> Result<String, SettingError>;

    /// Format the current value for display in `murmur config` output.
    fn format(&self, config: &Config) -> String;
}
