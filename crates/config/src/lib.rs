//! strata-config: layered configuration aggregation
//!
//! This crate loads key/value settings from heterogeneous sources (INI
//! files, XML files, .NET-style XML config, the Windows registry,
//! command-line arguments, in-memory maps), merges them into a unified
//! view of named [`Section`]s, resolves `${key}` / `${section|key}`
//! variable references across sections, and serializes the merged result
//! back out to any supported format, optionally encrypted.
//!
//! Merging is order-sensitive on purpose: incoming values win, so layering
//! environment-specific overrides over defaults is just a later merge.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_config::prelude::*;
//!
//! fn main() -> ConfigResult<()> {
//!     let defaults = Source::from_file(Ini::new(), "default.settings.ini")?;
//!     let overrides = Source::from_file(Ini::new(), "prod.settings.ini")?;
//!
//!     let merged = Source::in_memory();
//!     merged.merge(&[defaults, overrides])?;
//!     merged.expand_key_values();
//!
//!     let server = merged.section("Server")?;
//!     let port: u16 = server.get_or("port", 8080)?;
//!     let hosts: Vec<String> = server.get("hosts")?;
//!     println!("listening on port {port}, hosts {hosts:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency
//!
//! The model is single-threaded, synchronous, and blocking. [`Section`]
//! and [`Source`] are cheap-to-clone shared handles built on `Rc`, which
//! makes them deliberately `!Send`: sharing a source across threads is a
//! caller concern, not something the crate arbitrates. Driver I/O blocks;
//! there are no timeouts and no async variants.

#![warn(missing_docs)]

pub mod convert;
pub mod core;
pub mod crypto;
pub mod formats;
pub mod settings;
pub mod sources;

pub use self::convert::{FromSetting, ToSetting, parse_setting};
pub use self::core::{
    ChangeObserver, ConfigError, ConfigResult, Driver, MemoryDriver, ObserverId, Section, Source,
};
pub use self::crypto::{DEFAULT_KEY, Security};
pub use self::formats::{DotNetConfig, Format, Ini, Xml};
pub use self::settings::{SettingsOptions, SettingsRegistry};
pub use self::sources::{CommandLineSource, FileDriver};
#[cfg(windows)]
pub use self::sources::RegistrySource;

/// Prelude for convenient imports
pub mod prelude {
    //! One-stop imports for typical usage
    //!
    //! ```rust
    //! use strata_config::prelude::*;
    //! ```

    pub use crate::convert::{FromSetting, ToSetting};
    pub use crate::core::{ConfigError, ConfigResult, Section, Source};
    pub use crate::formats::{DotNetConfig, Format, Ini, Xml};
    pub use crate::settings::{SettingsOptions, SettingsRegistry};
    pub use crate::sources::CommandLineSource;
    #[cfg(windows)]
    pub use crate::sources::RegistrySource;
}
