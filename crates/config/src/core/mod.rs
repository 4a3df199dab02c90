//! The merge-and-expand engine: sections, sources, and variable expansion

pub mod error;
pub(crate) mod expand;
pub mod section;
pub mod source;

pub use error::{ConfigError, ConfigResult};
pub use section::{ChangeObserver, ObserverId, Section};
pub use source::{Driver, MemoryDriver, Source};
