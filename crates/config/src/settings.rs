//! Application settings bootstrap: default + environment-specific layering
//!
//! The registry loads `default.settings.<ext>` from a base directory,
//! discovers the environment name (global section entry, then process
//! environment variable, then the configured default), merges
//! `<env>.settings.<ext>` over the defaults, and expands variables. It is
//! an owned object handed through the application's call graph; there is
//! no global state.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::ConfigResult;
use crate::core::section::Section;
use crate::core::source::Source;
use crate::formats::{DotNetConfig, Format, Ini, Xml};

/// Discovery options for [`SettingsRegistry::init`].
#[derive(Debug, Clone)]
pub struct SettingsOptions {
    /// Directory the settings files live in.
    pub base_dir: PathBuf,
    /// Extension of the settings files: `.ini`, `.xml`, or `.config`.
    pub config_extension: String,
    /// Section holding the global configuration, including the
    /// environment entry.
    pub global_section: String,
    /// Entry (and process environment variable) naming the environment.
    pub environment_key: String,
    /// Environment used when nothing names one.
    pub default_environment: String,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            config_extension: ".ini".to_string(),
            global_section: "Global".to_string(),
            environment_key: "Environment".to_string(),
            default_environment: "dev".to_string(),
        }
    }
}

impl SettingsOptions {
    /// Options rooted at the given directory.
    pub fn in_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Use a different settings-file extension (`.ini`, `.xml`, `.config`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.config_extension = extension.into();
        self
    }

    /// Use a different default environment name.
    pub fn with_default_environment(mut self, environment: impl Into<String>) -> Self {
        self.default_environment = environment.into();
        self
    }

    fn format(&self) -> Option<Box<dyn Format>> {
        match self.config_extension.as_str() {
            ".ini" => Some(Box::new(Ini::new())),
            ".xml" => Some(Box::new(Xml::new())),
            ".config" => Some(Box::new(DotNetConfig::new())),
            _ => None,
        }
    }

    fn default_file(&self) -> PathBuf {
        self.base_dir
            .join(format!("default.settings{}", self.config_extension))
    }

    fn environment_file(&self, environment: &str) -> PathBuf {
        self.base_dir
            .join(format!("{environment}.settings{}", self.config_extension))
    }
}

/// The merged, expanded application settings and the environment they were
/// resolved for.
pub struct SettingsRegistry {
    options: SettingsOptions,
    environment: String,
    source: Source,
}

impl SettingsRegistry {
    /// Discover the environment and build the merged settings source.
    pub fn init(options: SettingsOptions) -> ConfigResult<Self> {
        let mut registry = Self {
            options,
            environment: String::new(),
            source: Source::in_memory(),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Repeat discovery and rebuild the merged source from the files'
    /// current contents.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let source = Source::in_memory();

        let default_settings = self.try_load(&self.options.default_file())?;
        let environment = self
            .environment_from(default_settings.as_ref())
            .or_else(|| self.environment_from_process())
            .unwrap_or_else(|| self.options.default_environment.clone());
        debug!(%environment, "resolved settings environment");

        if let Some(defaults) = default_settings {
            source.merge(&[defaults])?;
        }
        let environment_file = self.options.environment_file(&environment);
        if let Some(overrides) = self.try_load(&environment_file)? {
            source.merge(&[overrides])?;
        } else {
            debug!(path = %environment_file.display(), "no environment settings file");
        }

        source.expand_key_values();
        self.environment = environment;
        self.source = source;
        Ok(())
    }

    /// The environment the settings were resolved for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The merged settings source.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Convenience lookup of a section in the merged source, creating it
    /// if absent.
    pub fn section(&self, name: &str) -> ConfigResult<Section> {
        self.source.section(name)
    }

    fn environment_from(&self, settings: Option<&Source>) -> Option<String> {
        let section = settings?.find_section(&self.options.global_section)?;
        section
            .raw(&self.options.environment_key)
            .filter(|value| !value.is_empty())
    }

    fn environment_from_process(&self) -> Option<String> {
        std::env::var(&self.options.environment_key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn try_load(&self, path: &Path) -> ConfigResult<Option<Source>> {
        if !path.is_file() {
            return Ok(None);
        }
        let Some(format) = self.options.format() else {
            warn!(
                extension = %self.options.config_extension,
                "no format is registered for the configured extension"
            );
            return Ok(None);
        };
        Source::from_file(format, path).map(Some)
    }
}
