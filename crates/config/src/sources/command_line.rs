//! Command-line argument source
//!
//! Arguments become settings only for the switches registered through
//! [`CommandLineSource::add_switch`]. A switch matches arguments of the
//! forms `/name`, `-name`, `--name`, each optionally followed by `:value`
//! or `=value`; a bare switch stores `"true"`. Matching is
//! case-insensitive and the last occurrence wins.

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::source::Source;

/// Driver turning process arguments into sections, switch by switch.
pub struct CommandLineSource {
    args: Vec<String>,
    source: Source,
}

impl CommandLineSource {
    /// Capture the given argument list (typically `std::env::args().skip(1)`).
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            source: Source::in_memory(),
        }
    }

    /// Register switches under a section: every argument matching one of
    /// them is stored in that section under the switch's bare name.
    pub fn add_switch(&mut self, section_name: &str, switches: &[&str]) -> ConfigResult<()> {
        if switches.is_empty() {
            return Err(ConfigError::invalid_argument(
                "at least one switch name is required",
            ));
        }
        let section = self.source.section(section_name)?;
        for switch in switches {
            let wanted = bare_name(switch);
            if wanted.is_empty() {
                return Err(ConfigError::invalid_argument(format!(
                    "switch name `{switch}` is empty after stripping prefixes"
                )));
            }
            for arg in &self.args {
                let stripped = bare_name(arg);
                let (name, value) = match stripped.split_once([':', '=']) {
                    Some((name, value)) => (name, Some(value)),
                    None => (stripped, None),
                };
                if name.eq_ignore_ascii_case(wanted) {
                    section.set(wanted, value.unwrap_or("true"))?;
                }
            }
        }
        Ok(())
    }

    /// The aggregate the registered switches were parsed into.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Consume the driver, keeping only the aggregate.
    pub fn into_source(self) -> Source {
        self.source
    }
}

/// Strip the `-`/`/` prefix from a switch or argument.
fn bare_name(text: &str) -> &str {
    text.trim().trim_start_matches(['-', '/'])
}
