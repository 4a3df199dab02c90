//! Per-format adapters: parse and serialize section sets
//!
//! Each adapter is a mechanical codec between a text representation and a
//! set of [`Section`]s. The interesting semantics (merging, expansion,
//! auto-save) live in [`crate::core`]; a format only has to honor two
//! rules: parsing aborts on structural errors without returning a partial
//! section set, and serialization is deterministic and order-preserving.

mod dotnet;
mod ini;
mod xml;

pub use dotnet::DotNetConfig;
pub use ini::Ini;
pub use xml::Xml;

use crate::core::error::ConfigResult;
use crate::core::section::Section;

/// A text codec for configuration sections.
pub trait Format {
    /// Short display name of the format.
    fn name(&self) -> &'static str;

    /// Parse serialized text into zero or more sections. Structural errors
    /// fail with [`ConfigError::Format`](crate::ConfigError::Format),
    /// citing a line where the format is line-oriented.
    fn parse(&self, text: &str) -> ConfigResult<Vec<Section>>;

    /// Deterministic serialization of the given sections, preserving
    /// section and key order.
    fn to_serialized_form(&self, sections: &[Section]) -> String;
}

impl<F: Format + ?Sized> Format for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn parse(&self, text: &str) -> ConfigResult<Vec<Section>> {
        (**self).parse(text)
    }

    fn to_serialized_form(&self, sections: &[Section]) -> String {
        (**self).to_serialized_form(sections)
    }
}

/// Reject duplicate section names while collecting parsed sections.
pub(crate) fn push_unique(
    sections: &mut Vec<Section>,
    section: Section,
    line: Option<usize>,
) -> ConfigResult<()> {
    use crate::core::error::ConfigError;

    if sections.iter().any(|existing| existing.name() == section.name()) {
        let message = format!("duplicate section name `{}`", section.name());
        return Err(match line {
            Some(line) => ConfigError::format_at(line, message),
            None => ConfigError::format(message),
        });
    }
    sections.push(section);
    Ok(())
}
