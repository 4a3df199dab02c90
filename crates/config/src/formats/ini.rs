//! INI text format
//!
//! Section headers in brackets, `key=value` lines, `;` comments. Values
//! keep their surrounding quotes verbatim; the first `=` splits key from
//! value so values may contain further `=` signs.

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::section::Section;
use crate::formats::{Format, push_unique};

/// The INI format adapter.
///
/// By default a `;` anywhere in a line starts a comment, so inline
/// comments after a value are stripped. With `line_comments_only` set,
/// only lines that *start* with `;` are comments and an inline `;` is part
/// of the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ini {
    /// Treat `;` as a comment marker only at the start of a line.
    pub line_comments_only: bool,
}

impl Ini {
    /// Adapter with inline comment stripping (the default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that honors `;` only at the start of a line.
    pub fn with_line_comments_only() -> Self {
        Self {
            line_comments_only: true,
        }
    }
}

impl Format for Ini {
    fn name(&self) -> &'static str {
        "INI"
    }

    fn parse(&self, text: &str) -> ConfigResult<Vec<Section>> {
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<Section> = None;

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    return Err(ConfigError::format_at(
                        line_number,
                        "section header is missing its closing bracket",
                    ));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::format_at(line_number, "empty section name"));
                }
                let section = Section::new(name)?;
                push_unique(&mut sections, section.clone(), Some(line_number))?;
                current = Some(section);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::format_at(
                    line_number,
                    format!("expected `key=value` but found `{line}`"),
                ));
            };
            let Some(section) = &current else {
                return Err(ConfigError::format_at(
                    line_number,
                    "setting appears before any section header",
                ));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::format_at(line_number, "empty setting key"));
            }
            let mut value = value.trim();
            if !self.line_comments_only {
                if let Some(comment) = value.find(';') {
                    value = value[..comment].trim_end();
                }
            }
            section.set(key, value)?;
        }

        Ok(sections)
    }

    fn to_serialized_form(&self, sections: &[Section]) -> String {
        let mut out = String::new();
        for (index, section) in sections.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(section.name());
            out.push_str("]\n");
            for (key, value) in section.iter() {
                out.push_str(&key);
                out.push('=');
                out.push_str(&value);
                out.push('\n');
            }
        }
        out
    }
}
