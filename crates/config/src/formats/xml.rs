//! Generic XML section/key-value format
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <configuration>
//!   <section name="Default">
//!     <key name="a" value="a" />
//!   </section>
//! </configuration>
//! ```
//!
//! Reading goes through `quick-xml`; writing builds the document by hand so
//! the serialized form is deterministic byte for byte.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::section::Section;
use crate::formats::{Format, push_unique};

/// The generic XML format adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xml;

impl Xml {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Format for Xml {
    fn name(&self) -> &'static str {
        "XML"
    }

    fn parse(&self, text: &str) -> ConfigResult<Vec<Section>> {
        let mut reader = Reader::from_str(text);
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<Section> = None;

        loop {
            let event = reader.read_event().map_err(|err| {
                ConfigError::format(format!(
                    "XML error at offset {}: {err}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(element) | Event::Empty(element) => {
                    match element.name().as_ref() {
                        b"configuration" => {}
                        b"section" => {
                            let name = required_attribute(&element, "name")?;
                            let section = Section::new(name)
                                .map_err(|_| ConfigError::format("empty section name"))?;
                            push_unique(&mut sections, section.clone(), None)?;
                            current = Some(section);
                        }
                        b"key" => {
                            let Some(section) = &current else {
                                return Err(ConfigError::format(
                                    "<key> element outside of a <section>",
                                ));
                            };
                            let name = required_attribute(&element, "name")?;
                            let value = attribute(&element, "value")?.unwrap_or_default();
                            if name.is_empty() {
                                return Err(ConfigError::format("empty key name"));
                            }
                            section.set(name, value)?;
                        }
                        _ => {
                            // Unknown elements are tolerated and skipped.
                        }
                    }
                }
                Event::End(element) => {
                    if element.name().as_ref() == b"section" {
                        current = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(sections)
    }

    fn to_serialized_form(&self, sections: &[Section]) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n");
        for section in sections {
            out.push_str("  <section name=\"");
            out.push_str(&escape_xml(section.name()));
            out.push_str("\">\n");
            for (key, value) in section.iter() {
                out.push_str("    <key name=\"");
                out.push_str(&escape_xml(&key));
                out.push_str("\" value=\"");
                out.push_str(&escape_xml(&value));
                out.push_str("\" />\n");
            }
            out.push_str("  </section>\n");
        }
        out.push_str("</configuration>\n");
        out
    }
}

/// Fetch an attribute's unescaped value.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> ConfigResult<Option<String>> {
    let attribute = element
        .try_get_attribute(name)
        .map_err(|err| ConfigError::format(format!("bad attribute: {err}")))?;
    match attribute {
        Some(attribute) => {
            let value = attribute
                .unescape_value()
                .map_err(|err| ConfigError::format(format!("bad attribute value: {err}")))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Fetch an attribute that must be present and non-empty.
pub(crate) fn required_attribute(element: &BytesStart<'_>, name: &str) -> ConfigResult<String> {
    match attribute(element, name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::format(format!(
            "<{}> element is missing a non-empty `{name}` attribute",
            String::from_utf8_lossy(element.name().as_ref()),
        ))),
    }
}

/// Minimal XML text/attribute escaping for serialization.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
