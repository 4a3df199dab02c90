//! .NET-style XML configuration format
//!
//! The `app.config` shape: sections are declared up front in
//! `<configSections>`, then each section is a top-level element holding
//! `<add key="..." value="..."/>` entries.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <configuration>
//!   <configSections>
//!     <section name="Default" type="System.Configuration.NameValueSectionHandler" />
//!   </configSections>
//!   <Default>
//!     <add key="a" value="a" />
//!   </Default>
//! </configuration>
//! ```
//!
//! The declaration block is what preserves empty sections and section
//! order; the `type` attribute is emitted for compatibility and ignored on
//! read. Section names must be valid XML element names, which this format
//! inherits from its .NET ancestry.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::section::Section;
use crate::formats::xml::{attribute, escape_xml, required_attribute};
use crate::formats::{Format, push_unique};

const SECTION_HANDLER: &str = "System.Configuration.NameValueSectionHandler";

/// The .NET-config format adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotNetConfig;

impl DotNetConfig {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Format for DotNetConfig {
    fn name(&self) -> &'static str {
        ".NET config"
    }

    fn parse(&self, text: &str) -> ConfigResult<Vec<Section>> {
        let mut reader = Reader::from_str(text);
        let mut sections: Vec<Section> = Vec::new();
        let mut in_declarations = false;
        let mut depth = 0usize;
        let mut current: Option<Section> = None;

        loop {
            let event = reader.read_event().map_err(|err| {
                ConfigError::format(format!(
                    "XML error at offset {}: {err}",
                    reader.buffer_position()
                ))
            })?;
            let (element, empty) = match event {
                Event::Start(element) => (element, false),
                Event::Empty(element) => (element, true),
                Event::End(element) => {
                    depth = depth.saturating_sub(1);
                    if element.name().as_ref() == b"configSections" {
                        in_declarations = false;
                    } else if depth == 1 {
                        current = None;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
            match (depth, tag.as_str()) {
                (0, "configuration") => {}
                (0, other) => {
                    return Err(ConfigError::format(format!(
                        "expected <configuration> root, found <{other}>"
                    )));
                }
                (1, "configSections") => in_declarations = !empty,
                (2, "section") if in_declarations => {
                    let name = required_attribute(&element, "name")?;
                    push_unique(&mut sections, Section::new(name)?, None)?;
                }
                (1, name) => {
                    // A section element. It may or may not have been
                    // declared; undeclared ones are created here.
                    let section = match sections.iter().find(|s| s.name() == name) {
                        Some(existing) => existing.clone(),
                        None => {
                            let section = Section::new(name)?;
                            push_unique(&mut sections, section.clone(), None)?;
                            section
                        }
                    };
                    if !empty {
                        current = Some(section);
                    }
                }
                (2, "add") => {
                    let Some(section) = &current else {
                        return Err(ConfigError::format("<add> element outside of a section"));
                    };
                    let key = required_attribute(&element, "key")?;
                    let value = attribute(&element, "value")?.unwrap_or_default();
                    section.set(key, value)?;
                }
                _ => {}
            }
            if !empty {
                depth += 1;
            }
        }

        Ok(sections)
    }

    fn to_serialized_form(&self, sections: &[Section]) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n");
        out.push_str("  <configSections>\n");
        for section in sections {
            out.push_str("    <section name=\"");
            out.push_str(&escape_xml(section.name()));
            out.push_str("\" type=\"");
            out.push_str(SECTION_HANDLER);
            out.push_str("\" />\n");
        }
        out.push_str("  </configSections>\n");
        for section in sections {
            out.push_str("  <");
            out.push_str(section.name());
            out.push_str(">\n");
            for (key, value) in section.iter() {
                out.push_str("    <add key=\"");
                out.push_str(&escape_xml(&key));
                out.push_str("\" value=\"");
                out.push_str(&escape_xml(&value));
                out.push_str("\" />\n");
            }
            out.push_str("  </");
            out.push_str(section.name());
            out.push_str(">\n");
        }
        out.push_str("</configuration>\n");
        out
    }
}
