//! File-backed sources
//!
//! A file source pairs a [`Format`] with an optional file path. It has two
//! states: *unbound* (no path; save fails, reload is a no-op) and *bound*
//! (path set; both operations active). Binding happens at construction via
//! [`Source::from_file`] or later through [`Source::bind_path`]; there is
//! no transition back to unbound.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::section::Section;
use crate::core::source::{Driver, Source};
use crate::crypto::{self, Security};
use crate::formats::Format;

/// Driver persisting sections to a text file through a [`Format`].
pub struct FileDriver {
    format: Box<dyn Format>,
    path: Option<PathBuf>,
}

impl FileDriver {
    /// An unbound driver for the given format.
    pub fn new(format: impl Format + 'static) -> Self {
        Self {
            format: Box::new(format),
            path: None,
        }
    }

    /// A driver bound to a path from the start.
    pub fn bound(format: impl Format + 'static, path: impl Into<PathBuf>) -> Self {
        Self {
            format: Box::new(format),
            path: Some(path.into()),
        }
    }
}

impl Driver for FileDriver {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn save(&mut self, sections: &[Section], security: &Security) -> ConfigResult<()> {
        let Some(path) = self.path.clone() else {
            return Err(ConfigError::configuration(
                "no file path bound; bind a path before saving",
            ));
        };
        let mut text = self.format.to_serialized_form(sections);
        if security.encrypt {
            text = crypto::encrypt(&text, &security.key)?;
        }
        // Truncate-then-write; fs::write creates the file if needed.
        fs::write(&path, text).map_err(|err| ConfigError::file_write(&path, err.to_string()))?;
        debug!(path = %path.display(), sections = sections.len(), "saved configuration");
        Ok(())
    }

    fn reload(&mut self, security: &Security) -> ConfigResult<Option<Vec<Section>>> {
        let Some(path) = self.path.clone() else {
            return Ok(None);
        };
        let mut text =
            fs::read_to_string(&path).map_err(|err| ConfigError::file_read(&path, err.to_string()))?;
        if security.encrypt {
            text = crypto::decrypt(&text, &security.key)?;
        }
        let sections = self.format.parse(&text)?;
        debug!(path = %path.display(), sections = sections.len(), "reloaded configuration");
        Ok(Some(sections))
    }

    fn to_serialized_form(&self, sections: &[Section]) -> ConfigResult<String> {
        Ok(self.format.to_serialized_form(sections))
    }

    fn bind(&mut self, path: PathBuf) -> ConfigResult<()> {
        self.path = Some(path);
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Source {
    /// Build an unbound file source from already-serialized text.
    pub fn from_text(format: impl Format + 'static, text: &str) -> ConfigResult<Source> {
        let sections = format.parse(text)?;
        let source = Source::with_driver(Box::new(FileDriver::new(format)));
        for section in &sections {
            source.add(section)?;
        }
        Ok(source)
    }

    /// Build a bound file source by loading the given file.
    pub fn from_file(
        format: impl Format + 'static,
        path: impl Into<PathBuf>,
    ) -> ConfigResult<Source> {
        let path = path.into();
        let text = fs::read_to_string(&path)
            .map_err(|err| ConfigError::file_read(&path, err.to_string()))?;
        let sections = format.parse(&text)?;
        let source = Source::with_driver(Box::new(FileDriver::bound(format, path)));
        for section in &sections {
            source.add(section)?;
        }
        Ok(source)
    }

    /// Build a bound file source by loading and decrypting the given file.
    /// The source keeps encryption enabled, so a later save re-encrypts
    /// with the same key.
    pub fn from_encrypted_file(
        format: impl Format + 'static,
        path: impl Into<PathBuf>,
        key: impl Into<String>,
    ) -> ConfigResult<Source> {
        let path = path.into();
        let key = key.into();
        let cipher_text = fs::read_to_string(&path)
            .map_err(|err| ConfigError::file_read(&path, err.to_string()))?;
        let text = crypto::decrypt(&cipher_text, &key)?;
        let sections = format.parse(&text)?;
        let source = Source::with_driver(Box::new(FileDriver::bound(format, path)));
        source.set_encrypt(true);
        source.set_encryption_key(key);
        for section in &sections {
            source.add(section)?;
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{DotNetConfig, Ini, Xml};

    const SAMPLE: &str = "[owner]\nname=John Doe\n\n[database]\nport=143\n";

    fn temp_path(dir: &tempfile::TempDir, file: &str) -> PathBuf {
        dir.path().join(file)
    }

    #[test]
    fn saving_without_a_path_fails() {
        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        let err = source.save().unwrap_err();
        assert!(matches!(err, ConfigError::Configuration { .. }));
    }

    #[test]
    fn reload_without_a_path_is_a_no_op() {
        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.reload().unwrap();
        assert_eq!(source.section_count(), 2);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "roundtrip.ini");

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.bind_path(&path).unwrap();
        source.save().unwrap();

        let from_file = Source::from_file(Ini::new(), &path).unwrap();
        assert_eq!(
            source.to_serialized_form().unwrap(),
            from_file.to_serialized_form().unwrap()
        );
    }

    #[test]
    fn reload_discards_local_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "reload.ini");
        fs::write(&path, SAMPLE).unwrap();

        let source = Source::from_file(Ini::new(), &path).unwrap();
        source
            .find_section("owner")
            .unwrap()
            .set("name", "changed")
            .unwrap();
        source.reload().unwrap();
        assert_eq!(
            source.find_section("owner").unwrap().raw("name").unwrap(),
            "John Doe"
        );
    }

    #[test]
    fn auto_save_writes_through_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "autosave.ini");

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.bind_path(&path).unwrap();
        source.set_auto_save(true);
        source
            .find_section("owner")
            .unwrap()
            .set("name", "Jane Doe")
            .unwrap();

        let reloaded = Source::from_file(Ini::new(), &path).unwrap();
        assert_eq!(
            reloaded.find_section("owner").unwrap().raw("name").unwrap(),
            "Jane Doe"
        );
    }

    #[test]
    fn encrypted_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "secret.ini");
        let key = "a real key";

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.bind_path(&path).unwrap();
        source.set_encrypt(true);
        source.set_encryption_key(key);
        source.save().unwrap();

        // The stored bytes are not the plain serialization.
        let stored = fs::read_to_string(&path).unwrap();
        assert!(!stored.contains("John Doe"));

        let loaded = Source::from_encrypted_file(Ini::new(), &path, key).unwrap();
        assert_eq!(
            loaded.find_section("owner").unwrap().raw("name").unwrap(),
            "John Doe"
        );
    }

    #[test]
    fn decrypting_with_the_wrong_key_yields_an_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "secret.ini");

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.bind_path(&path).unwrap();
        source.set_encrypt(true);
        source.set_encryption_key("a real key");
        source.save().unwrap();

        let loaded = Source::from_encrypted_file(Ini::new(), &path, "the wrong key").unwrap();
        assert_eq!(loaded.section_count(), 0);
    }

    #[test]
    fn saving_with_the_placeholder_key_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "secret.ini");

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        source.bind_path(&path).unwrap();
        source.set_encrypt(true);
        let err = source.save().unwrap_err();
        assert!(matches!(err, ConfigError::Configuration { .. }));
    }

    #[test]
    fn xml_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "settings.xml");

        let source = Source::from_text(Ini::new(), SAMPLE).unwrap();
        let xml_source = Source::with_driver(Box::new(FileDriver::bound(Xml::new(), &path)));
        for section in source.sections() {
            xml_source.add(&section).unwrap();
        }
        xml_source.save().unwrap();

        let loaded = Source::from_file(Xml::new(), &path).unwrap();
        assert_eq!(
            xml_source.to_serialized_form().unwrap(),
            loaded.to_serialized_form().unwrap()
        );
    }

    #[test]
    fn dotnet_config_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "app.config");

        let source = Source::with_driver(Box::new(FileDriver::bound(DotNetConfig::new(), &path)));
        let section = source.section("Default").unwrap();
        section.set("a", "a").unwrap();
        source.save().unwrap();

        let loaded = Source::from_file(DotNetConfig::new(), &path).unwrap();
        assert_eq!(loaded.find_section("Default").unwrap().raw("a").unwrap(), "a");
    }

    #[test]
    fn missing_file_reports_a_read_error() {
        let err = Source::from_file(Ini::new(), "/nonexistent/nowhere.ini").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
