//! Windows registry source
//!
//! Loads a registry key hierarchy into sections: the key's own values form
//! a section named after the key's last path component, and every subkey
//! (recursively) forms a section named by its backslash-joined relative
//! path. Value kinds map onto the canonical string encodings: strings
//! pass through (expandable strings are environment-expanded on read, as
//! the platform does), multi-strings use the string-list encoding, binary
//! data uses base64, and DWORD/QWORD become integer strings. Saving writes
//! each value back with the kind it was loaded with; new values default to
//! plain strings.

use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use tracing::debug;
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
    KEY_READ, REG_BINARY, REG_DWORD, REG_EXPAND_SZ, REG_MULTI_SZ, REG_QWORD, REG_SZ,
};
use winreg::{RegKey, RegValue};

use crate::convert::{decode_string_list, encode_string_list};
use crate::core::error::{ConfigError, ConfigResult};
use crate::core::section::Section;
use crate::core::source::{Driver, Source};
use crate::crypto::Security;

/// Hive-qualified registry path, e.g.
/// `HKEY_LOCAL_MACHINE\SOFTWARE\Vendor\App`.
#[derive(Debug, Clone)]
struct KeyPath {
    hive: &'static str,
    subkey: String,
}

impl KeyPath {
    fn parse(path: &str) -> ConfigResult<Self> {
        let (hive_name, subkey) = match path.split_once('\\') {
            Some((hive, rest)) => (hive, rest.to_string()),
            None => (path, String::new()),
        };
        let hive = match hive_name.to_ascii_uppercase().as_str() {
            "HKEY_CLASSES_ROOT" | "HKCR" => "HKEY_CLASSES_ROOT",
            "HKEY_CURRENT_USER" | "HKCU" => "HKEY_CURRENT_USER",
            "HKEY_LOCAL_MACHINE" | "HKLM" => "HKEY_LOCAL_MACHINE",
            "HKEY_USERS" | "HKU" => "HKEY_USERS",
            "HKEY_CURRENT_CONFIG" | "HKCC" => "HKEY_CURRENT_CONFIG",
            other => {
                return Err(ConfigError::invalid_argument(format!(
                    "unknown registry hive `{other}`"
                )));
            }
        };
        if subkey.is_empty() {
            return Err(ConfigError::invalid_argument(
                "registry path must name a key below the hive",
            ));
        }
        Ok(Self { hive, subkey })
    }

    fn hive_key(&self) -> RegKey {
        let hive = match self.hive {
            "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
            "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
            "HKEY_USERS" => HKEY_USERS,
            "HKEY_CURRENT_CONFIG" => HKEY_CURRENT_CONFIG,
            _ => HKEY_LOCAL_MACHINE,
        };
        RegKey::predef(hive)
    }

    /// Name of the section holding the root key's own values.
    fn root_section(&self) -> &str {
        self.subkey.rsplit('\\').next().unwrap_or(&self.subkey)
    }
}

/// Remembered value kind per (section, key), so saves preserve kinds.
type KindMap = IndexMap<(String, String), winreg::enums::RegType>;

/// Driver persisting sections to a registry key hierarchy.
pub struct RegistryDriver {
    path: KeyPath,
    kinds: KindMap,
}

/// Registry-backed configuration sources.
pub struct RegistrySource;

impl RegistrySource {
    /// Open (creating if necessary) the given hive-qualified key and load
    /// its hierarchy into a [`Source`].
    pub fn open(path: &str) -> ConfigResult<Source> {
        let driver = RegistryDriver {
            path: KeyPath::parse(path)?,
            kinds: KindMap::new(),
        };
        let source = Source::with_driver(Box::new(driver));
        source.reload()?;
        Ok(source)
    }
}

impl Driver for RegistryDriver {
    fn kind(&self) -> &'static str {
        "registry"
    }

    fn save(&mut self, sections: &[Section], _security: &Security) -> ConfigResult<()> {
        let hive = self.path.hive_key();
        let (root, _) = hive
            .create_subkey(&self.path.subkey)
            .map_err(|err| registry_error(&self.path.subkey, &err))?;
        let root_section = self.path.root_section().to_string();
        for section in sections {
            if section.name() == root_section {
                write_section(&root, section, &self.kinds)?;
            } else {
                let (key, _) = root
                    .create_subkey(section.name())
                    .map_err(|err| registry_error(section.name(), &err))?;
                write_section(&key, section, &self.kinds)?;
            }
        }
        debug!(path = %self.path.subkey, sections = sections.len(), "saved registry configuration");
        Ok(())
    }

    fn reload(&mut self, _security: &Security) -> ConfigResult<Option<Vec<Section>>> {
        let hive = self.path.hive_key();
        let (root, _) = hive
            .create_subkey(&self.path.subkey)
            .map_err(|err| registry_error(&self.path.subkey, &err))?;
        self.kinds.clear();
        let mut sections = Vec::new();
        walk(&root, None, self.path.root_section(), &mut sections, &mut self.kinds)?;
        Ok(Some(sections))
    }

    fn path(&self) -> Option<&std::path::Path> {
        None
    }

    fn bind(&mut self, _path: PathBuf) -> ConfigResult<()> {
        Err(ConfigError::unsupported(
            "registry sources are bound at construction",
        ))
    }
}

fn write_section(key: &RegKey, section: &Section, kinds: &KindMap) -> ConfigResult<()> {
    for (name, value) in section.iter() {
        let kind = kinds
            .get(&(section.name().to_string(), name.clone()))
            .cloned()
            .unwrap_or(REG_SZ);
        let raw = encode_value(&value, kind)?;
        key.set_raw_value(&name, &raw)
            .map_err(|err| registry_error(&name, &err))?;
    }
    Ok(())
}

/// Depth-first, subkeys before the key itself, so nested sections appear
/// ahead of their parents and the root section comes last.
fn walk(
    key: &RegKey,
    prefix: Option<&str>,
    section_name: &str,
    sections: &mut Vec<Section>,
    kinds: &mut KindMap,
) -> ConfigResult<()> {
    let child_names: Vec<String> = key.enum_keys().filter_map(Result::ok).collect();
    for child_name in child_names {
        let child = key
            .open_subkey_with_flags(&child_name, KEY_READ)
            .map_err(|err| registry_error(&child_name, &err))?;
        let child_section = match prefix {
            Some(prefix) => format!("{prefix}\\{child_name}"),
            None => child_name.clone(),
        };
        walk(&child, Some(&child_section), &child_section, sections, kinds)?;
    }

    let section = Section::new(section_name)?;
    for entry in key.enum_values() {
        let (name, value) = entry.map_err(|err| registry_error(section_name, &err))?;
        kinds.insert((section_name.to_string(), name.clone()), value.vtype);
        section.set(name, decode_value(&value)?)?;
    }
    sections.push(section);
    Ok(())
}

/// Decode a registry value into the canonical string form.
fn decode_value(value: &RegValue) -> ConfigResult<String> {
    match value.vtype {
        REG_SZ => utf16_string(&value.bytes),
        REG_EXPAND_SZ => Ok(expand_env(&utf16_string(&value.bytes)?)),
        REG_MULTI_SZ => {
            let joined = utf16_string(&value.bytes)?;
            let items: Vec<String> = joined
                .split('\0')
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect();
            Ok(encode_string_list(&items))
        }
        REG_DWORD => {
            let bytes: [u8; 4] = value.bytes.as_slice().try_into().map_err(|_| {
                ConfigError::format("REG_DWORD value is not 4 bytes long")
            })?;
            Ok(u32::from_le_bytes(bytes).to_string())
        }
        REG_QWORD => {
            let bytes: [u8; 8] = value.bytes.as_slice().try_into().map_err(|_| {
                ConfigError::format("REG_QWORD value is not 8 bytes long")
            })?;
            Ok(u64::from_le_bytes(bytes).to_string())
        }
        REG_BINARY => Ok(BASE64.encode(&value.bytes)),
        _ => Ok(BASE64.encode(&value.bytes)),
    }
}

/// Encode a canonical string back into a registry value of the given kind.
fn encode_value(value: &str, kind: winreg::enums::RegType) -> ConfigResult<RegValue> {
    let bytes = match kind {
        REG_SZ | REG_EXPAND_SZ => utf16_bytes(value),
        REG_MULTI_SZ => {
            let mut joined = String::new();
            for item in decode_string_list(value) {
                joined.push_str(&item);
                joined.push('\0');
            }
            utf16_bytes(&joined)
        }
        REG_DWORD => {
            let number: u32 = value.trim().parse().map_err(|_| {
                ConfigError::conversion(value, "REG_DWORD", "expected an unsigned 32-bit integer")
            })?;
            number.to_le_bytes().to_vec()
        }
        REG_QWORD => {
            let number: u64 = value.trim().parse().map_err(|_| {
                ConfigError::conversion(value, "REG_QWORD", "expected an unsigned 64-bit integer")
            })?;
            number.to_le_bytes().to_vec()
        }
        _ => BASE64
            .decode(value.trim().as_bytes())
            .map_err(|err| ConfigError::conversion(value, "REG_BINARY", err.to_string()))?,
    };
    Ok(RegValue { bytes, vtype: kind })
}

fn utf16_string(bytes: &[u8]) -> ConfigResult<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let trimmed: Vec<u16> = units
        .iter()
        .copied()
        .rev()
        .skip_while(|unit| *unit == 0)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    String::from_utf16(&trimmed)
        .map_err(|err| ConfigError::format(format!("invalid UTF-16 in registry value: {err}")))
}

fn utf16_bytes(text: &str) -> Vec<u8> {
    let mut out: Vec<u8> = text
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    out.extend_from_slice(&[0, 0]);
    out
}

/// Expand `%NAME%` environment references the way the platform expands
/// REG_EXPAND_SZ values; unknown names are left intact.
fn expand_env(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn registry_error(context: &str, err: &std::io::Error) -> ConfigError {
    ConfigError::file_read(context, err.to_string())
}
