//! Typed conversion between stored strings and setting values
//!
//! Every setting is canonically a string; typed access is a pure function
//! of that string plus the requested type. The closed set of supported
//! conversions lives here as [`FromSetting`] / [`ToSetting`]
//! implementations, selected at compile time by the requested type:
//!
//! - `bool` accepts `true`/`false` case-insensitively, or any integer
//!   string where `0` is false and everything else is true;
//! - all primitive integers and floats, `char`, `String`, `PathBuf`;
//! - `url::Url` and `chrono::DateTime<Utc>` (RFC 3339);
//! - `Vec<String>` as a comma-separated list with backslash escaping, and
//!   `Vec<u8>` as base64 (both encodings are reversible);
//! - C-like enums and bitflags sets via [`setting_enum!`](crate::setting_enum)
//!   and [`setting_flags!`](crate::setting_flags).
//!
//! Custom types plug in by implementing the two traits directly;
//! [`parse_setting`] bridges anything that already implements `FromStr`.

mod macros;

use std::any::type_name;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use url::Url;

use crate::core::error::{ConfigError, ConfigResult};

/// Conversion from the stored string form into a typed value.
pub trait FromSetting: Sized {
    /// Parse the raw stored string. Failures are reported as
    /// [`ConfigError::Conversion`] naming the requested type.
    fn from_setting(raw: &str) -> ConfigResult<Self>;
}

/// Conversion from a typed value into the stored string form.
pub trait ToSetting {
    /// The canonical string form, accepted back by
    /// [`FromSetting::from_setting`].
    fn to_setting(&self) -> String;
}

/// Parse via [`FromStr`], wrapping the failure into a conversion error
/// that names the target type. The building block for custom
/// [`FromSetting`] implementations.
pub fn parse_setting<T>(raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| ConfigError::conversion(raw, type_name::<T>(), err.to_string()))
}

impl FromSetting for String {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        Ok(raw.to_string())
    }
}

impl ToSetting for String {
    fn to_setting(&self) -> String {
        self.clone()
    }
}

impl ToSetting for &str {
    fn to_setting(&self) -> String {
        (*self).to_string()
    }
}

impl FromSetting for bool {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        let trimmed = raw.trim();
        // Integer forms first: 0 is false, any other integer is true.
        if let Ok(number) = trimmed.parse::<i64>() {
            return Ok(number != 0);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Ok(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        Err(ConfigError::conversion(
            raw,
            type_name::<bool>(),
            "expected true, false, or an integer",
        ))
    }
}

impl ToSetting for bool {
    fn to_setting(&self) -> String {
        self.to_string()
    }
}

macro_rules! impl_from_str_settings {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromSetting for $ty {
                fn from_setting(raw: &str) -> ConfigResult<Self> {
                    parse_setting(raw)
                }
            }

            impl ToSetting for $ty {
                fn to_setting(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

impl_from_str_settings!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char,
);

impl FromSetting for PathBuf {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        Ok(PathBuf::from(raw))
    }
}

impl ToSetting for PathBuf {
    fn to_setting(&self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl FromSetting for Url {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        parse_setting(raw)
    }
}

impl ToSetting for Url {
    fn to_setting(&self) -> String {
        self.as_str().to_string()
    }
}

impl FromSetting for DateTime<Utc> {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(|err| {
                ConfigError::conversion(raw, type_name::<DateTime<Utc>>(), err.to_string())
            })
    }
}

impl ToSetting for DateTime<Utc> {
    fn to_setting(&self) -> String {
        self.to_rfc3339()
    }
}

/// String lists are stored comma-separated; commas and backslashes inside
/// items are backslash-escaped so the encoding round-trips.
impl FromSetting for Vec<String> {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        Ok(decode_string_list(raw))
    }
}

impl ToSetting for Vec<String> {
    fn to_setting(&self) -> String {
        encode_string_list(self)
    }
}

impl ToSetting for &[String] {
    fn to_setting(&self) -> String {
        encode_string_list(self)
    }
}

/// Byte arrays are stored as standard base64.
impl FromSetting for Vec<u8> {
    fn from_setting(raw: &str) -> ConfigResult<Self> {
        BASE64
            .decode(raw.trim().as_bytes())
            .map_err(|err| ConfigError::conversion(raw, type_name::<Vec<u8>>(), err.to_string()))
    }
}

impl ToSetting for Vec<u8> {
    fn to_setting(&self) -> String {
        BASE64.encode(self)
    }
}

impl ToSetting for &[u8] {
    fn to_setting(&self) -> String {
        BASE64.encode(self)
    }
}

pub(crate) fn encode_string_list(items: &[String]) -> String {
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        for ch in item.chars() {
            if ch == ',' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
    }
    out
}

pub(crate) fn decode_string_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in raw.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(current);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T>(value: T) -> T
    where
        T: FromSetting + ToSetting,
    {
        T::from_setting(&value.to_setting()).unwrap()
    }

    #[test]
    fn bool_accepts_named_forms_in_any_case() {
        assert!(bool::from_setting("true").unwrap());
        assert!(bool::from_setting("True").unwrap());
        assert!(!bool::from_setting("false").unwrap());
        assert!(!bool::from_setting("FALSE").unwrap());
    }

    #[test]
    fn bool_accepts_integer_forms() {
        assert!(!bool::from_setting("0").unwrap());
        assert!(bool::from_setting("1").unwrap());
        assert!(bool::from_setting("-7").unwrap());
    }

    #[test]
    fn bool_rejects_other_text() {
        assert!(bool::from_setting("yes").is_err());
    }

    #[test]
    fn integers_round_trip() {
        assert_eq!(round_trip(5_i32), 5);
        assert_eq!(round_trip(u64::MAX), u64::MAX);
        assert_eq!(i32::from_setting("5").unwrap(), 5);
    }

    #[test]
    fn integer_conversion_failure_names_the_type() {
        let err = i32::from_setting("five").unwrap_err();
        assert!(err.to_string().contains("i32"));
        assert!(err.to_string().contains("five"));
    }

    #[test]
    fn urls_round_trip() {
        let url = Url::parse("http://mydomain.com/").unwrap();
        assert_eq!(round_trip(url.clone()), url);
        assert_eq!(url.to_setting(), "http://mydomain.com/");
    }

    #[test]
    fn timestamps_round_trip() {
        let now = DateTime::parse_from_rfc3339("2012-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(round_trip(now), now);
    }

    #[test]
    fn byte_arrays_round_trip_through_base64() {
        let data = vec![10_u8, 43, 44, 45, 14, 255];
        assert_eq!(round_trip(data.clone()), data);
        assert!(Vec::<u8>::from_setting("not base64!").is_err());
    }

    #[test]
    fn string_lists_round_trip() {
        let items = vec!["One".to_string(), "Two".to_string(), "Three".to_string()];
        assert_eq!(round_trip(items.clone()), items);
    }

    #[test]
    fn string_lists_escape_commas_and_backslashes() {
        let items = vec!["a,b".to_string(), "c\\d".to_string()];
        let encoded = items.to_setting();
        assert_eq!(encoded, "a\\,b,c\\\\d");
        assert_eq!(Vec::<String>::from_setting(&encoded).unwrap(), items);
    }

    #[test]
    fn empty_string_list_round_trips() {
        let items: Vec<String> = Vec::new();
        assert_eq!(round_trip(items.clone()), items);
    }

    #[test]
    fn paths_pass_through_unchanged() {
        let path = PathBuf::from("/etc/app/settings.ini");
        assert_eq!(round_trip(path.clone()), path);
    }
}
