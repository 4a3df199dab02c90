//! Conversion impl generators for enum-like setting types

/// Implement [`FromSetting`](crate::FromSetting) and
/// [`ToSetting`](crate::ToSetting) for a C-like enum, accepting either the
/// variant name or its underlying integer value, and serializing to the
/// name. List every variant with its discriminant:
///
/// ```rust
/// use strata_config::setting_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// enum Platform {
///     #[default]
///     None,
///     Win2k,
///     WinXp,
/// }
///
/// setting_enum!(Platform { None = 0, Win2k = 1, WinXp = 2 });
/// ```
#[macro_export]
macro_rules! setting_enum {
    ($ty:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl $crate::FromSetting for $ty {
            fn from_setting(raw: &str) -> $crate::ConfigResult<Self> {
                let trimmed = raw.trim();
                if let Ok(number) = trimmed.parse::<i64>() {
                    return match number {
                        $( $value => Ok(<$ty>::$variant), )+
                        other => Err($crate::ConfigError::conversion(
                            raw,
                            stringify!($ty),
                            format!("no variant has value {other}"),
                        )),
                    };
                }
                match trimmed {
                    $( stringify!($variant) => Ok(<$ty>::$variant), )+
                    other => Err($crate::ConfigError::conversion(
                        raw,
                        stringify!($ty),
                        format!("unknown variant `{other}`"),
                    )),
                }
            }
        }

        impl $crate::ToSetting for $ty {
            fn to_setting(&self) -> String {
                match self {
                    $( <$ty>::$variant => stringify!($variant).to_string(), )+
                }
            }
        }
    };
}

/// Implement [`FromSetting`](crate::FromSetting) and
/// [`ToSetting`](crate::ToSetting) for a [`bitflags`] type, accepting a
/// comma-separated flag-name list (`"A, B, C"`) or the combined integer
/// value, and serializing to the name list (or the raw bits when unnamed
/// bits are set):
///
/// ```rust
/// use strata_config::setting_flags;
///
/// bitflags::bitflags! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     struct Options: u32 {
///         const A = 1;
///         const B = 2;
///         const C = 4;
///     }
/// }
///
/// setting_flags!(Options);
/// ```
///
/// [`bitflags`]: https://docs.rs/bitflags
#[macro_export]
macro_rules! setting_flags {
    ($ty:ident) => {
        impl $crate::FromSetting for $ty {
            fn from_setting(raw: &str) -> $crate::ConfigResult<Self> {
                let trimmed = raw.trim();
                if let Ok(bits) = trimmed.parse() {
                    return Ok(<$ty>::from_bits_truncate(bits));
                }
                let mut flags = <$ty>::empty();
                for part in trimmed.split(',') {
                    let name = part.trim();
                    if name.is_empty() {
                        continue;
                    }
                    match <$ty>::from_name(name) {
                        Some(flag) => flags |= flag,
                        None => {
                            return Err($crate::ConfigError::conversion(
                                raw,
                                stringify!($ty),
                                format!("unknown flag `{name}`"),
                            ));
                        }
                    }
                }
                Ok(flags)
            }
        }

        impl $crate::ToSetting for $ty {
            fn to_setting(&self) -> String {
                let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
                if names.is_empty() {
                    self.bits().to_string()
                } else {
                    names.join(", ")
                }
            }
        }
    };
}
