//! Named sections of string key/value settings
//!
//! A [`Section`] is an insertion-ordered mapping from string keys to string
//! values with a fixed name. All settings are stored as strings until
//! requested; typed access goes through the [`crate::convert`] traits.
//!
//! Sections are cheap-to-clone shared handles: a section obtained from a
//! [`crate::Source`] aliases the source's own section, so mutations are
//! visible everywhere the handle travels. The handles are deliberately
//! single-threaded (`!Send`); callers sharing them across threads must
//! serialize access externally.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::convert::{FromSetting, ToSetting};
use crate::core::error::{ConfigError, ConfigResult};

/// Callback invoked after an entry changes, with the section name and the
/// key that was set. Auto-saving sources register one of these per section;
/// application code can register its own to watch for changes.
pub type ChangeObserver = Rc<dyn Fn(&str, &str) -> ConfigResult<()>>;

/// Identifier returned by [`Section::subscribe`], used to unsubscribe.
pub type ObserverId = u64;

struct SectionInner {
    entries: IndexMap<String, String>,
    observers: Vec<(ObserverId, ChangeObserver)>,
    next_observer: ObserverId,
}

/// A named, ordered set of string key/value settings.
#[derive(Clone)]
pub struct Section {
    name: Rc<str>,
    inner: Rc<RefCell<SectionInner>>,
}

impl Section {
    /// Create an empty section. Fails with
    /// [`ConfigError::InvalidArgument`] if the name is empty.
    pub fn new(name: impl Into<String>) -> ConfigResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::invalid_argument(
                "section name must not be empty",
            ));
        }
        Ok(Self {
            name: Rc::from(name.as_str()),
            inner: Rc::new(RefCell::new(SectionInner {
                entries: IndexMap::new(),
                observers: Vec::new(),
                next_observer: 0,
            })),
        })
    }

    /// The immutable name of this section.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed read. Returns the type's default value when the key is absent;
    /// a present value that cannot be converted fails with
    /// [`ConfigError::Conversion`].
    pub fn get<T>(&self, key: &str) -> ConfigResult<T>
    where
        T: FromSetting + Default,
    {
        match self.raw(key) {
            Some(raw) => T::from_setting(&raw),
            None => Ok(T::default()),
        }
    }

    /// Typed read with an explicit fallback for absent keys.
    pub fn get_or<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromSetting,
    {
        match self.raw(key) {
            Some(raw) => T::from_setting(&raw),
            None => Ok(default),
        }
    }

    /// Typed read that distinguishes absence from presence: `Ok(None)` when
    /// the key does not exist.
    pub fn try_get<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromSetting,
    {
        self.raw(key).map(|raw| T::from_setting(&raw)).transpose()
    }

    /// The stored string form of a setting, if present.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().entries.get(key).cloned()
    }

    /// Whether the section contains the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    /// Store a setting as its canonical string form, overwriting any
    /// existing value, then notify observers.
    ///
    /// The entry is updated before observers run: an observer error (for
    /// example auto-save on a source whose driver cannot save) propagates,
    /// but the new value is already in place.
    pub fn set<T>(&self, key: impl Into<String>, value: T) -> ConfigResult<()>
    where
        T: ToSetting,
    {
        let key = key.into();
        let raw = value.to_setting();
        self.inner.borrow_mut().entries.insert(key.clone(), raw);
        self.notify(&key)
    }

    /// Remove a setting. Returns `true` iff the key existed.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.borrow_mut().entries.shift_remove(key).is_some()
    }

    /// Number of entries in the section.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether the section holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    /// Ordered iteration over a snapshot of the entries. Restartable and
    /// finite; mutations made while iterating are not reflected.
    pub fn iter(&self) -> impl Iterator<Item = (String, String)> {
        self.entries().into_iter()
    }

    /// Register an observer called after every [`Section::set`].
    pub fn subscribe(&self, observer: impl Fn(&str, &str) -> ConfigResult<()> + 'static) -> ObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer;
        inner.next_observer += 1;
        inner.observers.push((id, Rc::new(observer)));
        id
    }

    /// Remove a previously registered observer. Returns `true` iff it was
    /// still registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.observers.len();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
        inner.observers.len() != before
    }

    /// Write a raw value without notifying observers. Used by the variable
    /// expander so expansion does not trigger auto-save storms.
    pub(crate) fn set_raw(&self, key: &str, value: String) {
        self.inner
            .borrow_mut()
            .entries
            .insert(key.to_string(), value);
    }

    /// Drop every entry, keeping observers registered.
    pub(crate) fn clear_entries(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    /// Identity comparison: do the two handles alias the same section?
    pub(crate) fn same_section(&self, other: &Section) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self, key: &str) -> ConfigResult<()> {
        // Snapshot the observer list so callbacks run without a borrow held,
        // letting them read this section (e.g. to serialize it).
        let observers: Vec<ChangeObserver> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(&self.name, key)?;
        }
        Ok(())
    }
}

/// Structural equality: same name and same key/value pairs, regardless of
/// insertion order. Observers do not participate.
impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        self.inner.borrow().entries == other.inner.borrow().entries
    }
}

impl Eq for Section {}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("name", &self.name)
            .field("entries", &self.inner.borrow().entries)
            .finish()
    }
}
