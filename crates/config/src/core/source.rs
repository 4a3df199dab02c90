//! Configuration sources: the merge-and-expand engine
//!
//! A [`Source`] owns a set of named [`Section`]s, remembers which other
//! sources were merged into it, and delegates persistence to a [`Driver`].
//! Like sections, sources are cheap-to-clone shared handles with
//! single-threaded interior state; callers sharing one across threads must
//! serialize access externally.
//!
//! Merge semantics are deliberately order-sensitive: `add` lets incoming
//! entries win over existing ones, so later merges win and merging is not
//! commutative for conflicting keys. Environment-specific overrides layered
//! over defaults depend on exactly this.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::expand;
use crate::core::section::{ObserverId, Section};
use crate::crypto::Security;

/// Storage backend contract for a [`Source`].
///
/// A driver persists the current section set and produces a fresh one on
/// reload. File-backed drivers also expose the unbound→bound path state
/// machine; in-memory drivers simply report the operations as unsupported.
pub trait Driver {
    /// Short name of the backing medium, used in log lines and errors.
    fn kind(&self) -> &'static str;

    /// Persist the given section set.
    fn save(&mut self, sections: &[Section], security: &Security) -> ConfigResult<()>;

    /// Produce a fresh section set from the backing medium. `Ok(None)`
    /// means the driver has nothing bound to load from and the reload is a
    /// no-op.
    fn reload(&mut self, security: &Security) -> ConfigResult<Option<Vec<Section>>>;

    /// Deterministic serialized form of the given section set, when the
    /// driver has a textual representation.
    fn to_serialized_form(&self, sections: &[Section]) -> ConfigResult<String> {
        let _ = sections;
        Err(ConfigError::unsupported(format!(
            "{} sources have no serialized form",
            self.kind()
        )))
    }

    /// Bind the driver to a path. Only meaningful for file-backed drivers.
    fn bind(&mut self, path: PathBuf) -> ConfigResult<()> {
        let _ = path;
        Err(ConfigError::unsupported(format!(
            "{} sources cannot be bound to a path",
            self.kind()
        )))
    }

    /// The bound path, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// The in-memory driver: an aggregate with no backing store. Saving and
/// reloading are unsupported, which also makes it the standard test double
/// for auto-save behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDriver;

impl Driver for MemoryDriver {
    fn kind(&self) -> &'static str {
        "in-memory"
    }

    fn save(&mut self, _sections: &[Section], _security: &Security) -> ConfigResult<()> {
        Err(ConfigError::unsupported("save on an in-memory source"))
    }

    fn reload(&mut self, _security: &Security) -> ConfigResult<Option<Vec<Section>>> {
        Err(ConfigError::unsupported("reload on an in-memory source"))
    }
}

struct SourceInner {
    sections: IndexMap<String, Section>,
    merged: Vec<Source>,
    auto_save: bool,
    security: Security,
    driver: Box<dyn Driver>,
    /// Observer registrations this source holds on its sections, so clear
    /// can detach them.
    subscriptions: Vec<(Section, ObserverId)>,
}

/// An aggregate of named sections, possibly built by merging other sources,
/// persisted through a [`Driver`].
#[derive(Clone)]
pub struct Source {
    inner: Rc<RefCell<SourceInner>>,
}

impl Source {
    /// Create a source with no backing store.
    pub fn in_memory() -> Self {
        Self::with_driver(Box::new(MemoryDriver))
    }

    /// Create a source over an arbitrary driver.
    pub fn with_driver(driver: Box<dyn Driver>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SourceInner {
                sections: IndexMap::new(),
                merged: Vec::new(),
                auto_save: false,
                security: Security::default(),
                driver,
                subscriptions: Vec::new(),
            })),
        }
    }

    // ── sections ───────────────────────────────────────────────────────

    /// Look up a section by name, creating an empty one if it does not
    /// exist yet. Fails only when a section would have to be created with
    /// an invalid (empty) name.
    pub fn section(&self, name: &str) -> ConfigResult<Section> {
        if let Some(existing) = self.inner.borrow().sections.get(name) {
            return Ok(existing.clone());
        }
        let section = Section::new(name)?;
        self.add(&section)?;
        Ok(section)
    }

    /// Look up a section by name without creating it.
    pub fn find_section(&self, name: &str) -> Option<Section> {
        self.inner.borrow().sections.get(name).cloned()
    }

    /// Whether a section with the given name exists.
    pub fn contains_section(&self, name: &str) -> bool {
        self.inner.borrow().sections.contains_key(name)
    }

    /// Snapshot of the sections in insertion order.
    pub fn sections(&self) -> Vec<Section> {
        self.inner.borrow().sections.values().cloned().collect()
    }

    /// Snapshot of the section names in insertion order.
    pub fn section_names(&self) -> Vec<String> {
        self.inner.borrow().sections.keys().cloned().collect()
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.inner.borrow().sections.len()
    }

    /// Add a section to this source.
    ///
    /// If no section with that name exists the handle is taken in as-is
    /// (the source and the caller then alias the same section). If one
    /// exists, the incoming entries are merged into it and incoming values
    /// win on conflict; keys only present in the existing section are
    /// preserved. The merge path goes through [`Section::set`], so
    /// auto-save fires per overwritten key and its errors propagate.
    pub fn add(&self, section: &Section) -> ConfigResult<()> {
        let existing = self.find_section(section.name());
        match existing {
            None => {
                self.watch_for_auto_save(section);
                self.inner
                    .borrow_mut()
                    .sections
                    .insert(section.name().to_string(), section.clone());
                Ok(())
            }
            Some(current) => {
                if current.same_section(section) {
                    return Ok(());
                }
                for (key, value) in section.entries() {
                    current.set(key, value)?;
                }
                Ok(())
            }
        }
    }

    // ── merging ────────────────────────────────────────────────────────

    /// Merge the given sources into this one, in order.
    ///
    /// Every section of every child is `add`ed, so child values win over
    /// existing values for identical keys and later children win over
    /// earlier ones. Each child is tracked for cascading [`Source::clear`]
    /// unless it is already tracked (compared by handle identity); the
    /// section merge itself runs every time, so re-merging a child
    /// re-applies whatever its sections currently contain.
    pub fn merge(&self, sources: &[Source]) -> ConfigResult<()> {
        for child in sources {
            if Rc::ptr_eq(&self.inner, &child.inner) {
                // Merging a source into itself is a no-op.
                continue;
            }
            debug!(
                sections = child.section_count(),
                "merging configuration source"
            );
            for section in child.sections() {
                self.add(&section)?;
            }
            let mut inner = self.inner.borrow_mut();
            let tracked = inner
                .merged
                .iter()
                .any(|existing| Rc::ptr_eq(&existing.inner, &child.inner));
            if !tracked {
                inner.merged.push(child.clone());
            }
        }
        Ok(())
    }

    /// Snapshot of the sources merged into this one, in first-merge order.
    pub fn merged_sources(&self) -> Vec<Source> {
        self.inner.borrow().merged.clone()
    }

    /// Clear all sections and their values, cascade into every merged
    /// source, and forget the merged list. Merging a cleared child again
    /// later is allowed.
    pub fn clear(&self) {
        let (sections, merged, subscriptions) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::take(&mut inner.sections),
                std::mem::take(&mut inner.merged),
                std::mem::take(&mut inner.subscriptions),
            )
        };
        for (section, id) in subscriptions {
            section.unsubscribe(id);
        }
        for section in sections.values() {
            section.clear_entries();
        }
        drop(sections);
        for child in merged {
            child.clear();
        }
    }

    // ── expansion ──────────────────────────────────────────────────────

    /// Resolve `${key}` and `${sectionName|key}` tokens in every value of
    /// every section, in place. See [`crate::core::expand`] for the exact
    /// semantics (unknown references become empty, cycles stay literal).
    pub fn expand_key_values(&self) {
        let sections = self.inner.borrow().sections.clone();
        expand::expand_all(&sections);
    }

    // ── persistence ────────────────────────────────────────────────────

    /// Persist the current section set, including everything merged in,
    /// through the driver.
    pub fn save(&self) -> ConfigResult<()> {
        let mut inner = self.inner.borrow_mut();
        let SourceInner {
            sections,
            security,
            driver,
            ..
        } = &mut *inner;
        let snapshot: Vec<Section> = sections.values().cloned().collect();
        driver.save(&snapshot, security)
    }

    /// Discard all sections and merged sources and load a fresh set from
    /// the backing medium. A file-backed source with no bound path treats
    /// this as a no-op.
    pub fn reload(&self) -> ConfigResult<()> {
        let loaded = {
            let mut inner = self.inner.borrow_mut();
            let SourceInner {
                security, driver, ..
            } = &mut *inner;
            driver.reload(security)?
        };
        let Some(sections) = loaded else {
            return Ok(());
        };
        self.clear();
        for section in &sections {
            self.add(section)?;
        }
        Ok(())
    }

    /// The driver's deterministic serialized form of the current sections.
    pub fn to_serialized_form(&self) -> ConfigResult<String> {
        let inner = self.inner.borrow();
        let snapshot: Vec<Section> = inner.sections.values().cloned().collect();
        inner.driver.to_serialized_form(&snapshot)
    }

    /// Bind the source to a file path. For file-backed sources this is the
    /// unbound→bound transition that makes `save` and `reload` active;
    /// there is no transition back.
    pub fn bind_path(&self, path: impl Into<PathBuf>) -> ConfigResult<()> {
        self.inner.borrow_mut().driver.bind(path.into())
    }

    /// The bound file path, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.borrow().driver.path().map(Path::to_path_buf)
    }

    // ── flags ──────────────────────────────────────────────────────────

    /// Whether every `set` on a reachable section saves synchronously.
    pub fn auto_save(&self) -> bool {
        self.inner.borrow().auto_save
    }

    /// Turn auto-save on or off.
    pub fn set_auto_save(&self, auto_save: bool) {
        self.inner.borrow_mut().auto_save = auto_save;
    }

    /// Whether save/load pass text through the cipher.
    pub fn encrypt(&self) -> bool {
        self.inner.borrow().security.encrypt
    }

    /// Enable or disable encryption of the serialized form.
    pub fn set_encrypt(&self, encrypt: bool) {
        self.inner.borrow_mut().security.encrypt = encrypt;
    }

    /// The configured encryption key string.
    pub fn encryption_key(&self) -> String {
        self.inner.borrow().security.key.clone()
    }

    /// Set the key used to encrypt and decrypt the serialized form.
    pub fn set_encryption_key(&self, key: impl Into<String>) {
        self.inner.borrow_mut().security.key = key.into();
    }

    // ── internals ──────────────────────────────────────────────────────

    /// Register the auto-save observer on a section this source is taking
    /// in. The observer holds a weak handle, so it dissolves with the
    /// source and never keeps it alive through the section.
    fn watch_for_auto_save(&self, section: &Section) {
        let weak: Weak<RefCell<SourceInner>> = Rc::downgrade(&self.inner);
        let id = section.subscribe(move |section_name, key| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            if !inner.borrow().auto_save {
                return Ok(());
            }
            debug!(section = section_name, key, "auto-saving after change");
            Source { inner }.save()
        });
        self.inner
            .borrow_mut()
            .subscriptions
            .push((section.clone(), id));
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Source")
            .field("driver", &inner.driver.kind())
            .field("sections", &inner.sections.keys().collect::<Vec<_>>())
            .field("merged", &inner.merged.len())
            .field("auto_save", &inner.auto_save)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "key";
    const SECTION: &str = "Default";
    const VALUE: &str = "value";

    fn source_with_section() -> Source {
        let source = Source::in_memory();
        let section = Section::new(SECTION).unwrap();
        source.add(&section).unwrap();
        section.set(KEY, VALUE).unwrap();
        source
    }

    fn get(source: &Source, section: &str, key: &str) -> String {
        source
            .find_section(section)
            .unwrap()
            .get::<String>(key)
            .unwrap()
    }

    #[test]
    fn adding_a_new_section_stores_the_same_handle() {
        let source = Source::in_memory();
        let section = Section::new(SECTION).unwrap();
        source.add(&section).unwrap();
        section.set(KEY, VALUE).unwrap();
        assert_eq!(get(&source, SECTION, KEY), VALUE);
    }

    #[test]
    fn adding_a_colliding_section_overrides_keys() {
        let source = source_with_section();
        let incoming = Section::new(SECTION).unwrap();
        incoming.set(KEY, KEY).unwrap();
        incoming.set("extra", "1").unwrap();
        source.add(&incoming).unwrap();
        assert_eq!(get(&source, SECTION, KEY), KEY);
        assert_eq!(get(&source, SECTION, "extra"), "1");
        // Only one section of that name exists.
        assert_eq!(source.section_count(), 1);
    }

    #[test]
    fn adding_preserves_existing_only_keys() {
        let source = source_with_section();
        let incoming = Section::new(SECTION).unwrap();
        incoming.set("other", "2").unwrap();
        source.add(&incoming).unwrap();
        assert_eq!(get(&source, SECTION, KEY), VALUE);
        assert_eq!(get(&source, SECTION, "other"), "2");
    }

    #[test]
    fn section_lookup_creates_missing_sections() {
        let source = Source::in_memory();
        assert!(!source.contains_section("Fresh"));
        let section = source.section("Fresh").unwrap();
        section.set(KEY, VALUE).unwrap();
        assert_eq!(get(&source, "Fresh", KEY), VALUE);
        assert!(source.section("").is_err());
    }

    #[test]
    fn merging_adds_new_sections() {
        let source = source_with_section();
        let other = Source::in_memory();
        let section = Section::new("Extra").unwrap();
        section.set(KEY, KEY).unwrap();
        other.add(&section).unwrap();

        source.merge(&[other]).unwrap();
        assert!(source.contains_section("Extra"));
        assert_eq!(get(&source, "Extra", KEY), KEY);
    }

    #[test]
    fn merging_overwrites_conflicting_keys() {
        let source = source_with_section();
        let other = source_with_section();
        other.find_section(SECTION).unwrap().set(KEY, KEY).unwrap();

        assert_eq!(get(&source, SECTION, KEY), VALUE);
        source.merge(&[other]).unwrap();
        assert_eq!(get(&source, SECTION, KEY), KEY);
    }

    #[test]
    fn later_merges_win() {
        let source = Source::in_memory();
        let first = source_with_section();
        let second = source_with_section();
        second.find_section(SECTION).unwrap().set(KEY, "2").unwrap();
        source.merge(&[first, second]).unwrap();
        assert_eq!(get(&source, SECTION, KEY), "2");
    }

    #[test]
    fn merging_the_same_source_twice_tracks_it_once() {
        let source = source_with_section();
        let child = source_with_section();

        assert_eq!(source.merged_sources().len(), 0);
        source.merge(&[child.clone()]).unwrap();
        assert_eq!(source.merged_sources().len(), 1);

        // The child's current values are still re-applied.
        child.find_section(SECTION).unwrap().set(KEY, KEY).unwrap();
        source.merge(&[child]).unwrap();
        assert_eq!(source.merged_sources().len(), 1);
        assert_eq!(get(&source, SECTION, KEY), KEY);
    }

    #[test]
    fn clear_cascades_into_merged_sources() {
        let source = source_with_section();
        let child = source_with_section();
        source.merge(&[child.clone()]).unwrap();

        let section = source.find_section(SECTION).unwrap();
        assert_eq!(section.len(), 1);

        source.clear();
        assert_eq!(source.section_count(), 0);
        assert_eq!(source.merged_sources().len(), 0);
        assert_eq!(child.section_count(), 0);
        // The section object itself was emptied, wherever it is still held.
        assert_eq!(section.len(), 0);
    }

    #[test]
    fn clear_terminates_on_mutually_merged_sources() {
        let a = source_with_section();
        let b = source_with_section();
        a.merge(&[b.clone()]).unwrap();
        b.merge(&[a.clone()]).unwrap();
        a.clear();
        assert_eq!(a.section_count(), 0);
        assert_eq!(b.section_count(), 0);
    }

    #[test]
    fn remerging_after_clear_is_allowed() {
        let source = source_with_section();
        let child = source_with_section();
        source.merge(&[child.clone()]).unwrap();
        source.clear();

        let section = Section::new(SECTION).unwrap();
        section.set(KEY, "fresh").unwrap();
        child.add(&section).unwrap();
        source.merge(&[child]).unwrap();
        assert_eq!(source.merged_sources().len(), 1);
        assert_eq!(get(&source, SECTION, KEY), "fresh");
    }

    #[test]
    fn auto_save_failure_surfaces_but_keeps_the_value() {
        let source = source_with_section();
        source.set_auto_save(true);
        let err = source
            .find_section(SECTION)
            .unwrap()
            .set(KEY, KEY)
            .unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(get(&source, SECTION, KEY), KEY);
    }

    #[test]
    fn no_save_is_attempted_with_auto_save_disabled() {
        let source = source_with_section();
        source.set_auto_save(false);
        source.find_section(SECTION).unwrap().set(KEY, KEY).unwrap();
        assert_eq!(get(&source, SECTION, KEY), KEY);
    }

    #[test]
    fn cleared_sections_no_longer_trigger_auto_save() {
        let source = source_with_section();
        let section = source.find_section(SECTION).unwrap();
        source.set_auto_save(true);
        source.clear();
        // The handle is detached from the source now; setting must not
        // attempt to save the source it used to belong to.
        section.set(KEY, KEY).unwrap();
    }

    #[test]
    fn expansion_is_reachable_through_the_source() {
        let source = source_with_section();
        let section = source.find_section(SECTION).unwrap();
        section.set(KEY, "${value}").unwrap();
        section.set("value", KEY).unwrap();
        source.expand_key_values();
        assert_eq!(get(&source, SECTION, KEY), KEY);
    }

    #[test]
    fn in_memory_save_and_reload_are_unsupported() {
        let source = Source::in_memory();
        assert!(source.save().unwrap_err().is_unsupported());
        assert!(source.reload().unwrap_err().is_unsupported());
        assert!(source.to_serialized_form().unwrap_err().is_unsupported());
        assert!(source.bind_path("anywhere.ini").unwrap_err().is_unsupported());
    }

    #[test]
    fn merging_a_source_into_itself_is_a_no_op() {
        let source = source_with_section();
        source.merge(&[source.clone()]).unwrap();
        assert_eq!(source.merged_sources().len(), 0);
        assert_eq!(get(&source, SECTION, KEY), VALUE);
    }
}
