//! End-to-end semantics of the merge-and-expand engine, exercised through
//! the public API only.

use strata_config::prelude::*;
use strata_config::setting_enum;

const KEY: &str = "key";
const SECTION: &str = "Default";
const VALUE: &str = "value";

fn source_with_section() -> Source {
    let source = Source::in_memory();
    let section = source.section(SECTION).unwrap();
    section.set(KEY, VALUE).unwrap();
    source
}

#[test]
fn merge_precedence_is_later_wins() {
    // A has X.k = 1; merging B with X.k = 2 must yield 2.
    let a = Source::in_memory();
    a.section("X").unwrap().set("k", "1").unwrap();
    let b = Source::in_memory();
    b.section("X").unwrap().set("k", "2").unwrap();

    a.merge(&[b]).unwrap();
    assert_eq!(a.section("X").unwrap().get::<String>("k").unwrap(), "2");
}

#[test]
fn merge_tracking_is_idempotent_but_values_reapply() {
    let a = source_with_section();
    let b = source_with_section();

    a.merge(&[b.clone()]).unwrap();
    assert_eq!(a.merged_sources().len(), 1);

    b.section(SECTION).unwrap().set(KEY, "newer").unwrap();
    a.merge(&[b]).unwrap();
    assert_eq!(a.merged_sources().len(), 1);
    assert_eq!(
        a.section(SECTION).unwrap().get::<String>(KEY).unwrap(),
        "newer"
    );
}

#[test]
fn clear_cascades_through_merge_chains() {
    let a = source_with_section();
    let b = source_with_section();
    let c = source_with_section();
    b.merge(&[c.clone()]).unwrap();
    a.merge(&[b.clone()]).unwrap();

    a.clear();
    assert_eq!(a.section_count(), 0);
    assert_eq!(b.section_count(), 0);
    assert_eq!(c.section_count(), 0);
    assert_eq!(a.merged_sources().len(), 0);
    assert_eq!(b.merged_sources().len(), 0);
}

#[test]
fn expansion_works_across_merged_sources() {
    let defaults = Source::in_memory();
    let paths = defaults.section("Paths").unwrap();
    paths.set("root", "/srv").unwrap();
    paths.set("logs", "${root}/logs").unwrap();

    let overrides = Source::in_memory();
    overrides.section("Paths").unwrap().set("root", "/data").unwrap();

    let merged = Source::in_memory();
    merged.merge(&[defaults, overrides]).unwrap();
    merged.expand_key_values();

    assert_eq!(
        merged.section("Paths").unwrap().get::<String>("logs").unwrap(),
        "/data/logs"
    );
}

#[test]
fn expansion_cycle_terminates_and_leaves_the_token() {
    let source = Source::in_memory();
    let section = source.section(SECTION).unwrap();
    section.set("a", "${b}").unwrap();
    section.set("b", "${a}").unwrap();

    source.expand_key_values();
    assert_eq!(section.get::<String>("a").unwrap(), "${b}");
    assert_eq!(section.get::<String>("b").unwrap(), "${a}");
}

#[test]
fn sections_compare_structurally() {
    let one = Section::new(SECTION).unwrap();
    one.set("a", "a").unwrap();
    one.set("b", "b").unwrap();
    let two = Section::new(SECTION).unwrap();
    two.set("b", "b").unwrap();
    two.set("a", "a").unwrap();
    assert_eq!(one, two);

    two.set("b", "changed").unwrap();
    assert_ne!(one, two);
}

#[test]
fn set_then_get_returns_the_string_form() {
    let section = Section::new(SECTION).unwrap();
    section.set("flag", true).unwrap();
    section.set("count", 42_i64).unwrap();
    section.set("bytes", vec![1_u8, 2, 3]).unwrap();

    assert_eq!(section.get::<String>("flag").unwrap(), "true");
    assert_eq!(section.get::<String>("count").unwrap(), "42");
    assert_eq!(section.get::<Vec<u8>>("bytes").unwrap(), vec![1, 2, 3]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

setting_enum!(Tier { Free = 0, Pro = 1, Enterprise = 2 });

#[test]
fn enums_round_trip_through_a_section() {
    let section = Section::new(SECTION).unwrap();
    section.set("tier", Tier::Pro).unwrap();
    assert_eq!(section.get::<String>("tier").unwrap(), "Pro");
    assert_eq!(section.get::<Tier>("tier").unwrap(), Tier::Pro);

    section.set("tier", "2").unwrap();
    assert_eq!(section.get::<Tier>("tier").unwrap(), Tier::Enterprise);

    // Absent key falls back to the enum's default.
    assert_eq!(section.get::<Tier>("absent").unwrap(), Tier::Free);
}

#[test]
fn conversion_failure_reports_value_and_type() {
    let section = Section::new(SECTION).unwrap();
    section.set(KEY, "not-a-number").unwrap();
    let err = section.get::<i32>(KEY).unwrap_err();
    match err {
        ConfigError::Conversion { value, target, .. } => {
            assert_eq!(value, "not-a-number");
            assert!(target.contains("i32"));
        }
        other => panic!("expected a conversion error, got {other:?}"),
    }
}

#[test]
fn auto_save_observer_fires_through_merged_sections() {
    // The parent takes the child's section handles in as-is, so a set
    // through the child fires the parent's auto-save too (which is
    // unsupported on the in-memory driver and therefore visible as an
    // error).
    let parent = Source::in_memory();
    let child = source_with_section();
    parent.merge(&[child.clone()]).unwrap();

    parent.set_auto_save(true);
    let err = child.section(SECTION).unwrap().set(KEY, "x").unwrap_err();
    assert!(matches!(err, ConfigError::Unsupported { .. }));
    // The mutation still landed, on both views.
    assert_eq!(
        parent.section(SECTION).unwrap().get::<String>(KEY).unwrap(),
        "x"
    );
}
