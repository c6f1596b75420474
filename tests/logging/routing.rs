//! Integration tests for message routing
//!
//! Tests category filtering, duplicate suppression across overlapping taps,
//! detaching, and global warnings from unattached nodes.

use std::fmt::Write;
use std::path::PathBuf;

use simtree::foundation::NodeId;
use simtree::logging::{self, DestinationManager, DestinationSpec, LogSource, LoggingConfig, Tap};
use simtree::node::{Forest, NodeSpec, ObservationPoint};

use crate::data_lines;

struct Tree {
    forest: Forest,
    top: NodeId,
    a: NodeId,
    b: NodeId,
    c: NodeId,
    d: NodeId,
}

/// `top.a.b.c` plus `top.a.d`.
fn tree() -> Tree {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    let b = forest.create_node(Some(a), NodeSpec::new("b", "b")).unwrap();
    let c = forest.create_node(Some(b), NodeSpec::new("c", "c")).unwrap();
    let d = forest.create_node(Some(a), NodeSpec::new("d", "d")).unwrap();
    Tree { forest, top, a, b, c, d }
}

fn file(dir: &tempfile::TempDir, name: &str) -> (PathBuf, DestinationSpec) {
    let path = dir.path().join(name);
    (path.clone(), DestinationSpec::Path(path))
}

// =============================================================================
// Category Routing
// =============================================================================

#[test]
fn tap_only_records_its_category() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "mine.log");
    let Tree { mut forest, a, c, d, .. } = tree();
    let mine = LogSource::new(&mut forest, c, "mycategory", "mine").unwrap();
    let other = LogSource::new(&mut forest, d, "other", "other").unwrap();
    let tap = Tap::new(&mut forest, a, "mycategory", &spec).unwrap();

    mine.log(&forest, "first");
    other.log(&forest, "second");

    let lines = data_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("mycategory"));
    assert!(lines[0].ends_with("} first"));
    assert!(lines[0].contains(" top.a.b.c "));
    assert_eq!(tap.num_recorded(), 1);
}

#[test]
fn builder_content_is_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "builder.log.raw");
    let Tree { mut forest, top, c, .. } = tree();
    let source = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let _tap = Tap::new(&mut forest, top, "debug", &spec).unwrap();

    {
        let mut msg = source.emit(&forest);
        write!(msg, "line one\n").unwrap();
        write!(msg, "line two").unwrap();
    }
    let mut cancelled = source.emit(&forest);
    write!(cancelled, "never").unwrap();
    cancelled.cancel();
    drop(cancelled);

    assert_eq!(data_lines(&path), vec!["line oneline two"]);
}

#[test]
fn file_layout_follows_extension() {
    let dir = tempfile::tempdir().unwrap();
    let (basic_path, basic) = file(&dir, "out.log.basic");
    let (verbose_path, verbose) = file(&dir, "out.log.verbose");
    let Tree { mut forest, top, b, .. } = tree();
    let clk = forest.create_clock("clk", 10).unwrap();
    forest.set_clock(top, clk).unwrap();
    let source = LogSource::new(&mut forest, b, "debug", "debug").unwrap();
    let _basic_tap = Tap::new(&mut forest, top, "debug", &basic).unwrap();
    let _verbose_tap = Tap::new(&mut forest, top, "debug", &verbose).unwrap();

    forest.set_current_tick(120);
    source.log(&forest, "tick");

    assert_eq!(data_lines(&basic_path), vec!["top.a.b [debug]: tick"]);
    let verbose_lines = data_lines(&verbose_path);
    assert_eq!(verbose_lines.len(), 1);
    assert!(verbose_lines[0].starts_with("{000000000120 00000012 "), "{}", verbose_lines[0]);
    assert!(verbose_lines[0].contains(" top.a.b debug} tick"));
}

// =============================================================================
// Duplicate Suppression
// =============================================================================

#[test]
fn overlapping_taps_write_each_message_once() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "shared.log");
    let Tree { mut forest, a, b, c, .. } = tree();
    let source = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let outer = Tap::new(&mut forest, a, "", &spec).unwrap();
    let inner = Tap::new(&mut forest, b, "", &spec).unwrap();
    assert!(std::sync::Arc::ptr_eq(outer.destination(), inner.destination()));

    source.log(&forest, "once");

    assert_eq!(data_lines(&path).len(), 1);
    assert_eq!((outer.num_recorded(), inner.num_recorded()), (1, 1));
    let stats = inner.destination().stats();
    assert_eq!((stats.received, stats.written, stats.duplicates), (2, 1, 1));
}

#[test]
fn destinations_are_shared_by_argument() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("same.log");
    let manager = DestinationManager::new();
    let first = manager.get(&DestinationSpec::from(path.as_path())).unwrap();
    let second = manager
        .get(&DestinationSpec::parse(&path.display().to_string()))
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(manager.len(), 1);
    assert!(manager.get(&DestinationSpec::Path(dir.path().join("no/such/dir/x.log"))).is_err());
}

// =============================================================================
// Deregistration
// =============================================================================

#[test]
fn detached_tap_stops_receiving() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "detach.log");
    let Tree { mut forest, a, c, .. } = tree();
    let source = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let mut tap = Tap::new(&mut forest, a, "debug", &spec).unwrap();

    source.log(&forest, "before");
    let received = tap.destination().num_received();
    tap.detach(&mut forest).unwrap();
    assert!(!source.is_observed(&forest));
    assert!(source.observation_points(&forest).is_empty());
    source.log(&forest, "after");

    assert_eq!(data_lines(&path).len(), 1);
    assert_eq!(tap.destination().num_received(), received);
    assert_eq!(tap.num_recorded(), 1);
}

#[test]
fn reset_moves_the_tap() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "reset.log.raw");
    let Tree { mut forest, b, c, d, .. } = tree();
    let under_c = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let under_d = LogSource::new(&mut forest, d, "debug", "debug").unwrap();
    let mut tap = Tap::new(&mut forest, b, "debug", &spec).unwrap();

    under_d.log(&forest, "unheard");
    tap.reset(&mut forest, d).unwrap();
    under_c.log(&forest, "unheard too");
    under_d.log(&forest, "heard");

    assert_eq!(data_lines(&path), vec!["heard"]);
    assert_eq!(tap.point(), Some(ObservationPoint::Node(d)));
}

#[test]
fn dropped_tap_goes_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "dropped.log");
    let Tree { mut forest, a, c, .. } = tree();
    let source = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let tap = Tap::new(&mut forest, a, "debug", &spec).unwrap();
    drop(tap);
    source.log(&forest, "nobody");
    assert!(data_lines(&path).is_empty());
    assert_eq!(forest.purge_dead_observers(), 1);
}

#[test]
fn dropped_tap_no_longer_observes_its_sources() {
    let dir = tempfile::tempdir().unwrap();
    let (_, spec) = file(&dir, "unobserved.log");
    let Tree { mut forest, a, c, .. } = tree();
    let source = LogSource::new(&mut forest, c, "debug", "debug").unwrap();
    let tap = Tap::new(&mut forest, a, "debug", &spec).unwrap();
    assert!(source.is_observed(&forest));
    assert_eq!(source.observation_points(&forest), vec![ObservationPoint::Node(a)]);

    drop(tap);
    assert!(!source.is_observed(&forest));
    assert!(source.observation_points(&forest).is_empty());
    let mut msg = source.emit(&forest);
    write!(msg, "unheard").unwrap();
    assert!(!msg.is_observed());
}

#[test]
fn detaching_from_destroyed_node_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let (_, spec) = file(&dir, "expired.log");
    let Tree { mut forest, top, d, .. } = tree();
    let mut tap = Tap::new(&mut forest, d, "", &spec).unwrap();
    forest.enter_teardown(top).unwrap();
    forest.destroy(d).unwrap();
    tap.detach(&mut forest).unwrap();
    assert_eq!(tap.point(), None);
}

// =============================================================================
// Global Warnings
// =============================================================================

#[test]
fn global_warning_tap_sees_unattached_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "global.log.basic");
    let Tree { mut forest, top, .. } = tree();
    let _tap = Tap::new(&mut forest, ObservationPoint::Global, "warning", &spec).unwrap();

    let loose = forest.create_node(None, NodeSpec::new("loose", "not yet attached")).unwrap();
    let warnings = LogSource::new(&mut forest, loose, "warning", "warnings").unwrap();
    warnings.log(&forest, "early");
    assert_eq!(data_lines(&path), vec!["~loose [warning]: early"]);

    forest.add_child(top, loose).unwrap();
    warnings.log(&forest, "attached");
    assert_eq!(data_lines(&path), vec!["~loose [warning]: early", "top.loose [warning]: attached"]);
}

#[test]
fn framework_warnings_carry_node_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("framework.log.basic");
    let Tree { mut forest, a, c, .. } = tree();
    let config = LoggingConfig::default().with_warning_destination(&path);
    let logging = logging::install_with(&mut forest, &config).unwrap();

    forest.destroy(c).unwrap();
    forest.warn(a, "custom");

    let lines = data_lines(&path);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("top.a.b.c [warning]: node top.a.b.c destroyed while attached"));
    assert_eq!(lines[1], "top.a [warning]: custom");
    assert_eq!(logging.taps()[0].num_recorded(), 2);
}

#[test]
fn global_sources_work_before_any_tree() {
    let dir = tempfile::tempdir().unwrap();
    let (path, spec) = file(&dir, "early.log.raw");
    let mut forest = Forest::new();
    let logging = logging::install(&mut forest).unwrap();
    let _tap = Tap::new(&mut forest, ObservationPoint::Global, "debug, parameters", &spec).unwrap();

    logging.sources().debug.log(&forest, "booting");
    logging.sources().parameters.log(&forest, "width=4");
    logging.sources().warning.log(&forest, "not tapped");
    assert_eq!(data_lines(&path), vec!["booting", "width=4"]);
}
