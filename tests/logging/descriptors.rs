//! Integration tests for tap descriptors
//!
//! Descriptor sets are prepared and stored before the tree exists, then
//! materialized once it is built.

use simtree::logging::{LogSource, TapDescriptor, decode_descriptors, encode_descriptors, unused_descriptors};
use simtree::node::{Forest, GLOBAL_LOCATION, NodeSpec};

use crate::data_lines;

#[test]
fn stored_descriptors_materialize_after_construction() {
    let dir = tempfile::tempdir().unwrap();
    let cores_log = dir.path().join("cores.log.basic");
    let warnings_log = dir.path().join("warnings.log.basic");
    let set = vec![
        TapDescriptor::new("top.core*", "debug", cores_log.display().to_string()),
        TapDescriptor::new(GLOBAL_LOCATION, "warning", warnings_log.display().to_string()),
        TapDescriptor::new("top.gpu*", "debug", "1"),
    ];
    let stored = dir.path().join("taps.msgpack");
    std::fs::write(&stored, encode_descriptors(&set).unwrap()).unwrap();

    let mut forest = Forest::new();
    let _logging = simtree::logging::install(&mut forest).unwrap();
    let top = forest.create_root("top", "root").unwrap();
    let mut sources = Vec::new();
    for i in 0..2 {
        let core = forest.create_node(Some(top), NodeSpec::new(format!("core{i}"), "core")).unwrap();
        sources.push(LogSource::new(&mut forest, core, "debug", "debug").unwrap());
    }
    let mut set = decode_descriptors(&std::fs::read(&stored).unwrap()).unwrap();
    let mut taps = Vec::new();
    for descriptor in &mut set {
        taps.extend(descriptor.materialize(&mut forest, top).unwrap());
    }
    assert_eq!(taps.len(), 3);
    assert_eq!(set.iter().map(|d| d.usage_count).collect::<Vec<_>>(), vec![2, 1, 0]);
    let unused = unused_descriptors(&set);
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].location, "top.gpu*");

    sources[1].log(&forest, "hello");
    forest.warn(top, "late");
    assert_eq!(data_lines(&cores_log), vec!["top.core1 [debug]: hello"]);
    assert_eq!(data_lines(&warnings_log), vec!["top [warning]: late"]);
}

#[test]
fn usage_counts_survive_storage() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("top.log").display().to_string();
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let mut descriptor = TapDescriptor::new("top", "", dest);
    let _taps = descriptor.materialize(&mut forest, top).unwrap();

    let decoded = decode_descriptors(&encode_descriptors(std::slice::from_ref(&descriptor)).unwrap()).unwrap();
    assert_eq!(decoded[0].usage_count, 1);
    assert!(decoded[0].is_used());
}

#[test]
fn malformed_patterns_are_flagged() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    for pattern in ["top.", "top.core-0", ".top"] {
        let mut descriptor = TapDescriptor::new(pattern, "", "2");
        assert!(descriptor.materialize(&mut forest, top).unwrap().is_empty());
        assert!(descriptor.bad_pattern, "{pattern}");
        assert!(!descriptor.is_used());
    }
}
