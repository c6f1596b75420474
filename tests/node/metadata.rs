//! Integration tests for clock and location metadata files

use std::fs::{self, File};

use simtree::foundation::ErrorKind;
use simtree::node::{
    Forest, ForestConfig, METADATA_VERSION, NodeSpec, parse_clock_file, parse_location_file, write_clock_file,
    write_location_file,
};

fn clocked_tree() -> (Forest, simtree::foundation::NodeId) {
    let mut forest = Forest::with_config(ForestConfig::default().with_ticks_per_second(1_000));
    let top = forest.create_root("top", "root").unwrap();
    let core_clk = forest.create_clock("core_clk", 1).unwrap();
    let bus_clk = forest.create_clock_with_ratio("bus_clk", 2, 1, 2).unwrap();
    forest.set_clock(top, core_clk).unwrap();
    let bus = forest.create_node(Some(top), NodeSpec::new("bus", "interconnect")).unwrap();
    forest.set_clock(bus, bus_clk).unwrap();
    for i in 0..2 {
        forest
            .create_node(Some(top), NodeSpec::anonymous("core", i, "core"))
            .unwrap();
    }
    (forest, top)
}

#[test]
fn files_written_to_disk_parse_back() {
    let dir = tempfile::tempdir().unwrap();
    let (forest, top) = clocked_tree();

    let clock_path = dir.path().join("clocks.txt");
    write_clock_file(&forest, &mut File::create(&clock_path).unwrap()).unwrap();
    let clocks = parse_clock_file(&fs::read_to_string(&clock_path).unwrap()).unwrap();
    assert_eq!(clocks.version, METADATA_VERSION);
    assert_eq!(clocks.ticks_per_second, 1_000);
    let names: Vec<_> = clocks.clocks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["core_clk", "bus_clk"]);

    let location_path = dir.path().join("locations.txt");
    write_location_file(&forest, top, &mut File::create(&location_path).unwrap()).unwrap();
    let records = parse_location_file(&fs::read_to_string(&location_path).unwrap()).unwrap();
    let bus = records.iter().find(|r| r.location == "top.bus").unwrap();
    assert_eq!(bus.clock_uid, Some(clocks.clocks[1].uid));
    let core = records.iter().find(|r| r.location == "top.core[1]").unwrap();
    assert_eq!(core.clock_uid, Some(clocks.clocks[0].uid));
}

#[test]
fn every_location_names_a_known_clock() {
    let (forest, top) = clocked_tree();
    let mut clock_out = Vec::new();
    let mut location_out = Vec::new();
    write_clock_file(&forest, &mut clock_out).unwrap();
    write_location_file(&forest, top, &mut location_out).unwrap();

    let clocks = parse_clock_file(&String::from_utf8(clock_out).unwrap()).unwrap();
    let records = parse_location_file(&String::from_utf8(location_out).unwrap()).unwrap();
    assert_eq!(records.len(), 4);
    for record in &records {
        let uid = record.clock_uid.unwrap();
        assert!(clocks.clocks.iter().any(|c| c.uid == uid), "{record:?}");
    }
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let text = "# clocks\n1\n\n1000\n# core\n3,core_clk,1,1,1\n";
    let parsed = parse_clock_file(text).unwrap();
    assert_eq!(parsed.clocks.len(), 1);
    assert_eq!(parsed.clocks[0].uid, 3);
}

#[test]
fn malformed_files_report_the_line() {
    let err = parse_clock_file("1\n1000\n3,core_clk,one,1,1\n").unwrap_err();
    match err.kind {
        ErrorKind::Malformed { file, line, .. } => {
            assert_eq!(file, "clock");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(parse_clock_file("").is_err());
    assert!(parse_location_file("2\n").is_err());
    assert!(parse_location_file("1\n5,top\n").is_err());
}

#[test]
fn unclocked_location_parses_as_none() {
    let records = parse_location_file("1\n5,top,-1\n").unwrap();
    assert_eq!(records[0].clock_uid, None);
}
