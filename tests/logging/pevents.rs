//! Integration tests for pevent collectors and controllers

use simtree::logging::{DestinationSpec, FormatFlags, PairDefinition, PeventCollector, PeventController};
use simtree::node::{Forest, NodeSpec};

use crate::data_lines;

struct Issue {
    slot: u32,
    opcode: &'static str,
    stalled: bool,
}

fn issue_pairs() -> PairDefinition<Issue> {
    PairDefinition::new()
        .pair("slot", |i: &Issue| i.slot)
        .pair_with("op", |i: &Issue| i.opcode, FormatFlags { unquoted: true, ..FormatFlags::default() })
        .pair_with("stall", |i: &Issue| i.stalled, FormatFlags::verbose_only())
}

const ADD: Issue = Issue {
    slot: 2,
    opcode: "add",
    stalled: true,
};

#[test]
fn controller_taps_one_core() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("core0.pevents.log.raw");
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let clk = forest.create_clock("clk", 4).unwrap();
    forest.set_clock(top, clk).unwrap();
    let mut collectors = Vec::new();
    let mut cores = Vec::new();
    for i in 0..2 {
        let core = forest.create_node(Some(top), NodeSpec::new(format!("core{i}"), "core")).unwrap();
        cores.push(core);
        collectors.push(PeventCollector::new(&mut forest, core, "issue", issue_pairs(), false).unwrap());
    }

    let mut controller = PeventController::new();
    controller
        .add_tap(&mut forest, cores[0], &["issue"], &DestinationSpec::from(path.clone()), false)
        .unwrap();
    assert!(collectors[0].is_collecting(&forest));
    assert!(!collectors[1].is_collecting(&forest));

    forest.set_current_tick(40);
    for collector in &collectors {
        collector.collect(&forest, &ADD);
    }
    assert_eq!(data_lines(&path), vec!["ev=\"issue\" slot=\"2\" op=add cyc=10;"]);
    assert_eq!(controller.num_recorded(), 1);
}

#[test]
fn verbose_and_plain_events_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let plain_path = dir.path().join("plain.log.raw");
    let verbose_path = dir.path().join("verbose.log.raw");
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let plain = PeventCollector::new(&mut forest, top, "issue", issue_pairs(), false).unwrap();
    let verbose = PeventCollector::new(&mut forest, top, "issue", issue_pairs(), true).unwrap();

    let mut controller = PeventController::new();
    controller
        .add_tap(&mut forest, top, &["all"], &DestinationSpec::from(plain_path.clone()), false)
        .unwrap();
    controller
        .add_tap(&mut forest, top, &["issue"], &DestinationSpec::from(verbose_path.clone()), true)
        .unwrap();

    plain.collect(&forest, &ADD);
    verbose.collect(&forest, &ADD);
    assert_eq!(data_lines(&plain_path), vec!["ev=\"issue\" slot=\"2\" op=add cyc=0;"]);
    assert_eq!(
        data_lines(&verbose_path),
        vec!["ev=\"issue\" slot=\"2\" op=add stall=\"1\" cyc=0;"]
    );
}

#[test]
fn skew_shifts_reported_cycle() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let mut collector = PeventCollector::new(&mut forest, top, "issue", issue_pairs(), false)
        .unwrap()
        .with_skew(5);
    forest.set_current_tick(10);
    assert!(collector.render(&forest, &ADD).ends_with(" cyc=15;"));
    collector.set_skew(-20);
    assert!(collector.render(&forest, &ADD).ends_with(" cyc=-10;"));
    assert_eq!(collector.name(), "issue");
}
