//! Integration tests for the phase machine and clocks
//!
//! Tests phase ordering, resource creation, validation, teardown, and
//! clock association.

use std::cell::RefCell;
use std::rc::Rc;

use simtree::foundation::{ErrorKind, NodeId, Result};
use simtree::node::{Forest, ForestConfig, NodeBehavior, NodeSpec, Origin, Phase, WarningSink};

type Journal = Rc<RefCell<Vec<String>>>;

struct Collect(Journal);

impl WarningSink for Collect {
    fn warn(&self, forest: &Forest, origin: Origin, message: &str) {
        self.0
            .borrow_mut()
            .push(format!("{}: {message}", forest.origin_location(origin)));
    }
}

fn collecting(forest: &mut Forest) -> Journal {
    let seen = Journal::default();
    forest.set_warning_sink(Box::new(Collect(Rc::clone(&seen))));
    seen
}

/// Records every hook call, optionally spawning a child or failing.
struct Probe {
    tag: &'static str,
    journal: Journal,
    spawn: bool,
    reject: bool,
    fail_teardown: bool,
}

impl Probe {
    fn new(tag: &'static str, journal: &Journal) -> Self {
        Self {
            tag,
            journal: Rc::clone(journal),
            spawn: false,
            reject: false,
            fail_teardown: false,
        }
    }

    fn note(&self, event: &str) {
        self.journal.borrow_mut().push(format!("{}:{event}", self.tag));
    }
}

impl NodeBehavior for Probe {
    fn on_configuring(&mut self, _forest: &Forest, _me: NodeId) -> Result<()> {
        self.note("configuring");
        Ok(())
    }

    fn create_resources(&mut self, forest: &mut Forest, me: NodeId) -> Result<()> {
        self.note("resources");
        if self.spawn {
            let child = Probe::new("spawned", &self.journal);
            forest.create_node(Some(me), NodeSpec::new("spawned", "made late").with_behavior(child))?;
        }
        Ok(())
    }

    fn validate_node(&self, _forest: &Forest, _me: NodeId) -> Result<()> {
        if self.reject {
            return Err(simtree::foundation::Error::internal("queue depth must be positive"));
        }
        Ok(())
    }

    fn on_teardown(&mut self, _forest: &Forest, _me: NodeId) -> Result<()> {
        self.note("teardown");
        if self.fail_teardown {
            return Err(simtree::foundation::Error::internal("counter still live"));
        }
        Ok(())
    }
}

// =============================================================================
// Phase Ordering
// =============================================================================

#[test]
fn finalize_runs_every_stage_in_order() {
    let journal = Journal::default();
    let mut forest = Forest::new();
    let top = forest
        .create_root_with(NodeSpec::new("top", "root").with_behavior(Probe::new("top", &journal)))
        .unwrap();
    forest
        .create_node(Some(top), NodeSpec::new("a", "a").with_behavior(Probe::new("a", &journal)))
        .unwrap();

    forest.finalize_tree(top).unwrap();
    assert_eq!(
        *journal.borrow(),
        vec!["top:configuring", "a:configuring", "top:resources", "a:resources"]
    );
    assert!(forest.iter().all(|n| n.phase() == Phase::Finalized));
}

#[test]
fn resource_hooks_reach_nodes_created_while_finalizing() {
    let journal = Journal::default();
    let mut forest = Forest::new();
    let mut probe = Probe::new("top", &journal);
    probe.spawn = true;
    let top = forest
        .create_root_with(NodeSpec::new("top", "root").with_behavior(probe))
        .unwrap();

    forest.finalize_tree(top).unwrap();
    assert!(journal.borrow().contains(&"spawned:resources".to_owned()));
    let spawned = forest.get_child(top, "spawned").unwrap();
    assert_eq!(forest.phase(spawned).unwrap(), Phase::Finalized);
}

#[test]
fn phases_only_advance() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    forest.enter_finalizing(top).unwrap();
    assert!(forest.enter_configuring(top).unwrap_err().is_phase_error());
    forest.finalize_tree(top).unwrap();
    assert!(forest.finalize_tree(top).unwrap_err().is_phase_error());
}

#[test]
fn transitions_start_at_tree_roots() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    let err = forest.finalize_tree(a).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidStructure(_)));
}

#[test]
fn finalized_tree_rejects_structure_changes() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let clk = forest.create_clock("clk", 10).unwrap();
    let loose = forest.create_node(None, NodeSpec::new("late", "late")).unwrap();
    forest.finalize_tree(top).unwrap();

    assert!(forest.add_child(top, loose).unwrap_err().is_phase_error());
    assert!(forest.set_clock(top, clk).unwrap_err().is_phase_error());
    assert!(forest.create_node(Some(top), NodeSpec::new("x", "x")).is_err());
    assert!(forest.get_child(top, "x").unwrap_err().is_not_found());
    assert_eq!(forest.node(top).unwrap().child_count(), 0);
}

#[test]
fn failed_validation_leaves_tree_finalizing() {
    let journal = Journal::default();
    let mut forest = Forest::new();
    let mut probe = Probe::new("top", &journal);
    probe.reject = true;
    let top = forest
        .create_root_with(NodeSpec::new("top", "root").with_behavior(probe))
        .unwrap();

    let err = forest.finalize_tree(top).unwrap_err();
    match err.kind {
        ErrorKind::FinalizationError { location, reason } => {
            assert_eq!(location, "top");
            assert!(reason.contains("queue depth"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(forest.phase(top).unwrap(), Phase::Finalizing);
}

#[test]
fn post_run_validation_requires_finalized_tree() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    assert!(forest.validate_post_run(top).unwrap_err().is_phase_error());
    forest.finalize_tree(top).unwrap();
    forest.validate_post_run(top).unwrap();
}

// =============================================================================
// Teardown and Destruction
// =============================================================================

#[test]
fn teardown_is_idempotent() {
    let journal = Journal::default();
    let mut forest = Forest::new();
    let top = forest
        .create_root_with(NodeSpec::new("top", "root").with_behavior(Probe::new("top", &journal)))
        .unwrap();
    forest.finalize_tree(top).unwrap();
    journal.borrow_mut().clear();

    forest.enter_teardown(top).unwrap();
    forest.enter_teardown(top).unwrap();
    assert_eq!(*journal.borrow(), vec!["top:teardown"]);
    assert_eq!(forest.phase(top).unwrap(), Phase::Teardown);
}

#[test]
fn teardown_errors_become_budgeted_warnings() {
    let journal = Journal::default();
    let mut forest = Forest::with_config(ForestConfig::default().with_teardown_warning_budget(1));
    let warnings = collecting(&mut forest);
    let top = forest.create_root("top", "root").unwrap();
    for name in ["a", "b"] {
        let mut probe = Probe::new("x", &journal);
        probe.fail_teardown = true;
        forest
            .create_node(Some(top), NodeSpec::new(name, name).with_behavior(probe))
            .unwrap();
    }

    forest.enter_teardown(top).unwrap();
    let warnings = warnings.borrow();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("top.a: teardown of top.a failed"));
}

#[test]
fn destruction_outside_teardown_warns() {
    let mut forest = Forest::new();
    let warnings = collecting(&mut forest);
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    let b = forest.create_node(Some(top), NodeSpec::new("b", "b")).unwrap();
    forest.destroy(a).unwrap();
    assert_eq!(warnings.borrow().len(), 1);

    forest.enter_teardown(top).unwrap();
    forest.destroy(b).unwrap();
    assert_eq!(warnings.borrow().len(), 1);
    assert!(!forest.contains(b));
}

#[test]
fn destruction_warnings_stop_at_limit() {
    let mut forest =
        Forest::with_config(ForestConfig::default().with_destruction_warning_limit(2));
    let warnings = collecting(&mut forest);
    let top = forest.create_root("top", "root").unwrap();
    for i in 0..4 {
        let n = forest.create_node(Some(top), NodeSpec::new(format!("n{i}"), "n")).unwrap();
        forest.destroy(n).unwrap();
    }
    let warnings = warnings.borrow();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[1].ends_with("further destruction warnings suppressed"));
}

#[test]
fn orphans_remember_destroyed_parent_location() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    let b = forest.create_node(Some(a), NodeSpec::new("b", "b")).unwrap();
    forest.enter_teardown(top).unwrap();
    forest.destroy(a).unwrap();
    assert_eq!(forest.location(b).unwrap(), "top.a.b");
    assert!(forest.parentless_nodes().contains(&b));
    assert!(forest.node(a).unwrap_err().is_expired());
}

#[test]
fn destroy_subtree_removes_children_first() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    forest.create_node(Some(a), NodeSpec::new("b", "b")).unwrap();
    forest.enter_teardown(top).unwrap();
    assert_eq!(forest.destroy_subtree(top).unwrap(), 3);
    assert!(forest.is_empty());
}

// =============================================================================
// Clocks
// =============================================================================

#[test]
fn working_clock_is_inherited() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "a")).unwrap();
    let b = forest.create_node(Some(a), NodeSpec::new("b", "b")).unwrap();
    let slow = forest.create_clock("slow", 4).unwrap();
    let fast = forest.create_clock("fast", 1).unwrap();
    forest.set_clock(top, slow).unwrap();
    forest.set_clock(b, fast).unwrap();

    assert_eq!(forest.working_clock(a).unwrap(), Some(slow));
    assert_eq!(forest.working_clock(b).unwrap(), Some(fast));
    assert_eq!(forest.cycle_of(Origin::Node(a), 12), Some(3));
    assert_eq!(forest.cycle_of(Origin::Global, 12), None);
    assert_eq!(forest.find_clock("fast"), Some(fast));
}

#[test]
fn clocks_are_fixed_once_finalizing() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let clk = forest.create_clock("clk", 2).unwrap();
    forest.enter_configuring(top).unwrap();
    forest.set_clock(top, clk).unwrap();
    forest.enter_finalizing(top).unwrap();
    assert!(forest.set_clock(top, clk).unwrap_err().is_phase_error());
    assert_eq!(forest.working_clock(top).unwrap(), Some(clk));
}

#[test]
fn bad_clocks_are_rejected() {
    let mut forest = Forest::new();
    assert!(forest.create_clock("zero", 0).is_err());
    assert!(forest.create_clock_with_ratio("ratio", 1, 0, 1).is_err());
    assert!(forest.create_clock("bad name", 1).is_err());
    assert!(forest.clocks().is_empty());
}

#[test]
fn simulated_time_saturates() {
    let mut forest = Forest::new();
    forest.set_current_tick(u64::MAX - 1);
    forest.advance_ticks(5);
    assert_eq!(forest.current_tick(), u64::MAX);
}
