use instill_core::InstallUnit;

use super::*;

fn add(id: &str, requires: &[&str]) -> PlanOperation {
    PlanOperation::Add(PlanUnit::with_requirements(
        InstallUnit::new(id, "1.0.0"),
        requires.iter().map(ToString::to_string).collect(),
    ))
}

fn update(id: &str, requires: &[&str]) -> PlanOperation {
    PlanOperation::Update(PlanUnit::with_requirements(
        InstallUnit::new(id, "1.0.0"),
        requires.iter().map(ToString::to_string).collect(),
    ))
}

fn remove(id: &str) -> PlanOperation {
    PlanOperation::Remove(PlanUnit::new(InstallUnit::new(id, "1.0.0")))
}

fn id_match(requirement: &str, candidate: &PlanUnit) -> bool {
    candidate.unit.id == requirement
}

fn ids(operations: &[PlanOperation]) -> Vec<&str> {
    operations
        .iter()
        .map(|operation| operation.plan_unit().unit.id.as_str())
        .collect()
}

#[test]
fn requirements_precede_dependents() {
    let plan = vec![add("app", &["lib"]), add("lib", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["lib", "app"]);
}

#[test]
fn chain_orders_transitively() {
    let plan = vec![add("top", &["mid"]), add("mid", &["base"]), add("base", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["base", "mid", "top"]);
}

#[test]
fn independent_units_keep_input_order() {
    let plan = vec![add("b", &[]), add("a", &[]), add("c", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["b", "a", "c"]);
}

#[test]
fn removals_trail_additions_in_input_order() {
    let plan = vec![
        remove("old-b"),
        add("app", &["lib"]),
        remove("old-a"),
        add("lib", &[]),
    ];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["lib", "app", "old-b", "old-a"]);
    assert!(ordered[2].is_removal() && ordered[3].is_removal());
}

#[test]
fn updates_are_ordered_like_additions() {
    let plan = vec![update("app", &["lib"]), add("lib", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["lib", "app"]);
}

#[test]
fn cycle_falls_back_to_input_order() {
    let plan = vec![
        add("a", &["b"]),
        add("b", &["a"]),
        add("standalone", &[]),
        remove("gone"),
    ];
    let ordered = order_plan(plan, id_match);
    // No partial reordering: every addition keeps its input position.
    assert_eq!(ids(&ordered), vec!["a", "b", "standalone", "gone"]);
}

#[test]
fn ambiguous_requirement_is_not_an_edge() {
    // Both fragments satisfy the requirement, so it cannot order "app".
    let satisfies = |requirement: &str, candidate: &PlanUnit| {
        requirement == "fragment" && candidate.unit.id.starts_with("fragment")
    };
    let plan = vec![
        add("app", &["fragment"]),
        add("fragment-linux", &[]),
        add("fragment-win32", &[]),
    ];
    let ordered = order_plan(plan, satisfies);
    assert_eq!(ids(&ordered), vec!["app", "fragment-linux", "fragment-win32"]);
}

#[test]
fn self_reference_is_not_an_edge() {
    let plan = vec![add("self", &["self"]), add("other", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["self", "other"]);
}

#[test]
fn requirement_outside_candidates_is_ignored() {
    let plan = vec![add("app", &["already-installed"]), add("lib", &[])];
    let ordered = order_plan(plan, id_match);
    assert_eq!(ids(&ordered), vec!["app", "lib"]);
}

#[test]
fn empty_plan_stays_empty() {
    let ordered = order_plan(Vec::new(), id_match);
    assert!(ordered.is_empty());
}
