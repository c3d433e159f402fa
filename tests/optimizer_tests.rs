//! Tests for the production planning pipeline.

use std::sync::Arc;

use ficsplan::data::Catalog;
use ficsplan::decode::{NodeKind, SolveStatus};
use ficsplan::graph::VarId;
use ficsplan::lp::{EngineError, LpEngine, LpResult};
use ficsplan::models::{InputConstraint, NodeOverride, ObjectiveMode, ProductionRequest, SolverSettings};
use ficsplan::optimizer::Planner;
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-4;

fn planner() -> Planner {
    Planner::new(Arc::new(Catalog::embedded().expect("Failed to load embedded catalog")))
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "{}: expected {}, got {}",
        what,
        expected,
        actual
    );
}

fn machine_count(node: &ficsplan::decode::SolutionNode) -> f64 {
    match node.kind {
        NodeKind::Machine { machines, .. } => machines,
        _ => panic!("{} is not a machine", node.id),
    }
}

#[test]
fn test_steel_beams_from_available_ingots() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 5.0)
        .with_input("SteelIngot", 90.0, InputConstraint::Max);

    let result = planner().solve(&request).unwrap();
    assert_eq!(result.status, SolveStatus::Optimal);

    let beam = result.machine("SteelBeam").expect("SteelBeam should run");
    assert_close(beam.value, 5.0, "SteelBeam output");
    assert_close(machine_count(beam), 5.0 / 15.0, "SteelBeam machines");

    let input = result.input_node("SteelIngot").expect("Input should be drawn");
    assert_close(input.value, 20.0, "SteelIngot drawn");
    assert!(result.machine("IngotSteel").is_none(), "Available ingots are used first");

    let delivered = result.byproduct("SteelPlate").unwrap();
    assert_close(delivered.value, 5.0, "SteelPlate delivered");
    assert!(matches!(delivered.kind, NodeKind::Byproduct { requested: true, .. }));
}

#[test]
fn test_flow_edges_connect_plan_nodes() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 5.0)
        .with_input("SteelIngot", 90.0, InputConstraint::Max);
    let result = planner().solve(&request).unwrap();

    let feed = result
        .edges
        .iter()
        .find(|e| e.from == "input:SteelIngot:0" && e.to == "machine:SteelBeam")
        .expect("Input should feed the beam machine");
    assert_eq!(feed.resource, "SteelIngot");
    assert_close(feed.value, 20.0, "SteelIngot flow");

    let delivery = result
        .edges
        .iter()
        .find(|e| e.from == "machine:SteelBeam" && e.to == "byproduct:SteelPlate")
        .expect("Beam machine should deliver the output");
    assert_close(delivery.value, 5.0, "SteelPlate flow");
}

#[test]
fn test_ficsite_prefers_aluminum_route() {
    let request = ProductionRequest::new().with_output("FicsiteIngot", 10.0);
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());

    let sam = result.machine("SAMIngot").expect("Reanimated SAM should be produced");
    assert_close(sam.value, 20.0, "SAMIngot output");
    assert!(result.machine("FicsiteIngot_AL").is_some());
    assert!(result.machine("FicsiteIngot_Iron").is_none());
    assert_close(result.world_node("SAM").unwrap().value, 80.0, "SAM extracted");
}

#[test]
fn test_wet_concrete_from_declared_stone() {
    let request = ProductionRequest::new()
        .with_maximized_output("Cement", 0.0)
        .with_input("Stone", 30.0, InputConstraint::Max)
        .with_blocked_resource("Stone")
        .with_allowed_recipes(&["Concrete", "Alternate_WetConcrete"]);

    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());
    assert!(result.world_node("Stone").is_none(), "Blocked stone is not extracted");
    assert_close(result.input_node("Stone").unwrap().value, 30.0, "Stone input");
    assert_close(result.byproduct("Cement").unwrap().value, 20.0, "Cement produced");
    assert_close(result.machine("Alternate_WetConcrete").unwrap().value, 20.0, "Wet concrete output");
    assert!(result.machine("Concrete").is_none());
}

#[test]
fn test_unproducible_output_is_reported() {
    let request = ProductionRequest::new().with_output("AlienProtein", 10.0);
    let result = planner().solve(&request).unwrap();

    assert!(result.is_optimal());
    assert!(result.byproduct("AlienProtein").is_none());
    let unmet = result.unmet_outputs();
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].resource, "AlienProtein");
    assert_eq!(unmet[0].requested, 10.0);
    assert_close(unmet[0].solved, 0.0, "AlienProtein solved");
}

#[test]
fn test_blocked_building_leaves_output_unmet() {
    let request = ProductionRequest::new()
        .with_output("SteelIngot", 10.0)
        .with_blocked_building("FoundryMk1");
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());
    assert_eq!(result.unmet_outputs().len(), 1);
}

#[test]
fn test_insufficient_exact_input_is_infeasible() {
    let request = ProductionRequest::new()
        .with_output("IronIngot", 30.0)
        .with_input("OreIron", 10.0, InputConstraint::Exact)
        .with_blocked_resource("OreIron");
    let result = planner().solve(&request).unwrap();
    assert_eq!(result.status, SolveStatus::Infeasible);
    assert!(result.nodes.is_empty());
    assert!(result.raw.is_some());
}

#[test]
fn test_resource_cap_override() {
    let mut request = ProductionRequest::new().with_output("IronIngot", 100.0);
    request.resources_amount.insert("OreIron".to_string(), 50.0);
    let result = planner().solve(&request).unwrap();
    assert_eq!(result.status, SolveStatus::Infeasible);
}

#[test]
fn test_minimize_power_and_area() {
    let base = ProductionRequest::new()
        .with_output("SteelPlate", 15.0)
        .with_input("SteelIngot", 60.0, InputConstraint::Exact);

    let power = planner()
        .solve(&base.clone().with_objective(ObjectiveMode::MinimizePower))
        .unwrap();
    assert!(power.is_optimal());
    assert_close(power.total_power(), 4.0, "Power of one constructor");

    let area = planner()
        .solve(&base.with_objective(ObjectiveMode::MinimizeArea))
        .unwrap();
    assert!(area.is_optimal());
    assert_close(area.total_area(), 80.0, "Area of one constructor");
}

#[test]
fn test_overclock_scales_machines_and_power() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 15.0)
        .with_input("SteelIngot", 60.0, InputConstraint::Exact)
        .with_node(
            "SteelBeam",
            NodeOverride {
                somersloops: None,
                overclock: Some(200.0),
            },
        );
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());

    let beam = result.machine("SteelBeam").unwrap();
    assert_close(machine_count(beam), 0.5, "Machines at 200%");
    // 0.5 machines * 4 MW * 2^1.321928
    assert!((result.total_power() - 5.0).abs() < 1e-3, "got {}", result.total_power());
}

#[test]
fn test_somersloops_amplify_output() {
    let request = ProductionRequest::new().with_output("SteelPlate", 15.0).with_node(
        "SteelBeam",
        NodeOverride {
            somersloops: Some(1),
            overclock: None,
        },
    );
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());

    let catalog = result.context().catalog();
    let plate = catalog.item_index("SteelPlate").unwrap();
    let ingot = catalog.item_index("SteelIngot").unwrap();
    let beam = catalog.recipe_index("SteelBeam").unwrap();

    let original = result.value_of(VarId::Original { resource: plate, recipe: beam }).unwrap();
    let amplified = result.value_of(VarId::Amplified { resource: plate, recipe: beam }).unwrap();
    let consumed = result
        .value_of(VarId::RecipeIngredient { resource: ingot, recipe: beam })
        .unwrap();
    assert_close(original, 7.5, "Original output");
    assert_close(amplified, 7.5, "Amplified output");
    assert_close(consumed, 30.0, "Ingots consumed");

    let node = result.machine("SteelBeam").unwrap();
    assert_close(node.value, 15.0, "Total output");
    assert_close(machine_count(node), 0.5, "Amplified machines");
    match node.kind {
        NodeKind::Machine { somersloops, .. } => assert_eq!(somersloops, 1),
        _ => unreachable!(),
    }
    let energy = result.value_of(VarId::Energy { recipe: beam }).unwrap();
    assert_close(energy, 8.0, "Doubled output quadruples power per machine");
}

#[test]
fn test_maximized_outputs_grow_in_lockstep() {
    let request = ProductionRequest::new()
        .with_maximized_output("IronPlate", 10.0)
        .with_maximized_output("IronRod", 10.0)
        .with_input("OreIron", 90.0, InputConstraint::Max)
        .with_blocked_resource("OreIron");

    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());
    assert_close(result.byproduct("IronPlate").unwrap().value, 36.0, "Iron plates");
    assert_close(result.byproduct("IronRod").unwrap().value, 36.0, "Iron rods");
}

#[test]
fn test_lockstep_can_be_disabled() {
    let request = ProductionRequest::new()
        .with_maximized_output("IronPlate", 10.0)
        .with_maximized_output("IronRod", 10.0)
        .with_input("OreIron", 90.0, InputConstraint::Max)
        .with_blocked_resource("OreIron");
    let settings = SolverSettings {
        lockstep_maximized_outputs: false,
        ..SolverSettings::default()
    };

    let result = planner().with_settings(settings).solve(&request).unwrap();
    assert!(result.is_optimal());
    // Rods yield more units per ingot, plates stay at their floor
    assert_close(result.byproduct("IronPlate").unwrap().value, 10.0, "Iron plates");
    assert_close(result.byproduct("IronRod").unwrap().value, 75.0, "Iron rods");
}

#[test]
fn test_packaging_loop_is_not_linked() {
    let request = ProductionRequest::new().with_output("PackagedWater", 10.0);
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());
    assert_close(result.machine("PackagedWater").unwrap().value, 10.0, "Packaged water");
    assert!(result
        .edges
        .iter()
        .all(|e| !(e.from == "machine:UnpackageWater" && e.to == "machine:PackagedWater")));
}

#[test]
fn test_recipe_penalty_changes_choice() {
    let request = ProductionRequest::new().with_output("SteelIngot", 30.0);
    let plain = planner().solve(&request).unwrap();
    assert!(plain.machine("Alternate_IngotSteel_1").is_some());
    assert!(plain.machine("IngotSteel").is_none());

    let mut penalized = request.clone();
    penalized
        .recipe_penalties
        .insert("Alternate_IngotSteel_1".to_string(), 1.0);
    let result = planner().solve(&penalized).unwrap();
    assert_close(result.machine("IngotSteel").unwrap().value, 30.0, "Standard steel");
    assert!(result.machine("Alternate_IngotSteel_1").is_none());
}

#[test]
fn test_duplicate_outputs_are_merged() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 2.0)
        .with_output("SteelPlate", 3.0);
    let result = planner().solve(&request).unwrap();
    assert!(result.is_optimal());
    assert_eq!(result.outputs.len(), 1);
    assert_close(result.byproduct("SteelPlate").unwrap().value, 5.0, "Merged output");
}

#[test]
fn test_solve_is_idempotent() {
    let request = ProductionRequest::new().with_output("FicsiteIngot", 10.0);
    let first = planner().solve(&request).unwrap();
    let second = planner().solve(&request).unwrap();
    assert_eq!(first.raw, second.raw);
    assert_eq!(first.nodes, second.nodes);
}

#[test]
fn test_flow_is_conserved_at_every_resource() {
    let request = ProductionRequest::new().with_output("FicsiteIngot", 10.0);
    let result = planner().solve(&request).unwrap();
    let graph = result.graph();
    let value = |var| graph.value(var).unwrap_or(0.0);

    for node in graph.nodes() {
        let VarId::Resource { resource } = node.var else {
            continue;
        };
        let total = value(node.var);
        let produced: f64 = graph.producers_of(node.var).into_iter().map(value).sum();
        let consumed: f64 = graph.consumers_of(node.var).into_iter().map(value).sum();
        let leftover = value(VarId::Byproduct { resource });
        assert!((produced - total).abs() < 1e-5, "supply mismatch at {}", node.var);
        assert!((consumed + leftover - total).abs() < 1e-5, "demand mismatch at {}", node.var);
    }
}

#[test]
fn test_report_serializes() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 5.0)
        .with_input("SteelIngot", 90.0, InputConstraint::Max);
    let report = planner().solve(&request).unwrap().report();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains(r#""status":"Optimal""#), "got {}", json);
    assert!(json.contains("machine:SteelBeam"));
    assert!(json.contains("totalPower"));
}

struct BrokenEngine;

impl LpEngine for BrokenEngine {
    fn solve(&self, _problem: &str) -> Result<LpResult, EngineError> {
        Err(EngineError::Malformed {
            line: 1,
            message: "engine unavailable".to_string(),
        })
    }
}

#[test]
fn test_engine_failure_yields_failed_result() {
    let catalog = Arc::new(Catalog::embedded().unwrap());
    let planner = Planner::with_engine(catalog, BrokenEngine);
    let request = ProductionRequest::new().with_output("SteelPlate", 5.0);

    let result = planner.solve(&request).expect("Engine failures are not errors");
    assert_eq!(result.status, SolveStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("engine unavailable"));
    assert!(result.nodes.is_empty());
    assert_eq!(result.outputs.len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn exact_inputs_are_drawn_in_full(amount in 1.0f64..200.0) {
        let request = ProductionRequest::new()
            .with_output("SteelPlate", 5.0)
            .with_input("SteelIngot", amount, InputConstraint::Exact);
        let result = planner().solve(&request).unwrap();
        prop_assert!(result.is_optimal());
        let drawn = result.input_node("SteelIngot").map(|n| n.value).unwrap_or(0.0);
        prop_assert!((drawn - amount).abs() < TOLERANCE, "drew {} of {}", drawn, amount);
    }

    #[test]
    fn max_inputs_are_never_exceeded(cap in 1.0f64..100.0) {
        let request = ProductionRequest::new()
            .with_output("SteelPlate", 5.0)
            .with_input("SteelIngot", cap, InputConstraint::Max);
        let result = planner().solve(&request).unwrap();
        prop_assert!(result.is_optimal());
        let catalog = result.context().catalog();
        let ingot = catalog.item_index("SteelIngot").unwrap();
        let drawn = result.value_of(VarId::RawInput { resource: ingot, input: 0 }).unwrap_or(0.0);
        prop_assert!(drawn <= cap + TOLERANCE, "drew {} above cap {}", drawn, cap);
        prop_assert!((drawn - cap.min(20.0)).abs() < TOLERANCE, "drew {} with cap {}", drawn, cap);
    }
}
