//! Tests for data models.

use ficsplan::data::Catalog;
use ficsplan::models::{
    InputConstraint, NodeOverride, ObjectiveMode, OutputObjective, ProductionRequest, SolverSettings,
};

#[test]
fn test_per_minute_rates() {
    let catalog = Catalog::embedded().unwrap();
    let beam = catalog.recipe(catalog.recipe_index("SteelBeam").unwrap());
    // 4 ingots -> 1 beam every 4 seconds
    assert_eq!(beam.per_minute(beam.ingredients[0].amount), 60.0);
    assert_eq!(beam.per_minute(beam.products[0].amount), 15.0);

    let scrap = catalog.recipe(catalog.recipe_index("AluminumScrap").unwrap());
    assert_eq!(scrap.per_minute(scrap.products[0].amount), 360.0);
}

#[test]
fn test_primary_product_is_first() {
    let catalog = Catalog::embedded().unwrap();
    let plastic = catalog.recipe(catalog.recipe_index("Plastic").unwrap());
    let primary = plastic.primary_product().unwrap();
    assert_eq!(catalog.item(primary.item).id, "Plastic");
    assert_eq!(plastic.products.len(), 2);
}

#[test]
fn test_packaging_pair_is_inverse() {
    let catalog = Catalog::embedded().unwrap();
    let pack = catalog.recipe(catalog.recipe_index("PackagedWater").unwrap());
    let unpack = catalog.recipe(catalog.recipe_index("UnpackageWater").unwrap());
    assert!(pack.is_inverse_of(unpack));
    assert!(unpack.is_inverse_of(pack));
    assert!(!pack.is_inverse_of(pack), "A recipe is never its own inverse");
}

#[test]
fn test_unrelated_recipes_are_not_inverse() {
    let catalog = Catalog::embedded().unwrap();
    let ingot = catalog.recipe(catalog.recipe_index("IngotIron").unwrap());
    let plate = catalog.recipe(catalog.recipe_index("IronPlate").unwrap());
    let solution = catalog.recipe(catalog.recipe_index("AluminaSolution").unwrap());
    let scrap = catalog.recipe(catalog.recipe_index("AluminumScrap").unwrap());
    assert!(!ingot.is_inverse_of(plate));
    // Alumina solution and scrap share water but are not a packaging pair
    assert!(!solution.is_inverse_of(scrap));
}

#[test]
fn test_clock_factor_is_clamped() {
    let node = |overclock| NodeOverride {
        somersloops: None,
        overclock: Some(overclock),
    };
    assert_eq!(node(100.0).clock_factor(), 1.0);
    assert_eq!(node(50.0).clock_factor(), 0.5);
    assert_eq!(node(400.0).clock_factor(), 2.5);
    assert_eq!(node(0.0).clock_factor(), 0.01);
    assert_eq!(node(f64::NAN).clock_factor(), 1.0);
}

#[test]
fn test_somersloops_clamped_to_slots() {
    let node = NodeOverride {
        somersloops: Some(4),
        overclock: None,
    };
    assert_eq!(node.somersloops_used(2), 2);
    assert_eq!(node.somersloops_used(0), 0);
    assert_eq!(NodeOverride::default().somersloops_used(4), 0);
}

#[test]
fn test_request_from_json() {
    let json = r#"{
        "inputs": [{"resource": "Stone", "amount": 30, "constraint": "exact"}],
        "outputs": [
            {"resource": "Cement", "amount": 0, "objective": "max"},
            {"resource": "IronPlate", "amount": 10}
        ],
        "allowedRecipes": ["Concrete"],
        "blockedResources": ["Stone"],
        "blockedBuildings": ["Packager"],
        "resourcesAmount": {"OreIron": 500},
        "objective": "minimize_area",
        "nodes": {"Concrete": {"somersloops": 1, "overclock": 150}},
        "recipePenalties": {"Concrete": 2.5}
    }"#;

    let request = ProductionRequest::from_json(json).expect("Failed to parse request");
    assert_eq!(request.inputs[0].constraint, InputConstraint::Exact);
    assert_eq!(request.outputs[0].objective, OutputObjective::Max);
    assert_eq!(request.outputs[1].objective, OutputObjective::Default);
    assert_eq!(request.allowed_recipes, Some(vec!["Concrete".to_string()]));
    assert_eq!(request.blocked_resources, Some(vec!["Stone".to_string()]));
    assert_eq!(request.blocked_buildings, Some(vec!["Packager".to_string()]));
    assert_eq!(request.resources_amount.get("OreIron"), Some(&500.0));
    assert_eq!(request.objective, ObjectiveMode::MinimizeArea);
    assert_eq!(request.nodes["Concrete"].somersloops, Some(1));
    assert_eq!(request.nodes["Concrete"].overclock, Some(150.0));
    assert_eq!(request.recipe_penalties["Concrete"], 2.5);
}

#[test]
fn test_request_defaults() {
    let request = ProductionRequest::from_json("{}").unwrap();
    assert!(request.inputs.is_empty());
    assert!(request.outputs.is_empty());
    assert!(request.allowed_recipes.is_none());
    assert_eq!(request.objective, ObjectiveMode::MinimizeResources);

    let request = ProductionRequest::from_json(r#"{"inputs": [{"resource": "Coal", "amount": 5}]}"#).unwrap();
    assert_eq!(request.inputs[0].constraint, InputConstraint::Max, "Inputs default to max");
}

#[test]
fn test_request_rejects_bad_json() {
    assert!(ProductionRequest::from_json("{not json").is_err());
    assert!(ProductionRequest::from_json(r#"{"objective": "minimize_fun"}"#).is_err());
}

#[test]
fn test_request_builders() {
    let request = ProductionRequest::new()
        .with_output("SteelPlate", 5.0)
        .with_maximized_output("SteelPipe", 1.0)
        .with_input("SteelIngot", 90.0, InputConstraint::Max)
        .with_blocked_resource("OreIron")
        .with_blocked_building("Packager")
        .with_allowed_recipes(&["SteelBeam", "SteelPipe"])
        .with_objective(ObjectiveMode::MinimizePower);

    assert_eq!(request.outputs.len(), 2);
    assert_eq!(request.outputs[1].objective, OutputObjective::Max);
    assert_eq!(request.inputs[0].amount, 90.0);
    assert_eq!(request.blocked_resources.as_deref(), Some(&["OreIron".to_string()][..]));
    assert_eq!(request.allowed_recipes.as_ref().map(Vec::len), Some(2));
    assert_eq!(request.objective, ObjectiveMode::MinimizePower);
}

#[test]
fn test_settings_defaults_and_partial_json() {
    let defaults = SolverSettings::default();
    assert_eq!(defaults.epsilon, 1e-6);
    assert_eq!(defaults.resource_weight_scale, 1000.0);
    assert_eq!(defaults.fallback_weight, 100.0);
    assert!(defaults.lockstep_maximized_outputs);

    let settings: SolverSettings = serde_json::from_str(r#"{"fallbackWeight": 5, "lockstepMaximizedOutputs": false}"#).unwrap();
    assert_eq!(settings.fallback_weight, 5.0);
    assert!(!settings.lockstep_maximized_outputs);
    assert_eq!(settings.input_discount, defaults.input_discount);
}
