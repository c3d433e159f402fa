//! Tests for the solver context, graph construction and flow consolidation.

use std::sync::Arc;

use ficsplan::builder::{
    add_input_resource_constraints, add_output_production_constraints, compute_production_constraints,
};
use ficsplan::consolidate::consolidate_flows;
use ficsplan::context::{Comparison, Constraint, Objective, SolverContext};
use ficsplan::data::Catalog;
use ficsplan::graph::{Consumer, EdgeKind, Producer, VarId};
use ficsplan::models::{InputConstraint, NodeOverride, ProductionInput, ProductionRequest, SolverSettings};
use ficsplan::PlannerError;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::embedded().expect("Failed to load embedded catalog"))
}

fn context(request: ProductionRequest) -> SolverContext {
    SolverContext::new(catalog(), SolverSettings::default(), request)
}

fn item(ctx: &SolverContext, id: &str) -> usize {
    ctx.catalog().item_index(id).unwrap()
}

fn recipe(ctx: &SolverContext, id: &str) -> usize {
    ctx.catalog().recipe_index(id).unwrap()
}

#[test]
fn test_aliases_are_stable_and_reversible() {
    let mut ctx = context(ProductionRequest::new());
    let a = VarId::Resource { resource: 3 };
    let b = VarId::Energy { recipe: 7 };

    assert_eq!(ctx.encode_var(a), "x0");
    assert_eq!(ctx.encode_var(b), "x1");
    assert_eq!(ctx.encode_var(a), "x0", "Encoding twice returns the same alias");
    assert_eq!(ctx.decode_var("x1"), Some(b));
    assert_eq!(ctx.decode_var("x9"), None);
}

#[test]
fn test_structural_names_are_unique() {
    let vars = [
        VarId::Resource { resource: 1 },
        VarId::RawWorld { resource: 1 },
        VarId::RawInput { resource: 1, input: 0 },
        VarId::RecipeOutput { resource: 1, recipe: 2 },
        VarId::Original { resource: 1, recipe: 2 },
        VarId::Amplified { resource: 1, recipe: 2 },
        VarId::RecipeIngredient { resource: 1, recipe: 2 },
        VarId::Byproduct { resource: 1 },
        VarId::Energy { recipe: 2 },
        VarId::Area { recipe: 2 },
        VarId::Link { resource: 1, from: Producer::Recipe(2), to: Consumer::Recipe(3) },
        VarId::Link { resource: 1, from: Producer::World, to: Consumer::Byproduct },
    ];
    let names: std::collections::HashSet<String> = vars.iter().map(|v| v.to_string()).collect();
    assert_eq!(names.len(), vars.len());
    assert_eq!(vars[3].to_string(), "out_1_2");
    assert_eq!(vars[10].to_string(), "link_1_r2_r3");
    assert_eq!(vars[11].to_string(), "link_1_w_b");
}

#[test]
fn test_world_resource_max_honors_overrides_and_blocks() {
    let mut request = ProductionRequest::new().with_blocked_resource("Coal");
    request.resources_amount.insert("OreIron".to_string(), 500.0);
    let ctx = context(request);

    assert_eq!(ctx.world_resource_max_if_allowed(item(&ctx, "OreIron")), Some(500.0));
    assert_eq!(ctx.world_resource_max_if_allowed(item(&ctx, "OreCopper")), Some(36900.0));
    assert_eq!(ctx.world_resource_max_if_allowed(item(&ctx, "Coal")), None);
    assert_eq!(ctx.world_resource_max_if_allowed(item(&ctx, "IronIngot")), None);
}

#[test]
fn test_recipe_filters() {
    let request = ProductionRequest::new()
        .with_allowed_recipes(&["IngotIron", "PackagedWater", "NoSuchRecipe"])
        .with_blocked_building("Packager");
    let ctx = context(request);

    assert!(ctx.is_recipe_allowed(recipe(&ctx, "IngotIron")));
    assert!(!ctx.is_recipe_allowed(recipe(&ctx, "IronPlate")));
    assert!(ctx.is_recipe_produced_in_allowed_building(recipe(&ctx, "IngotIron")));
    assert!(!ctx.is_recipe_produced_in_allowed_building(recipe(&ctx, "PackagedWater")));

    let open = context(ProductionRequest::new());
    assert!(open.is_recipe_allowed(recipe(&open, "IronPlate")), "No allow-list allows everything");
}

#[test]
fn test_set_bounds_keeps_intersection() {
    let mut ctx = context(ProductionRequest::new());
    let var = VarId::RawWorld { resource: 0 };
    ctx.set_bounds(var, 0.0, Some(100.0));
    ctx.set_bounds(var, 5.0, Some(200.0));
    ctx.set_bounds(var, 0.0, None);
    let bounds = ctx.bounds(var).unwrap();
    assert_eq!(bounds.lower, 5.0);
    assert_eq!(bounds.upper, Some(100.0));
}

#[test]
fn test_formulate_requires_objective() {
    let mut ctx = context(ProductionRequest::new());
    ctx.add_constraint(Constraint::equal(vec![(VarId::Resource { resource: 0 }, 1.0)], 1.0));
    assert!(matches!(ctx.formulate_problem(), Err(PlannerError::MissingObjective)));
}

#[test]
fn test_formulate_problem_text() {
    let mut ctx = context(ProductionRequest::new());
    let world = VarId::RawWorld { resource: 0 };
    let aggregator = VarId::Resource { resource: 0 };
    ctx.set_objective(Objective {
        terms: vec![(world, 2.5)],
    });
    ctx.add_constraint(Constraint::equal(vec![(world, 1.0), (aggregator, -1.0)], 0.0));
    ctx.add_constraint(Constraint::new(vec![(aggregator, 1.0)], Comparison::Ge, 12.0));
    ctx.set_bounds(world, 0.0, Some(92100.0));
    ctx.set_bounds(aggregator, 1.5, None);

    let text = ctx.formulate_problem().unwrap();
    let expected = "MINIMIZE\n obj: + 2.5 x0\nSUBJECT TO\n c0: + 1 x0 - 1 x1 = 0\n c1: + 1 x1 >= 12\nBOUNDS\n x1 >= 1.5\n 0 <= x0 <= 92100\nEND\n";
    // Bounds are listed in variable order: aggregators before world nodes
    assert_eq!(text, expected);

    let readable = ctx.describe_problem().unwrap();
    assert!(readable.contains("world_OreIron"), "got:\n{}", readable);
    assert!(readable.contains("res_OreIron"), "got:\n{}", readable);
}

#[test]
fn test_input_constraints() {
    let mut ctx = context(ProductionRequest::new());
    let ingot = item(&ctx, "SteelIngot");
    let exact = ProductionInput {
        resource: "SteelIngot".to_string(),
        amount: 60.0,
        constraint: InputConstraint::Exact,
    };
    let max = ProductionInput {
        resource: "SteelIngot".to_string(),
        amount: 30.0,
        constraint: InputConstraint::Max,
    };
    let unknown = ProductionInput {
        resource: "Unobtainium".to_string(),
        amount: 30.0,
        constraint: InputConstraint::Max,
    };
    add_input_resource_constraints(&mut ctx, &exact, 0);
    add_input_resource_constraints(&mut ctx, &max, 1);
    add_input_resource_constraints(&mut ctx, &unknown, 2);

    let first = VarId::RawInput { resource: ingot, input: 0 };
    let second = VarId::RawInput { resource: ingot, input: 1 };
    assert_eq!(ctx.graph().producers_of(VarId::Resource { resource: ingot }), vec![first, second]);
    assert_eq!(ctx.constraints(), &[Constraint::equal(vec![(first, 1.0)], 60.0)]);
    assert_eq!(ctx.bounds(second).unwrap().upper, Some(30.0));
    assert_eq!(ctx.world_input_vars().len(), 2, "Unknown inputs are skipped");
}

#[test]
fn test_cyclic_recipe_graph_terminates() {
    let mut ctx = context(ProductionRequest::new());
    let water = item(&ctx, "Water");
    compute_production_constraints(&mut ctx, water);

    // Water -> AluminumScrap -> AluminaSolution -> Water is a cycle, as is
    // Water -> UnpackageWater -> PackagedWater -> Water.
    for id in ["AluminumScrap", "AluminaSolution", "UnpackageWater", "PackagedWater", "FluidCanister", "Plastic"] {
        assert!(ctx.is_visited(recipe(&ctx, id)), "{} should be expanded", id);
    }
    assert!(!ctx.is_visited(recipe(&ctx, "IngotIron")));
    assert!(!ctx.mark_visited(recipe(&ctx, "AluminumScrap")), "Recipes are expanded once");

    let world = VarId::RawWorld { resource: water };
    assert!(ctx.graph().contains(world));
    assert_eq!(ctx.bounds(world).unwrap().upper, Some(1e9));
}

#[test]
fn test_blocked_recipes_are_not_expanded() {
    let request = ProductionRequest::new()
        .with_allowed_recipes(&["IronPlate", "IngotIron"])
        .with_blocked_resource("OreIron");
    let mut ctx = context(request);
    let plate = item(&ctx, "IronPlate");
    compute_production_constraints(&mut ctx, plate);

    let visited: Vec<&str> = ctx
        .visited_recipes()
        .map(|r| ctx.catalog().recipe(r).id.as_str())
        .collect();
    assert_eq!(visited, vec!["IngotIron", "IronPlate"]);
    assert!(ctx.world_vars().is_empty(), "Blocked ore has no world node");
}

#[test]
fn test_recipe_expansion_variables() {
    let request = ProductionRequest::new().with_node(
        "SteelBeam",
        NodeOverride {
            somersloops: Some(1),
            overclock: None,
        },
    );
    let mut ctx = context(request);
    let plate = item(&ctx, "SteelPlate");
    let ingot = item(&ctx, "SteelIngot");
    let beam = recipe(&ctx, "SteelBeam");
    compute_production_constraints(&mut ctx, plate);

    for var in [
        VarId::RecipeOutput { resource: plate, recipe: beam },
        VarId::Original { resource: plate, recipe: beam },
        VarId::Amplified { resource: plate, recipe: beam },
        VarId::RecipeIngredient { resource: ingot, recipe: beam },
        VarId::Energy { recipe: beam },
        VarId::Area { recipe: beam },
        VarId::Byproduct { resource: plate },
    ] {
        assert!(ctx.graph().contains(var), "{} should be in the graph", var);
    }

    let original = VarId::Original { resource: plate, recipe: beam };
    let ingredient = VarId::RecipeIngredient { resource: ingot, recipe: beam };
    assert!(
        ctx.constraints()
            .contains(&Constraint::equal(vec![(ingredient, 1.0), (original, -4.0)], 0.0)),
        "Ingredients scale with the unamplified output"
    );
}

#[test]
fn test_unproducible_output_is_unmet() {
    let mut ctx = context(ProductionRequest::new());
    let protein = item(&ctx, "AlienProtein");
    let output = ficsplan::models::ProductionOutput {
        resource: "AlienProtein".to_string(),
        amount: 10.0,
        objective: Default::default(),
    };
    add_output_production_constraints(&mut ctx, &output, 0);

    assert_eq!(ctx.unmet_outputs(), &[protein]);
    assert!(ctx.constraints().is_empty(), "No target is emitted for an unmet output");
}

#[test]
fn test_consolidation_links_and_packaging_suppression() {
    let mut ctx = context(ProductionRequest::new());
    let packaged = item(&ctx, "PackagedWater");
    let water = item(&ctx, "Water");
    let pack = recipe(&ctx, "PackagedWater");
    let unpack = recipe(&ctx, "UnpackageWater");
    compute_production_constraints(&mut ctx, packaged);
    consolidate_flows(&mut ctx).unwrap();

    let links: Vec<VarId> = ctx
        .graph()
        .edges()
        .filter_map(|e| match e.kind {
            EdgeKind::Link(link) => Some(link),
            EdgeKind::Flow => None,
        })
        .collect();

    assert!(!links.contains(&VarId::Link {
        resource: packaged,
        from: Producer::Recipe(pack),
        to: Consumer::Recipe(unpack),
    }));
    assert!(!links.contains(&VarId::Link {
        resource: water,
        from: Producer::Recipe(unpack),
        to: Consumer::Recipe(pack),
    }));
    assert!(links.contains(&VarId::Link {
        resource: water,
        from: Producer::World,
        to: Consumer::Recipe(pack),
    }));
    assert!(links.contains(&VarId::Link {
        resource: packaged,
        from: Producer::Recipe(pack),
        to: Consumer::Byproduct,
    }));
}

#[test]
fn test_consolidation_pins_unsupplied_resources() {
    let request = ProductionRequest::new().with_blocked_resource("OreIron");
    let mut ctx = context(request);
    let ore = item(&ctx, "OreIron");
    let ingot = item(&ctx, "IronIngot");
    let smelt = recipe(&ctx, "IngotIron");
    compute_production_constraints(&mut ctx, ingot);
    consolidate_flows(&mut ctx).unwrap();

    let aggregator = VarId::Resource { resource: ore };
    let consumer = VarId::RecipeIngredient { resource: ore, recipe: smelt };
    assert!(ctx.constraints().contains(&Constraint::equal(vec![(aggregator, 1.0)], 0.0)));
    assert!(ctx.constraints().contains(&Constraint::equal(vec![(consumer, 1.0)], 0.0)));
    assert!(ctx
        .constraints()
        .contains(&Constraint::equal(vec![(VarId::Byproduct { resource: ore }, 1.0)], 0.0)));
}

#[test]
fn test_consolidation_rejects_unexpected_node() {
    let mut ctx = context(ProductionRequest::new());
    ctx.graph_mut().add_edge(
        VarId::Energy { recipe: 0 },
        VarId::Resource { resource: 0 },
        EdgeKind::Flow,
    );
    assert!(matches!(consolidate_flows(&mut ctx), Err(PlannerError::Inconsistent(_))));
}
