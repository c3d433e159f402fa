//! Constraint Builder.
//!
//! Expands the recipe graph reachable from the requested outputs into
//! solver variables and proportionality constraints. The expansion is a
//! depth-first walk over resources; every recipe is expanded at most once,
//! which terminates the walk on cyclic recipe graphs.

use crate::context::{Comparison, Constraint, RequestedOutput, SolverContext};
use crate::graph::{EdgeKind, VarId};
use crate::models::{InputConstraint, OutputObjective, ProductionInput, ProductionOutput, POWER_CLOCK_EXPONENT};

/// Registers a declared input as a supply of its resource.
///
/// `exact` inputs must be drawn in full; `max` inputs are bounded above.
/// Inputs naming an unknown item or carrying a negative or non-finite amount
/// are skipped.
pub fn add_input_resource_constraints(ctx: &mut SolverContext, input: &ProductionInput, index: usize) {
    let Some(resource) = ctx.catalog().item_index(&input.resource) else {
        tracing::warn!(resource = %input.resource, index, "skipping input with unknown resource");
        return;
    };
    if !input.amount.is_finite() || input.amount < 0.0 {
        tracing::warn!(resource = %input.resource, amount = input.amount, "skipping input with invalid amount");
        return;
    }

    let raw = VarId::RawInput { resource, input: index };
    ctx.graph_mut()
        .add_edge(raw, VarId::Resource { resource }, EdgeKind::Flow);

    match input.constraint {
        InputConstraint::Exact => ctx.add_constraint(Constraint::equal(vec![(raw, 1.0)], input.amount)),
        InputConstraint::Max => ctx.set_bounds(raw, 0.0, Some(input.amount)),
    }
}

/// Registers a requested output and expands everything that can produce it.
///
/// The output's byproduct variable carries the delivered amount. When no
/// producer of the resource survives expansion the target is not emitted;
/// the output is recorded as unmet instead.
pub fn add_output_production_constraints(ctx: &mut SolverContext, output: &ProductionOutput, index: usize) {
    let Some(resource) = ctx.catalog().item_index(&output.resource) else {
        tracing::warn!(resource = %output.resource, index, "skipping output with unknown resource");
        return;
    };
    if !output.amount.is_finite() || output.amount < 0.0 {
        tracing::warn!(resource = %output.resource, amount = output.amount, "skipping output with invalid amount");
        return;
    }

    let maximize = output.objective == OutputObjective::Max;
    ctx.push_requested_output(RequestedOutput {
        resource,
        amount: output.amount,
        maximize,
    });

    let byproduct = VarId::Byproduct { resource };
    ctx.graph_mut().ensure_node(byproduct);
    compute_production_constraints(ctx, resource);

    if ctx.graph().producers_of(VarId::Resource { resource }).is_empty() {
        tracing::warn!(resource = %output.resource, "no recipe or input can supply requested output");
        ctx.mark_unmet(resource);
        return;
    }

    if maximize {
        ctx.set_bounds(byproduct, output.amount, None);
        ctx.push_maximized_output(byproduct, output.amount);
    } else {
        ctx.add_constraint(Constraint::equal(vec![(byproduct, 1.0)], output.amount));
    }
}

/// Expands every allowed recipe producing `resource`, recursing into their
/// ingredients.
pub fn compute_production_constraints(ctx: &mut SolverContext, resource: usize) {
    let aggregator = VarId::Resource { resource };
    ctx.graph_mut().ensure_node(aggregator);

    if let Some(max) = ctx.world_resource_max_if_allowed(resource) {
        let world = VarId::RawWorld { resource };
        if !ctx.graph().contains(world) {
            ctx.graph_mut().add_edge(world, aggregator, EdgeKind::Flow);
            ctx.set_bounds(world, 0.0, Some(max));
        }
    }

    let recipes = ctx.catalog().recipes_producing(resource).to_vec();
    for recipe in recipes {
        if !ctx.is_recipe_allowed(recipe) || !ctx.is_recipe_produced_in_allowed_building(recipe) {
            continue;
        }
        if !ctx.mark_visited(recipe) {
            continue;
        }
        let ingredients = expand_recipe(ctx, recipe);
        for ingredient in ingredients {
            compute_production_constraints(ctx, ingredient);
        }
    }
}

// Emits the variables and constraints of one recipe and returns the items
// it consumes.
fn expand_recipe(ctx: &mut SolverContext, index: usize) -> Vec<usize> {
    let catalog = ctx.catalog_arc();
    let recipe = catalog.recipe(index);
    let building = catalog.building(recipe.building);
    let Some(primary) = recipe.primary_product().copied() else {
        return Vec::new();
    };

    let node = ctx.node_override(index);
    let clock = node.clock_factor();
    let slots = building.somersloop_slots;
    let used = node.somersloops_used(slots);
    let primary_rate = recipe.per_minute(primary.amount);
    let machines_per_unit = 1.0 / (primary_rate * clock);

    let output = VarId::RecipeOutput {
        resource: primary.item,
        recipe: index,
    };

    // Ingredients, energy and area scale with the unamplified part only.
    let base = if used > 0 {
        let original = VarId::Original {
            resource: primary.item,
            recipe: index,
        };
        let amplified = VarId::Amplified {
            resource: primary.item,
            recipe: index,
        };
        ctx.graph_mut().ensure_node(original);
        ctx.graph_mut().ensure_node(amplified);
        ctx.add_constraint(Constraint::equal(
            vec![(output, 1.0), (original, -1.0), (amplified, -1.0)],
            0.0,
        ));
        ctx.add_constraint(Constraint::new(
            vec![(amplified, 1.0), (original, -(used as f64 / slots as f64))],
            Comparison::Le,
            0.0,
        ));
        original
    } else {
        output
    };

    let boost = if used > 0 {
        (1.0 + used as f64 / slots as f64).powi(2)
    } else {
        1.0
    };
    let energy = VarId::Energy { recipe: index };
    let area = VarId::Area { recipe: index };
    ctx.graph_mut().ensure_node(energy);
    ctx.graph_mut().ensure_node(area);
    ctx.add_constraint(Constraint::equal(
        vec![
            (energy, 1.0),
            (
                base,
                -(building.power * clock.powf(POWER_CLOCK_EXPONENT) * boost * machines_per_unit),
            ),
        ],
        0.0,
    ));
    ctx.add_constraint(Constraint::equal(
        vec![(area, 1.0), (base, -(building.area * machines_per_unit))],
        0.0,
    ));

    let mut consumed = Vec::with_capacity(recipe.ingredients.len());
    for part in &recipe.ingredients {
        let ingredient = VarId::RecipeIngredient {
            resource: part.item,
            recipe: index,
        };
        ctx.graph_mut()
            .add_edge(VarId::Resource { resource: part.item }, ingredient, EdgeKind::Flow);
        ctx.add_constraint(Constraint::equal(
            vec![(ingredient, 1.0), (base, -(recipe.per_minute(part.amount) / primary_rate))],
            0.0,
        ));
        consumed.push(part.item);
    }

    for (position, part) in recipe.products.iter().enumerate() {
        let product = VarId::RecipeOutput {
            resource: part.item,
            recipe: index,
        };
        ctx.graph_mut()
            .add_edge(product, VarId::Resource { resource: part.item }, EdgeKind::Flow);
        ctx.graph_mut().ensure_node(VarId::Byproduct { resource: part.item });
        if position > 0 {
            ctx.add_constraint(Constraint::equal(
                vec![(product, 1.0), (output, -(recipe.per_minute(part.amount) / primary_rate))],
                0.0,
            ));
        }
    }

    tracing::trace!(recipe = %recipe.id, clock, somersloops = used, "expanded recipe");
    consumed
}
