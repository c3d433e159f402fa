//! Objective Composer.

use crate::context::{Constraint, Objective, SolverContext};
use crate::graph::VarId;
use crate::models::ObjectiveMode;

/// Builds the minimization objective for the request's mode, subtracts the
/// maximized outputs and ties them together when lockstep is enabled.
pub fn compose_objective(ctx: &mut SolverContext) {
    let mode = ctx.request().objective;
    let mut terms = match mode {
        ObjectiveMode::MinimizeResources => resource_terms(ctx),
        ObjectiveMode::MinimizePower => tie_broken(ctx, ctx.energy_vars()),
        ObjectiveMode::MinimizeArea => tie_broken(ctx, ctx.area_vars()),
    };

    let maximized = ctx.maximized_outputs().to_vec();
    let weight = ctx.settings().maximize_weight;
    terms.extend(maximized.iter().map(|&(var, _)| (var, -weight)));

    if ctx.settings().lockstep_maximized_outputs && maximized.len() > 1 {
        let (first, first_amount) = maximized[0];
        for &(var, amount) in &maximized[1..] {
            // Scale each output with the first in the ratio of their floors.
            let ratio = if first_amount > 0.0 && amount > 0.0 {
                vec![(var, first_amount), (first, -amount)]
            } else {
                vec![(var, 1.0), (first, -1.0)]
            };
            ctx.add_constraint(Constraint::equal(ratio, 0.0));
        }
    }

    tracing::debug!(?mode, terms = terms.len(), "composed objective");
    ctx.set_objective(Objective { terms });
}

/// Adds `weight × primary output` for every penalized recipe that was
/// expanded.
pub fn apply_recipe_penalties(ctx: &mut SolverContext) {
    let catalog = ctx.catalog_arc();
    let penalties = ctx.recipe_penalties().to_vec();
    for (recipe, weight) in penalties {
        if !ctx.is_visited(recipe) {
            continue;
        }
        let Some(primary) = catalog.recipe(recipe).primary_product() else {
            continue;
        };
        ctx.add_objective_term(
            VarId::RecipeOutput {
                resource: primary.item,
                recipe,
            },
            weight,
        );
    }
}

// Weighted raw resource consumption. World extraction is weighted by the
// inverse of the weighted cap; inputs of world resources are slightly
// cheaper than extraction so they are drawn first.
fn resource_terms(ctx: &SolverContext) -> Vec<(VarId, f64)> {
    let settings = ctx.settings();
    let catalog = ctx.catalog();
    let world_vars = ctx.world_vars();
    let input_vars = ctx.world_input_vars();

    if world_vars.is_empty() {
        return input_vars
            .into_iter()
            .map(|var| (var, settings.fallback_weight))
            .collect();
    }

    let world_weight = |resource: usize| match catalog.world_resource(resource) {
        Some(world) if world.weighted_max > 0.0 => settings.resource_weight_scale / world.weighted_max,
        _ => settings.fallback_weight,
    };

    let mut terms: Vec<(VarId, f64)> = world_vars
        .iter()
        .filter_map(|var| var.resource().map(|r| (*var, world_weight(r))))
        .collect();
    for var in input_vars {
        let Some(resource) = var.resource() else {
            continue;
        };
        let weight = if catalog.is_world_resource(resource) {
            world_weight(resource) * settings.input_discount
        } else {
            settings.intermediate_input_weight
        };
        terms.push((var, weight));
    }
    terms
}

// Power or area totals, plus scaled-down resource terms so that among plans
// of equal total the one drawing fewer resources wins.
fn tie_broken(ctx: &SolverContext, primary: Vec<VarId>) -> Vec<(VarId, f64)> {
    let tie_break = ctx.settings().tie_break_weight;
    let mut terms: Vec<(VarId, f64)> = primary.into_iter().map(|var| (var, 1.0)).collect();
    terms.extend(
        resource_terms(ctx)
            .into_iter()
            .map(|(var, weight)| (var, weight * tie_break)),
    );
    terms
}
