//! Production planning entry point.
//!
//! [`Planner::solve`] runs the whole pipeline for one request: a fresh
//! [`SolverContext`] is populated by the builder, balanced by the
//! consolidator, given an objective, formulated as text, solved by the LP
//! engine and decoded into a [`SolutionResult`].

use std::sync::Arc;

use crate::builder::{add_input_resource_constraints, add_output_production_constraints};
use crate::consolidate::consolidate_flows;
use crate::context::SolverContext;
use crate::data::Catalog;
use crate::decode::{decode_solution, SolutionResult};
use crate::error::Result;
use crate::lp::{LpEngine, SimplexEngine};
use crate::models::{OutputObjective, ProductionOutput, ProductionRequest, SolverSettings};
use crate::objective::{apply_recipe_penalties, compose_objective};

/// Solves production requests against a shared catalog.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ficsplan::data::Catalog;
/// use ficsplan::models::ProductionRequest;
/// use ficsplan::optimizer::Planner;
///
/// let planner = Planner::new(Arc::new(Catalog::embedded().unwrap()));
/// let request = ProductionRequest::new().with_output("IronPlate", 20.0);
/// let result = planner.solve(&request).unwrap();
/// assert!(result.is_optimal());
/// assert!(result.machine("IronPlate").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Planner<E: LpEngine = SimplexEngine> {
    catalog: Arc<Catalog>,
    settings: SolverSettings,
    engine: E,
}

impl Planner<SimplexEngine> {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_engine(catalog, SimplexEngine)
    }
}

impl<E: LpEngine> Planner<E> {
    /// Creates a planner that hands formulated problems to `engine`.
    pub fn with_engine(catalog: Arc<Catalog>, engine: E) -> Self {
        Self {
            catalog,
            settings: SolverSettings::default(),
            engine,
        }
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Builds the complete problem for `request` without solving it.
    pub fn build_context(&self, request: &ProductionRequest) -> Result<SolverContext> {
        let mut ctx = SolverContext::new(Arc::clone(&self.catalog), self.settings.clone(), request.clone());

        for (index, input) in request.inputs.iter().enumerate() {
            add_input_resource_constraints(&mut ctx, input, index);
        }
        for (index, output) in merge_outputs(&request.outputs).iter().enumerate() {
            add_output_production_constraints(&mut ctx, output, index);
        }

        consolidate_flows(&mut ctx)?;
        compose_objective(&mut ctx);
        apply_recipe_penalties(&mut ctx);
        Ok(ctx)
    }

    /// Solves one request.
    ///
    /// Infeasible and unbounded plans are reported through the result's
    /// status. A problem the engine rejects yields a `Failed` result.
    ///
    /// # Errors
    ///
    /// Only broken internal invariants are returned as errors.
    pub fn solve(&self, request: &ProductionRequest) -> Result<SolutionResult> {
        let ctx = self.build_context(request)?;
        let problem = ctx.formulate_problem()?;
        tracing::debug!(
            variables = ctx.graph().len(),
            constraints = ctx.constraints().len(),
            "formulated problem\n{}",
            problem
        );

        let raw = match self.engine.solve(&problem) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "LP engine failed\n{}", problem);
                return Ok(SolutionResult::failed(ctx, err.to_string()));
            }
        };
        tracing::info!(status = ?raw.status, objective = raw.objective_value, "solved production plan");
        decode_solution(ctx, raw)
    }
}

// Sums duplicate outputs of the same resource; one maximized entry makes
// the merged output maximized.
fn merge_outputs(outputs: &[ProductionOutput]) -> Vec<ProductionOutput> {
    let mut merged: Vec<ProductionOutput> = Vec::with_capacity(outputs.len());
    for output in outputs {
        match merged.iter_mut().find(|o| o.resource == output.resource) {
            Some(existing) => {
                existing.amount += output.amount;
                if output.objective == OutputObjective::Max {
                    existing.objective = OutputObjective::Max;
                }
            }
            None => merged.push(output.clone()),
        }
    }
    merged
}
