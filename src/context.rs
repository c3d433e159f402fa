//! Per-solve state: the solver graph, the alias table, constraints, bounds
//! and the objective.
//!
//! A [`SolverContext`] is created fresh for every request and never reused.
//! Everything the builder, consolidator and objective composer emit lands
//! here, and [`SolverContext::formulate_problem`] serializes it into the text
//! format read by the LP engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::data::Catalog;
use crate::error::{PlannerError, Result};
use crate::graph::{Consumer, Producer, SolverGraph, VarId};
use crate::models::{NodeOverride, ProductionRequest, SolverSettings};

/// Relation between the left-hand side and the constant of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Le => "<=",
            Comparison::Ge => ">=",
        }
    }
}

/// A linear constraint `Σ coef·var (op) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub terms: Vec<(VarId, f64)>,
    pub op: Comparison,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(terms: Vec<(VarId, f64)>, op: Comparison, rhs: f64) -> Self {
        Self { terms, op, rhs }
    }

    /// `Σ terms = rhs`
    pub fn equal(terms: Vec<(VarId, f64)>, rhs: f64) -> Self {
        Self::new(terms, Comparison::Eq, rhs)
    }
}

/// Bounds of one variable; `upper: None` means unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarBounds {
    pub lower: f64,
    pub upper: Option<f64>,
}

impl Default for VarBounds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: None,
        }
    }
}

/// A linear minimization objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objective {
    pub terms: Vec<(VarId, f64)>,
}

/// A requested output after merging duplicate entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestedOutput {
    pub resource: usize,
    pub amount: f64,
    pub maximize: bool,
}

/// Transient state of a single solve.
#[derive(Debug)]
pub struct SolverContext {
    catalog: Arc<Catalog>,
    settings: SolverSettings,
    request: ProductionRequest,
    graph: SolverGraph,
    aliases: HashMap<VarId, String>,
    alias_lookup: HashMap<String, VarId>,
    constraints: Vec<Constraint>,
    bounds: BTreeMap<VarId, VarBounds>,
    objective: Option<Objective>,
    allowed_recipes: Option<HashSet<usize>>,
    blocked_resources: HashSet<usize>,
    blocked_buildings: HashSet<usize>,
    resource_caps: HashMap<usize, f64>,
    node_overrides: HashMap<usize, NodeOverride>,
    recipe_penalties: Vec<(usize, f64)>,
    visited: Vec<bool>,
    maximized: Vec<(VarId, f64)>,
    requested: Vec<RequestedOutput>,
    unmet: Vec<usize>,
}

impl SolverContext {
    /// Creates a context for `request`, resolving every id it mentions.
    ///
    /// Ids the catalog does not know are logged and ignored.
    pub fn new(catalog: Arc<Catalog>, settings: SolverSettings, request: ProductionRequest) -> Self {
        let allowed_recipes = request.allowed_recipes.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|id| resolve(id, "allowed recipe", catalog.recipe_index(id)))
                .collect::<HashSet<_>>()
        });
        let blocked_resources = request
            .blocked_resources
            .iter()
            .flatten()
            .filter_map(|id| resolve(id, "blocked resource", catalog.item_index(id)))
            .collect();
        let blocked_buildings = request
            .blocked_buildings
            .iter()
            .flatten()
            .filter_map(|id| resolve(id, "blocked building", catalog.building_index(id)))
            .collect();
        let resource_caps = request
            .resources_amount
            .iter()
            .filter_map(|(id, &amount)| {
                let item = resolve(id, "resource amount override", catalog.item_index(id))?;
                if !amount.is_finite() || amount < 0.0 {
                    tracing::warn!(resource = %id, amount, "ignoring invalid resource amount override");
                    return None;
                }
                Some((item, amount))
            })
            .collect();
        let node_overrides = request
            .nodes
            .iter()
            .filter_map(|(id, node)| Some((resolve(id, "node override", catalog.recipe_index(id))?, *node)))
            .collect();
        let recipe_penalties = request
            .recipe_penalties
            .iter()
            .filter_map(|(id, &weight)| {
                let recipe = resolve(id, "recipe penalty", catalog.recipe_index(id))?;
                weight.is_finite().then_some((recipe, weight))
            })
            .collect();
        let visited = vec![false; catalog.recipes().len()];

        Self {
            catalog,
            settings,
            request,
            graph: SolverGraph::new(),
            aliases: HashMap::new(),
            alias_lookup: HashMap::new(),
            constraints: Vec::new(),
            bounds: BTreeMap::new(),
            objective: None,
            allowed_recipes,
            blocked_resources,
            blocked_buildings,
            resource_caps,
            node_overrides,
            recipe_penalties,
            visited,
            maximized: Vec::new(),
            requested: Vec::new(),
            unmet: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_arc(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn request(&self) -> &ProductionRequest {
        &self.request
    }

    pub fn graph(&self) -> &SolverGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SolverGraph {
        &mut self.graph
    }

    // ------------------------------------------------------------------
    // Aliases
    // ------------------------------------------------------------------

    /// Returns the short LP column name of `var`, assigning the next free
    /// `xN` on first use.
    pub fn encode_var(&mut self, var: VarId) -> String {
        if let Some(alias) = self.aliases.get(&var) {
            return alias.clone();
        }
        let alias = format!("x{}", self.aliases.len());
        self.aliases.insert(var, alias.clone());
        self.alias_lookup.insert(alias.clone(), var);
        alias
    }

    /// Maps a column name back to its variable.
    pub fn decode_var(&self, alias: &str) -> Option<VarId> {
        self.alias_lookup.get(alias).copied()
    }

    fn alias(&self, var: VarId) -> Result<&str> {
        self.aliases
            .get(&var)
            .map(String::as_str)
            .ok_or_else(|| PlannerError::Inconsistent(format!("variable {} has no alias", var)))
    }

    // ------------------------------------------------------------------
    // Request-derived queries
    // ------------------------------------------------------------------

    /// Whether the recipe is on the allow-list (or no allow-list was given).
    pub fn is_recipe_allowed(&self, recipe: usize) -> bool {
        self.allowed_recipes
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&recipe))
    }

    pub fn is_recipe_produced_in_allowed_building(&self, recipe: usize) -> bool {
        !self
            .blocked_buildings
            .contains(&self.catalog.recipe(recipe).building)
    }

    /// Effective extraction cap of a resource.
    ///
    /// Returns `None` for items that are not world resources and for blocked
    /// ones. A `resourcesAmount` override replaces the catalog cap.
    pub fn world_resource_max_if_allowed(&self, resource: usize) -> Option<f64> {
        let world = self.catalog.world_resource(resource)?;
        if self.blocked_resources.contains(&resource) {
            return None;
        }
        Some(self.resource_caps.get(&resource).copied().unwrap_or(world.max))
    }

    /// Machine configuration of a recipe; defaults when none was given.
    pub fn node_override(&self, recipe: usize) -> NodeOverride {
        self.node_overrides.get(&recipe).copied().unwrap_or_default()
    }

    pub fn recipe_penalties(&self) -> &[(usize, f64)] {
        &self.recipe_penalties
    }

    /// Marks a recipe as expanded. Returns `false` if it already was.
    pub fn mark_visited(&mut self, recipe: usize) -> bool {
        match self.visited.get_mut(recipe) {
            Some(seen) if !*seen => {
                *seen = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_visited(&self, recipe: usize) -> bool {
        self.visited.get(recipe).copied().unwrap_or(false)
    }

    /// Indices of every expanded recipe, in catalog order.
    pub fn visited_recipes(&self) -> impl Iterator<Item = usize> + '_ {
        self.visited
            .iter()
            .enumerate()
            .filter_map(|(index, &seen)| seen.then_some(index))
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// World extraction variables in graph order.
    pub fn world_vars(&self) -> Vec<VarId> {
        self.vars_matching(|v| matches!(v, VarId::RawWorld { .. }))
    }

    /// Declared-input variables in graph order.
    pub fn world_input_vars(&self) -> Vec<VarId> {
        self.vars_matching(|v| matches!(v, VarId::RawInput { .. }))
    }

    pub fn energy_vars(&self) -> Vec<VarId> {
        self.vars_matching(|v| matches!(v, VarId::Energy { .. }))
    }

    pub fn area_vars(&self) -> Vec<VarId> {
        self.vars_matching(|v| matches!(v, VarId::Area { .. }))
    }

    fn vars_matching(&self, pred: impl Fn(&VarId) -> bool) -> Vec<VarId> {
        self.graph.nodes().map(|n| n.var).filter(|v| pred(v)).collect()
    }

    /// Byproduct variables of maximized outputs with their requested floor.
    pub fn maximized_outputs(&self) -> &[(VarId, f64)] {
        &self.maximized
    }

    pub fn push_maximized_output(&mut self, var: VarId, amount: f64) {
        self.maximized.push((var, amount));
    }

    pub fn requested_outputs(&self) -> &[RequestedOutput] {
        &self.requested
    }

    pub fn push_requested_output(&mut self, output: RequestedOutput) {
        self.requested.push(output);
    }

    /// Outputs whose resource no allowed recipe or input can supply.
    pub fn unmet_outputs(&self) -> &[usize] {
        &self.unmet
    }

    pub fn mark_unmet(&mut self, resource: usize) {
        if !self.unmet.contains(&resource) {
            self.unmet.push(resource);
        }
    }

    // ------------------------------------------------------------------
    // Problem
    // ------------------------------------------------------------------

    pub fn add_constraint(&mut self, constraint: Constraint) {
        for &(var, _) in &constraint.terms {
            self.encode_var(var);
        }
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Restricts `var` to `[lower, upper]`.
    ///
    /// Setting bounds twice keeps the intersection.
    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: Option<f64>) {
        self.encode_var(var);
        let entry = self.bounds.entry(var).or_insert(VarBounds {
            lower,
            upper,
        });
        entry.lower = entry.lower.max(lower);
        entry.upper = match (entry.upper, upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn bounds(&self, var: VarId) -> Option<VarBounds> {
        self.bounds.get(&var).copied()
    }

    pub fn set_objective(&mut self, objective: Objective) {
        for &(var, _) in &objective.terms {
            self.encode_var(var);
        }
        self.objective = Some(objective);
    }

    /// Appends a term to the objective, creating an empty one if needed.
    pub fn add_objective_term(&mut self, var: VarId, coef: f64) {
        self.encode_var(var);
        self.objective
            .get_or_insert_with(Objective::default)
            .terms
            .push((var, coef));
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Serializes the problem into the engine's text format, using the
    /// `xN` aliases as column names.
    ///
    /// # Errors
    ///
    /// [`PlannerError::MissingObjective`] if no objective was composed.
    pub fn formulate_problem(&self) -> Result<String> {
        self.render(|var| self.alias(var).map(str::to_string))
    }

    /// Same problem as [`formulate_problem`](Self::formulate_problem), with
    /// catalog ids in the variable names.
    pub fn describe_problem(&self) -> Result<String> {
        self.render(|var| Ok(self.readable_name(var)))
    }

    fn render(&self, name: impl Fn(VarId) -> Result<String>) -> Result<String> {
        let objective = self.objective.as_ref().ok_or(PlannerError::MissingObjective)?;
        let mut out = String::new();

        out.push_str("MINIMIZE\n obj:");
        for &(var, coef) in &objective.terms {
            write_term(&mut out, coef, &name(var)?);
        }
        out.push('\n');

        out.push_str("SUBJECT TO\n");
        for (index, constraint) in self.constraints.iter().enumerate() {
            let _ = write!(out, " c{}:", index);
            for &(var, coef) in &constraint.terms {
                write_term(&mut out, coef, &name(var)?);
            }
            let _ = writeln!(out, " {} {}", constraint.op.symbol(), constraint.rhs);
        }

        out.push_str("BOUNDS\n");
        for (&var, bounds) in &self.bounds {
            let var = name(var)?;
            let _ = match bounds.upper {
                Some(upper) => writeln!(out, " {} <= {} <= {}", bounds.lower, var, upper),
                None => writeln!(out, " {} >= {}", var, bounds.lower),
            };
        }
        out.push_str("END\n");
        Ok(out)
    }

    /// Structural name of a variable with catalog ids in place of indices,
    /// e.g. `out_SteelPlate_SteelBeam`.
    pub fn readable_name(&self, var: VarId) -> String {
        let item = |i: usize| sanitize(&self.catalog.item(i).id);
        let recipe = |r: usize| sanitize(&self.catalog.recipe(r).id);
        let role = var.role();
        match var {
            VarId::Resource { resource } | VarId::RawWorld { resource } | VarId::Byproduct { resource } => {
                format!("{}_{}", role, item(resource))
            }
            VarId::RawInput { resource, input } => format!("{}_{}_{}", role, item(resource), input),
            VarId::RecipeOutput { resource, recipe: r }
            | VarId::Original { resource, recipe: r }
            | VarId::Amplified { resource, recipe: r }
            | VarId::RecipeIngredient { resource, recipe: r } => {
                format!("{}_{}_{}", role, item(resource), recipe(r))
            }
            VarId::Energy { recipe: r } | VarId::Area { recipe: r } => format!("{}_{}", role, recipe(r)),
            VarId::Link { resource, from, to } => {
                let from = match from {
                    Producer::World => "world".to_string(),
                    Producer::Input(index) => format!("input{}", index),
                    Producer::Recipe(r) => recipe(r),
                };
                let to = match to {
                    Consumer::Recipe(r) => recipe(r),
                    Consumer::Byproduct => "byproduct".to_string(),
                };
                format!("{}_{}_{}_{}", role, item(resource), from, to)
            }
        }
    }
}

fn resolve(id: &str, what: &str, index: Option<usize>) -> Option<usize> {
    if index.is_none() {
        tracing::warn!(id = %id, "ignoring unknown {}", what);
    }
    index
}

fn write_term(out: &mut String, coef: f64, name: &str) {
    let sign = if coef < 0.0 { '-' } else { '+' };
    let _ = write!(out, " {} {} {}", sign, coef.abs(), name);
}

// Keeps only characters valid in an LP column name.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
