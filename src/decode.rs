//! Solution Decoder.
//!
//! Maps the engine's column values back onto typed plan nodes (machines,
//! world and input resources, byproducts) and flow edges between them.

use serde::Serialize;

use crate::context::SolverContext;
use crate::error::{PlannerError, Result};
use crate::graph::{EdgeKind, SolverGraph, VarId};
use crate::lp::{LpResult, LpStatus};

/// Final status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The engine rejected the problem
    Failed,
}

impl From<LpStatus> for SolveStatus {
    fn from(status: LpStatus) -> Self {
        match status {
            LpStatus::Optimal => SolveStatus::Optimal,
            LpStatus::Infeasible => SolveStatus::Infeasible,
            LpStatus::Unbounded => SolveStatus::Unbounded,
        }
    }
}

/// Identity of a plan node, by catalog index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Machine { recipe: usize },
    World { resource: usize },
    Input { resource: usize, input: usize },
    Byproduct { resource: usize },
}

/// Where a raw resource node draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceSource {
    World,
    Input { index: usize },
}

/// What a plan node represents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    /// A group of identical machines running one recipe
    #[serde(rename_all = "camelCase")]
    Machine {
        recipe: String,
        /// Primary product
        resource: String,
        building: String,
        machines: f64,
        somersloops: u32,
        /// Clock speed in percent
        overclock: f64,
    },
    /// Raw supply from the world or a declared input
    Resource { resource: String, source: ResourceSource },
    /// Leftover production, or a requested output when `requested`
    Byproduct { resource: String, requested: bool },
}

/// A plan node with its solved rate per minute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionNode {
    pub id: String,
    #[serde(skip)]
    pub key: NodeKey,
    pub value: f64,
    pub kind: NodeKind,
}

/// A flow of one resource between two plan nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionEdge {
    pub from: String,
    pub to: String,
    #[serde(skip)]
    pub from_key: NodeKey,
    #[serde(skip)]
    pub to_key: NodeKey,
    pub resource: String,
    pub value: f64,
}

/// Requested versus delivered amount of one output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputReport {
    pub resource: String,
    pub requested: f64,
    pub solved: f64,
    pub maximized: bool,
}

/// Serializable summary of a [`SolutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub total_power: f64,
    pub total_area: f64,
    pub nodes: Vec<SolutionNode>,
    pub edges: Vec<SolutionEdge>,
    pub outputs: Vec<OutputReport>,
    pub error: Option<String>,
}

/// The decoded plan, retained together with the context that produced it.
#[derive(Debug)]
pub struct SolutionResult {
    pub status: SolveStatus,
    pub nodes: Vec<SolutionNode>,
    pub edges: Vec<SolutionEdge>,
    pub outputs: Vec<OutputReport>,
    pub raw: Option<LpResult>,
    pub error: Option<String>,
    context: SolverContext,
}

impl SolutionResult {
    /// A result for a solve the engine could not run.
    pub fn failed(context: SolverContext, message: impl Into<String>) -> Self {
        let outputs = output_reports(&context);
        Self {
            status: SolveStatus::Failed,
            nodes: Vec::new(),
            edges: Vec::new(),
            outputs,
            raw: None,
            error: Some(message.into()),
            context,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn context(&self) -> &SolverContext {
        &self.context
    }

    pub fn graph(&self) -> &SolverGraph {
        self.context.graph()
    }

    pub fn node(&self, key: NodeKey) -> Option<&SolutionNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    /// The machine group running `recipe_id`, if the plan uses it.
    pub fn machine(&self, recipe_id: &str) -> Option<&SolutionNode> {
        let recipe = self.context.catalog().recipe_index(recipe_id)?;
        self.node(NodeKey::Machine { recipe })
    }

    pub fn world_node(&self, resource_id: &str) -> Option<&SolutionNode> {
        let resource = self.context.catalog().item_index(resource_id)?;
        self.node(NodeKey::World { resource })
    }

    /// The first declared-input node drawing `resource_id`.
    pub fn input_node(&self, resource_id: &str) -> Option<&SolutionNode> {
        let resource = self.context.catalog().item_index(resource_id)?;
        self.nodes
            .iter()
            .find(|node| matches!(node.key, NodeKey::Input { resource: r, .. } if r == resource))
    }

    pub fn byproduct(&self, resource_id: &str) -> Option<&SolutionNode> {
        let resource = self.context.catalog().item_index(resource_id)?;
        self.node(NodeKey::Byproduct { resource })
    }

    /// Solved value of any variable, including bookkeeping ones.
    pub fn value_of(&self, var: VarId) -> Option<f64> {
        self.graph().value(var)
    }

    /// Total power draw in MW.
    pub fn total_power(&self) -> f64 {
        self.sum_of(self.context.energy_vars())
    }

    /// Total building footprint in m².
    pub fn total_area(&self) -> f64 {
        self.sum_of(self.context.area_vars())
    }

    fn sum_of(&self, vars: Vec<VarId>) -> f64 {
        vars.into_iter().filter_map(|var| self.graph().value(var)).sum()
    }

    /// Outputs delivered below their requested amount.
    pub fn unmet_outputs(&self) -> Vec<&OutputReport> {
        let epsilon = self.context.settings().epsilon;
        self.outputs
            .iter()
            .filter(|output| output.solved + epsilon < output.requested)
            .collect()
    }

    pub fn report(&self) -> PlanReport {
        let optimal = self.is_optimal();
        PlanReport {
            status: self.status,
            objective_value: self.raw.as_ref().filter(|_| optimal).map(|raw| raw.objective_value),
            total_power: self.total_power(),
            total_area: self.total_area(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            outputs: self.outputs.clone(),
            error: self.error.clone(),
        }
    }
}

/// Decodes an engine result into a plan.
///
/// Values whose magnitude is below the configured epsilon are dropped.
///
/// # Errors
///
/// [`PlannerError::Inconsistent`] if the graph holds a link variable as a
/// node.
pub fn decode_solution(mut context: SolverContext, raw: LpResult) -> Result<SolutionResult> {
    let status = SolveStatus::from(raw.status);
    if status != SolveStatus::Optimal {
        let outputs = output_reports(&context);
        return Ok(SolutionResult {
            status,
            nodes: Vec::new(),
            edges: Vec::new(),
            outputs,
            raw: Some(raw),
            error: None,
            context,
        });
    }

    for (alias, &value) in &raw.columns {
        match context.decode_var(alias) {
            Some(var) => context.graph_mut().set_value(var, value),
            None => tracing::warn!(column = %alias, "engine returned an unknown column"),
        }
    }

    let epsilon = context.settings().epsilon;
    let mut nodes = Vec::new();
    for node in context.graph().nodes() {
        let value = context.graph().value(node.var).unwrap_or(0.0);
        if value.abs() < epsilon {
            continue;
        }
        if let Some(decoded) = decode_node(&context, node.var, value)? {
            nodes.push(decoded);
        }
    }

    let mut edges = Vec::new();
    for edge in context.graph().edges() {
        let EdgeKind::Link(link) = edge.kind else {
            continue;
        };
        let value = context.graph().value(link).unwrap_or(0.0);
        if value < epsilon {
            continue;
        }
        let from = context.graph().node(edge.from).var;
        let to = context.graph().node(edge.to).var;
        let (Some(from_key), Some(to_key)) = (endpoint(from), endpoint(to)) else {
            continue;
        };
        let from_node = nodes.iter().find(|n: &&SolutionNode| n.key == from_key);
        let to_node = nodes.iter().find(|n: &&SolutionNode| n.key == to_key);
        let (Some(from_node), Some(to_node)) = (from_node, to_node) else {
            continue;
        };
        let resource = link.resource().map_or_else(String::new, |r| context.catalog().item(r).id.clone());
        edges.push(SolutionEdge {
            from: from_node.id.clone(),
            to: to_node.id.clone(),
            from_key,
            to_key,
            resource,
            value,
        });
    }

    let outputs = output_reports(&context);
    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "decoded solution");
    Ok(SolutionResult {
        status,
        nodes,
        edges,
        outputs,
        raw: Some(raw),
        error: None,
        context,
    })
}

fn decode_node(ctx: &SolverContext, var: VarId, value: f64) -> Result<Option<SolutionNode>> {
    let catalog = ctx.catalog();
    let node = match var {
        VarId::RecipeOutput { resource, recipe } => {
            let entry = catalog.recipe(recipe);
            let Some(primary) = entry.primary_product() else {
                return Ok(None);
            };
            if primary.item != resource {
                return Ok(None);
            }
            let building = catalog.building(entry.building);
            let config = ctx.node_override(recipe);
            let clock = config.clock_factor();
            let somersloops = config.somersloops_used(building.somersloop_slots);
            let base = if somersloops > 0 {
                ctx.graph()
                    .value(VarId::Original { resource, recipe })
                    .unwrap_or(value)
            } else {
                value
            };
            SolutionNode {
                id: format!("machine:{}", entry.id),
                key: NodeKey::Machine { recipe },
                value,
                kind: NodeKind::Machine {
                    recipe: entry.id.clone(),
                    resource: catalog.item(resource).id.clone(),
                    building: building.id.clone(),
                    machines: base / (entry.per_minute(primary.amount) * clock),
                    somersloops,
                    overclock: clock * 100.0,
                },
            }
        }
        VarId::RawWorld { resource } => {
            let id = &catalog.item(resource).id;
            SolutionNode {
                id: format!("world:{}", id),
                key: NodeKey::World { resource },
                value,
                kind: NodeKind::Resource {
                    resource: id.clone(),
                    source: ResourceSource::World,
                },
            }
        }
        VarId::RawInput { resource, input } => {
            let id = &catalog.item(resource).id;
            SolutionNode {
                id: format!("input:{}:{}", id, input),
                key: NodeKey::Input { resource, input },
                value,
                kind: NodeKind::Resource {
                    resource: id.clone(),
                    source: ResourceSource::Input { index: input },
                },
            }
        }
        VarId::Byproduct { resource } => {
            let id = &catalog.item(resource).id;
            SolutionNode {
                id: format!("byproduct:{}", id),
                key: NodeKey::Byproduct { resource },
                value,
                kind: NodeKind::Byproduct {
                    resource: id.clone(),
                    requested: ctx.requested_outputs().iter().any(|o| o.resource == resource),
                },
            }
        }
        VarId::Link { .. } => {
            return Err(PlannerError::Inconsistent(format!(
                "link variable {} stored as a graph node",
                var
            )));
        }
        _ => return Ok(None),
    };
    Ok(Some(node))
}

// Plan node a flow endpoint belongs to; ingredients resolve to their machine.
fn endpoint(var: VarId) -> Option<NodeKey> {
    match var {
        VarId::RawWorld { resource } => Some(NodeKey::World { resource }),
        VarId::RawInput { resource, input } => Some(NodeKey::Input { resource, input }),
        VarId::RecipeOutput { recipe, .. } | VarId::RecipeIngredient { recipe, .. } => {
            Some(NodeKey::Machine { recipe })
        }
        VarId::Byproduct { resource } => Some(NodeKey::Byproduct { resource }),
        _ => None,
    }
}

fn output_reports(ctx: &SolverContext) -> Vec<OutputReport> {
    ctx.requested_outputs()
        .iter()
        .map(|output| OutputReport {
            resource: ctx.catalog().item(output.resource).id.clone(),
            requested: output.amount,
            solved: ctx
                .graph()
                .value(VarId::Byproduct {
                    resource: output.resource,
                })
                .unwrap_or(0.0),
            maximized: output.maximize,
        })
        .collect()
}
