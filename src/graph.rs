//! Typed solver graph.
//!
//! Every LP decision variable is a [`VarId`]: a role plus the catalog
//! indices it belongs to. Variables that take part in resource flow are
//! nodes of a [`SolverGraph`]; link variables live on the edges created
//! during consolidation.

use std::collections::HashMap;
use std::fmt;

/// The supplying side of a flow into a resource aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Producer {
    /// Extraction from the world
    World,
    /// A declared factory input, by position in the request
    Input(usize),
    /// A recipe listing the resource among its products
    Recipe(usize),
}

/// The receiving side of a flow out of a resource aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Consumer {
    /// A recipe listing the resource among its ingredients
    Recipe(usize),
    /// The resource's leftover / requested-output sink
    Byproduct,
}

/// Structured identifier of one LP decision variable.
///
/// `resource` and `recipe` are catalog indices. Two `VarId`s are equal iff
/// they denote the same variable, so the id doubles as a deterministic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarId {
    /// Total amount of a resource flowing through the plan
    Resource { resource: usize },
    /// Amount extracted from the world
    RawWorld { resource: usize },
    /// Amount drawn from a declared input
    RawInput { resource: usize, input: usize },
    /// Amount of a product made by a recipe (including amplification)
    RecipeOutput { resource: usize, recipe: usize },
    /// Unamplified part of an amplified primary product
    Original { resource: usize, recipe: usize },
    /// Somersloop-amplified part of a primary product
    Amplified { resource: usize, recipe: usize },
    /// Amount of an ingredient consumed by a recipe
    RecipeIngredient { resource: usize, recipe: usize },
    /// Leftover of a resource; also the delivered amount of an output
    Byproduct { resource: usize },
    /// Power drawn by all machines of a recipe (MW)
    Energy { recipe: usize },
    /// Footprint of all machines of a recipe (m²)
    Area { recipe: usize },
    /// Flow of a resource from one producer to one consumer
    Link {
        resource: usize,
        from: Producer,
        to: Consumer,
    },
}

impl VarId {
    /// Returns the resource this variable carries, if any.
    pub fn resource(&self) -> Option<usize> {
        match *self {
            VarId::Resource { resource }
            | VarId::RawWorld { resource }
            | VarId::RawInput { resource, .. }
            | VarId::RecipeOutput { resource, .. }
            | VarId::Original { resource, .. }
            | VarId::Amplified { resource, .. }
            | VarId::RecipeIngredient { resource, .. }
            | VarId::Byproduct { resource }
            | VarId::Link { resource, .. } => Some(resource),
            VarId::Energy { .. } | VarId::Area { .. } => None,
        }
    }

    /// Returns the recipe this variable belongs to, if any.
    pub fn recipe(&self) -> Option<usize> {
        match *self {
            VarId::RecipeOutput { recipe, .. }
            | VarId::Original { recipe, .. }
            | VarId::Amplified { recipe, .. }
            | VarId::RecipeIngredient { recipe, .. }
            | VarId::Energy { recipe }
            | VarId::Area { recipe } => Some(recipe),
            _ => None,
        }
    }

    /// Views the variable as the supplying end of a flow.
    pub fn as_producer(&self) -> Option<(usize, Producer)> {
        match *self {
            VarId::RawWorld { resource } => Some((resource, Producer::World)),
            VarId::RawInput { resource, input } => Some((resource, Producer::Input(input))),
            VarId::RecipeOutput { resource, recipe } => Some((resource, Producer::Recipe(recipe))),
            _ => None,
        }
    }

    /// Views the variable as the receiving end of a flow.
    pub fn as_consumer(&self) -> Option<(usize, Consumer)> {
        match *self {
            VarId::RecipeIngredient { resource, recipe } => Some((resource, Consumer::Recipe(recipe))),
            VarId::Byproduct { resource } => Some((resource, Consumer::Byproduct)),
            _ => None,
        }
    }

    /// Short role tag used in variable names.
    pub fn role(&self) -> &'static str {
        match self {
            VarId::Resource { .. } => "res",
            VarId::RawWorld { .. } => "world",
            VarId::RawInput { .. } => "input",
            VarId::RecipeOutput { .. } => "out",
            VarId::Original { .. } => "orig",
            VarId::Amplified { .. } => "amp",
            VarId::RecipeIngredient { .. } => "ing",
            VarId::Byproduct { .. } => "byp",
            VarId::Energy { .. } => "power",
            VarId::Area { .. } => "area",
            VarId::Link { .. } => "link",
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::World => write!(f, "w"),
            Producer::Input(index) => write!(f, "i{}", index),
            Producer::Recipe(recipe) => write!(f, "r{}", recipe),
        }
    }
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumer::Recipe(recipe) => write!(f, "r{}", recipe),
            Consumer::Byproduct => write!(f, "b"),
        }
    }
}

/// Structural name, e.g. `out_17_10` or `link_11_r2_r10`.
impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = self.role();
        match *self {
            VarId::Resource { resource } | VarId::RawWorld { resource } | VarId::Byproduct { resource } => {
                write!(f, "{}_{}", role, resource)
            }
            VarId::RawInput { resource, input } => write!(f, "{}_{}_{}", role, resource, input),
            VarId::RecipeOutput { resource, recipe }
            | VarId::Original { resource, recipe }
            | VarId::Amplified { resource, recipe }
            | VarId::RecipeIngredient { resource, recipe } => write!(f, "{}_{}_{}", role, resource, recipe),
            VarId::Energy { recipe } | VarId::Area { recipe } => write!(f, "{}_{}", role, recipe),
            VarId::Link { resource, from, to } => write!(f, "{}_{}_{}_{}", role, resource, from, to),
        }
    }
}

/// Position of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Position of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIndex(pub usize);

/// What an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Structural flow: producer → aggregator or aggregator → consumer
    Flow,
    /// A consolidated producer → consumer flow with its own variable
    Link(VarId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub kind: EdgeKind,
}

/// A variable node with its adjacency lists.
#[derive(Debug, Clone, PartialEq)]
pub struct VarNode {
    pub var: VarId,
    /// Edges whose destination is this node.
    inputs: Vec<EdgeIndex>,
    /// Edges whose source is this node.
    outputs: Vec<EdgeIndex>,
}

/// Directed graph of variable nodes, stored as an arena.
///
/// Nodes keep insertion order, which makes every traversal (and therefore
/// the formulated problem) deterministic. Solved values are written back
/// per variable after decoding.
#[derive(Debug, Clone, Default)]
pub struct SolverGraph {
    nodes: Vec<VarNode>,
    lookup: HashMap<VarId, NodeIndex>,
    edges: Vec<Edge>,
    values: HashMap<VarId, f64>,
}

impl SolverGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for `var`, inserting it if needed.
    pub fn ensure_node(&mut self, var: VarId) -> NodeIndex {
        if let Some(&index) = self.lookup.get(&var) {
            return index;
        }
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(VarNode {
            var,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        self.lookup.insert(var, index);
        index
    }

    pub fn node_index(&self, var: VarId) -> Option<NodeIndex> {
        self.lookup.get(&var).copied()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.lookup.contains_key(&var)
    }

    pub fn node(&self, index: NodeIndex) -> &VarNode {
        &self.nodes[index.0]
    }

    /// Iterates over nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &VarNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds an edge between two variables, creating missing nodes.
    ///
    /// A second `Flow` edge between the same pair is not duplicated.
    pub fn add_edge(&mut self, from: VarId, to: VarId, kind: EdgeKind) -> EdgeIndex {
        let from = self.ensure_node(from);
        let to = self.ensure_node(to);
        if kind == EdgeKind::Flow {
            let existing = self.nodes[from.0]
                .outputs
                .iter()
                .copied()
                .find(|e| self.edges[e.0].to == to && self.edges[e.0].kind == EdgeKind::Flow);
            if let Some(existing) = existing {
                return existing;
            }
        }
        let index = EdgeIndex(self.edges.len());
        self.edges.push(Edge { from, to, kind });
        self.nodes[from.0].outputs.push(index);
        self.nodes[to.0].inputs.push(index);
        index
    }

    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index.0]
    }

    /// Iterates over edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Variables with a `Flow` edge into `var`.
    pub fn producers_of(&self, var: VarId) -> Vec<VarId> {
        let Some(index) = self.node_index(var) else {
            return Vec::new();
        };
        self.nodes[index.0]
            .inputs
            .iter()
            .map(|e| &self.edges[e.0])
            .filter(|e| e.kind == EdgeKind::Flow)
            .map(|e| self.nodes[e.from.0].var)
            .collect()
    }

    /// Variables with a `Flow` edge out of `var`.
    pub fn consumers_of(&self, var: VarId) -> Vec<VarId> {
        let Some(index) = self.node_index(var) else {
            return Vec::new();
        };
        self.nodes[index.0]
            .outputs
            .iter()
            .map(|e| &self.edges[e.0])
            .filter(|e| e.kind == EdgeKind::Flow)
            .map(|e| self.nodes[e.to.0].var)
            .collect()
    }

    /// Link variables on edges entering `var`.
    pub fn links_into(&self, var: VarId) -> Vec<VarId> {
        self.links(var, |node| &node.inputs)
    }

    /// Link variables on edges leaving `var`.
    pub fn links_out_of(&self, var: VarId) -> Vec<VarId> {
        self.links(var, |node| &node.outputs)
    }

    fn links(&self, var: VarId, side: impl Fn(&VarNode) -> &Vec<EdgeIndex>) -> Vec<VarId> {
        let Some(index) = self.node_index(var) else {
            return Vec::new();
        };
        side(&self.nodes[index.0])
            .iter()
            .filter_map(|e| match self.edges[e.0].kind {
                EdgeKind::Link(link) => Some(link),
                EdgeKind::Flow => None,
            })
            .collect()
    }

    /// Records the solved value of a variable (node or link).
    pub fn set_value(&mut self, var: VarId, value: f64) {
        self.values.insert(var, value);
    }

    /// Returns the solved value of a variable, if the solve assigned one.
    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(&var).copied()
    }
}
