//! Data models and structures for the planner.
//!
//! This module contains the catalog entities (items, recipes, buildings and
//! world resources), the CSV row layouts they are loaded from, the
//! [`ProductionRequest`] a caller submits for a solve, and the tunable
//! [`SolverSettings`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Exponent applied to the clock speed when computing a machine's power draw.
///
/// A machine running at 250% draws `2.5^1.321928 ≈ 3.36` times its base power.
pub const POWER_CLOCK_EXPONENT: f64 = 1.321928;

/// A resource that can appear in recipes.
///
/// # Example
///
/// ```
/// use ficsplan::models::Item;
///
/// let ore = Item {
///     id: "OreIron".to_string(),
///     name: "Iron Ore".to_string(),
///     unit: "item".to_string(),
///     producible: false,
///     index: 0,
/// };
/// assert!(!ore.producible);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Stable identifier (e.g., "SteelIngot")
    pub id: String,
    /// Display name (e.g., "Steel Ingot")
    pub name: String,
    /// Unit the rate is expressed in ("item" or "m3")
    pub unit: String,
    /// Whether any recipe in the game can make this item
    pub producible: bool,
    /// Position in the catalog, used in variable naming
    pub index: usize,
}

/// One ingredient or product line of a recipe, resolved to an item index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecipePart {
    /// Catalog index of the item
    pub item: usize,
    /// Quantity per cycle
    pub amount: f64,
}

/// A fixed-ratio transformation of ingredients into products.
///
/// The first entry in `products` is the primary product; every other product
/// is tied to it proportionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<RecipePart>,
    pub products: Vec<RecipePart>,
    /// Cycle time in seconds
    pub time: f64,
    /// Catalog index of the producing building
    pub building: usize,
    /// Whether this is an alternate (unlockable) recipe
    pub alternate: bool,
    pub index: usize,
}

impl Recipe {
    /// Returns the primary product, if the recipe has any product at all.
    pub fn primary_product(&self) -> Option<&RecipePart> {
        self.products.first()
    }

    /// Converts a per-cycle quantity into a per-minute rate.
    ///
    /// ```
    /// use ficsplan::models::{Recipe, RecipePart};
    ///
    /// let recipe = Recipe {
    ///     id: "SteelBeam".to_string(),
    ///     name: "Steel Beam".to_string(),
    ///     ingredients: vec![RecipePart { item: 0, amount: 4.0 }],
    ///     products: vec![RecipePart { item: 1, amount: 1.0 }],
    ///     time: 4.0,
    ///     building: 0,
    ///     alternate: false,
    ///     index: 0,
    /// };
    /// assert_eq!(recipe.per_minute(4.0), 60.0);
    /// ```
    pub fn per_minute(&self, amount: f64) -> f64 {
        amount * 60.0 / self.time
    }

    /// Whether `other` undoes this recipe: its products are exactly this
    /// recipe's ingredients and its ingredients are exactly this recipe's
    /// products (compared as item sets).
    ///
    /// Packaging / unpackaging pairs are the typical case. Linking one into
    /// the other only moves resources in a circle.
    pub fn is_inverse_of(&self, other: &Recipe) -> bool {
        if self.index == other.index || self.ingredients.is_empty() || other.ingredients.is_empty() {
            return false;
        }
        item_set(&self.ingredients) == item_set(&other.products)
            && item_set(&self.products) == item_set(&other.ingredients)
    }
}

fn item_set(parts: &[RecipePart]) -> Vec<usize> {
    let mut items: Vec<usize> = parts.iter().map(|p| p.item).collect();
    items.sort_unstable();
    items.dedup();
    items
}

/// A production building type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    /// Clearance footprint in square metres
    pub area: f64,
    /// Power draw in MW at 100% clock
    pub power: f64,
    /// Number of somersloops the building accepts
    pub somersloop_slots: u32,
    pub index: usize,
}

/// Availability of a resource that is extracted from the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldResource {
    /// Catalog index of the item
    pub item: usize,
    /// Hard availability cap per minute
    pub max: f64,
    /// Cap used only to weight the objective; a lower value makes the
    /// resource look scarcer to the optimizer
    pub weighted_max: f64,
}

// ============================================================================
// CSV Row Structures
// ============================================================================

/// CSV row structure for `items.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub producible: bool,
}

fn default_unit() -> String {
    "item".to_string()
}

/// CSV row structure for `recipes.csv`.
///
/// `ingredients` and `products` are semicolon-separated `ItemId:amount`
/// lists, e.g. `OreIron:3;Coal:3`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRow {
    pub id: String,
    pub name: String,
    pub building: String,
    pub time: f64,
    #[serde(default)]
    pub ingredients: String,
    pub products: String,
    #[serde(default)]
    pub alternate: bool,
}

/// CSV row structure for `buildings.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingRow {
    pub id: String,
    pub name: String,
    pub area: f64,
    pub power: f64,
    #[serde(default)]
    pub somersloop_slots: u32,
}

/// CSV row structure for `world_resources.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldResourceRow {
    pub id: String,
    pub max: f64,
    pub weighted_max: f64,
}

// ============================================================================
// Production Request
// ============================================================================

/// How a declared input amount constrains the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputConstraint {
    /// The whole amount must be consumed (or left over as byproduct)
    Exact,
    /// Up to the amount may be drawn
    #[default]
    Max,
}

/// How a requested output amount is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputObjective {
    /// Produce exactly the amount
    #[default]
    Default,
    /// Produce as much as possible, at least the amount
    Max,
}

/// Primary optimization goal of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    /// Minimize weighted raw resource consumption
    #[default]
    MinimizeResources,
    /// Minimize total power draw
    MinimizePower,
    /// Minimize total building footprint
    MinimizeArea,
}

/// A resource the factory already has available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionInput {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub constraint: InputConstraint,
}

/// A resource the factory should deliver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionOutput {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub objective: OutputObjective,
}

/// Per-recipe machine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOverride {
    /// Somersloops placed in each machine (clamped to the building's slots)
    #[serde(default)]
    pub somersloops: Option<u32>,
    /// Clock speed in percent (clamped to 1..=250)
    #[serde(default)]
    pub overclock: Option<f64>,
}

impl NodeOverride {
    /// Returns the clock speed as a multiplier (1.0 = 100%).
    ///
    /// ```
    /// use ficsplan::models::NodeOverride;
    ///
    /// let node = NodeOverride { somersloops: None, overclock: Some(250.0) };
    /// assert_eq!(node.clock_factor(), 2.5);
    /// assert_eq!(NodeOverride::default().clock_factor(), 1.0);
    /// ```
    pub fn clock_factor(&self) -> f64 {
        match self.overclock {
            Some(percent) if percent.is_finite() => percent.clamp(1.0, 250.0) / 100.0,
            _ => 1.0,
        }
    }

    /// Returns the number of somersloops actually used in a building with
    /// `slots` slots.
    pub fn somersloops_used(&self, slots: u32) -> u32 {
        self.somersloops.unwrap_or(0).min(slots)
    }
}

/// A declarative production request, as submitted by the caller per solve.
///
/// The JSON form uses camelCase field names; every field is optional.
///
/// # Example
///
/// ```
/// use ficsplan::models::{ProductionRequest, ObjectiveMode};
///
/// let request = ProductionRequest::from_json(
///     r#"{"outputs": [{"resource": "SteelPlate", "amount": 5}], "objective": "minimize_power"}"#,
/// ).unwrap();
/// assert_eq!(request.outputs.len(), 1);
/// assert_eq!(request.objective, ObjectiveMode::MinimizePower);
/// assert!(request.allowed_recipes.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRequest {
    #[serde(default)]
    pub inputs: Vec<ProductionInput>,
    #[serde(default)]
    pub outputs: Vec<ProductionOutput>,
    /// Recipe ids that may be used; `None` allows every recipe
    #[serde(default)]
    pub allowed_recipes: Option<Vec<String>>,
    /// World resources that must not be extracted
    #[serde(default)]
    pub blocked_resources: Option<Vec<String>>,
    /// Buildings whose recipes must not be used
    #[serde(default)]
    pub blocked_buildings: Option<Vec<String>>,
    /// Overrides of world resource caps
    #[serde(default)]
    pub resources_amount: BTreeMap<String, f64>,
    #[serde(default)]
    pub objective: ObjectiveMode,
    /// Machine configuration keyed by recipe id
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeOverride>,
    /// Extra objective weight per unit of a recipe's primary output
    #[serde(default)]
    pub recipe_penalties: BTreeMap<String, f64>,
}

impl ProductionRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a request from its JSON form.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds an output that must be produced at exactly `amount` per minute.
    pub fn with_output(mut self, resource: &str, amount: f64) -> Self {
        self.outputs.push(ProductionOutput {
            resource: resource.to_string(),
            amount,
            objective: OutputObjective::Default,
        });
        self
    }

    /// Adds an output to maximize, with `floor` as the minimum amount.
    pub fn with_maximized_output(mut self, resource: &str, floor: f64) -> Self {
        self.outputs.push(ProductionOutput {
            resource: resource.to_string(),
            amount: floor,
            objective: OutputObjective::Max,
        });
        self
    }

    /// Adds a declared input.
    pub fn with_input(mut self, resource: &str, amount: f64, constraint: InputConstraint) -> Self {
        self.inputs.push(ProductionInput {
            resource: resource.to_string(),
            amount,
            constraint,
        });
        self
    }

    /// Restricts the plan to the given recipes.
    pub fn with_allowed_recipes(mut self, recipes: &[&str]) -> Self {
        self.allowed_recipes = Some(recipes.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Forbids extracting the given world resource.
    pub fn with_blocked_resource(mut self, resource: &str) -> Self {
        self.blocked_resources
            .get_or_insert_with(Vec::new)
            .push(resource.to_string());
        self
    }

    /// Forbids every recipe made in the given building.
    pub fn with_blocked_building(mut self, building: &str) -> Self {
        self.blocked_buildings
            .get_or_insert_with(Vec::new)
            .push(building.to_string());
        self
    }

    pub fn with_objective(mut self, objective: ObjectiveMode) -> Self {
        self.objective = objective;
        self
    }

    /// Sets the machine configuration of a recipe.
    pub fn with_node(mut self, recipe: &str, node: NodeOverride) -> Self {
        self.nodes.insert(recipe.to_string(), node);
        self
    }
}

// ============================================================================
// Solver Settings
// ============================================================================

/// Numeric tunables of the solver.
///
/// All fields have defaults, so a partial JSON document is enough to adjust
/// a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverSettings {
    /// Values whose magnitude is below this are treated as zero when decoding
    pub epsilon: f64,
    /// Numerator of a world resource's weight (`scale / weighted_max`)
    pub resource_weight_scale: f64,
    /// Multiplier applied to declared inputs of world resources, so that
    /// declared inputs are drawn before the same resource from the world
    pub input_discount: f64,
    /// Weight of declared inputs of non-world resources
    pub intermediate_input_weight: f64,
    /// Weight of every declared input when no world resource is reachable
    pub fallback_weight: f64,
    /// Weight of each maximized output (subtracted from the objective)
    pub maximize_weight: f64,
    /// Scale of resource terms added to power and area objectives
    pub tie_break_weight: f64,
    /// Force several maximized outputs to grow in proportion to each other
    pub lockstep_maximized_outputs: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            resource_weight_scale: 1000.0,
            input_discount: 0.99,
            intermediate_input_weight: 1e-4,
            fallback_weight: 100.0,
            maximize_weight: 1e5,
            tie_break_weight: 1e-3,
            lockstep_maximized_outputs: true,
        }
    }
}
