//! # ficsplan
//!
//! A command-line tool and library that plans factory production chains with
//! linear programming.
//!
//! Given the outputs a factory should deliver (and optionally the resources
//! it already has), the planner decides which recipes to run, at what rate,
//! in which buildings and drawing which raw resources, subject to:
//!
//! - Recipe allow-lists and blocked buildings
//! - World resource caps and blocked resources
//! - Per-recipe overclock and somersloop amplification
//!
//! ## Modules
//!
//! - [`models`] - Catalog entities, production requests and solver settings
//! - [`data`] - CSV catalog loading and the embedded default catalog
//! - [`graph`] - Typed solver variables and the variable graph
//! - [`context`] - Per-solve state and problem formulation
//! - [`builder`] - Recursive expansion of the recipe graph
//! - [`consolidate`] - Flow balancing between producers and consumers
//! - [`objective`] - Objective composition
//! - [`lp`] - LP text format and the simplex engine
//! - [`decode`] - Mapping solved values back onto a production plan
//! - [`optimizer`] - The `Planner` entry point
//! - [`display`] - Output formatting
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use ficsplan::{
//!     data::Catalog,
//!     models::{InputConstraint, ProductionRequest},
//!     optimizer::Planner,
//!     display::render_results,
//! };
//!
//! let catalog = Arc::new(Catalog::embedded().unwrap());
//! let planner = Planner::new(catalog);
//!
//! // 5 steel beams per minute from 90 steel ingots we already have
//! let request = ProductionRequest::new()
//!     .with_output("SteelPlate", 5.0)
//!     .with_input("SteelIngot", 90.0, InputConstraint::Max);
//!
//! let result = planner.solve(&request).unwrap();
//! assert!(result.is_optimal());
//! println!("{}", render_results(&result));
//! ```
//!
//! ## Objective Modes
//!
//! 1. **Resources** (default): minimize raw resource extraction, weighting
//!    each resource by its scarcity.
//! 2. **Power**: minimize total power draw.
//! 3. **Area**: minimize total building footprint.
//!
//! Outputs requested with the `max` objective are maximized on top of the
//! primary mode.

pub mod builder;
pub mod consolidate;
pub mod context;
pub mod data;
pub mod decode;
pub mod display;
pub mod error;
pub mod graph;
pub mod lp;
pub mod models;
pub mod objective;
pub mod optimizer;
pub mod wasm;

pub use error::{PlannerError, Result};
