//! WebAssembly bindings.
//!
//! This module exposes the planner to JavaScript. Every function takes and
//! returns JSON strings; errors are reported inside the returned document
//! rather than thrown.

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::data::Catalog;
use crate::decode::{PlanReport, SolveStatus};
use crate::models::ProductionRequest;
use crate::optimizer::Planner;

/// JavaScript-friendly solve result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsSolveResult {
    pub success: bool,
    pub status: Option<SolveStatus>,
    pub error: Option<String>,
    pub report: Option<PlanReport>,
    pub elapsed_ms: f64,
}

impl JsSolveResult {
    fn error(message: String, elapsed_ms: f64) -> Self {
        log_error(&message);
        Self {
            success: false,
            status: None,
            error: Some(message),
            report: None,
            elapsed_ms,
        }
    }
}

/// JavaScript-friendly catalog item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCatalogItem {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub producible: bool,
    pub world_resource: bool,
    pub recipes: Vec<String>,
}

static CATALOG: OnceLock<Option<Arc<Catalog>>> = OnceLock::new();

// The embedded catalog, parsed on first use.
fn catalog() -> Result<Arc<Catalog>, String> {
    CATALOG
        .get_or_init(|| match Catalog::embedded() {
            Ok(catalog) => Some(Arc::new(catalog)),
            Err(e) => {
                log_error(&format!("failed to load embedded catalog: {}", e));
                None
            }
        })
        .clone()
        .ok_or_else(|| "embedded catalog is unavailable".to_string())
}

/// Solve a production request.
///
/// Takes a `ProductionRequest` as JSON and returns a JSON `JsSolveResult`.
#[wasm_bindgen]
pub fn solve_production(request_json: &str) -> String {
    let started = now_ms();
    let result = match run_solve(request_json) {
        Ok(report) => JsSolveResult {
            success: report.status == SolveStatus::Optimal,
            status: Some(report.status),
            error: report.error.clone(),
            report: Some(report),
            elapsed_ms: now_ms() - started,
        },
        Err(message) => JsSolveResult::error(message, now_ms() - started),
    };
    serde_json::to_string(&result).unwrap_or_default()
}

fn run_solve(request_json: &str) -> Result<PlanReport, String> {
    let request = ProductionRequest::from_json(request_json).map_err(|e| format!("Invalid input: {}", e))?;
    let planner = Planner::new(catalog()?);
    let result = planner.solve(&request).map_err(|e| e.to_string())?;
    Ok(result.report())
}

/// Render the LP problem for a request with readable variable names.
///
/// Returns the problem text, or a line starting with `error:`.
#[wasm_bindgen]
pub fn describe_problem(request_json: &str) -> String {
    let described = ProductionRequest::from_json(request_json)
        .map_err(|e| format!("Invalid input: {}", e))
        .and_then(|request| {
            let planner = Planner::new(catalog()?);
            let ctx = planner.build_context(&request).map_err(|e| e.to_string())?;
            ctx.describe_problem().map_err(|e| e.to_string())
        });
    match described {
        Ok(text) => text,
        Err(message) => {
            log_error(&message);
            format!("error: {}", message)
        }
    }
}

/// List every catalog item with the recipes producing it.
#[wasm_bindgen]
pub fn get_catalog_items() -> String {
    let Ok(catalog) = catalog() else {
        return "[]".to_string();
    };
    let items: Vec<JsCatalogItem> = catalog
        .items()
        .iter()
        .map(|item| JsCatalogItem {
            id: item.id.clone(),
            name: item.name.clone(),
            unit: item.unit.clone(),
            producible: item.producible,
            world_resource: catalog.is_world_resource(item.index),
            recipes: catalog
                .recipes_producing(item.index)
                .iter()
                .map(|&r| catalog.recipe(r).id.clone())
                .collect(),
        })
        .collect();
    serde_json::to_string(&items).unwrap_or_default()
}

/// Get version information.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

#[cfg(target_arch = "wasm32")]
fn log_error(message: &str) {
    web_sys::console::error_1(&JsValue::from_str(message));
}

#[cfg(not(target_arch = "wasm32"))]
fn log_error(message: &str) {
    tracing::error!("{}", message);
}
