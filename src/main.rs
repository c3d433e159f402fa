//! ficsplan - Command Line Interface
//!
//! This is the main entry point for the production planner.
//! Run with `--help` to see all available options.

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use ficsplan::{
    data::{load_catalog, Catalog},
    display::display_results,
    models::{
        InputConstraint, ObjectiveMode, OutputObjective, ProductionInput, ProductionOutput, ProductionRequest,
    },
    optimizer::Planner,
    PlannerError,
};
use tracing_subscriber::EnvFilter;

/// Primary optimization goal.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Objective {
    Resources,
    Power,
    Area,
}

impl From<Objective> for ObjectiveMode {
    fn from(objective: Objective) -> Self {
        match objective {
            Objective::Resources => ObjectiveMode::MinimizeResources,
            Objective::Power => ObjectiveMode::MinimizePower,
            Objective::Area => ObjectiveMode::MinimizeArea,
        }
    }
}

/// Command-line arguments for ficsplan.
#[derive(Parser, Debug)]
#[command(name = "ficsplan")]
#[command(author, version, about = "Plan factory production chains with linear programming", long_about = None)]
struct Args {
    /// Production request as a JSON file (flags below are merged into it)
    #[arg(short, long)]
    request: Option<PathBuf>,

    /// Requested output, as ID:AMOUNT or ID:AMOUNT:max
    #[arg(short, long = "output", value_parser = parse_output)]
    outputs: Vec<ProductionOutput>,

    /// Available input, as ID:AMOUNT (upper bound) or ID:AMOUNT:exact
    #[arg(short, long = "input", value_parser = parse_input)]
    inputs: Vec<ProductionInput>,

    /// What to minimize
    #[arg(long, value_enum)]
    objective: Option<Objective>,

    /// Restrict the plan to these recipes (repeatable)
    #[arg(long = "allow-recipe")]
    allow_recipes: Vec<String>,

    /// Forbid extracting this world resource (repeatable)
    #[arg(long = "block-resource")]
    block_resources: Vec<String>,

    /// Forbid recipes made in this building (repeatable)
    #[arg(long = "block-building")]
    block_buildings: Vec<String>,

    /// Directory with items.csv, buildings.csv, recipes.csv and
    /// world_resources.csv (defaults to the embedded catalog)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Print the LP problem with readable variable names and exit
    #[arg(long)]
    print_problem: bool,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_output(arg: &str) -> Result<ProductionOutput, String> {
    let (resource, amount, mode) = split_amount_arg(arg)?;
    let objective = match mode {
        None => OutputObjective::Default,
        Some(m) if m.eq_ignore_ascii_case("max") => OutputObjective::Max,
        Some(m) => return Err(format!("unknown output mode '{}' (expected 'max')", m)),
    };
    Ok(ProductionOutput {
        resource,
        amount,
        objective,
    })
}

fn parse_input(arg: &str) -> Result<ProductionInput, String> {
    let (resource, amount, mode) = split_amount_arg(arg)?;
    let constraint = match mode {
        None => InputConstraint::Max,
        Some(m) if m.eq_ignore_ascii_case("max") => InputConstraint::Max,
        Some(m) if m.eq_ignore_ascii_case("exact") => InputConstraint::Exact,
        Some(m) => return Err(format!("unknown input mode '{}' (expected 'max' or 'exact')", m)),
    };
    Ok(ProductionInput {
        resource,
        amount,
        constraint,
    })
}

fn split_amount_arg(arg: &str) -> Result<(String, f64, Option<&str>), String> {
    let mut parts = arg.split(':');
    let resource = parts.next().filter(|r| !r.is_empty()).ok_or("missing resource id")?;
    let amount = parts
        .next()
        .ok_or_else(|| format!("missing amount in '{}'", arg))?
        .parse::<f64>()
        .map_err(|e| format!("invalid amount in '{}': {}", arg, e))?;
    let mode = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many fields in '{}'", arg));
    }
    Ok((resource.to_string(), amount, mode))
}

fn build_request(args: &Args) -> Result<ProductionRequest, Box<dyn Error>> {
    let mut request = match &args.request {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|source| PlannerError::Io {
                path: path.clone(),
                source,
            })?;
            ProductionRequest::from_json(&json)?
        }
        None => ProductionRequest::new(),
    };

    request.outputs.extend(args.outputs.iter().cloned());
    request.inputs.extend(args.inputs.iter().cloned());
    if let Some(objective) = args.objective {
        request.objective = objective.into();
    }
    if !args.allow_recipes.is_empty() {
        request
            .allowed_recipes
            .get_or_insert_with(Vec::new)
            .extend(args.allow_recipes.iter().cloned());
    }
    for resource in &args.block_resources {
        request = request.with_blocked_resource(resource);
    }
    for building in &args.block_buildings {
        request = request.with_blocked_building(building);
    }
    Ok(request)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "ficsplan=debug" } else { "ficsplan=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let catalog = match &args.data {
        Some(dir) => load_catalog(dir)?,
        None => Catalog::embedded()?,
    };
    let request = build_request(&args)?;
    if request.outputs.is_empty() {
        eprintln!("Error: no outputs requested. Use --output ID:AMOUNT or --request FILE.");
        std::process::exit(2);
    }

    let planner = Planner::new(Arc::new(catalog));

    if args.print_problem {
        let ctx = planner.build_context(&request)?;
        print!("{}", ctx.describe_problem()?);
        return Ok(());
    }

    let result = planner.solve(&request)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.report())?);
    } else {
        println!("ficsplan - Production Planner");
        println!("================================================================");
        println!();
        println!("Request:");
        for output in &request.outputs {
            println!("  Output:  {} {} ({:?})", output.resource, output.amount, output.objective);
        }
        for input in &request.inputs {
            println!("  Input:   {} {} ({:?})", input.resource, input.amount, input.constraint);
        }
        println!("  Objective: {:?}", request.objective);
        display_results(&result);
    }

    if !result.is_optimal() {
        std::process::exit(1);
    }
    Ok(())
}
