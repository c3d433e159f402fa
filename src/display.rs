//! Display and formatting utilities.
//!
//! This module renders a solved production plan as a plain-text report for
//! the command-line interface.

use std::fmt::Write as _;

use crate::decode::{NodeKind, ResourceSource, SolutionResult, SolveStatus};

/// Formats a rate per minute.
///
/// # Example
///
/// ```
/// use ficsplan::display::format_rate;
///
/// assert_eq!(format_rate(12.5), "12.50/min");
/// assert_eq!(format_rate(1800.0), "1800.00/min");
/// ```
pub fn format_rate(per_minute: f64) -> String {
    format!("{:.2}/min", per_minute)
}

/// Formats a power draw given in MW, switching to GW above 1000 MW.
///
/// ```
/// use ficsplan::display::format_power;
///
/// assert_eq!(format_power(4.0), "4.0 MW");
/// assert_eq!(format_power(2500.0), "2.50 GW");
/// ```
pub fn format_power(megawatts: f64) -> String {
    if megawatts.abs() >= 1000.0 {
        format!("{:.2} GW", megawatts / 1000.0)
    } else {
        format!("{:.1} MW", megawatts)
    }
}

/// Formats a footprint in square metres.
pub fn format_area(square_metres: f64) -> String {
    format!("{:.0} m2", square_metres)
}

/// Renders the complete report for a solve.
///
/// The report contains:
/// - The solve status (and the engine error, if any)
/// - The machine groups with building, count and clock
/// - Raw resources drawn from the world and from declared inputs
/// - Requested outputs and leftover byproducts
/// - Total power and area
pub fn render_results(result: &SolutionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "+================================================================+");
    let _ = writeln!(out, "|                  PRODUCTION PLAN RESULTS                       |");
    let _ = writeln!(out, "+================================================================+");
    let _ = writeln!(out);
    let _ = writeln!(out, "[STATUS] {:?}", result.status);

    if result.status != SolveStatus::Optimal {
        if let Some(error) = &result.error {
            let _ = writeln!(out, "  Error: {}", error);
        }
        render_outputs(&mut out, result);
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[MACHINES]");
    let _ = writeln!(out, "----------------------------------------------------------------");
    let _ = writeln!(
        out,
        "{:<26} {:<16} {:>8} {:>7} {:>14}",
        "Recipe", "Building", "Count", "Clock", "Output"
    );
    let _ = writeln!(out, "----------------------------------------------------------------");
    for node in &result.nodes {
        if let NodeKind::Machine {
            recipe,
            building,
            machines,
            somersloops,
            overclock,
            ..
        } = &node.kind
        {
            let sloops = if *somersloops > 0 {
                format!(" (+{} sloop)", somersloops)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "{:<26} {:<16} {:>8.2} {:>6.0}% {:>14}{}",
                recipe,
                building,
                machines,
                overclock,
                format_rate(node.value),
                sloops
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[RAW RESOURCES]");
    let _ = writeln!(out, "----------------------------------------------------------------");
    for node in &result.nodes {
        if let NodeKind::Resource { resource, source } = &node.kind {
            let from = match source {
                ResourceSource::World => "world".to_string(),
                ResourceSource::Input { index } => format!("input #{}", index),
            };
            let _ = writeln!(out, "  {:<24} {:<10} {:>14}", resource, from, format_rate(node.value));
        }
    }

    render_outputs(&mut out, result);

    let leftovers: Vec<_> = result
        .nodes
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::Byproduct {
                resource,
                requested: false,
            } => Some((resource, node.value)),
            _ => None,
        })
        .collect();
    if !leftovers.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "[BYPRODUCTS]");
        let _ = writeln!(out, "----------------------------------------------------------------");
        for (resource, value) in leftovers {
            let _ = writeln!(out, "  {:<35} {:>14}", resource, format_rate(value));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[SUMMARY]");
    let _ = writeln!(out, "----------------------------------------------------------------");
    let _ = writeln!(out, "  Total Power:      {}", format_power(result.total_power()));
    let _ = writeln!(out, "  Total Area:       {}", format_area(result.total_area()));
    let machines = result
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Machine { .. }))
        .count();
    let _ = writeln!(out, "  Machine Groups:   {}", machines);
    let _ = writeln!(out, "  Flows:            {}", result.edges.len());
    out
}

fn render_outputs(out: &mut String, result: &SolutionResult) {
    if result.outputs.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[OUTPUTS]");
    let _ = writeln!(out, "----------------------------------------------------------------");
    let epsilon = result.context().settings().epsilon;
    for output in &result.outputs {
        let marker = if output.solved + epsilon < output.requested {
            "  (UNMET)"
        } else if output.maximized {
            "  (maximized)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {:<24} requested {:>14}  solved {:>14}{}",
            output.resource,
            format_rate(output.requested),
            format_rate(output.solved),
            marker
        );
    }
}

/// Prints the report for a solve to stdout.
pub fn display_results(result: &SolutionResult) {
    print!("{}", render_results(result));
}
