//! Flow Consolidator.
//!
//! After expansion every Resource aggregator has a set of producers
//! (world, inputs, recipe outputs) and a set of consumers (recipe
//! ingredients). Consolidation balances the two sides and splits the flow
//! into one link variable per producer/consumer pair, so the decoded plan
//! knows which machine feeds which.

use crate::context::{Constraint, SolverContext};
use crate::error::{PlannerError, Result};
use crate::graph::{Consumer, EdgeKind, Producer, VarId};

/// Emits the conservation and link constraints of every resource.
///
/// # Errors
///
/// [`PlannerError::Inconsistent`] if an aggregator is connected to a
/// variable that can be neither a producer nor a consumer.
pub fn consolidate_flows(ctx: &mut SolverContext) -> Result<()> {
    let aggregators: Vec<usize> = ctx
        .graph()
        .nodes()
        .filter_map(|node| match node.var {
            VarId::Resource { resource } => Some(resource),
            _ => None,
        })
        .collect();

    for resource in aggregators {
        consolidate_resource(ctx, resource)?;
    }

    let byproducts: Vec<VarId> = ctx
        .graph()
        .nodes()
        .map(|node| node.var)
        .filter(|var| matches!(var, VarId::Byproduct { .. }))
        .collect();

    for byproduct in byproducts {
        let links = ctx.graph().links_into(byproduct);
        let mut terms = vec![(byproduct, 1.0)];
        terms.extend(links.into_iter().map(|link| (link, -1.0)));
        ctx.add_constraint(Constraint::equal(terms, 0.0));
    }

    tracing::debug!(
        nodes = ctx.graph().len(),
        edges = ctx.graph().edge_count(),
        constraints = ctx.constraints().len(),
        "consolidated flows"
    );
    Ok(())
}

fn consolidate_resource(ctx: &mut SolverContext, resource: usize) -> Result<()> {
    let aggregator = VarId::Resource { resource };
    let byproduct = VarId::Byproduct { resource };

    let producers = ctx.graph().producers_of(aggregator);
    let consumers = ctx.graph().consumers_of(aggregator);

    let producers = producers
        .into_iter()
        .map(|var| match var.as_producer() {
            Some((r, producer)) if r == resource => Ok((var, producer)),
            _ => Err(unexpected(var, aggregator)),
        })
        .collect::<Result<Vec<_>>>()?;
    let consumers = consumers
        .into_iter()
        .map(|var| match var.as_consumer() {
            Some((r, consumer @ Consumer::Recipe(_))) if r == resource => Ok((var, consumer)),
            _ => Err(unexpected(var, aggregator)),
        })
        .collect::<Result<Vec<_>>>()?;

    ctx.graph_mut().ensure_node(byproduct);

    if producers.is_empty() {
        ctx.add_constraint(Constraint::equal(vec![(aggregator, 1.0)], 0.0));
        for &(consumer, _) in &consumers {
            ctx.add_constraint(Constraint::equal(vec![(consumer, 1.0)], 0.0));
        }
        return Ok(());
    }

    let mut supply = vec![(aggregator, -1.0)];
    supply.extend(producers.iter().map(|&(var, _)| (var, 1.0)));
    ctx.add_constraint(Constraint::equal(supply, 0.0));

    let mut demand = vec![(aggregator, 1.0), (byproduct, -1.0)];
    demand.extend(consumers.iter().map(|&(var, _)| (var, -1.0)));
    ctx.add_constraint(Constraint::equal(demand, 0.0));

    let catalog = ctx.catalog_arc();
    for &(producer_var, producer) in &producers {
        let mut links = Vec::with_capacity(consumers.len() + 1);
        for &(consumer_var, consumer) in &consumers {
            if let (Producer::Recipe(from), Consumer::Recipe(to)) = (producer, consumer) {
                if catalog.recipe(from).is_inverse_of(catalog.recipe(to)) {
                    continue;
                }
            }
            let link = VarId::Link {
                resource,
                from: producer,
                to: consumer,
            };
            ctx.graph_mut()
                .add_edge(producer_var, consumer_var, EdgeKind::Link(link));
            links.push(link);
        }

        let share = VarId::Link {
            resource,
            from: producer,
            to: Consumer::Byproduct,
        };
        ctx.graph_mut()
            .add_edge(producer_var, byproduct, EdgeKind::Link(share));
        links.push(share);

        let mut terms = vec![(producer_var, 1.0)];
        terms.extend(links.into_iter().map(|link| (link, -1.0)));
        ctx.add_constraint(Constraint::equal(terms, 0.0));
    }

    for &(consumer_var, _) in &consumers {
        let mut terms = vec![(consumer_var, 1.0)];
        terms.extend(ctx.graph().links_into(consumer_var).into_iter().map(|link| (link, -1.0)));
        ctx.add_constraint(Constraint::equal(terms, 0.0));
    }

    Ok(())
}

fn unexpected(var: VarId, aggregator: VarId) -> PlannerError {
    PlannerError::Inconsistent(format!("unexpected node type {} connected to {}", var, aggregator))
}
