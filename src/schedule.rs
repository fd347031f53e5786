//! Time-window propagation along a single route.
//!
//! Given the ordered request sequence of one vehicle, this module computes the
//! feasible arrival-time interval `[min, max]` at every position, propagating
//! forward from the vehicle's start window through cumulative travel times,
//! intersecting each node's own window, and bounding waiting slack and total
//! route duration. It is the feasibility check used by both construction and
//! local search before any route mutation is accepted.

use crate::instance::ProblemInstance;

/// Feasible arrival-time interval at one route position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalWindow {
    pub min: i64,
    pub max: i64,
}

/// The propagated schedule of one vehicle route.
///
/// `arrivals` is index-aligned with the request sequence handed to
/// [`propagate`]; the depot start interval is kept separately.
#[derive(Debug, Clone)]
pub struct RouteSchedule {
    /// Feasible departure interval at the depot
    pub start: ArrivalWindow,
    /// Arrival interval at every visited request, in route order
    pub arrivals: Vec<ArrivalWindow>,
}

impl RouteSchedule {
    /// Earliest possible arrival at the terminal node of the route.
    ///
    /// Returning to the depot is free, so this is the earliest finishing time
    /// of the shift. Minimized across vehicles it is the scheduling component
    /// the optimizer shrinks.
    pub fn terminal_min(&self) -> i64 {
        self.arrivals.last().map(|a| a.min).unwrap_or(self.start.min)
    }
}

/// Propagate arrival intervals along `route` (request indices, depot
/// excluded). Returns `None` as soon as any interval becomes empty: a window
/// that cannot be met, waiting above the allowed slack, or a route duration
/// beyond the vehicle's maximum.
pub fn propagate(instance: &ProblemInstance, route: &[usize]) -> Option<RouteSchedule> {
    let depot_tw = instance.window(instance.depot);

    if route.is_empty() {
        return Some(RouteSchedule {
            start: ArrivalWindow { min: depot_tw.earliest, max: depot_tw.latest },
            arrivals: Vec::new(),
        });
    }

    // Forward pass: earliest and latest arrival at each position. The latest
    // arrival may exceed the latest departure from the predecessor by at most
    // the waiting slack; a window opening further away than the slack allows
    // empties the interval here.
    let mut mins = Vec::with_capacity(route.len());
    let mut maxs = Vec::with_capacity(route.len());
    let mut prev = instance.depot;
    let mut prev_min = depot_tw.earliest;
    let mut prev_max = depot_tw.latest;

    for &node in route {
        let t = instance.travel(prev, node);
        let w = instance.window(node);
        let min = (prev_min + t).max(w.earliest);
        let max = (prev_max + t + instance.max_waiting).min(w.latest);
        if min > max {
            return None;
        }
        mins.push(min);
        maxs.push(max);
        prev = node;
        prev_min = min;
        prev_max = max;
    }

    // Backward pass: tighten arrival maxima so every later window stays
    // reachable without exceeding its own latest time.
    for k in (0..route.len() - 1).rev() {
        let t = instance.travel(route[k], route[k + 1]);
        maxs[k] = maxs[k].min(maxs[k + 1] - t);
        if maxs[k] < mins[k] {
            return None;
        }
    }

    let first_travel = instance.travel(instance.depot, route[0]);
    let start_max = depot_tw.latest.min(maxs[0] - first_travel);
    if start_max < depot_tw.earliest {
        return None;
    }

    // Duration bound. Elapsed time shrinks weakly as the start moves later,
    // so the latest feasible start gives the exact minimum duration: rerun
    // the forward mins anchored there and compare the terminal arrival.
    let mut dur_prev = start_max;
    let mut prev = instance.depot;
    for &node in route {
        let t = instance.travel(prev, node);
        dur_prev = (dur_prev + t).max(instance.window(node).earliest);
        prev = node;
    }
    if dur_prev - start_max > instance.max_route_duration {
        return None;
    }

    // Arrivals later than the latest start plus the maximum duration would
    // force the duration bound to be violated.
    let arrival_cap = start_max + instance.max_route_duration;
    for k in 0..route.len() {
        maxs[k] = maxs[k].min(arrival_cap);
        if maxs[k] < mins[k] {
            return None;
        }
    }

    let arrivals = mins
        .into_iter()
        .zip(maxs)
        .map(|(min, max)| ArrivalWindow { min, max })
        .collect();

    Some(RouteSchedule {
        start: ArrivalWindow { min: depot_tw.earliest, max: start_max },
        arrivals,
    })
}
