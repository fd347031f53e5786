//! Solution representation and reporting.
//!
//! A solution assigns every request either to a position in one vehicle's
//! route or to the dropped set. Routes implicitly start and end at the depot;
//! returning to the depot is free by construction of the time matrix. The
//! extractor converts a final solution into the reporting structure with
//! per-stop arrival bounds.

use serde::Serialize;

use crate::instance::ProblemInstance;
use crate::schedule;

/// Where a request ended up in a solution.
///
/// A tagged variant per node, so move validity checks are exhaustive instead
/// of relying on sentinel route positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Visited by `vehicle` at `position` within its route
    Visited { vehicle: usize, position: usize },
    /// Left out of all routes at the fixed penalty
    Dropped,
}

/// A multi-route assignment of requests to vehicles.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Ordered request indices per vehicle (depot start/end implicit)
    pub routes: Vec<Vec<usize>>,
    /// Per-node assignment, index-aligned with the instance locations.
    /// The depot entry is never read.
    pub assignment: Vec<Assignment>,
    /// Driven travel time plus drop penalties
    pub objective: i64,
}

impl Solution {
    /// The all-dropped baseline: every vehicle idle, every request dropped.
    /// Always feasible, so it is the starting point of any search.
    pub fn empty(instance: &ProblemInstance) -> Self {
        Solution {
            routes: vec![Vec::new(); instance.vehicles],
            assignment: vec![Assignment::Dropped; instance.num_nodes()],
            objective: instance.drop_penalty * instance.num_requests() as i64,
        }
    }

    /// Rebuild the per-node assignment table from the routes and refresh the
    /// objective. Call after any structural route change.
    pub fn sync(&mut self, instance: &ProblemInstance) {
        for entry in self.assignment.iter_mut() {
            *entry = Assignment::Dropped;
        }
        for (vehicle, route) in self.routes.iter().enumerate() {
            for (position, &node) in route.iter().enumerate() {
                self.assignment[node] = Assignment::Visited { vehicle, position };
            }
        }
        self.objective = self.recompute_objective(instance);
    }

    /// Travel time actually driven across all routes.
    pub fn travel_time(&self, instance: &ProblemInstance) -> i64 {
        self.routes.iter().map(|route| route_travel_time(instance, route)).sum()
    }

    /// Dropped request indices, in node order.
    pub fn dropped(&self, instance: &ProblemInstance) -> Vec<usize> {
        instance
            .request_indices()
            .filter(|&node| self.assignment[node] == Assignment::Dropped)
            .collect()
    }

    /// Recompute the objective from scratch: driven travel plus one penalty
    /// per dropped request. Used for verification and after mutations.
    pub fn recompute_objective(&self, instance: &ProblemInstance) -> i64 {
        self.travel_time(instance)
            + instance.drop_penalty * self.dropped(instance).len() as i64
    }

    /// Check that every route admits a feasible schedule.
    pub fn is_feasible(&self, instance: &ProblemInstance) -> bool {
        self.routes.iter().all(|route| schedule::propagate(instance, route).is_some())
    }
}

/// Travel time of one route: depot to first request, then between requests.
/// The return leg to the depot is free.
pub fn route_travel_time(instance: &ProblemInstance, route: &[usize]) -> i64 {
    if route.is_empty() {
        return 0;
    }
    let mut total = instance.travel(instance.depot, route[0]);
    for pair in route.windows(2) {
        total += instance.travel(pair[0], pair[1]);
    }
    total
}

/// One visited stop in the report.
#[derive(Debug, Clone, Serialize)]
pub struct Stop {
    pub id: String,
    pub arrival_min: i64,
    pub arrival_max: i64,
}

/// Ordered visit sequence of one vehicle with arrival bounds.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub vehicle: usize,
    pub start_min: i64,
    pub start_max: i64,
    pub stops: Vec<Stop>,
    pub travel_time: i64,
    /// Earliest finishing time of the shift
    pub finish_min: i64,
}

/// The final reporting structure handed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionReport {
    pub routes: Vec<RouteReport>,
    pub dropped: Vec<String>,
    pub objective: i64,
    pub feasible: bool,
}

/// Convert a final solution into the reporting structure.
///
/// Pure and side-effect free. A solution whose routes cannot be scheduled is
/// a programming-contract violation, not a recoverable error.
pub fn extract(instance: &ProblemInstance, solution: &Solution) -> SolutionReport {
    let routes = solution
        .routes
        .iter()
        .enumerate()
        .map(|(vehicle, route)| {
            let sched = schedule::propagate(instance, route)
                .expect("every route in a final solution must admit a schedule");
            let stops = route
                .iter()
                .zip(&sched.arrivals)
                .map(|(&node, arrival)| Stop {
                    id: instance.locations[node].id.clone(),
                    arrival_min: arrival.min,
                    arrival_max: arrival.max,
                })
                .collect();
            RouteReport {
                vehicle,
                start_min: sched.start.min,
                start_max: sched.start.max,
                stops,
                travel_time: route_travel_time(instance, route),
                finish_min: sched.terminal_min(),
            }
        })
        .collect();

    let dropped = solution
        .dropped(instance)
        .into_iter()
        .map(|node| instance.locations[node].id.clone())
        .collect();

    SolutionReport {
        routes,
        dropped,
        objective: solution.recompute_objective(instance),
        feasible: true,
    }
}

impl std::fmt::Display for SolutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Objective: {}", self.objective)?;
        if self.dropped.is_empty() {
            writeln!(f, "Dropped nodes: none")?;
        } else {
            writeln!(f, "Dropped nodes: {}", self.dropped.join(" "))?;
        }
        let mut total_time = 0;
        for route in &self.routes {
            writeln!(f, "Route for vehicle {}:", route.vehicle)?;
            write!(f, "  start Time({},{})", route.start_min, route.start_max)?;
            for stop in &route.stops {
                write!(f, " -> {} Time({},{})", stop.id, stop.arrival_min, stop.arrival_max)?;
            }
            writeln!(f)?;
            writeln!(f, "  Time of the route: {}min", route.finish_min)?;
            total_time += route.finish_min;
        }
        writeln!(f, "Total time of all routes: {}min", total_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Location, TimeWindow, DEPOT_ID};

    fn instance_with_matrix(matrix: Vec<Vec<i64>>, windows: Vec<TimeWindow>) -> ProblemInstance {
        let n = matrix.len();
        let locations: Vec<Location> = (0..n)
            .map(|i| {
                let id = if i == 0 { DEPOT_ID.to_string() } else { format!("node_{}", i) };
                Location { id, lat: 0.0, lng: 0.0, time_window: Some(windows[i]) }
            })
            .collect();
        ProblemInstance {
            name: "test".to_string(),
            locations,
            matrix,
            windows,
            vehicles: 2,
            depot: 0,
            max_route_duration: 480,
            max_waiting: 60,
            drop_penalty: 1000,
        }
    }

    fn three_node_instance() -> ProblemInstance {
        let matrix = vec![
            vec![0, 30, 40],
            vec![0, 0, 20],
            vec![0, 20, 0],
        ];
        let windows =
            vec![TimeWindow::new(0, 480), TimeWindow::new(0, 240), TimeWindow::new(0, 480)];
        instance_with_matrix(matrix, windows)
    }

    #[test]
    fn test_empty_solution_objective() {
        let instance = three_node_instance();
        let solution = Solution::empty(&instance);
        assert_eq!(solution.objective, 2000);
        assert_eq!(solution.recompute_objective(&instance), 2000);
        assert!(solution.is_feasible(&instance));
    }

    #[test]
    fn test_objective_accounting() {
        let instance = three_node_instance();
        let mut solution = Solution::empty(&instance);
        solution.routes[0] = vec![1, 2];
        solution.sync(&instance);

        // depot->1 (30) + 1->2 (20), free return, no drops
        assert_eq!(solution.travel_time(&instance), 50);
        assert_eq!(solution.objective, 50);
        assert_eq!(
            solution.assignment[2],
            Assignment::Visited { vehicle: 0, position: 1 }
        );
    }

    #[test]
    fn test_partial_assignment_pays_penalty() {
        let instance = three_node_instance();
        let mut solution = Solution::empty(&instance);
        solution.routes[1] = vec![1];
        solution.sync(&instance);

        assert_eq!(solution.objective, 30 + 1000);
        assert_eq!(solution.dropped(&instance), vec![2]);
    }

    #[test]
    fn test_extract_report() {
        let instance = three_node_instance();
        let mut solution = Solution::empty(&instance);
        solution.routes[0] = vec![1, 2];
        solution.sync(&instance);

        let report = extract(&instance, &solution);
        assert!(report.feasible);
        assert_eq!(report.objective, 50);
        assert!(report.dropped.is_empty());

        let route = &report.routes[0];
        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[0].arrival_min, 30);
        assert_eq!(route.stops[1].arrival_min, 50);
        assert_eq!(route.finish_min, 50);

        // Every reported arrival bound lies inside the declared window.
        for (stop, &node) in route.stops.iter().zip(&solution.routes[0]) {
            let w = instance.window(node);
            assert!(w.contains(stop.arrival_min));
            assert!(w.contains(stop.arrival_max));
        }
    }

    #[test]
    fn test_display_mentions_dropped() {
        let instance = three_node_instance();
        let mut solution = Solution::empty(&instance);
        solution.routes[0] = vec![1];
        solution.sync(&instance);

        let text = extract(&instance, &solution).to_string();
        assert!(text.contains("Dropped nodes: node_2"));
        assert!(text.contains("Route for vehicle 0"));
    }
}
