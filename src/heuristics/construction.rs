//! Construction heuristics.
//!
//! The initial assignment is built by cheapest insertion: repeatedly pick the
//! unrouted request whose best feasible insertion anywhere in the fleet has
//! the smallest marginal travel-time increase. Requests that no vehicle can
//! serve within the waiting and duration bounds stay unassigned and are
//! charged the drop penalty later.

use log::debug;

use crate::instance::ProblemInstance;
use crate::schedule;
use crate::solution::Solution;

/// Trait for initial-solution builders.
pub trait ConstructionHeuristic {
    fn construct(&self, instance: &ProblemInstance) -> Solution;
    fn name(&self) -> &str;
}

/// Cheapest-insertion construction.
///
/// Every insertion is validated through the time-window propagator before it
/// is considered, so the resulting partial solution is window-feasible for
/// every inserted node. Ties are broken by lowest node index.
pub struct CheapestInsertion;

impl CheapestInsertion {
    pub fn new() -> Self {
        CheapestInsertion
    }

    /// Marginal travel increase of inserting `node` into `route` at `pos`.
    /// Appending at the end only pays the leg in, since the depot return is
    /// free.
    fn insertion_delta(
        instance: &ProblemInstance,
        route: &[usize],
        node: usize,
        pos: usize,
    ) -> i64 {
        let prev = if pos == 0 { instance.depot } else { route[pos - 1] };
        match route.get(pos) {
            Some(&next) => {
                instance.travel(prev, node) + instance.travel(node, next)
                    - instance.travel(prev, next)
            }
            None => instance.travel(prev, node),
        }
    }

    /// Best feasible insertion of `node` across one route, if any.
    fn best_insertion_in_route(
        instance: &ProblemInstance,
        route: &[usize],
        node: usize,
    ) -> Option<(usize, i64)> {
        let mut best: Option<(usize, i64)> = None;
        for pos in 0..=route.len() {
            let delta = Self::insertion_delta(instance, route, node, pos);
            if best.is_some_and(|(_, d)| delta >= d) {
                continue;
            }
            let mut candidate = route.to_vec();
            candidate.insert(pos, node);
            if schedule::propagate(instance, &candidate).is_some() {
                best = Some((pos, delta));
            }
        }
        best
    }
}

impl Default for CheapestInsertion {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for CheapestInsertion {
    fn construct(&self, instance: &ProblemInstance) -> Solution {
        let mut solution = Solution::empty(instance);
        let mut unrouted: Vec<usize> = instance.request_indices().collect();

        while !unrouted.is_empty() {
            let mut best: Option<(usize, usize, usize, i64)> = None; // node, vehicle, pos, delta

            // `unrouted` is kept in ascending node order, so the strict
            // comparison breaks ties by lowest node index.
            for &node in &unrouted {
                for (vehicle, route) in solution.routes.iter().enumerate() {
                    if let Some((pos, delta)) = Self::best_insertion_in_route(instance, route, node)
                    {
                        if best.map_or(true, |(_, _, _, d)| delta < d) {
                            best = Some((node, vehicle, pos, delta));
                        }
                    }
                }
            }

            match best {
                Some((node, vehicle, pos, delta)) => {
                    solution.routes[vehicle].insert(pos, node);
                    unrouted.retain(|&n| n != node);
                    debug!(
                        "inserted {} into vehicle {} at {} (delta {}min)",
                        instance.locations[node].id, vehicle, pos, delta
                    );
                }
                None => break,
            }
        }

        if !unrouted.is_empty() {
            debug!("{} requests could not be inserted feasibly", unrouted.len());
        }

        solution.sync(instance);
        solution
    }

    fn name(&self) -> &str {
        "CheapestInsertion"
    }
}
