//! Guided local search improvement under a wall-clock budget.
//!
//! The optimizer mutates the current multi-route solution with relocation,
//! exchange and drop/reinsert moves, validating every candidate through the
//! time-window propagator before acceptance. Moves are scored against an
//! augmented objective `travel + lambda * arc_penalty`; when the search hits a
//! local optimum, the most time-costly arcs currently driven are penalized so
//! the landscape shifts enough to escape. True objective bookkeeping (travel
//! plus drop penalties) is kept separate and decides the best-found snapshot.

use std::time::{Duration, Instant};

use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::heuristics::construction::{CheapestInsertion, ConstructionHeuristic};
use crate::instance::ProblemInstance;
use crate::schedule;
use crate::solution::Solution;

const EPSILON: f64 = 1e-9;

/// Trait for local search improvement methods
pub trait LocalSearch {
    fn improve(&self, instance: &ProblemInstance, solution: &mut Solution) -> bool;
    fn name(&self) -> &str;
}

/// Search parameters.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Wall-clock budget for the anytime loop
    pub time_limit: Duration,
    /// Weight of accumulated arc penalties in the augmented cost
    pub lambda: f64,
    /// Random seed (tie-breaking among equal moves and penalized arcs)
    pub seed: u64,
    /// Deterministic budget substitute: when set, the loop runs exactly this
    /// many iterations instead of polling the wall clock. Used by tests.
    pub max_iterations: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            time_limit: Duration::from_secs(5),
            lambda: 0.3,
            seed: 42,
            max_iterations: None,
        }
    }
}

/// Per-arc penalty counters for one search run.
///
/// Flat row-major storage indexed by `(from, to)`. The counters are owned by
/// the optimizer instance, never shared across runs, so independent searches
/// (multi-start, tests) cannot interfere.
struct ArcPenalties {
    data: Vec<u32>,
    n: usize,
}

impl ArcPenalties {
    fn new(n: usize) -> Self {
        ArcPenalties { data: vec![0; n * n], n }
    }

    #[inline]
    fn get(&self, from: usize, to: usize) -> u32 {
        self.data[from * self.n + to]
    }

    #[inline]
    fn increment(&mut self, from: usize, to: usize) {
        let slot = &mut self.data[from * self.n + to];
        *slot = slot.saturating_add(1);
    }
}

/// A candidate mutation of the current solution.
#[derive(Debug, Clone, Copy)]
enum Move {
    /// Move one visited node to another route/position
    Relocate { from_vehicle: usize, from_pos: usize, to_vehicle: usize, to_pos: usize },
    /// Swap two visited nodes between positions (same or different routes)
    Exchange { vehicle_a: usize, pos_a: usize, vehicle_b: usize, pos_b: usize },
    /// Remove a visited node, paying the drop penalty
    Drop { vehicle: usize, pos: usize },
    /// Insert a dropped node at a route position
    Reinsert { node: usize, vehicle: usize, to_pos: usize },
}

/// Guided local search optimizer.
///
/// Owns nothing across runs: penalty counters and random state are created
/// per `improve` call, so the type is safe to reuse for independent searches.
pub struct GuidedLocalSearch {
    pub config: SearchConfig,
}

impl GuidedLocalSearch {
    pub fn new(config: SearchConfig) -> Self {
        GuidedLocalSearch { config }
    }

    /// Augmented cost of one arc: raw travel time plus the penalty term.
    #[inline]
    fn arc_cost(&self, instance: &ProblemInstance, penalties: &ArcPenalties, from: usize, to: usize) -> f64 {
        instance.travel(from, to) as f64 + self.config.lambda * penalties.get(from, to) as f64
    }

    /// Augmented travel cost of a whole route (depot return is free).
    fn route_cost(&self, instance: &ProblemInstance, penalties: &ArcPenalties, route: &[usize]) -> f64 {
        if route.is_empty() {
            return 0.0;
        }
        let mut cost = self.arc_cost(instance, penalties, instance.depot, route[0]);
        for pair in route.windows(2) {
            cost += self.arc_cost(instance, penalties, pair[0], pair[1]);
        }
        cost
    }

    /// Build the mutated routes a move would produce. Returns the affected
    /// vehicles and their new request sequences.
    fn mutated_routes(solution: &Solution, mv: &Move) -> Vec<(usize, Vec<usize>)> {
        match *mv {
            Move::Relocate { from_vehicle, from_pos, to_vehicle, to_pos } => {
                if from_vehicle == to_vehicle {
                    let mut route = solution.routes[from_vehicle].clone();
                    let node = route.remove(from_pos);
                    let adj = if to_pos > from_pos { to_pos - 1 } else { to_pos };
                    route.insert(adj, node);
                    vec![(from_vehicle, route)]
                } else {
                    let mut from = solution.routes[from_vehicle].clone();
                    let mut to = solution.routes[to_vehicle].clone();
                    let node = from.remove(from_pos);
                    to.insert(to_pos, node);
                    vec![(from_vehicle, from), (to_vehicle, to)]
                }
            }
            Move::Exchange { vehicle_a, pos_a, vehicle_b, pos_b } => {
                if vehicle_a == vehicle_b {
                    let mut route = solution.routes[vehicle_a].clone();
                    route.swap(pos_a, pos_b);
                    vec![(vehicle_a, route)]
                } else {
                    let mut a = solution.routes[vehicle_a].clone();
                    let mut b = solution.routes[vehicle_b].clone();
                    std::mem::swap(&mut a[pos_a], &mut b[pos_b]);
                    vec![(vehicle_a, a), (vehicle_b, b)]
                }
            }
            Move::Drop { vehicle, pos } => {
                let mut route = solution.routes[vehicle].clone();
                route.remove(pos);
                vec![(vehicle, route)]
            }
            Move::Reinsert { node, vehicle, to_pos } => {
                let mut route = solution.routes[vehicle].clone();
                route.insert(to_pos, node);
                vec![(vehicle, route)]
            }
        }
    }

    /// Augmented-objective delta of a move, or `None` when any mutated route
    /// admits no feasible schedule.
    fn evaluate(
        &self,
        instance: &ProblemInstance,
        solution: &Solution,
        penalties: &ArcPenalties,
        mv: &Move,
    ) -> Option<f64> {
        let mutated = Self::mutated_routes(solution, mv);

        let mut delta = 0.0;
        for (vehicle, route) in &mutated {
            schedule::propagate(instance, route)?;
            delta += self.route_cost(instance, penalties, route)
                - self.route_cost(instance, penalties, &solution.routes[*vehicle]);
        }

        // Drop penalties enter the augmented objective at their raw value.
        match mv {
            Move::Drop { .. } => delta += instance.drop_penalty as f64,
            Move::Reinsert { .. } => delta -= instance.drop_penalty as f64,
            _ => {}
        }

        Some(delta)
    }

    /// Apply a move to the solution and refresh its bookkeeping.
    fn apply(instance: &ProblemInstance, solution: &mut Solution, mv: &Move) {
        for (vehicle, route) in Self::mutated_routes(solution, mv) {
            solution.routes[vehicle] = route;
        }
        solution.sync(instance);
    }

    /// Scan the full neighborhood for the best augmented-improving move.
    /// Equal-quality moves are tie-broken uniformly at random so different
    /// seeds explore different trajectories.
    fn best_move(
        &self,
        instance: &ProblemInstance,
        solution: &Solution,
        penalties: &ArcPenalties,
        rng: &mut ChaCha8Rng,
    ) -> Option<Move> {
        let mut best: Option<Move> = None;
        let mut best_delta = -EPSILON;
        let mut ties = 0usize;

        let mut consider = |mv: Move, delta: f64, rng: &mut ChaCha8Rng| {
            if delta < best_delta - EPSILON {
                best = Some(mv);
                best_delta = delta;
                ties = 1;
            } else if best.is_some() && (delta - best_delta).abs() <= EPSILON {
                ties += 1;
                if rng.gen_range(0..ties) == 0 {
                    best = Some(mv);
                }
            }
        };

        let vehicles = solution.routes.len();

        // Relocations
        for from_vehicle in 0..vehicles {
            for from_pos in 0..solution.routes[from_vehicle].len() {
                for to_vehicle in 0..vehicles {
                    let len = solution.routes[to_vehicle].len();
                    for to_pos in 0..=len {
                        if from_vehicle == to_vehicle
                            && (to_pos == from_pos || to_pos == from_pos + 1)
                        {
                            continue;
                        }
                        let mv = Move::Relocate { from_vehicle, from_pos, to_vehicle, to_pos };
                        if let Some(delta) = self.evaluate(instance, solution, penalties, &mv) {
                            consider(mv, delta, rng);
                        }
                    }
                }
            }
        }

        // Exchanges
        for vehicle_a in 0..vehicles {
            for pos_a in 0..solution.routes[vehicle_a].len() {
                for vehicle_b in vehicle_a..vehicles {
                    let start_b = if vehicle_a == vehicle_b { pos_a + 1 } else { 0 };
                    for pos_b in start_b..solution.routes[vehicle_b].len() {
                        let mv = Move::Exchange { vehicle_a, pos_a, vehicle_b, pos_b };
                        if let Some(delta) = self.evaluate(instance, solution, penalties, &mv) {
                            consider(mv, delta, rng);
                        }
                    }
                }
            }
        }

        // Drops
        for vehicle in 0..vehicles {
            for pos in 0..solution.routes[vehicle].len() {
                let mv = Move::Drop { vehicle, pos };
                if let Some(delta) = self.evaluate(instance, solution, penalties, &mv) {
                    consider(mv, delta, rng);
                }
            }
        }

        // Reinsertions of dropped nodes
        for node in solution.dropped(instance) {
            for vehicle in 0..vehicles {
                for to_pos in 0..=solution.routes[vehicle].len() {
                    let mv = Move::Reinsert { node, vehicle, to_pos };
                    if let Some(delta) = self.evaluate(instance, solution, penalties, &mv) {
                        consider(mv, delta, rng);
                    }
                }
            }
        }

        best
    }

    /// Escape a local optimum: raise the penalty of the currently driven
    /// arcs with maximal utility `travel / (1 + penalty)`, so the augmented
    /// landscape tilts away from the most expensive structures in use.
    fn penalize(
        &self,
        instance: &ProblemInstance,
        solution: &Solution,
        penalties: &mut ArcPenalties,
    ) {
        let mut arcs: Vec<(usize, usize, f64)> = Vec::new();

        let mut visit = |from: usize, to: usize| {
            let travel = instance.travel(from, to) as f64;
            let utility = travel / (1.0 + penalties.get(from, to) as f64);
            arcs.push((from, to, utility));
        };

        for route in &solution.routes {
            if let Some(&first) = route.first() {
                visit(instance.depot, first);
            }
            for pair in route.windows(2) {
                visit(pair[0], pair[1]);
            }
        }

        let Some(max_utility) = arcs.iter().map(|&(_, _, u)| OrderedFloat(u)).max() else {
            return;
        };

        for (from, to, utility) in arcs {
            if (utility - max_utility.0).abs() <= EPSILON {
                penalties.increment(from, to);
                debug!(
                    "penalized arc {} -> {} (utility {:.2})",
                    instance.locations[from].id, instance.locations[to].id, utility
                );
            }
        }
    }
}

impl LocalSearch for GuidedLocalSearch {
    fn improve(&self, instance: &ProblemInstance, solution: &mut Solution) -> bool {
        let start = Instant::now();
        let deadline = start + self.config.time_limit;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut penalties = ArcPenalties::new(instance.num_nodes());

        let initial_objective = solution.objective;
        let mut best = solution.clone();
        let mut iterations: u64 = 0;

        loop {
            // The anytime loop yields at iteration boundaries only: one
            // deadline poll (or iteration-count check in test mode) per pass.
            let budget_left = match self.config.max_iterations {
                Some(limit) => iterations < limit,
                None => Instant::now() < deadline,
            };
            if !budget_left {
                break;
            }
            iterations += 1;

            match self.best_move(instance, solution, &penalties, &mut rng) {
                Some(mv) => {
                    Self::apply(instance, solution, &mv);
                    if solution.objective < best.objective {
                        best = solution.clone();
                        debug!("new best objective {} at iteration {}", best.objective, iterations);
                    }
                }
                None => {
                    // Local optimum under the augmented objective.
                    self.penalize(instance, solution, &mut penalties);
                }
            }
        }

        info!(
            "{}: {} iterations in {:.2}s, objective {} -> {}",
            self.name(),
            iterations,
            start.elapsed().as_secs_f64(),
            initial_objective,
            best.objective
        );

        // Never return an in-progress mutation: the best snapshot is the
        // answer even when the loop was cut mid-descent.
        *solution = best;
        solution.objective < initial_objective
    }

    fn name(&self) -> &str {
        "GuidedLocalSearch"
    }
}

/// Multi-start wrapper: independent construction-plus-search runs with
/// isolated state, executed in parallel, comparing final objectives only.
pub struct MultiStartSolver {
    pub starts: usize,
    pub config: SearchConfig,
}

impl MultiStartSolver {
    pub fn new(starts: usize, config: SearchConfig) -> Self {
        MultiStartSolver { starts: starts.max(1), config }
    }

    pub fn run(&self, instance: &ProblemInstance) -> Solution {
        (0..self.starts)
            .into_par_iter()
            .map(|k| {
                let mut config = self.config.clone();
                config.seed = self.config.seed.wrapping_add(k as u64);
                let mut solution = CheapestInsertion::new().construct(instance);
                GuidedLocalSearch::new(config).improve(instance, &mut solution);
                solution
            })
            .min_by_key(|solution| solution.objective)
            .unwrap_or_else(|| Solution::empty(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Location, TimeWindow, DEPOT_ID};

    fn instance_with_matrix(
        matrix: Vec<Vec<i64>>,
        windows: Vec<TimeWindow>,
        vehicles: usize,
        drop_penalty: i64,
    ) -> ProblemInstance {
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
            vehicles,
            depot: 0,
            max_route_duration: 480,
            max_waiting: 60,
            drop_penalty,
        }
    }

    fn test_config(iterations: u64) -> SearchConfig {
        SearchConfig { max_iterations: Some(iterations), ..SearchConfig::default() }
    }

    fn wide(n: usize) -> Vec<TimeWindow> {
        vec![TimeWindow::new(0, 480); n]
    }

    #[test]
    fn test_never_worse_than_start() {
        let matrix = vec![
            vec![0, 30, 40, 35],
            vec![0, 0, 20, 25],
            vec![0, 20, 0, 15],
            vec![0, 25, 15, 0],
        ];
        let instance = instance_with_matrix(matrix, wide(4), 2, 1000);
        let mut solution = CheapestInsertion::new().construct(&instance);
        let before = solution.objective;

        GuidedLocalSearch::new(test_config(50)).improve(&instance, &mut solution);
        assert!(solution.objective <= before);
        assert_eq!(solution.objective, solution.recompute_objective(&instance));
        assert!(solution.is_feasible(&instance));
    }

    #[test]
    fn test_relocation_untangles_routes() {
        // Node 2 sits right next to node 1; serving it from the second
        // vehicle wastes a long leg from the depot.
        let matrix = vec![vec![0, 10, 12], vec![0, 0, 2], vec![0, 2, 0]];
        let instance = instance_with_matrix(matrix, wide(3), 2, 1000);

        let mut solution = Solution::empty(&instance);
        solution.routes[0] = vec![1];
        solution.routes[1] = vec![2];
        solution.sync(&instance);
        assert_eq!(solution.objective, 22);

        GuidedLocalSearch::new(test_config(30)).improve(&instance, &mut solution);
        assert_eq!(solution.objective, 12);
    }

    #[test]
    fn test_cheap_penalty_drops_far_nodes() {
        // Serving either node costs 30+; at penalty 10 dropping wins.
        let matrix = vec![vec![0, 30, 35], vec![0, 0, 40], vec![0, 40, 0]];
        let instance = instance_with_matrix(matrix, wide(3), 1, 10);

        let mut solution = CheapestInsertion::new().construct(&instance);
        GuidedLocalSearch::new(test_config(30)).improve(&instance, &mut solution);
        assert_eq!(solution.dropped(&instance).len(), 2);
        assert_eq!(solution.objective, 20);
    }

    #[test]
    fn test_drop_monotone_in_penalty() {
        let matrix = vec![
            vec![0, 30, 40, 35],
            vec![0, 0, 20, 25],
            vec![0, 20, 0, 15],
            vec![0, 25, 15, 0],
        ];
        let mut drops_at = Vec::new();
        for penalty in [1, 25, 1000] {
            let instance = instance_with_matrix(matrix.clone(), wide(4), 2, penalty);
            let mut solution = CheapestInsertion::new().construct(&instance);
            GuidedLocalSearch::new(test_config(60)).improve(&instance, &mut solution);
            drops_at.push(solution.dropped(&instance).len());
        }
        // Raising the penalty never increases the number of drops.
        assert!(drops_at[0] >= drops_at[1]);
        assert!(drops_at[1] >= drops_at[2]);
    }

    #[test]
    fn test_infeasible_node_stays_dropped() {
        // Node 2 can never meet its window; the search must keep it dropped
        // and charge exactly one penalty.
        let matrix = vec![vec![0, 30, 300], vec![0, 0, 280], vec![0, 280, 0]];
        let windows =
            vec![TimeWindow::new(0, 480), TimeWindow::new(0, 240), TimeWindow::new(0, 240)];
        let instance = instance_with_matrix(matrix, windows, 1, 1000);

        let mut solution = CheapestInsertion::new().construct(&instance);
        GuidedLocalSearch::new(test_config(40)).improve(&instance, &mut solution);

        assert_eq!(solution.dropped(&instance), vec![2]);
        assert_eq!(solution.objective, 30 + 1000);
        assert!(solution.is_feasible(&instance));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let matrix = vec![
            vec![0, 30, 40, 35],
            vec![0, 0, 20, 25],
            vec![0, 20, 0, 15],
            vec![0, 25, 15, 0],
        ];
        let instance = instance_with_matrix(matrix, wide(4), 2, 1000);

        let run = || {
            let mut solution = CheapestInsertion::new().construct(&instance);
            GuidedLocalSearch::new(test_config(40)).improve(&instance, &mut solution);
            solution
        };
        let a = run();
        let b = run();
        assert_eq!(a.routes, b.routes);
        assert_eq!(a.objective, b.objective);
    }

    #[test]
    fn test_multi_start_matches_or_beats_single() {
        let matrix = vec![
            vec![0, 30, 40, 35],
            vec![0, 0, 20, 25],
            vec![0, 20, 0, 15],
            vec![0, 25, 15, 0],
        ];
        let instance = instance_with_matrix(matrix, wide(4), 2, 1000);

        let mut single = CheapestInsertion::new().construct(&instance);
        GuidedLocalSearch::new(test_config(40)).improve(&instance, &mut single);

        let multi = MultiStartSolver::new(4, test_config(40)).run(&instance);
        assert!(multi.objective <= single.objective);
        assert!(multi.is_feasible(&instance));
    }
}
