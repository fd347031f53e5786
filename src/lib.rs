//! Fleet Routing Solver Library
//!
//! Assigns a fleet of mobile agents to geographically distributed visit
//! requests under time windows, minimizing total travel time. When full
//! coverage is infeasible within the time and fleet limits, the least
//! valuable visits are dropped at a fixed penalty instead of violating
//! constraints.
//!
//! # Features
//!
//! - Travel-time matrix derived from coordinates (haversine, 20 km/h)
//! - Cheapest-insertion construction validated by time-window propagation
//! - Guided local search improvement under a wall-clock budget
//! - Parallel multi-start with isolated per-run state
//!
//! # Example
//!
//! ```no_run
//! use vrptw_solver::instance::ProblemInstance;
//! use vrptw_solver::heuristics::SearchConfig;
//!
//! let instance = ProblemInstance::from_file("instances/bangalore.json").unwrap();
//! let report = vrptw_solver::solve(&instance, &SearchConfig::default()).unwrap();
//! println!("{}", report);
//! ```

pub mod geo;
pub mod heuristics;
pub mod instance;
pub mod schedule;
pub mod solution;

pub use instance::{Location, ProblemInstance, SolverError, TimeWindow};
pub use solution::{Solution, SolutionReport};

use heuristics::{CheapestInsertion, ConstructionHeuristic, GuidedLocalSearch, LocalSearch,
    MultiStartSolver, SearchConfig};

/// Construct, improve and extract: the full pipeline for one instance.
///
/// Returns [`SolverError::NoSolution`] only if the search framework failed to
/// retain even the all-dropped baseline, which indicates a fault rather than
/// a hard instance.
pub fn solve(
    instance: &ProblemInstance,
    config: &SearchConfig,
) -> Result<SolutionReport, SolverError> {
    let mut solution = CheapestInsertion::new().construct(instance);
    if !solution.is_feasible(instance) {
        // Dropping everything is always feasible; fall back rather than
        // search from a corrupt state.
        solution = Solution::empty(instance);
    }

    GuidedLocalSearch::new(config.clone()).improve(instance, &mut solution);

    if !solution.is_feasible(instance) {
        return Err(SolverError::NoSolution);
    }
    Ok(solution::extract(instance, &solution))
}

/// Like [`solve`], but runs `starts` independent seeded searches in parallel
/// and keeps the best final objective.
pub fn solve_multi_start(
    instance: &ProblemInstance,
    config: &SearchConfig,
    starts: usize,
) -> Result<SolutionReport, SolverError> {
    let solution = MultiStartSolver::new(starts, config.clone()).run(instance);
    if !solution.is_feasible(instance) {
        return Err(SolverError::NoSolution);
    }
    Ok(solution::extract(instance, &solution))
}
