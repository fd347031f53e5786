//! Heuristic algorithms for the routing solver.
//!
//! - `construction`: builds an initial feasible-or-best-effort assignment
//! - `local_search`: guided local search improvement under a time budget

pub mod construction;
pub mod local_search;

pub use construction::{CheapestInsertion, ConstructionHeuristic};
pub use local_search::{GuidedLocalSearch, LocalSearch, MultiStartSolver, SearchConfig};
