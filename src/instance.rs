//! Problem model for the fleet routing solver.
//!
//! This module builds the immutable optimization instance: the pairwise
//! travel-time matrix derived from raw coordinates, the index-aligned time
//! windows, the fleet size and the drop penalty. Instances can be constructed
//! programmatically or loaded from a JSON file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo;

/// Identifier used for the shared start location of every vehicle.
pub const DEPOT_ID: &str = "start";

/// Errors surfaced by the solver.
///
/// Feasibility problems of individual nodes are never errors: a node whose
/// window cannot be met simply stays dropped at the fixed penalty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// Malformed configuration, rejected before any search runs.
    Config(String),
    /// The search could not produce even the all-dropped baseline solution.
    /// This indicates a budget or implementation fault, not a hard instance.
    NoSolution,
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::Config(msg) => write!(f, "configuration error: {}", msg),
            SolverError::NoSolution => write!(f, "search produced no solution"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Inclusive interval during which a visit to a node must begin, in minutes
/// from the shared planning epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: i64,
    pub latest: i64,
}

impl TimeWindow {
    pub fn new(earliest: i64, latest: i64) -> Self {
        TimeWindow { earliest, latest }
    }

    /// Check whether a time lies inside the window.
    #[inline]
    pub fn contains(&self, t: i64) -> bool {
        t >= self.earliest && t <= self.latest
    }

    fn validate(&self, id: &str) -> Result<(), SolverError> {
        if self.earliest > self.latest {
            return Err(SolverError::Config(format!(
                "time window of '{}' has earliest {} > latest {}",
                id, self.earliest, self.latest
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.earliest, self.latest)
    }
}

/// A geographic visit location.
///
/// Immutable after creation. The depot is a distinguished location with
/// identifier [`DEPOT_ID`]; when it carries no window it is given the widest
/// one (the whole planning horizon).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable identifier
    pub id: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Optional time window, minutes from the planning epoch
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl Location {
    pub fn new(id: &str, lat: f64, lng: f64, time_window: Option<TimeWindow>) -> Self {
        Location { id: id.to_string(), lat, lng, time_window }
    }
}

/// The immutable definition of one optimization instance.
///
/// Built once from the depot and request locations; read-only for the rest of
/// execution. Index 0 is always the depot, requests follow in input order.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    /// Name of the instance
    pub name: String,
    /// All locations, depot first
    pub locations: Vec<Location>,
    /// Pairwise travel times in minutes, index-aligned with `locations`
    pub matrix: Vec<Vec<i64>>,
    /// Time windows, index-aligned with `locations`
    pub windows: Vec<TimeWindow>,
    /// Number of vehicles in the fleet
    pub vehicles: usize,
    /// Index of the shared start location (always 0)
    pub depot: usize,
    /// Maximum elapsed time per vehicle route, minutes
    pub max_route_duration: i64,
    /// Maximum idle time a vehicle may wait before a window opens, minutes
    pub max_waiting: i64,
    /// Fixed cost charged for leaving a request unvisited
    pub drop_penalty: i64,
}

/// On-disk JSON shape of an instance.
#[derive(Debug, Deserialize)]
struct InstanceFile {
    #[serde(default)]
    name: String,
    depot: Location,
    requests: Vec<Location>,
    vehicles: usize,
    #[serde(default = "default_drop_penalty")]
    drop_penalty: i64,
    #[serde(default = "default_max_route_duration")]
    max_route_duration: i64,
    #[serde(default = "default_max_waiting")]
    max_waiting: i64,
}

fn default_drop_penalty() -> i64 {
    1000
}

fn default_max_route_duration() -> i64 {
    480
}

fn default_max_waiting() -> i64 {
    60
}

impl ProblemInstance {
    /// Build an instance from a depot and an ordered sequence of requests.
    ///
    /// Rejects malformed configuration (zero vehicles, reversed windows)
    /// before any search runs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        depot: Location,
        requests: Vec<Location>,
        vehicles: usize,
        drop_penalty: i64,
        max_route_duration: i64,
        max_waiting: i64,
    ) -> Result<Self, SolverError> {
        if vehicles == 0 {
            return Err(SolverError::Config("vehicle count must be positive".to_string()));
        }
        if max_route_duration < 0 {
            return Err(SolverError::Config("max route duration must be non-negative".to_string()));
        }
        if max_waiting < 0 {
            return Err(SolverError::Config("max waiting must be non-negative".to_string()));
        }
        if drop_penalty < 0 {
            return Err(SolverError::Config("drop penalty must be non-negative".to_string()));
        }

        let mut locations = Vec::with_capacity(requests.len() + 1);
        locations.push(depot);
        locations.extend(requests);

        for loc in &locations {
            if let Some(tw) = &loc.time_window {
                tw.validate(&loc.id)?;
            }
        }

        // The depot gets the widest window when none is declared, so every
        // vehicle may start anywhere in the planning horizon.
        let horizon = TimeWindow::new(0, max_route_duration);
        let windows: Vec<TimeWindow> = locations
            .iter()
            .map(|loc| loc.time_window.unwrap_or(horizon))
            .collect();

        let matrix = Self::build_time_matrix(&locations, 0);

        Ok(ProblemInstance {
            name: name.to_string(),
            locations,
            matrix,
            windows,
            vehicles,
            depot: 0,
            max_route_duration,
            max_waiting,
            drop_penalty,
        })
    }

    /// Load an instance from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SolverError> {
        let file = File::open(&path)
            .map_err(|e| SolverError::Config(format!("cannot open file: {}", e)))?;
        let reader = BufReader::new(file);
        let parsed: InstanceFile = serde_json::from_reader(reader)
            .map_err(|e| SolverError::Config(format!("cannot parse instance: {}", e)))?;

        let name = if parsed.name.is_empty() {
            path.as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            parsed.name
        };

        Self::new(
            &name,
            parsed.depot,
            parsed.requests,
            parsed.vehicles,
            parsed.drop_penalty,
            parsed.max_route_duration,
            parsed.max_waiting,
        )
    }

    /// Compute the full pairwise travel-time matrix.
    ///
    /// Any entry whose destination is the depot is forced to zero: finishing a
    /// shift is free, so the optimizer never penalizes route termination.
    /// This makes the matrix intentionally asymmetric on depot-destination
    /// edges; everywhere else the symmetric mirror entry is reused to halve
    /// the estimator calls.
    fn build_time_matrix(locations: &[Location], depot: usize) -> Vec<Vec<i64>> {
        let n = locations.len();
        let mut matrix = vec![vec![-1i64; n]; n];

        for i in 0..n {
            for j in 0..n {
                if j == depot {
                    matrix[i][j] = 0;
                } else if i == j {
                    matrix[i][j] = 0;
                } else if matrix[j][i] != -1 {
                    matrix[i][j] = matrix[j][i];
                } else {
                    let a = &locations[i];
                    let b = &locations[j];
                    matrix[i][j] = geo::travel_minutes(a.lat, a.lng, b.lat, b.lng);
                }
            }
        }

        matrix
    }

    /// Travel time in minutes between two node indices.
    #[inline]
    pub fn travel(&self, i: usize, j: usize) -> i64 {
        self.matrix[i][j]
    }

    /// Time window of a node.
    #[inline]
    pub fn window(&self, i: usize) -> TimeWindow {
        self.windows[i]
    }

    /// Total number of nodes, depot included.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.locations.len()
    }

    /// Number of request nodes (excluding the depot).
    pub fn num_requests(&self) -> usize {
        self.locations.len() - 1
    }

    /// Indices of all request nodes.
    pub fn request_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.locations.len()).filter(move |&i| i != self.depot)
    }

    /// Get statistics about the instance.
    pub fn statistics(&self) -> InstanceStatistics {
        let windowed = self
            .locations
            .iter()
            .enumerate()
            .filter(|(i, loc)| *i != self.depot && loc.time_window.is_some())
            .count();

        let mut travel_times: Vec<i64> = Vec::new();
        for i in self.request_indices() {
            for j in self.request_indices() {
                if i < j {
                    travel_times.push(self.travel(i, j));
                }
            }
        }
        let avg_travel = if travel_times.is_empty() {
            0.0
        } else {
            travel_times.iter().sum::<i64>() as f64 / travel_times.len() as f64
        };
        let max_travel = travel_times.iter().copied().max().unwrap_or(0);

        InstanceStatistics {
            name: self.name.clone(),
            num_nodes: self.num_nodes(),
            num_requests: self.num_requests(),
            num_windowed: windowed,
            vehicles: self.vehicles,
            drop_penalty: self.drop_penalty,
            max_route_duration: self.max_route_duration,
            max_waiting: self.max_waiting,
            avg_travel,
            max_travel,
        }
    }
}

/// Statistics about a routing instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_nodes: usize,
    pub num_requests: usize,
    pub num_windowed: usize,
    pub vehicles: usize,
    pub drop_penalty: i64,
    pub max_route_duration: i64,
    pub max_waiting: i64,
    pub avg_travel: f64,
    pub max_travel: i64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} (1 depot + {} requests)", self.num_nodes, self.num_requests)?;
        writeln!(f, "  Requests with time windows: {}", self.num_windowed)?;
        writeln!(f, "  Vehicles: {}", self.vehicles)?;
        writeln!(f, "  Drop penalty: {}", self.drop_penalty)?;
        writeln!(f, "  Max route duration: {}min", self.max_route_duration)?;
        writeln!(f, "  Max waiting: {}min", self.max_waiting)?;
        writeln!(f, "  Avg travel time: {:.2}min", self.avg_travel)?;
        writeln!(f, "  Max travel time: {}min", self.max_travel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depot() -> Location {
        Location::new(DEPOT_ID, 12.937400, 77.613243, Some(TimeWindow::new(0, 480)))
    }

    fn sample_requests() -> Vec<Location> {
        vec![
            Location::new("hoskote_1", 13.072926, 77.787838, Some(TimeWindow::new(0, 240))),
            Location::new("koramangala_1", 12.927923, 77.627106, Some(TimeWindow::new(0, 240))),
            Location::new("hsr_1", 12.911884, 77.637080, Some(TimeWindow::new(241, 480))),
        ]
    }

    fn sample_instance() -> ProblemInstance {
        ProblemInstance::new("test", depot(), sample_requests(), 2, 1000, 480, 60).unwrap()
    }

    #[test]
    fn test_zero_vehicles_rejected() {
        let err = ProblemInstance::new("test", depot(), sample_requests(), 0, 1000, 480, 60)
            .unwrap_err();
        assert!(matches!(err, SolverError::Config(_)));
    }

    #[test]
    fn test_reversed_window_rejected() {
        let bad = vec![Location::new("bad", 13.0, 77.7, Some(TimeWindow::new(300, 100)))];
        let err = ProblemInstance::new("test", depot(), bad, 1, 1000, 480, 60).unwrap_err();
        assert!(matches!(err, SolverError::Config(_)));
    }

    #[test]
    fn test_depot_column_is_zero() {
        let instance = sample_instance();
        for i in 0..instance.num_nodes() {
            assert_eq!(instance.travel(i, instance.depot), 0);
        }
    }

    #[test]
    fn test_matrix_symmetric_off_depot() {
        let instance = sample_instance();
        for i in instance.request_indices() {
            for j in instance.request_indices() {
                assert_eq!(instance.travel(i, j), instance.travel(j, i));
            }
        }
    }

    #[test]
    fn test_diagonal_is_zero() {
        let instance = sample_instance();
        for i in 0..instance.num_nodes() {
            assert_eq!(instance.travel(i, i), 0);
        }
    }

    #[test]
    fn test_matrix_matches_estimator() {
        let instance = sample_instance();
        let a = &instance.locations[1];
        let b = &instance.locations[2];
        let expected =
            (crate::geo::haversine_meters(a.lat, a.lng, b.lat, b.lng) / 333.33).floor() as i64;
        assert_eq!(instance.travel(1, 2), expected);
    }

    #[test]
    fn test_triangle_inequality_off_depot() {
        let instance = sample_instance();
        for i in instance.request_indices() {
            for j in instance.request_indices() {
                for k in instance.request_indices() {
                    // Integer truncation can violate the metric bound by at
                    // most the two dropped fractional minutes.
                    assert!(
                        instance.travel(i, j)
                            <= instance.travel(i, k) + instance.travel(k, j) + 2
                    );
                }
            }
        }
    }

    #[test]
    fn test_matrix_idempotent() {
        let a = sample_instance();
        let b = sample_instance();
        assert_eq!(a.matrix, b.matrix);
    }

    #[test]
    fn test_depot_window_defaults_to_horizon() {
        let bare_depot = Location::new(DEPOT_ID, 12.9374, 77.6132, None);
        let instance =
            ProblemInstance::new("test", bare_depot, sample_requests(), 1, 1000, 480, 60).unwrap();
        assert_eq!(instance.window(0), TimeWindow::new(0, 480));
    }

    #[test]
    fn test_window_contains() {
        let tw = TimeWindow::new(10, 20);
        assert!(tw.contains(10));
        assert!(tw.contains(20));
        assert!(!tw.contains(9));
        assert!(!tw.contains(21));
    }
}
