use std::fmt;

use atsp_core::{Cost, Tour};
use serde::{Deserialize, Serialize};

use crate::{ListenerStats, WorkerStats};

/// Outcome of one process of a search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchReport {
    pub rank: usize,
    pub processes: usize,
    pub threads: usize,
    /// Closed tour: home at both ends.
    pub tour: Tour,
    pub cost: Cost,
    pub elapsed_secs: f64,
    pub stats: WorkerStats,
    pub remote: ListenerStats,
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cities: Vec<String> = self.tour.cities().iter().map(ToString::to_string).collect();
        writeln!(f, "Best tour: {}", cities.join(" "))?;
        writeln!(f, "Cost = {}", self.cost)?;
        writeln!(f, "Elapsed time = {:e} seconds", self.elapsed_secs)?;
        write!(f, "Stack splits = {}", self.stats.donations)
    }
}
