use std::thread;

use atsp_core::CostMatrix;

use crate::{
    process::run_process,
    transport::LocalCluster,
    Error, Result, SearchConfig, SearchReport,
};

/// Single-process search.
pub fn solve(matrix: &CostMatrix, config: &SearchConfig) -> Result<SearchReport> {
    let endpoints = LocalCluster::new(1);
    run_process(matrix, config, &endpoints[0])
}

/// Runs `processes` simulated processes in this one, connected through
/// in-process channels. Returns one report per rank.
pub fn solve_cluster(
    matrix: &CostMatrix,
    config: &SearchConfig,
    processes: usize,
) -> Result<Vec<SearchReport>> {
    if processes == 0 {
        return Err(Error::invalid_config("process count must be positive"));
    }
    let endpoints = LocalCluster::new(processes);

    let results: Vec<Result<SearchReport>> = thread::scope(|s| {
        let handles: Vec<_> = endpoints
            .iter()
            .map(|endpoint| s.spawn(move || run_process(matrix, config, endpoint)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::other("process thread panicked")))
            })
            .collect()
    });

    let mut reports = Vec::with_capacity(processes);
    let mut relayed = None;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            // The originating process reports the actual cause.
            Err(e @ Error::RemoteAbort { .. }) => {
                relayed.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match relayed {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}
