use std::{
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Instant,
};

use atsp_core::CostMatrix;

use crate::{
    coordinator::{Listener, Peer},
    transport::Transport,
    worker::Worker,
    BestTour, Error, Partitioner, Result, SearchConfig, SearchReport, WorkShare, WorkerStats,
};

/// State shared by the workers and the listener of one process.
pub(crate) struct ProcessContext<'a> {
    pub(crate) matrix: &'a CostMatrix,
    pub(crate) config: &'a SearchConfig,
    pub(crate) best: BestTour,
    pub(crate) share: WorkShare,
    pub(crate) partitioner: Partitioner,
    pub(crate) peer: Peer<'a>,
    pub(crate) halt: AtomicBool,
    /// Workers across every process.
    pub(crate) workers: usize,
}

impl ProcessContext<'_> {
    /// Stops the local search and starts the abort protocol. Only the first
    /// failure of a process is propagated.
    fn fail(&self, err: &Error) {
        if self.halt.swap(true, Ordering::AcqRel) {
            return;
        }
        log::error!("process {} stopping: {err}", self.peer.rank());
        self.share.shutdown();
        self.peer.abort(&err.to_string());
    }
}

/// Runs this process's share of a distributed search: `config.threads`
/// workers plus one listener, returning once every process agreed the
/// search space is exhausted.
pub fn run_process(
    matrix: &CostMatrix,
    config: &SearchConfig,
    transport: &dyn Transport,
) -> Result<SearchReport> {
    config.validate()?;
    if transport.size() == 0 {
        return Err(Error::invalid_config("process count must be positive"));
    }
    let start = Instant::now();

    let ctx = ProcessContext {
        matrix,
        config,
        best: BestTour::new(),
        share: WorkShare::new(config.threads, config.min_split_size),
        partitioner: Partitioner::new(config.threads),
        peer: Peer::new(transport, matrix),
        halt: AtomicBool::new(false),
        workers: config.threads * transport.size(),
    };
    log::info!(
        "process {}/{} searching {} cities with {} threads, min split {}",
        transport.rank(),
        transport.size(),
        matrix.cities(),
        config.threads,
        config.min_split_size
    );

    let (worker_results, listener_result) = thread::scope(|s| {
        let ctx = &ctx;
        let listener = s.spawn(move || {
            let result = Listener::new(transport, matrix, &ctx.best, &ctx.share, &ctx.halt).run();
            if let Err(e) = &result {
                if !matches!(e, Error::RemoteAbort { .. }) {
                    ctx.halt.store(true, Ordering::Release);
                    ctx.share.shutdown();
                    ctx.peer.abort_peers(&e.to_string());
                }
            }
            result
        });

        let workers: Vec<_> = (0..config.threads)
            .map(|local| {
                s.spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        Worker::new(ctx, local).run()
                    }))
                    .unwrap_or_else(|_| Err(Error::other("worker thread panicked")));
                    if let Err(e) = &result {
                        ctx.fail(e);
                    }
                    result
                })
            })
            .collect();

        let worker_results: Vec<Result<WorkerStats>> = workers
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::other("worker thread panicked")))
            })
            .collect();
        let listener_result = listener
            .join()
            .unwrap_or_else(|_| Err(Error::other("listener thread panicked")));
        (worker_results, listener_result)
    });

    let mut stats = WorkerStats::default();
    let mut first_error = None;
    for result in worker_results {
        match result {
            Ok(s) => stats += s,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    let remote = listener_result?;

    let tour = ctx
        .best
        .snapshot()?
        .ok_or_else(|| Error::other("search finished without a complete tour"))?;
    let report = SearchReport {
        rank: transport.rank(),
        processes: transport.size(),
        threads: config.threads,
        cost: tour.cost(),
        tour,
        elapsed_secs: start.elapsed().as_secs_f64(),
        stats,
        remote,
    };
    log::info!(
        "process {} finished in {:.3}s, best cost {}",
        report.rank,
        report.elapsed_secs,
        report.cost
    );
    Ok(report)
}
