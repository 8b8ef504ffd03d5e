use std::{ops::AddAssign, sync::atomic::Ordering};

use atsp_core::{SearchStack, Tour, TourPool};
use serde::{Deserialize, Serialize};

use crate::{process::ProcessContext, Result, WorkRequest};

/// Counters kept by each worker and summed into the run report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub initial_tours: u64,
    pub expanded: u64,
    pub pruned: u64,
    pub complete: u64,
    pub improvements: u64,
    pub donations: u64,
    pub tours_donated: u64,
    pub requests: u64,
    pub tours_received: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, rhs: Self) {
        self.initial_tours += rhs.initial_tours;
        self.expanded += rhs.expanded;
        self.pruned += rhs.pruned;
        self.complete += rhs.complete;
        self.improvements += rhs.improvements;
        self.donations += rhs.donations;
        self.tours_donated += rhs.tours_donated;
        self.requests += rhs.requests;
        self.tours_received += rhs.tours_received;
    }
}

/// One search thread: its own stack and pool, everything else borrowed from
/// the process.
pub(crate) struct Worker<'c, 'a> {
    ctx: &'c ProcessContext<'a>,
    local_rank: usize,
    rank: usize,
    stack: SearchStack,
    pool: TourPool,
    stats: WorkerStats,
}

impl<'c, 'a> Worker<'c, 'a> {
    pub(crate) fn new(ctx: &'c ProcessContext<'a>, local_rank: usize) -> Self {
        let n = ctx.matrix.cities();
        Self {
            ctx,
            local_rank,
            rank: ctx.peer.rank() * ctx.config.threads + local_rank,
            stack: ctx.config.new_stack(n),
            pool: TourPool::new(n),
            stats: WorkerStats::default(),
        }
    }

    pub(crate) fn run(mut self) -> Result<WorkerStats> {
        log::debug!("worker {} started", self.rank);
        let initial = self.ctx.partitioner.assign(
            self.ctx.matrix,
            self.local_rank,
            self.rank,
            self.ctx.workers,
            &mut self.stack,
        )?;
        self.stats.initial_tours = initial as u64;

        while let Some(mut tour) = self.next_tour()? {
            self.offer_work()?;
            self.visit(&mut tour)?;
            self.pool.release(tour);
        }

        self.stack.drain_into(&mut self.pool);
        log::debug!(
            "worker {} finished: {:?}, {} tours allocated",
            self.rank,
            self.stats,
            self.pool.fresh_allocations()
        );
        Ok(self.stats)
    }

    /// Pops the next tour, asking siblings for work once the stack is empty.
    /// `None` means the process has run out of work or is shutting down.
    fn next_tour(&mut self) -> Result<Option<Tour>> {
        loop {
            if self.ctx.halt.load(Ordering::Acquire) {
                return Ok(None);
            }
            if let Some(tour) = self.stack.pop() {
                return Ok(Some(tour));
            }

            self.stats.requests += 1;
            match self.ctx.share.request_work(&mut self.stack)? {
                WorkRequest::Received(count) => {
                    log::trace!("worker {} received {count} tours", self.rank);
                    self.stats.tours_received += count as u64;
                }
                WorkRequest::Done { last } => {
                    if last {
                        self.ctx.peer.report_done()?;
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn offer_work(&mut self) -> Result<()> {
        if let Some(moved) = self.ctx.share.share_work(&mut self.stack)? {
            log::trace!("worker {} donated {moved} tours", self.rank);
            self.stats.donations += 1;
            self.stats.tours_donated += moved as u64;
        }
        Ok(())
    }

    fn visit(&mut self, tour: &mut Tour) -> Result<()> {
        let ctx = self.ctx;
        let matrix = ctx.matrix;
        let best = &ctx.best;

        if tour.is_candidate_complete(matrix) {
            self.stats.complete += 1;
            if tour.improves_on(matrix, best.cost()) && best.try_update(matrix, tour)? {
                self.stats.improvements += 1;
                log::debug!("worker {} found a tour of cost {}", self.rank, best.cost());
                ctx.peer.publish_best(tour)?;
            }
            return Ok(());
        }

        self.stats.expanded += 1;
        // Pushed in descending order so the lowest city is explored first.
        for nbr in (1..matrix.cities()).rev() {
            if tour.visited(nbr) {
                continue;
            }
            if tour.feasible(matrix, nbr, best.cost()) {
                tour.append(matrix, nbr);
                let pushed = self.stack.push_copy(tour, &mut self.pool);
                tour.remove_last(matrix);
                pushed?;
            } else {
                self.stats.pruned += 1;
            }
        }
        Ok(())
    }
}
