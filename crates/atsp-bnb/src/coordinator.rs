use std::sync::atomic::{AtomicBool, Ordering};

use atsp_core::{CostMatrix, Tour};
use serde::{Deserialize, Serialize};

use crate::{
    transport::{Message, Transport, ROOT},
    BestTour, Error, Result, WorkShare,
};

/// Worker-side handle for talking to the other processes.
pub struct Peer<'a> {
    transport: &'a dyn Transport,
    matrix: &'a CostMatrix,
}

impl<'a> Peer<'a> {
    pub fn new(transport: &'a dyn Transport, matrix: &'a CostMatrix) -> Self {
        Self { transport, matrix }
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    /// Propagates a tour that just improved the local register: the root
    /// broadcasts it, everyone else sends it to the root for relaying.
    pub fn publish_best(&self, tour: &Tour) -> Result<()> {
        let n = self.matrix.cities();
        let message = Message::BestTour(tour.cities()[..n].to_vec());
        if self.transport.is_root() {
            self.transport.broadcast(message)
        } else {
            self.transport.send(ROOT, message)
        }
    }

    pub fn report_done(&self) -> Result<()> {
        let rank = self.transport.rank();
        log::info!("process {rank} has no work left");
        self.transport.send(ROOT, Message::Done(rank))
    }

    /// Best effort: stops the local listener and tells the root, which
    /// relays the abort to every other process.
    pub fn abort(&self, reason: &str) {
        let rank = self.transport.rank();
        if !self.transport.is_root() {
            self.abort_peers(reason);
        }
        if let Err(e) = self.transport.send(rank, abort_message(rank, reason)) {
            log::warn!("could not deliver abort to own listener: {e}");
        }
    }

    /// Best effort: tells the other processes directly, for when the local
    /// listener is already gone.
    pub fn abort_peers(&self, reason: &str) {
        let message = abort_message(self.transport.rank(), reason);
        let sent = if self.transport.is_root() {
            self.transport.broadcast(message)
        } else {
            self.transport.send(ROOT, message)
        };
        if let Err(e) = sent {
            log::warn!("could not forward abort: {e}");
        }
    }
}

fn abort_message(rank: usize, reason: &str) -> Message {
    Message::Abort {
        rank,
        reason: reason.to_owned(),
    }
}

/// What the listener saw over the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStats {
    pub received: u64,
    pub applied: u64,
    pub relayed: u64,
}

/// Background loop run once per process next to its workers.
///
/// Applies best tours from other processes, and on the root tallies `Done`
/// messages. Once every process is done the root drains the best tours
/// still queued and only then broadcasts `Terminate`. Returns when this
/// process has seen `Terminate`, or with an error on `Abort`.
pub struct Listener<'a> {
    transport: &'a dyn Transport,
    matrix: &'a CostMatrix,
    best: &'a BestTour,
    share: &'a WorkShare,
    halt: &'a AtomicBool,
    stats: ListenerStats,
}

impl<'a> Listener<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        matrix: &'a CostMatrix,
        best: &'a BestTour,
        share: &'a WorkShare,
        halt: &'a AtomicBool,
    ) -> Self {
        Self {
            transport,
            matrix,
            best,
            share,
            halt,
            stats: ListenerStats::default(),
        }
    }

    pub fn run(mut self) -> Result<ListenerStats> {
        let rank = self.transport.rank();
        let mut running = self.transport.size();

        loop {
            match self.transport.recv()? {
                Message::BestTour(cities) => self.on_best(&cities)?,
                Message::Done(from) if self.transport.is_root() => {
                    running = running.saturating_sub(1);
                    log::info!("process {from} done, {running} still running");
                    if running == 0 {
                        self.drain()?;
                        self.transport.broadcast(Message::Terminate)?;
                        log::debug!("root broadcast terminate");
                        return Ok(self.stats);
                    }
                }
                Message::Done(from) => {
                    log::warn!("process {rank} ignoring done from {from}, it is not the root");
                }
                Message::Terminate if !self.transport.is_root() => {
                    log::debug!("process {rank} received terminate");
                    return Ok(self.stats);
                }
                Message::Terminate => log::warn!("root ignoring stray terminate"),
                Message::Abort { rank: from, reason } => return Err(self.on_abort(from, reason)),
            }
        }
    }

    fn on_best(&mut self, cities: &[usize]) -> Result<()> {
        self.stats.received += 1;
        if !self.best.apply_remote(self.matrix, cities)? {
            log::trace!("dropping stale best tour {cities:?}");
            return Ok(());
        }
        self.stats.applied += 1;
        log::debug!(
            "process {} adopted remote best tour, cost {}",
            self.transport.rank(),
            self.best.cost()
        );
        if self.transport.is_root() {
            self.transport.broadcast(Message::BestTour(cities.to_vec()))?;
            self.stats.relayed += 1;
        }
        Ok(())
    }

    /// Per-link ordering means every best tour a process sent arrived
    /// before its `Done`; this only picks up what is still sitting in the
    /// inbox.
    fn drain(&mut self) -> Result<()> {
        while let Some(message) = self.transport.try_recv()? {
            match message {
                Message::BestTour(cities) => self.on_best(&cities)?,
                Message::Abort { rank, reason } => return Err(self.on_abort(rank, reason)),
                other => log::warn!("unexpected {other:?} after every process finished"),
            }
        }
        Ok(())
    }

    fn on_abort(&self, from: usize, reason: String) -> Error {
        log::error!("process {from} aborted the run: {reason}");
        self.halt.store(true, Ordering::Release);
        self.share.shutdown();
        if self.transport.is_root() {
            if let Err(e) = self.transport.broadcast(abort_message(from, &reason)) {
                log::warn!("could not relay abort: {e}");
            }
        }
        Error::RemoteAbort { rank: from, reason }
    }
}
