use std::{
    collections::VecDeque,
    ops::Range,
    sync::{Barrier, Mutex, PoisonError},
};

use atsp_core::{CostMatrix, SearchStack, Tour};

use crate::{Error, Result};

/// Size of the first fully expanded level of the search tree holding at
/// least `workers` partial tours: the smallest `(n-1)(n-2)...(n-d)` that
/// reaches `workers`. `None` when even `(n-1)!` tours are too few.
pub fn queue_bound(cities: usize, workers: usize) -> Option<usize> {
    let workers = workers as u128;
    let mut size: u128 = 1;
    let mut factor = cities.saturating_sub(1) as u128;
    loop {
        if size >= workers {
            return Some(usize::try_from(size).unwrap_or(usize::MAX));
        }
        if factor == 0 {
            return None;
        }
        size = size.saturating_mul(factor);
        factor -= 1;
    }
}

/// Breadth-first expansion of the root until the queue holds at least one
/// tour per worker. Children are enqueued in ascending city order.
pub fn build_initial_queue(matrix: &CostMatrix, workers: usize) -> Result<VecDeque<Tour>> {
    let n = matrix.cities();
    let bound = queue_bound(n, workers).ok_or(Error::TooManyWorkers {
        workers,
        cities: n,
    })?;

    let mut queue = VecDeque::with_capacity(bound.min(1 << 16));
    queue.push_back(Tour::new(n));
    while queue.len() < workers {
        let Some(mut tour) = queue.pop_front() else {
            return Err(Error::TooManyWorkers { workers, cities: n });
        };
        for nbr in 1..n {
            if !tour.visited(nbr) {
                tour.append(matrix, nbr);
                queue.push_back(tour.clone());
                tour.remove_last(matrix);
            }
        }
    }
    Ok(queue)
}

/// Block partition of `len` queue entries: worker `rank` gets a contiguous
/// run, the first `len % workers` runs one longer than the rest.
pub fn block_range(rank: usize, len: usize, workers: usize) -> Range<usize> {
    let quotient = len / workers;
    let remainder = len % workers;
    if rank < remainder {
        let first = rank * (quotient + 1);
        first..first + quotient + 1
    } else {
        let first = rank * quotient + remainder;
        first..first + quotient
    }
}

#[derive(Debug, Default)]
struct Shared {
    bound: Option<usize>,
    queue: Vec<Option<Tour>>,
}

/// One-time start-up step handing every worker of a process its initial
/// block of the search tree.
///
/// Local worker 0 computes the queue bound, then builds the queue; the other
/// workers wait on the barrier between the two steps and after the second.
#[derive(Debug)]
pub struct Partitioner {
    barrier: Barrier,
    shared: Mutex<Shared>,
}

impl Partitioner {
    pub fn new(threads: usize) -> Self {
        Self {
            barrier: Barrier::new(threads),
            shared: Mutex::new(Shared::default()),
        }
    }

    /// Pushes this worker's block onto `stack`, returning its size. Every
    /// worker of the process fails together when the problem is too small.
    pub fn assign(
        &self,
        matrix: &CostMatrix,
        local_rank: usize,
        global_rank: usize,
        workers: usize,
        stack: &mut SearchStack,
    ) -> Result<usize> {
        let n = matrix.cities();

        // Nothing below may return before both barriers or the siblings hang.
        if local_rank == 0 {
            let bound = queue_bound(n, workers);
            log::debug!("initial queue bound for {workers} workers: {bound:?}");
            self.lock().bound = bound;
        }
        self.barrier.wait();

        if self.lock().bound.is_none() {
            log::warn!("too many workers ({workers}) for such a small problem ({n} cities)");
            return Err(Error::TooManyWorkers { workers, cities: n });
        }

        let mut built = Ok(());
        if local_rank == 0 {
            built = build_initial_queue(matrix, workers).map(|queue| {
                log::info!("initial queue holds {} tours", queue.len());
                self.lock().queue = queue.into_iter().map(Some).collect();
            });
        }
        self.barrier.wait();
        built?;

        let mut shared = self.lock();
        let range = block_range(global_rank, shared.queue.len(), workers);
        log::debug!("worker {global_rank} takes initial tours {range:?}");
        let mut taken = 0;
        for slot in shared.queue[range].iter_mut().rev() {
            if let Some(tour) = slot.take() {
                stack.push(tour)?;
                taken += 1;
            }
        }
        if taken == 0 {
            return Err(Error::other(format!(
                "worker {global_rank} received no initial tours"
            )));
        }
        Ok(taken)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // Only poisoned if a sibling panicked mid-assignment; the data is
        // still a valid queue.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
