use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use atsp_core::{City, Cost, CostMatrix, Tour};

use crate::Result;

/// Cheapest closed tour known to this process.
///
/// The tour itself sits behind a lock; its cost is mirrored in an atomic so
/// the pruning test can read it without locking. The cost only ever
/// decreases.
#[derive(Debug)]
pub struct BestTour {
    tour: Mutex<Option<Tour>>,
    cost: AtomicU64,
}

impl Default for BestTour {
    fn default() -> Self {
        Self::new()
    }
}

impl BestTour {
    pub fn new() -> Self {
        Self {
            tour: Mutex::new(None),
            cost: AtomicU64::new(Cost::MAX),
        }
    }

    /// Current best cost, `Cost::MAX` until a tour has been recorded.
    #[inline]
    pub fn cost(&self) -> Cost {
        self.cost.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Result<Option<Tour>> {
        Ok(self.tour.lock()?.clone())
    }

    /// Records `candidate` (a tour through all `n` cities, not yet closed)
    /// if it strictly beats the current best.
    ///
    /// The comparison is repeated under the lock: two workers can both pass
    /// an unlocked check against an older cost, and only the cheaper one may
    /// win.
    pub fn try_update(&self, matrix: &CostMatrix, candidate: &Tour) -> Result<bool> {
        let mut guard = self.tour.lock()?;
        if !candidate.improves_on(matrix, self.cost()) {
            return Ok(false);
        }
        let best = guard.get_or_insert_with(|| Tour::new(matrix.cities()));
        best.copy_from(candidate);
        best.close(matrix);
        self.cost.store(best.cost(), Ordering::Release);
        Ok(true)
    }

    /// Applies a tour received from another process. Stale or duplicate
    /// updates are dropped.
    pub fn apply_remote(&self, matrix: &CostMatrix, cities: &[City]) -> Result<bool> {
        let candidate = Tour::from_cities(matrix, cities)?;
        if !candidate.is_candidate_complete(matrix) {
            return Err(atsp_core::Error::invalid_tour(format!(
                "remote tour visits {} of {} cities",
                candidate.count(),
                matrix.cities()
            ))
            .into());
        }
        self.try_update(matrix, &candidate)
    }
}
