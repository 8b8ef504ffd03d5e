use crate::Tour;

/// Free list of retired tours owned by a single worker.
///
/// Allocation reuses a retired tour when one is available and only builds a
/// fresh one when the pool is empty.
#[derive(Debug)]
pub struct TourPool {
    free: Vec<Tour>,
    cities: usize,
    fresh: usize,
}

impl TourPool {
    pub fn new(cities: usize) -> Self {
        Self {
            free: Vec::new(),
            cities,
            fresh: 0,
        }
    }

    pub fn alloc(&mut self) -> Tour {
        match self.free.pop() {
            Some(tour) => tour,
            None => {
                self.fresh += 1;
                Tour::new(self.cities)
            }
        }
    }

    pub fn alloc_copy(&mut self, src: &Tour) -> Tour {
        let mut tour = self.alloc();
        tour.copy_from(src);
        tour
    }

    pub fn release(&mut self, tour: Tour) {
        self.free.push(tour);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Number of tours this pool had to build because none were free.
    pub fn fresh_allocations(&self) -> usize {
        self.fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostMatrix;

    #[test]
    fn released_tours_are_reused() {
        let m = CostMatrix::random(5, 9, 1).unwrap();
        let mut pool = TourPool::new(5);
        let mut a = pool.alloc();
        a.append(&m, 3);
        pool.release(a);
        assert_eq!(pool.len(), 1);

        let mut src = Tour::new(5);
        src.append(&m, 2);
        let b = pool.alloc_copy(&src);
        assert_eq!(b, src);
        assert!(pool.is_empty());
        assert_eq!(pool.fresh_allocations(), 1);

        let _c = pool.alloc();
        assert_eq!(pool.fresh_allocations(), 2);
    }
}
