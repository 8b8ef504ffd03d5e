use crate::{Error, Result, Tour, TourPool};

/// Bounded LIFO frontier of the depth-first search.
///
/// Pushing past the capacity is an error rather than a silent drop, since a
/// lost entry is a lost branch of the search tree.
#[derive(Debug, Default)]
pub struct SearchStack {
    tours: Vec<Tour>,
    capacity: usize,
}

impl SearchStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tours: Vec::new(),
            capacity,
        }
    }

    /// Default sizing for an `n`-city problem: twice `n²` entries.
    pub fn for_cities(n: usize) -> Self {
        let n = n.max(2);
        Self::with_capacity(2 * n * n)
    }

    pub fn push(&mut self, tour: Tour) -> Result<()> {
        if self.tours.len() == self.capacity {
            return Err(Error::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.tours.push(tour);
        Ok(())
    }

    /// Pushes a copy of `tour` drawn from `pool`, leaving `tour` free to be
    /// extended with its next sibling.
    pub fn push_copy(&mut self, tour: &Tour, pool: &mut TourPool) -> Result<()> {
        if self.tours.len() == self.capacity {
            return Err(Error::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.tours.push(pool.alloc_copy(tour));
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Tour> {
        self.tours.pop()
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tour> {
        self.tours.iter()
    }

    /// Moves roughly half of the entries into `dst`, which must be empty.
    ///
    /// Entries at odd positions go to `dst` and the even ones are compacted
    /// in place, so both halves sample every depth of the frontier. A single
    /// entry is moved whole. Returns the number of tours moved.
    pub fn split_into(&mut self, dst: &mut SearchStack) -> Result<usize> {
        if !dst.is_empty() {
            return Err(Error::SplitDestinationNotEmpty { len: dst.len() });
        }
        if self.tours.len() == 1 {
            dst.tours.append(&mut self.tours);
            return Ok(1);
        }

        let old = std::mem::take(&mut self.tours);
        self.tours.reserve(old.len() / 2 + 1);
        dst.tours.reserve(old.len() / 2);
        for (i, tour) in old.into_iter().enumerate() {
            if i % 2 == 1 {
                dst.tours.push(tour);
            } else {
                self.tours.push(tour);
            }
        }
        Ok(dst.tours.len())
    }

    /// Returns every remaining tour to `pool`.
    pub fn drain_into(&mut self, pool: &mut TourPool) {
        for tour in self.tours.drain(..) {
            pool.release(tour);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostMatrix;

    fn stack_of(k: usize) -> SearchStack {
        let m = CostMatrix::random(k + 1, 9, 3).unwrap();
        let mut s = SearchStack::with_capacity(64);
        for city in 1..=k {
            let mut t = Tour::new(k + 1);
            t.append(&m, city);
            s.push(t).unwrap();
        }
        s
    }

    fn lasts(s: &SearchStack) -> Vec<usize> {
        s.iter().map(Tour::last_city).collect()
    }

    #[test]
    fn lifo_order() {
        let mut s = stack_of(3);
        assert_eq!(s.pop().map(|t| t.last_city()), Some(3));
        assert_eq!(s.pop().map(|t| t.last_city()), Some(2));
        assert_eq!(s.pop().map(|t| t.last_city()), Some(1));
        assert!(s.pop().is_none());
    }

    #[test]
    fn overflow_is_an_error() {
        let mut s = SearchStack::with_capacity(1);
        s.push(Tour::new(3)).unwrap();
        assert!(matches!(
            s.push(Tour::new(3)),
            Err(Error::StackOverflow { capacity: 1 })
        ));
        let mut pool = TourPool::new(3);
        assert!(s.push_copy(&Tour::new(3), &mut pool).is_err());
    }

    #[test]
    fn split_alternates_entries() {
        let mut src = stack_of(5);
        let mut dst = SearchStack::with_capacity(64);
        assert_eq!(src.split_into(&mut dst).unwrap(), 2);
        assert_eq!(lasts(&src), vec![1, 3, 5]);
        assert_eq!(lasts(&dst), vec![2, 4]);
    }

    #[test]
    fn split_conserves_entries_and_never_empties_either_side() {
        for k in 1..12 {
            let mut src = stack_of(k);
            let mut dst = SearchStack::with_capacity(64);
            src.split_into(&mut dst).unwrap();
            assert_eq!(src.len() + dst.len(), k);
            assert!(!dst.is_empty(), "k = {k}");
            if k >= 2 {
                assert!(!src.is_empty(), "k = {k}");
            }
            let mut all = lasts(&src);
            all.extend(lasts(&dst));
            all.sort_unstable();
            assert_eq!(all, (1..=k).collect::<Vec<_>>());
        }
    }

    #[test]
    fn split_refuses_a_non_empty_destination() {
        let mut src = stack_of(4);
        let mut dst = stack_of(1);
        assert!(matches!(
            src.split_into(&mut dst),
            Err(Error::SplitDestinationNotEmpty { len: 1 })
        ));
        assert_eq!(src.len(), 4);
    }
}
