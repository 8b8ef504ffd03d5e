use serde::{Deserialize, Serialize};

use crate::{City, Cost, CostMatrix, Error, Result, HOME};

/// Sequence of visited cities starting at [`HOME`] plus the running cost of
/// its edges.
///
/// `cost` always equals the sum of the edge costs between consecutive
/// entries of `cities`. A partial tour never repeats a city; a closed tour
/// additionally ends with `HOME`.
///
/// Deserialization does not check any of this since it has no matrix to
/// check against. Run [`Tour::validate_closed`] on a decoded tour, or go
/// through [`Tour::from_cities`], before trusting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    cities: Vec<City>,
    cost: Cost,
}

impl Tour {
    /// Tour holding only the home city, with room for `n + 1` entries.
    pub fn new(n: usize) -> Self {
        let mut cities = Vec::with_capacity(n + 1);
        cities.push(HOME);
        Self { cities, cost: 0 }
    }

    pub fn reset(&mut self) {
        self.cities.clear();
        self.cities.push(HOME);
        self.cost = 0;
    }

    /// Rebuilds a tour from a bare city sequence, recomputing its cost.
    pub fn from_cities(matrix: &CostMatrix, cities: &[City]) -> Result<Self> {
        let n = matrix.cities();
        match cities.first() {
            Some(&HOME) => {}
            Some(&c) => return Err(Error::invalid_tour(format!("starts at {c}, not home"))),
            None => return Err(Error::invalid_tour("empty city sequence")),
        }
        if cities.len() > n {
            return Err(Error::invalid_tour(format!(
                "{} cities given for a {n}-city problem",
                cities.len()
            )));
        }
        let mut seen = vec![false; n];
        for &c in cities {
            if c >= n {
                return Err(Error::invalid_tour(format!("city {c} out of range")));
            }
            if seen[c] {
                return Err(Error::invalid_tour(format!("city {c} visited twice")));
            }
            seen[c] = true;
        }

        let mut tour = Self::new(n);
        tour.cities.extend_from_slice(&cities[1..]);
        tour.cost = matrix.path_cost(cities);
        Ok(tour)
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.cities.len()
    }

    #[inline(always)]
    pub fn cost(&self) -> Cost {
        self.cost
    }

    #[inline(always)]
    pub fn last_city(&self) -> City {
        self.cities[self.cities.len() - 1]
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn visited(&self, city: City) -> bool {
        self.cities.contains(&city)
    }

    pub fn append(&mut self, matrix: &CostMatrix, city: City) {
        debug_assert!(!self.visited(city), "city {city} already on the tour");
        debug_assert!(self.count() < matrix.cities());
        self.cost += matrix.cost(self.last_city(), city);
        self.cities.push(city);
    }

    pub fn remove_last(&mut self, matrix: &CostMatrix) {
        debug_assert!(self.count() >= 2, "the home city is never removed");
        if let Some(old_last) = self.cities.pop() {
            self.cost -= matrix.cost(self.last_city(), old_last);
        }
    }

    /// Makes `self` an independent copy of `other`, reusing the existing
    /// allocation.
    pub fn copy_from(&mut self, other: &Tour) {
        self.cities.clone_from(&other.cities);
        self.cost = other.cost;
    }

    /// Pruning test: `city` is unvisited and the extended tour would still
    /// be cheaper than `best`.
    #[inline]
    pub fn feasible(&self, matrix: &CostMatrix, city: City, best: Cost) -> bool {
        !self.visited(city)
            && self.cost.saturating_add(matrix.cost(self.last_city(), city)) < best
    }

    /// Every city has been visited; the edge back home is still implied.
    #[inline]
    pub fn is_candidate_complete(&self, matrix: &CostMatrix) -> bool {
        self.count() == matrix.cities()
    }

    /// Cost of the tour once the edge back home is added.
    #[inline]
    pub fn closed_cost(&self, matrix: &CostMatrix) -> Cost {
        self.cost + matrix.cost(self.last_city(), HOME)
    }

    /// Strict improvement over `best`; ties never replace.
    pub fn improves_on(&self, matrix: &CostMatrix, best: Cost) -> bool {
        self.is_candidate_complete(matrix) && self.closed_cost(matrix) < best
    }

    /// Appends the return to the home city.
    pub fn close(&mut self, matrix: &CostMatrix) {
        debug_assert!(self.is_candidate_complete(matrix));
        self.cost = self.closed_cost(matrix);
        self.cities.push(HOME);
    }

    pub fn is_closed(&self, matrix: &CostMatrix) -> bool {
        self.count() == matrix.cities() + 1
    }

    /// Checks a closed tour independently of how it was built: every city
    /// exactly once, home at both ends, and a cost matching the matrix.
    pub fn validate_closed(&self, matrix: &CostMatrix) -> Result<()> {
        let n = matrix.cities();
        if !self.is_closed(matrix) {
            return Err(Error::invalid_tour(format!(
                "{} entries, expected {}",
                self.count(),
                n + 1
            )));
        }
        if self.cities[0] != HOME || self.cities[n] != HOME {
            return Err(Error::invalid_tour("must start and end at home"));
        }
        let mut seen = vec![false; n];
        for &c in &self.cities[..n] {
            if c >= n || seen[c] {
                return Err(Error::invalid_tour(format!("city {c} repeated or out of range")));
            }
            seen[c] = true;
        }
        let recomputed = matrix.path_cost(&self.cities);
        if recomputed != self.cost {
            return Err(Error::invalid_tour(format!(
                "recorded cost {} but edges sum to {recomputed}",
                self.cost
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four() -> CostMatrix {
        CostMatrix::from_rows(&[&[0, 1, 2, 3], &[1, 0, 4, 5], &[2, 4, 0, 6], &[3, 5, 6, 0]])
            .unwrap()
    }

    #[test]
    fn append_and_remove_keep_cost_in_sync() {
        let m = four();
        let mut t = Tour::new(4);
        t.append(&m, 2);
        t.append(&m, 1);
        assert_eq!(t.cities(), &[0, 2, 1]);
        assert_eq!(t.cost(), 2 + 4);
        t.remove_last(&m);
        assert_eq!(t.cities(), &[0, 2]);
        assert_eq!(t.cost(), 2);
        t.remove_last(&m);
        assert_eq!(t.count(), 1);
        assert_eq!(t.cost(), 0);
    }

    #[test]
    fn copy_is_independent() {
        let m = four();
        let mut a = Tour::new(4);
        a.append(&m, 3);
        let mut b = Tour::new(4);
        b.copy_from(&a);
        a.append(&m, 1);
        assert_eq!(b.cities(), &[0, 3]);
        assert_eq!(b.cost(), 3);
    }

    #[test]
    fn feasibility_prunes_visited_and_expensive() {
        let m = four();
        let mut t = Tour::new(4);
        t.append(&m, 1);
        assert!(!t.feasible(&m, 1, 100));
        assert!(!t.feasible(&m, 0, 100));
        assert!(t.feasible(&m, 2, 100));
        // 1 + 4 == 5 is not strictly cheaper
        assert!(!t.feasible(&m, 2, 5));
        assert!(t.feasible(&m, 2, 6));
        assert!(t.feasible(&m, 3, Cost::MAX));
    }

    #[test]
    fn closing_requires_strict_improvement() {
        let m = four();
        let t = Tour::from_cities(&m, &[0, 1, 2, 3]).unwrap();
        assert!(t.is_candidate_complete(&m));
        assert_eq!(t.closed_cost(&m), 1 + 4 + 6 + 3);
        assert!(t.improves_on(&m, 15));
        assert!(!t.improves_on(&m, 14));

        let mut closed = t.clone();
        closed.close(&m);
        assert_eq!(closed.cities(), &[0, 1, 2, 3, 0]);
        closed.validate_closed(&m).unwrap();
    }

    #[test]
    fn from_cities_rejects_malformed_sequences() {
        let m = four();
        assert!(Tour::from_cities(&m, &[]).is_err());
        assert!(Tour::from_cities(&m, &[1, 0]).is_err());
        assert!(Tour::from_cities(&m, &[0, 2, 2]).is_err());
        assert!(Tour::from_cities(&m, &[0, 9]).is_err());
        assert!(Tour::from_cities(&m, &[0, 1, 2, 3, 0]).is_err());
    }

    #[test]
    fn validate_catches_a_wrong_cost() {
        let m = four();
        let mut t = Tour::from_cities(&m, &[0, 3, 2, 1]).unwrap();
        t.close(&m);
        t.validate_closed(&m).unwrap();
        t.cost += 1;
        assert!(t.validate_closed(&m).is_err());
    }

    #[test]
    fn decoded_tours_are_checked_before_use() {
        let m = four();
        let good: Tour = serde_json::from_str(r#"{"cities":[0,1,2,3,0],"cost":14}"#).unwrap();
        good.validate_closed(&m).unwrap();

        let wrong_cost: Tour =
            serde_json::from_str(r#"{"cities":[0,1,2,3,0],"cost":2}"#).unwrap();
        assert!(wrong_cost.validate_closed(&m).is_err());
        let repeated: Tour = serde_json::from_str(r#"{"cities":[0,1,1,3,0],"cost":14}"#).unwrap();
        assert!(repeated.validate_closed(&m).is_err());
    }
}
