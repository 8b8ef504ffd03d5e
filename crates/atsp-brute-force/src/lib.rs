use atsp_core::{City, CostMatrix, Tour, HOME};

/// Cheapest closed tour by exhaustive enumeration.
///
/// Permutations are visited in lexicographic order and only a strictly
/// cheaper tour replaces the current one, so ties resolve to the
/// lexicographically smallest sequence.
pub fn solve(matrix: &CostMatrix) -> Tour {
    let n = matrix.cities();
    let mut order: Vec<City> = (1..n).collect();
    let mut path = Vec::with_capacity(n + 1);

    let mut best_cost = u64::MAX;
    let mut best = Vec::new();

    loop {
        path.clear();
        path.push(HOME);
        path.extend_from_slice(&order);
        path.push(HOME);

        let cost = matrix.path_cost(&path);
        if cost < best_cost {
            best_cost = cost;
            best.clone_from(&path);
        }

        if !next_permutation(&mut order) {
            break;
        }
    }

    let mut tour = Tour::from_cities(matrix, &best[..n])
        .unwrap_or_else(|_| unreachable!("enumerated permutations are valid tours"));
    tour.close(matrix);
    tour
}

/// Number of distinct closed tours through `n` cities with a fixed start.
pub fn tour_count(n: usize) -> u128 {
    (1..n as u128).product()
}

fn next_permutation(items: &mut [City]) -> bool {
    let Some(i) = items.windows(2).rposition(|w| w[0] < w[1]) else {
        return false;
    };
    let j = items
        .iter()
        .rposition(|&x| x > items[i])
        .unwrap_or_else(|| unreachable!("a larger element exists past the pivot"));
    items.swap(i, j);
    items[i + 1..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations_in_lexicographic_order() {
        let mut items = vec![1, 2, 3];
        let mut seen = vec![items.clone()];
        while next_permutation(&mut items) {
            seen.push(items.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![1, 2, 3],
                vec![1, 3, 2],
                vec![2, 1, 3],
                vec![2, 3, 1],
                vec![3, 1, 2],
                vec![3, 2, 1],
            ]
        );
    }

    #[test]
    fn counts_fixed_start_tours() {
        assert_eq!(tour_count(1), 1);
        assert_eq!(tour_count(4), 6);
        assert_eq!(tour_count(6), 120);
    }

    #[test]
    fn tiny_instances() {
        let one = CostMatrix::from_rows(&[&[0]]).unwrap();
        let t = solve(&one);
        assert_eq!(t.cities(), &[0, 0]);
        assert_eq!(t.cost(), 0);

        let two = CostMatrix::from_rows(&[&[0, 3], &[5, 0]]).unwrap();
        let t = solve(&two);
        assert_eq!(t.cities(), &[0, 1, 0]);
        assert_eq!(t.cost(), 8);
    }
}
