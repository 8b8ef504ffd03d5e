use std::{
    fmt::Write as _,
    fs,
    io::{Read, Write},
    path::Path,
    str::FromStr,
};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type City = usize;
pub type Cost = u64;

/// Every tour starts and ends here.
pub const HOME: City = 0;

/// Immutable `n x n` table of directed edge costs.
///
/// Construction rejects any matrix with a non-zero diagonal or a non-positive
/// off-diagonal entry, so a value of this type can always be searched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRows", into = "MatrixRows")]
pub struct CostMatrix {
    n: usize,
    // Flattened row-major for cache locality
    costs: Vec<Cost>,
}

#[derive(Serialize, Deserialize)]
struct MatrixRows {
    rows: Vec<Vec<i64>>,
}

impl TryFrom<MatrixRows> for CostMatrix {
    type Error = Error;

    fn try_from(value: MatrixRows) -> Result<Self> {
        let n = value.rows.len();
        let mut raw = Vec::new();
        for (i, row) in value.rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(Error::invalid_matrix(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            raw.extend(row);
        }
        Self::from_signed(n, raw)
    }
}

impl From<CostMatrix> for MatrixRows {
    fn from(value: CostMatrix) -> Self {
        MatrixRows {
            rows: value
                .costs
                .chunks(value.n.max(1))
                .map(|row| row.iter().map(|&c| c as i64).collect())
                .collect(),
        }
    }
}

impl CostMatrix {
    pub fn new(n: usize, costs: Vec<Cost>) -> Result<Self> {
        if n == 0 {
            return Err(Error::invalid_matrix("number of cities must be positive"));
        }
        let entries = entry_count(n)?;
        if costs.len() != entries {
            return Err(Error::invalid_matrix(format!(
                "expected {entries} entries for {n} cities, got {}",
                costs.len()
            )));
        }
        for i in 0..n {
            for j in 0..n {
                let c = costs[i * n + j];
                if i == j && c != 0 {
                    return Err(Error::invalid_matrix(format!(
                        "diagonal entry [{i},{j}] = {c}, must be zero"
                    )));
                }
                if i != j && c == 0 {
                    return Err(Error::invalid_matrix(format!(
                        "off-diagonal entry [{i},{j}] = 0, must be positive"
                    )));
                }
            }
        }
        // Tour costs are plain sums of n edges and Cost::MAX means "no tour yet".
        let max = costs.iter().copied().max().unwrap_or(0);
        if max.checked_mul(n as Cost).map_or(true, |worst| worst == Cost::MAX) {
            return Err(Error::invalid_matrix(format!(
                "entry {max} is too large: a {n}-city tour could overflow the cost type"
            )));
        }
        Ok(Self { n, costs })
    }

    fn from_signed(n: usize, raw: Vec<i64>) -> Result<Self> {
        if let Some(pos) = raw.iter().position(|&c| c < 0) {
            return Err(Error::invalid_matrix(format!(
                "entry [{},{}] = {}, must be non-negative",
                pos / n.max(1),
                pos % n.max(1),
                raw[pos]
            )));
        }
        Self::new(n, raw.into_iter().map(|c| c as Cost).collect())
    }

    pub fn from_rows(rows: &[&[Cost]]) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != n) {
            return Err(Error::invalid_matrix(format!(
                "row {bad} has {} entries, expected {n}",
                rows[bad].len()
            )));
        }
        Self::new(n, rows.iter().flat_map(|r| r.iter().copied()).collect())
    }

    /// Reads the digraph text format: the city count followed by `n * n`
    /// whitespace separated integers in row-major order.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        text.parse()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::parse(format!("can't open {}: {e}", path.display()))
        })?;
        let matrix: Self = text.parse()?;
        log::debug!("loaded {} cities from {}", matrix.n, path.display());
        Ok(matrix)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.to_text().as_bytes())?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let width = self.costs.iter().max().map_or(1, |m| m.to_string().len());
        let mut out = format!("{}\n", self.n);
        for row in self.costs.chunks(self.n) {
            let line: Vec<String> = row.iter().map(|c| format!("{c:>width$}")).collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    /// Seeded random instance with off-diagonal costs drawn from `1..=max_cost`.
    pub fn random(n: usize, max_cost: Cost, seed: u64) -> Result<Self> {
        if max_cost == 0 {
            return Err(Error::invalid_matrix("max cost must be positive"));
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut costs = vec![0; entry_count(n)?];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    costs[i * n + j] = rng.gen_range(1..=max_cost);
                }
            }
        }
        Self::new(n, costs)
    }

    #[inline(always)]
    pub fn cost(&self, from: City, to: City) -> Cost {
        self.costs[from * self.n + to]
    }

    #[inline(always)]
    pub fn cities(&self) -> usize {
        self.n
    }

    /// Sum of consecutive edge costs along `path`.
    pub fn path_cost(&self, path: &[City]) -> Cost {
        path.windows(2).map(|w| self.cost(w[0], w[1])).sum()
    }
}

fn entry_count(n: usize) -> Result<usize> {
    n.checked_mul(n)
        .ok_or_else(|| Error::invalid_matrix(format!("{n} cities is too many")))
}

impl FromStr for CostMatrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();
        let n: i64 = tokens
            .next()
            .ok_or_else(|| Error::parse("empty input, expected the number of cities"))?
            .parse()
            .map_err(|e| Error::parse(format!("bad city count: {e}")))?;
        if n <= 0 {
            return Err(Error::invalid_matrix(
                "number of vertices in digraph must be positive",
            ));
        }
        let n = usize::try_from(n)
            .map_err(|_| Error::invalid_matrix(format!("{n} cities is too many")))?;
        let entries = entry_count(n)?;

        // Grows with the input; the declared count alone is not trusted.
        let mut raw = Vec::new();
        for idx in 0..entries {
            let token = tokens.next().ok_or_else(|| {
                Error::parse(format!("expected {entries} entries, found {idx}"))
            })?;
            let value: i64 = token.parse().map_err(|e| {
                Error::parse(format!("entry [{},{}] = {token:?}: {e}", idx / n, idx % n))
            })?;
            raw.push(value);
        }
        if tokens.next().is_some() {
            log::warn!("ignoring trailing tokens after {n}x{n} matrix");
        }

        Self::from_signed(n, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR: &str = "4\n0 1 2 3\n1 0 4 5\n2 4 0 6\n3 5 6 0\n";

    #[test]
    fn parses_digraph_text() {
        let m: CostMatrix = FOUR.parse().unwrap();
        assert_eq!(m.cities(), 4);
        assert_eq!(m.cost(0, 3), 3);
        assert_eq!(m.cost(2, 1), 4);
        assert_eq!(m.cost(3, 3), 0);
    }

    #[test]
    fn rejects_bad_diagonal() {
        let err = "2\n1 2\n3 0".parse::<CostMatrix>().unwrap_err();
        assert!(matches!(err, Error::InvalidMatrix(_)), "{err}");
    }

    #[test]
    fn rejects_non_positive_off_diagonal() {
        assert!("2\n0 0\n3 0".parse::<CostMatrix>().is_err());
        assert!("2\n0 -4\n3 0".parse::<CostMatrix>().is_err());
    }

    #[test]
    fn rejects_truncated_and_empty_input() {
        assert!(matches!(
            "3\n0 1 2\n1 0".parse::<CostMatrix>(),
            Err(Error::Parse(_))
        ));
        assert!("".parse::<CostMatrix>().is_err());
        assert!("0".parse::<CostMatrix>().is_err());
    }

    #[test]
    fn text_format_survives_a_write_and_reload() {
        let m = CostMatrix::random(6, 99, 7).unwrap();
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        assert_eq!(CostMatrix::from_reader(buf.as_slice()).unwrap(), m);
    }

    #[test]
    fn random_is_reproducible_and_valid() {
        let a = CostMatrix::random(8, 50, 42).unwrap();
        let b = CostMatrix::random(8, 50, 42).unwrap();
        let c = CostMatrix::random(8, 50, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        for i in 0..8 {
            for j in 0..8 {
                let cost = a.cost(i, j);
                if i == j {
                    assert_eq!(cost, 0);
                } else {
                    assert!((1..=50).contains(&cost));
                }
            }
        }
    }

    #[test]
    fn json_deserialization_validates() {
        let m: CostMatrix = serde_json::from_str(r#"{"rows":[[0,5],[7,0]]}"#).unwrap();
        assert_eq!(m.cost(1, 0), 7);
        assert!(serde_json::from_str::<CostMatrix>(r#"{"rows":[[0,5],[7,1]]}"#).is_err());
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(serde_json::from_str::<CostMatrix>(&json).unwrap(), m);
    }

    #[test]
    fn huge_city_counts_are_rejected_without_allocating() {
        for text in ["4294967296 1", "9223372036854775807 0 1"] {
            let err = text.parse::<CostMatrix>().unwrap_err();
            assert!(matches!(err, Error::InvalidMatrix(_)), "{text}: {err}");
        }
        // Fits in memory arithmetic but the input is far too short.
        assert!(matches!(
            "3000000000 0 1".parse::<CostMatrix>(),
            Err(Error::Parse(_))
        ));
        assert!(CostMatrix::random(1usize << 33, 10, 1).is_err());
    }

    #[test]
    fn entries_that_could_overflow_a_tour_cost_are_rejected() {
        let max = i64::MAX;
        let text = format!("3\n0 {max} {max}\n{max} 0 {max}\n{max} {max} 0\n");
        assert!(matches!(
            text.parse::<CostMatrix>(),
            Err(Error::InvalidMatrix(_))
        ));

        let limit = Cost::MAX / 4;
        assert!(CostMatrix::from_rows(&[&[0, limit], &[limit, 0]]).is_ok());
        let over = Cost::MAX / 2 + 1;
        assert!(CostMatrix::from_rows(&[&[0, over], &[1, 0]]).is_err());
    }

    #[test]
    fn path_cost_sums_consecutive_edges() {
        let m: CostMatrix = FOUR.parse().unwrap();
        assert_eq!(m.path_cost(&[0, 1, 2, 3, 0]), 1 + 4 + 6 + 3);
        assert_eq!(m.path_cost(&[0]), 0);
    }
}
