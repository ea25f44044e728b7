use statrs::distribution::{Discrete, Poisson};

use crate::config::{RentalConfig, ReturnMode};
use crate::error::SolveError;

/// Poisson probabilities for counts `0..=upper`.
///
/// Mass above `upper` is discarded, not folded into the last entry, so the
/// table sums to slightly less than one. Raising `upper` shrinks the deficit.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonTable {
    pub rate: f64,
    pub probs: Vec<f64>,
}

impl PoissonTable {
    pub fn new(rate: f64, upper: u8) -> Result<PoissonTable, SolveError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(SolveError::InvalidRate { rate });
        }
        let probs = if rate == 0.0 {
            // statrs requires a positive rate. A zero rate is a point mass at zero.
            (0..=upper).map(|n| if n == 0 { 1.0 } else { 0.0 }).collect()
        } else {
            let dist = Poisson::new(rate).map_err(|_| SolveError::InvalidRate { rate })?;
            (0..=upper).map(|n| dist.pmf(u64::from(n))).collect()
        };
        Ok(PoissonTable { rate, probs })
    }

    /// A count that occurs every day.
    pub fn constant(count: u8) -> PoissonTable {
        PoissonTable { rate: f64::from(count), probs: Self::point_mass(count) }
    }

    fn point_mass(count: u8) -> Vec<f64> {
        let mut probs = vec![0.0; count as usize + 1];
        probs[count as usize] = 1.0;
        probs
    }

    /// `(count, probability)` pairs in ascending count order. Zero-probability
    /// counts are skipped.
    pub fn support(&self) -> Vec<(u8, f64)> {
        self.probs
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(n, p)| (n as u8, *p))
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.probs.iter().sum()
    }
}

/// Truncated rental and return distributions for both locations.
#[derive(Debug, Clone)]
pub struct CarProbs {
    /// Loc 1 rental probs, indexed by number of cars requested
    pub x1: PoissonTable,
    /// Loc 1 return probs, indexed by number of cars returned
    pub y1: PoissonTable,
    /// Loc 2 rental probs, indexed by number of cars requested
    pub x2: PoissonTable,
    /// Loc 2 return probs, indexed by number of cars returned
    pub y2: PoissonTable,
}

impl CarProbs {
    pub fn new(config: &RentalConfig) -> Result<CarProbs, SolveError> {
        let upper = config.poisson_upper;
        let (y1, y2) = match config.returns {
            ReturnMode::Poisson => (
                PoissonTable::new(config.return_mean1, upper)?,
                PoissonTable::new(config.return_mean2, upper)?,
            ),
            ReturnMode::Expected => (
                PoissonTable::constant(expected_count(config.return_mean1)?),
                PoissonTable::constant(expected_count(config.return_mean2)?),
            ),
        };
        Ok(CarProbs {
            x1: PoissonTable::new(config.rent_mean1, upper)?,
            y1,
            x2: PoissonTable::new(config.rent_mean2, upper)?,
            y2,
        })
    }

    fn show_table(title: &str, table: &PoissonTable) {
        println!("\n=== {} (mean {:.2}, total {:.6}) ===", title, table.rate, table.total());
        for (n, p) in table.probs.iter().enumerate() {
            println!("{n:>5} | {p:10.6}");
        }
    }

    pub fn show_probs(&self) {
        CarProbs::show_table("Location #1 Rental Probabilities", &self.x1);
        CarProbs::show_table("Location #1 Return Probabilities", &self.y1);
        CarProbs::show_table("Location #2 Rental Probabilities", &self.x2);
        CarProbs::show_table("Location #2 Return Probabilities", &self.y2);
    }
}

fn expected_count(mean: f64) -> Result<u8, SolveError> {
    if !mean.is_finite() || mean < 0.0 || mean.round() > f64::from(u8::MAX) {
        return Err(SolveError::InvalidRate { rate: mean });
    }
    Ok(mean.round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case(3.0, 0, 0.049787068367863944; "Zero count")]
    #[test_case(3.0, 3, 0.22404180765538775; "Count at mean")]
    #[test_case(4.0, 10, 0.0052924766764201195; "Count at upper bound")]
    fn pmf_values(rate: f64, n: usize, expected: f64) {
        let table = PoissonTable::new(rate, 10).unwrap();
        assert_abs_diff_eq!(table.probs[n], expected, epsilon = 1e-9);
    }

    #[test]
    fn table_length() {
        let table = PoissonTable::new(2.0, 15).unwrap();
        assert_eq!(table.probs.len(), 16);
    }

    #[test]
    fn truncation_leaves_deficit() {
        let t5 = PoissonTable::new(4.0, 5).unwrap().total();
        let t10 = PoissonTable::new(4.0, 10).unwrap().total();
        let t15 = PoissonTable::new(4.0, 15).unwrap().total();
        assert!(t5 < t10);
        assert!(t10 < t15);
        assert!(t15 < 1.0);
        assert_abs_diff_eq!(t15, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn zero_rate_is_point_mass() {
        let table = PoissonTable::new(0.0, 4).unwrap();
        assert_eq!(table.probs, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(table.support(), vec![(0, 1.0)]);
    }

    #[test_case(-1.0; "Negative")]
    #[test_case(f64::NAN; "Not a number")]
    #[test_case(f64::INFINITY; "Infinite")]
    fn invalid_rate(rate: f64) {
        assert!(matches!(PoissonTable::new(rate, 10), Err(SolveError::InvalidRate { .. })));
    }

    #[test]
    fn constant_table() {
        let table = PoissonTable::constant(2);
        assert_eq!(table.support(), vec![(2, 1.0)]);
        assert_eq!(table.total(), 1.0);
    }

    #[test]
    fn expected_returns_are_constant() {
        let config = RentalConfig {
            returns: ReturnMode::Expected,
            return_mean1: 3.0,
            return_mean2: 2.4,
            ..RentalConfig::default()
        };
        let cprobs = CarProbs::new(&config).unwrap();
        assert_eq!(cprobs.y1.support(), vec![(3, 1.0)]);
        assert_eq!(cprobs.y2.support(), vec![(2, 1.0)]);
        assert_eq!(cprobs.x1.probs.len(), 11);
    }

    #[test]
    fn poisson_returns_are_truncated() {
        let cprobs = CarProbs::new(&RentalConfig::default()).unwrap();
        for table in [&cprobs.x1, &cprobs.y1, &cprobs.x2, &cprobs.y2] {
            assert_eq!(table.probs.len(), 11);
            assert!(table.total() < 1.0);
            assert!(table.total() > 0.99);
        }
    }
}
