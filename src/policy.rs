use ndarray::Array2;

use crate::state::State;

/// Deterministic policy: one action per state.
///
/// Indices to `actions` are [cars at site #1, cars at site #2]. The zero
/// action is feasible everywhere, so a fresh policy is valid for any model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub max_cars: u8,
    pub actions: Array2<i8>,
}

impl Policy {
    pub fn new(max_cars: u8) -> Policy {
        let dim = max_cars as usize + 1;
        Policy { max_cars, actions: Array2::<i8>::zeros((dim, dim)) }
    }

    pub fn get(&self, s: State) -> i8 {
        self.actions[s.index()]
    }

    /// Number of states whose action differs from `other`.
    pub fn changes_from(&self, other: &Policy) -> usize {
        self.actions
            .iter()
            .zip(other.actions.iter())
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Expected discounted return of each state under a fixed policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    pub values: Array2<f64>,
}

impl ValueFunction {
    pub fn new(max_cars: u8) -> ValueFunction {
        let dim = max_cars as usize + 1;
        ValueFunction { values: Array2::<f64>::zeros((dim, dim)) }
    }

    pub fn get(&self, s: State) -> f64 {
        self.values[s.index()]
    }

    /// Largest absolute per-state difference from `other`.
    pub fn max_abs_diff(&self, other: &ValueFunction) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .fold(0.0, |delta, (a, b)| f64::max(delta, (a - b).abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_default_policy() {
        // Act
        let dpolicy = Policy::new(4);
        // Assert
        let pdims = dpolicy.actions.dim();
        assert_eq!(dpolicy.actions.ndim(), 2);
        assert_eq!(pdims.0, 5);
        assert_eq!(pdims.1, 5);
        assert!(dpolicy.actions.iter().all(|a| *a == 0));
        assert_eq!(dpolicy.get(State::new(4, 4)), 0);
    }

    #[test]
    fn build_default_values() {
        let values = ValueFunction::new(3);
        assert_eq!(values.values.dim(), (4, 4));
        assert_eq!(values.get(State::new(3, 0)), 0.0);
    }

    #[test]
    fn count_policy_changes() {
        let p1 = Policy::new(2);
        let mut p2 = p1.clone();
        p2.actions[[0, 1]] = -1;
        p2.actions[[2, 0]] = 2;
        assert_eq!(p2.changes_from(&p1), 2);
        assert_eq!(p1.changes_from(&p1), 0);
        assert_eq!(p2.get(State::new(2, 0)), 2);
    }

    #[test]
    fn value_difference() {
        let v1 = ValueFunction::new(2);
        let mut v2 = v1.clone();
        v2.values[[1, 1]] = -3.5;
        v2.values[[0, 2]] = 1.0;
        assert_eq!(v2.max_abs_diff(&v1), 3.5);
        assert_eq!(v1.max_abs_diff(&v2), 3.5);
    }
}
