use thiserror::Error;

use crate::state::State;

/// Errors raised while building the transition model or iterating policies.
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("invalid Poisson rate {rate}: must be finite and non-negative")]
    InvalidRate { rate: f64 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("infeasible action {action} at state {state}")]
    InfeasibleAction { state: State, action: i8 },
    #[error("policy evaluation did not converge after {sweeps} sweeps (last delta {delta:.6})")]
    EvaluationNotConverged { sweeps: usize, delta: f64 },
    #[error("policy not stable after {rounds} improvement rounds")]
    PolicyNotStable { rounds: usize },
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("unable to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("unable to write grid: {0}")]
    Export(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SolveError {
    /// True for the two iteration-cap conditions, which callers may retry
    /// with a relaxed threshold or higher caps.
    pub fn is_not_converged(&self) -> bool {
        matches!(
            self,
            SolveError::EvaluationNotConverged { .. } | SolveError::PolicyNotStable { .. }
        )
    }
}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Read(#[from] config_file::ConfigFileError),
    #[error(transparent)]
    Invalid(#[from] SolveError),
}
