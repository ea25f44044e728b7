//! Problem and solver configuration read from a TOML file.
//!
//! Every field has a default. An empty file describes the classic problem:
//! 20 cars per lot, up to 5 moved overnight, Poisson rentals (3 and 4 per day)
//! and returns (3 and 2 per day), $10 per rental and $2 per car moved.

use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;

use crate::error::{ConfigError, SolveError};

/// One of the two rental locations.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    One,
    Two,
}

/// How returned cars are modelled.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    /// Returns are Poisson distributed, giving four stochastic variables.
    #[default]
    Poisson,
    /// Returns equal their rounded means every day, leaving only the two
    /// rental variables stochastic.
    Expected,
}

/// Cars moved out of one site that are not charged for.
///
/// Only transfers leaving `from` receive the allowance. Transfers in the
/// other direction pay for every car.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FreeTransfer {
    pub from: Site,
    #[serde(default = "default_free_units")]
    pub units: u8,
}

fn default_free_units() -> u8 {
    1
}

/// Fee charged per lot holding more than `threshold` cars after the
/// overnight move.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Parking {
    pub threshold: u8,
    pub fee: f64,
}

/// Hold information read from a TOML configuration file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RentalConfig {
    /// Maximum number of cars that can be stored at either location
    pub max_cars: u8,
    /// Maximum number of cars that can be moved between locations overnight
    pub max_move: u8,
    /// Expected number of cars rented each day at location #1
    pub rent_mean1: f64,
    /// Expected number of cars rented each day at location #2
    pub rent_mean2: f64,
    /// Expected number of cars returned each day at location #1
    pub return_mean1: f64,
    /// Expected number of cars returned each day at location #2
    pub return_mean2: f64,
    pub returns: ReturnMode,
    /// Credit earned per car rented
    pub rental_credit: f64,
    /// Cost per car moved
    pub move_cost: f64,
    pub free_transfer: Option<FreeTransfer>,
    pub parking: Option<Parking>,
    /// Discount rate
    pub gamma: f64,
    /// Policy evaluation stops once no state value changes by this much
    pub theta: f64,
    /// Largest count kept in each truncated Poisson table
    pub poisson_upper: u8,
    pub max_sweeps: usize,
    pub max_rounds: usize,
    /// Joint realizations with a smaller probability are dropped. 0 keeps all.
    pub prune_below: f64,
    /// Merge realizations that lead to the same next state.
    pub coalesce: bool,
    pub parallel: bool,
    /// Size of a dedicated worker pool for model construction. Uses the
    /// global rayon pool when unset.
    pub workers: Option<usize>,
}

impl Default for RentalConfig {
    fn default() -> Self {
        RentalConfig {
            max_cars: 20,
            max_move: 5,
            rent_mean1: 3.0,
            rent_mean2: 4.0,
            return_mean1: 3.0,
            return_mean2: 2.0,
            returns: ReturnMode::Poisson,
            rental_credit: 10.0,
            move_cost: 2.0,
            free_transfer: None,
            parking: None,
            gamma: 0.9,
            theta: 1e-3,
            poisson_upper: 10,
            max_sweeps: 10_000,
            max_rounds: 50,
            prune_below: 0.0,
            coalesce: true,
            parallel: true,
            workers: None,
        }
    }
}

/// Settings shared by the evaluator, the improver and the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub gamma: f64,
    pub theta: f64,
    pub max_sweeps: usize,
    pub max_rounds: usize,
    pub parallel: bool,
}

impl RentalConfig {
    /// Read and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<RentalConfig, ConfigError> {
        let config = RentalConfig::from_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SolveError> {
        for rate in [self.rent_mean1, self.rent_mean2, self.return_mean1, self.return_mean2] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(SolveError::InvalidRate { rate });
            }
        }
        if self.max_cars == 0 {
            return Err(invalid("max_cars must be at least 1"));
        }
        if self.max_move > self.max_cars || self.max_move > i8::MAX as u8 {
            return Err(invalid(format!(
                "max_move ({}) must not exceed max_cars ({})", self.max_move, self.max_cars)));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(invalid(format!("gamma ({}) must lie in (0, 1)", self.gamma)));
        }
        if !(self.theta > 0.0) {
            return Err(invalid(format!("theta ({}) must be positive", self.theta)));
        }
        if self.max_sweeps == 0 || self.max_rounds == 0 {
            return Err(invalid("max_sweeps and max_rounds must be at least 1"));
        }
        if !(self.prune_below >= 0.0) {
            return Err(invalid("prune_below must be non-negative"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1 when set"));
        }
        if let Some(parking) = self.parking {
            if !parking.fee.is_finite() {
                return Err(invalid("parking fee must be finite"));
            }
        }
        Ok(())
    }

    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            gamma: self.gamma,
            theta: self.theta,
            max_sweeps: self.max_sweeps,
            max_rounds: self.max_rounds,
            parallel: self.parallel,
        }
    }
}

fn invalid(msg: impl Into<String>) -> SolveError {
    SolveError::InvalidConfig(msg.into())
}
