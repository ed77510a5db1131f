//! Error types for trajectory generation

use crate::motion_model::ControlParams;
use thiserror::Error;

/// Why a Newton iteration was abandoned as divergent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DivergenceReason {
    /// Cost norm grew between consecutive iterations
    CostIncreased { previous: f64, current: f64 },
    /// The correction step contained NaN or an infinity
    NonFiniteStep,
    /// LU factorization of the Jacobian could not solve the system
    SingularJacobian,
    /// The motion model produced no terminal state
    EmptyTrajectory,
}

impl std::fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DivergenceReason::CostIncreased { previous, current } => {
                write!(f, "cost increased from {previous} to {current}")
            }
            DivergenceReason::NonFiniteStep => write!(f, "non-finite correction step"),
            DivergenceReason::SingularJacobian => write!(f, "singular jacobian"),
            DivergenceReason::EmptyTrajectory => write!(f, "empty trajectory"),
        }
    }
}

/// Terminal failure states of the trajectory optimizer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("tolerance not reached after {iterations} iterations (cost {cost_norm})")]
    IterationExhausted {
        iterations: usize,
        cost_norm: f64,
        params: ControlParams,
    },

    #[error("optimization diverged after {iterations} iterations: {reason}")]
    Diverged {
        reason: DivergenceReason,
        iterations: usize,
        params: ControlParams,
    },

    #[error("path length {path_length} implausible for goal distance {goal_distance}")]
    OptimizationError {
        path_length: f64,
        goal_distance: f64,
        iterations: usize,
        params: ControlParams,
    },
}

impl OptimizeError {
    /// Control parameters held when the optimizer gave up
    pub fn last_params(&self) -> &ControlParams {
        match self {
            OptimizeError::IterationExhausted { params, .. }
            | OptimizeError::Diverged { params, .. }
            | OptimizeError::OptimizationError { params, .. } => params,
        }
    }

    /// Number of Newton updates applied before the failure
    pub fn iterations(&self) -> usize {
        match self {
            OptimizeError::IterationExhausted { iterations, .. }
            | OptimizeError::Diverged { iterations, .. }
            | OptimizeError::OptimizationError { iterations, .. } => *iterations,
        }
    }
}

/// Rejected parameter values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// Failures of the concurrent batch driver itself
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("optimization task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Check a parameter that must be strictly positive and finite
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}
