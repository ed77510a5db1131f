//! Concurrent optimization of many independent goals
//!
//! Every request runs on tokio's blocking pool against one shared, read-only
//! [`TrajectoryGenerator`]. Per-call state never leaves `optimize`, so no
//! locking is needed.

use std::sync::Arc;

use log::debug;

use super::{OptimizedTrajectory, TrajectoryGenerator};
use crate::common::types::{goal_distance, Pose2D};
use crate::error::{BatchError, OptimizeError};
use crate::motion_model::{ControlParams, MotionModel};

/// Arguments of one [`TrajectoryGenerator::optimize`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationRequest {
    pub goal: Pose2D,
    pub initial: ControlParams,
    pub dt: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl OptimizationRequest {
    /// Request starting from a straight path of the goal's length
    pub fn from_straight_line(
        goal: Pose2D,
        vel: f64,
        k0: f64,
        dt: f64,
        tolerance: f64,
        max_iterations: usize,
    ) -> Self {
        let sf = goal_distance(&goal);
        OptimizationRequest {
            goal,
            initial: ControlParams::new(vel, k0, 0.0, 0.0, sf),
            dt,
            tolerance,
            max_iterations,
        }
    }
}

/// Optimize every request concurrently, returning results in request order
pub async fn optimize_batch<M>(
    generator: Arc<TrajectoryGenerator<M>>,
    requests: Vec<OptimizationRequest>,
) -> Result<Vec<Result<OptimizedTrajectory, OptimizeError>>, BatchError>
where
    M: MotionModel + 'static,
{
    debug!("optimizing {} goals", requests.len());

    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let generator = Arc::clone(&generator);
            tokio::task::spawn_blocking(move || {
                generator.optimize(
                    &request.goal,
                    &request.initial,
                    request.dt,
                    request.tolerance,
                    request.max_iterations,
                )
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await?);
    }
    Ok(results)
}
