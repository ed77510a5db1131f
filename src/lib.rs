//! Trajectory generation for differential drive robots
//!
//! Given a goal pose in the robot frame, [`TrajectoryGenerator::optimize`]
//! searches the shape parameters of a curvature profile until the forward
//! simulated trajectory ends at the goal.
//!
//! ```no_run
//! use trajectory_generator::{ControlParams, Pose2D, TrajectoryGenerator};
//!
//! let generator = TrajectoryGenerator::new();
//! let goal = Pose2D::new(1.0, 0.5, 0.3);
//! let initial = ControlParams::new(0.5, 0.0, 0.0, 0.0, 1.118);
//! match generator.optimize(&goal, &initial, 0.1, 1e-2, 100) {
//!     Ok(result) => println!("converged with {} poses", result.trajectory.len()),
//!     Err(e) => println!("no trajectory: {}", e),
//! }
//! ```
pub mod common;
pub mod control;
pub mod error;
pub mod motion_model;

pub use crate::common::types::Pose2D;
pub use crate::control::{
    estimate_jacobian, optimize_batch, FiniteDifferenceSteps, OptimizationRequest,
    OptimizedTrajectory, TrajectoryGenerator,
};
pub use crate::error::{BatchError, ConfigError, DivergenceReason, OptimizeError};
pub use crate::motion_model::{
    AngularVelocityParams, ControlParams, DiffDriveModel, MotionModel, MotionParams, Trajectory,
};
