//! Control module: optimization of trajectory control parameters
pub mod trajectory;

pub use self::trajectory::batch::{optimize_batch, OptimizationRequest};
pub use self::trajectory::jacobian::estimate_jacobian;
pub use self::trajectory::{FiniteDifferenceSteps, OptimizedTrajectory, TrajectoryGenerator};
