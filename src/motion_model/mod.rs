//! Motion models used to forward-simulate candidate trajectories
//!
//! The optimizer only ever talks to a model through [`MotionModel`], so it can
//! be driven by the full differential drive simulator or by a closed-form stub.

use crate::common::types::Pose2D;

pub mod diff_drive;

pub use diff_drive::{DiffDriveModel, MotionParams, MAX_SIMULATION_STEPS};

/// Shape of the angular velocity profile along the path
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularVelocityParams {
    /// Curvature at the start of the path, held fixed while optimizing
    pub k0: f64,
    /// Curvature at the middle of the path
    pub km: f64,
    /// Curvature at the end of the path
    pub kf: f64,
    /// Total path length
    pub sf: f64,
}

/// Control parameters describing one candidate trajectory
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlParams {
    /// Forward speed, held fixed while optimizing
    pub vel: f64,
    pub omega: AngularVelocityParams,
}

impl ControlParams {
    pub fn new(vel: f64, k0: f64, km: f64, kf: f64, sf: f64) -> Self {
        ControlParams {
            vel,
            omega: AngularVelocityParams { k0, km, kf, sf },
        }
    }
}

/// A simulated trajectory, sampled once per time step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub poses: Vec<Pose2D>,
    pub velocities: Vec<f64>,
    pub angular_velocities: Vec<f64>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all samples, keeping the allocations
    pub fn clear(&mut self) {
        self.poses.clear();
        self.velocities.clear();
        self.angular_velocities.clear();
    }

    /// Append one sample
    pub fn push(&mut self, pose: Pose2D, velocity: f64, angular_velocity: f64) {
        self.poses.push(pose);
        self.velocities.push(velocity);
        self.angular_velocities.push(angular_velocity);
    }

    /// Terminal state of the trajectory
    pub fn last_pose(&self) -> Option<Pose2D> {
        self.poses.last().copied()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Trait for forward kinematic simulators
pub trait MotionModel: Send + Sync {
    /// Simulate the full trajectory for `control`, appending samples to `trajectory`
    fn generate_trajectory(&self, dt: f64, control: &ControlParams, trajectory: &mut Trajectory);

    /// Simulate the same motion but only return the terminal pose
    fn generate_last_state(&self, dt: f64, sf: f64, vel: f64, k0: f64, km: f64, kf: f64) -> Pose2D;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_clear_keeps_sequences_parallel() {
        let mut trajectory = Trajectory::new();
        trajectory.push(Pose2D::zeros(), 0.5, 0.0);
        trajectory.push(Pose2D::new(0.05, 0.0, 0.0), 0.5, 0.1);
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.last_pose(), Some(Pose2D::new(0.05, 0.0, 0.0)));

        trajectory.clear();
        assert!(trajectory.is_empty());
        assert!(trajectory.velocities.is_empty());
        assert!(trajectory.angular_velocities.is_empty());
        assert_eq!(trajectory.last_pose(), None);
    }
}
