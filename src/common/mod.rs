//! Common utilities and types for trajectory generation

/// Common types and utilities used across the codebase
pub mod types {
    use nalgebra::Vector3;

    /// A 2D pose (x, y, theta) in the robot's start frame
    pub type Pose2D = Vector3<f64>;

    /// Straight-line distance from the start frame origin to a pose
    pub fn goal_distance(goal: &Pose2D) -> f64 {
        goal.xy().norm()
    }

}
