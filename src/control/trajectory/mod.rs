//! Trajectory generation module
//!
//! Solves the two-point boundary value problem "reach `goal` from the origin"
//! by Newton-Raphson iteration over the free shape parameters (km, kf, sf) of
//! a [`ControlParams`], using a finite-difference Jacobian of the motion
//! model's terminal state.

pub mod batch;
pub mod jacobian;

use std::collections::HashMap;

use log::{debug, trace, warn};
use nalgebra::Vector3;

use self::jacobian::estimate_jacobian;
use crate::common::types::{goal_distance, Pose2D};
use crate::error::{require_positive, ConfigError, DivergenceReason, OptimizeError};
use crate::motion_model::{ControlParams, DiffDriveModel, MotionModel, Trajectory};

/// Allowed relative deviation of the path length from the straight-line goal distance
const PATH_LENGTH_RATIO_LIMIT: f64 = 0.5;

/// Perturbation sizes for the central-difference Jacobian
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteDifferenceSteps {
    pub dkm: f64,
    pub dkf: f64,
    pub dsf: f64,
}

impl Default for FiniteDifferenceSteps {
    fn default() -> Self {
        FiniteDifferenceSteps {
            dkm: 0.005,
            dkf: 0.005,
            dsf: 0.1,
        }
    }
}

impl FiniteDifferenceSteps {
    pub fn new(dkm: f64, dkf: f64, dsf: f64) -> Result<Self, ConfigError> {
        Ok(FiniteDifferenceSteps {
            dkm: require_positive("dkm", dkm)?,
            dkf: require_positive("dkf", dkf)?,
            dsf: require_positive("dsf", dsf)?,
        })
    }

    /// Steps in Jacobian column order (km, kf, sf)
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.dkm, self.dkf, self.dsf)
    }

    /// Configure the steps from the `dkm`, `dkf` and `dsf` keys
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        let get = |key: &str, current: f64| params.get(key).copied().unwrap_or(current);

        *self = FiniteDifferenceSteps::new(
            get("dkm", self.dkm),
            get("dkf", self.dkf),
            get("dsf", self.dsf),
        )?;
        Ok(())
    }
}

/// A converged trajectory and the parameters that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedTrajectory {
    /// Norm of `goal - final pose`, below the requested tolerance
    pub cost_norm: f64,
    pub params: ControlParams,
    pub trajectory: Trajectory,
    /// Newton updates applied before convergence
    pub iterations: usize,
}

/// A trajectory generator for the robot
///
/// Holds only read-only configuration, so a single instance can serve
/// concurrent [`optimize`](Self::optimize) calls.
#[derive(Debug, Clone)]
pub struct TrajectoryGenerator<M = DiffDriveModel> {
    model: M,
    steps: FiniteDifferenceSteps,
    verbose: bool,
}

impl TrajectoryGenerator<DiffDriveModel> {
    /// Create a new trajectory generator around the differential drive model
    pub fn new() -> Self {
        Self::with_model(DiffDriveModel::default())
    }

    /// Set the kinematic limits passed through to the motion model
    pub fn set_motion_param(
        &mut self,
        max_yawrate: f64,
        max_d_yawrate: f64,
        max_acceleration: f64,
        max_wheel_angular_velocity: f64,
        wheel_radius: f64,
        tread: f64,
    ) -> Result<(), ConfigError> {
        self.model.set_param(
            max_yawrate,
            max_d_yawrate,
            max_acceleration,
            max_wheel_angular_velocity,
            wheel_radius,
            tread,
        )
    }

    /// Configure finite-difference steps and motion limits with parameters
    ///
    /// Either both groups are applied or, on error, neither is.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        let mut steps = self.steps;
        steps.configure(params)?;
        let mut model = self.model.clone();
        model.configure(params)?;

        self.steps = steps;
        self.model = model;
        Ok(())
    }
}

impl Default for TrajectoryGenerator<DiffDriveModel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MotionModel> TrajectoryGenerator<M> {
    /// Create a trajectory generator around any motion model
    pub fn with_model(model: M) -> Self {
        TrajectoryGenerator {
            model,
            steps: FiniteDifferenceSteps::default(),
            verbose: false,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn steps(&self) -> &FiniteDifferenceSteps {
        &self.steps
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Set the finite-difference steps for (km, kf, sf)
    pub fn set_optimization_param(
        &mut self,
        dkm: f64,
        dkf: f64,
        dsf: f64,
    ) -> Result<(), ConfigError> {
        self.steps = FiniteDifferenceSteps::new(dkm, dkf, dsf)?;
        Ok(())
    }

    /// Report failures through `warn!`
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Optimize `initial` until its trajectory ends at `goal`.
    ///
    /// Each iteration simulates the full trajectory, stops if
    /// `‖goal - final pose‖ < tolerance`, and otherwise applies one Newton step
    /// to (km, kf, sf). `k0` and `vel` are never changed. At least one
    /// simulation always runs, and at most `max_iterations` Newton steps are
    /// applied.
    ///
    /// On success the returned trajectory is the one generated from the
    /// returned parameters. On failure the error carries the last parameters
    /// tried.
    pub fn optimize(
        &self,
        goal: &Pose2D,
        initial: &ControlParams,
        dt: f64,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<OptimizedTrajectory, OptimizeError> {
        let distance_to_goal = goal_distance(goal);
        // No previous cost yet, so the first real cost never counts as an increase
        let mut last_cost_norm = f64::INFINITY;
        let mut params = *initial;
        let mut trajectory = Trajectory::new();
        let mut count = 0;

        loop {
            trajectory.clear();
            self.model.generate_trajectory(dt, &params, &mut trajectory);

            let Some(last_pose) = trajectory.last_pose() else {
                return Err(self.diverged(DivergenceReason::EmptyTrajectory, count, params));
            };
            let cost = goal - last_pose;
            let cost_norm = cost.norm();
            trace!(
                "iteration {}: cost {:.6} km={:.6} kf={:.6} sf={:.6}",
                count,
                cost_norm,
                params.omega.km,
                params.omega.kf,
                params.omega.sf
            );

            if cost_norm < tolerance {
                debug!("successfully optimized in {} iterations (cost {})", count, cost_norm);
                return Ok(OptimizedTrajectory {
                    cost_norm,
                    params,
                    trajectory,
                    iterations: count,
                });
            }

            if count >= max_iterations {
                if self.verbose {
                    warn!(
                        "cannot optimize trajectory: cost {} after {} iterations",
                        cost_norm, count
                    );
                }
                return Err(OptimizeError::IterationExhausted {
                    iterations: count,
                    cost_norm,
                    params,
                });
            }

            let jacobian = estimate_jacobian(&self.model, dt, &params, &self.steps);
            let Some(dp) = jacobian.lu().solve(&cost) else {
                return Err(self.diverged(DivergenceReason::SingularJacobian, count, params));
            };

            if cost_norm > last_cost_norm {
                let reason = DivergenceReason::CostIncreased {
                    previous: last_cost_norm,
                    current: cost_norm,
                };
                return Err(self.diverged(reason, count, params));
            }
            if !dp.iter().all(|d| d.is_finite()) {
                return Err(self.diverged(DivergenceReason::NonFiniteStep, count, params));
            }
            last_cost_norm = cost_norm;

            params.omega.km += dp[0];
            params.omega.kf += dp[1];
            params.omega.sf += dp[2];

            let deviation = (params.omega.sf - distance_to_goal).abs();
            if deviation > distance_to_goal * PATH_LENGTH_RATIO_LIMIT {
                if self.verbose {
                    warn!(
                        "optimization error: path length {} for goal distance {}",
                        params.omega.sf, distance_to_goal
                    );
                }
                return Err(OptimizeError::OptimizationError {
                    path_length: params.omega.sf,
                    goal_distance: distance_to_goal,
                    iterations: count,
                    params,
                });
            }

            count += 1;
        }
    }

    fn diverged(
        &self,
        reason: DivergenceReason,
        iterations: usize,
        params: ControlParams,
    ) -> OptimizeError {
        if self.verbose {
            warn!("diverge to infinity: {}", reason);
        }
        OptimizeError::Diverged {
            reason,
            iterations,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Terminal pose linear in the free parameters: Newton lands in one step
    struct LinearModel;

    impl LinearModel {
        fn terminal(km: f64, kf: f64, sf: f64) -> Pose2D {
            Pose2D::new(sf, 0.5 * km + 0.25 * kf, km + kf)
        }
    }

    impl MotionModel for LinearModel {
        fn generate_trajectory(&self, _dt: f64, control: &ControlParams, trajectory: &mut Trajectory) {
            let omega = &control.omega;
            trajectory.push(Pose2D::zeros(), control.vel, 0.0);
            trajectory.push(LinearModel::terminal(omega.km, omega.kf, omega.sf), control.vel, 0.0);
        }

        fn generate_last_state(&self, _dt: f64, sf: f64, _vel: f64, _k0: f64, km: f64, kf: f64) -> Pose2D {
            LinearModel::terminal(km, kf, sf)
        }
    }

    /// Produces nothing at all
    struct EmptyModel;

    impl MotionModel for EmptyModel {
        fn generate_trajectory(&self, _dt: f64, _control: &ControlParams, _trajectory: &mut Trajectory) {}

        fn generate_last_state(&self, _dt: f64, _sf: f64, _vel: f64, _k0: f64, _km: f64, _kf: f64) -> Pose2D {
            Pose2D::zeros()
        }
    }

    #[test]
    fn test_default_steps() {
        let generator = TrajectoryGenerator::new();
        assert_eq!(generator.steps().as_vector(), Vector3::new(0.005, 0.005, 0.1));
        assert!(!generator.verbose());
    }

    #[test]
    fn test_linear_model_converges_in_one_step() {
        let generator = TrajectoryGenerator::with_model(LinearModel);
        let goal = Pose2D::new(1.0, 0.2, 0.3);
        let initial = ControlParams::new(0.5, 0.1, 0.0, 0.0, 1.2);

        let result = generator.optimize(&goal, &initial, 0.1, 1e-6, 10).unwrap();
        assert_eq!(result.iterations, 1);
        assert!(result.cost_norm < 1e-6);
        // 0.5 km + 0.25 kf = 0.2 and km + kf = 0.3
        assert_relative_eq!(result.params.omega.km, 0.5, epsilon = 1e-9);
        assert_relative_eq!(result.params.omega.kf, -0.2, epsilon = 1e-9);
        assert_relative_eq!(result.params.omega.sf, 1.0, epsilon = 1e-9);
        // Fixed parameters are never touched
        assert_eq!(result.params.vel, 0.5);
        assert_eq!(result.params.omega.k0, 0.1);
        assert_relative_eq!(result.trajectory.last_pose().unwrap(), goal, epsilon = 1e-9);
    }

    #[test]
    fn test_large_first_cost_is_not_divergence() {
        let generator = TrajectoryGenerator::with_model(LinearModel);
        let goal = Pose2D::new(400.0, 0.0, 0.0);
        let initial = ControlParams::new(0.5, 0.0, 0.0, 0.0, 210.0);

        let result = generator.optimize(&goal, &initial, 0.1, 1e-6, 10).unwrap();
        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.params.omega.sf, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_converged_guess_needs_no_update() {
        let generator = TrajectoryGenerator::with_model(LinearModel);
        let goal = LinearModel::terminal(0.5, -0.2, 1.0);
        let initial = ControlParams::new(0.5, 0.0, 0.5, -0.2, 1.0);

        let result = generator.optimize(&goal, &initial, 0.1, 1e-6, 0).unwrap();
        assert_eq!(result.iterations, 0);
        assert_eq!(result.params, initial);
    }

    #[test]
    fn test_zero_budget_reports_exhaustion() {
        let generator = TrajectoryGenerator::with_model(LinearModel);
        let goal = Pose2D::new(1.0, 0.2, 0.3);
        let initial = ControlParams::new(0.5, 0.0, 0.0, 0.0, 1.2);

        let err = generator.optimize(&goal, &initial, 0.1, 1e-6, 0).unwrap_err();
        match err {
            OptimizeError::IterationExhausted {
                iterations,
                cost_norm,
                params,
            } => {
                assert_eq!(iterations, 0);
                assert!(cost_norm > 0.0);
                assert_eq!(params, initial);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_trajectory_is_divergence() {
        let generator = TrajectoryGenerator::with_model(EmptyModel);
        let initial = ControlParams::new(0.5, 0.0, 0.0, 0.0, 1.0);

        let err = generator
            .optimize(&Pose2D::new(1.0, 0.0, 0.0), &initial, 0.1, 1e-3, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            OptimizeError::Diverged {
                reason: DivergenceReason::EmptyTrajectory,
                iterations: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_set_optimization_param_validates() {
        let mut generator = TrajectoryGenerator::new();
        generator.set_optimization_param(0.01, 0.02, 0.05).unwrap();
        assert_eq!(generator.steps().as_vector(), Vector3::new(0.01, 0.02, 0.05));

        let err = generator.set_optimization_param(0.01, 0.0, 0.05).unwrap_err();
        assert_eq!(err, ConfigError::NotPositive { name: "dkf", value: 0.0 });
        assert_eq!(generator.steps().as_vector(), Vector3::new(0.01, 0.02, 0.05));
    }

    #[test]
    fn test_configure_is_all_or_nothing() {
        let mut generator = TrajectoryGenerator::new();
        let mut params = HashMap::new();
        params.insert("dsf".to_string(), 0.05);
        params.insert("wheel_radius".to_string(), f64::NAN);

        assert!(generator.configure(&params).is_err());
        assert_eq!(*generator.steps(), FiniteDifferenceSteps::default());

        params.insert("wheel_radius".to_string(), 0.1);
        params.insert("max_yawrate".to_string(), 1.2);
        params.insert("unused_key".to_string(), -1.0);
        generator.configure(&params).unwrap();
        assert_relative_eq!(generator.steps().dsf, 0.05);
        assert_relative_eq!(generator.model().params().wheel_radius, 0.1);
        assert_relative_eq!(generator.model().params().max_yawrate, 1.2);
    }

    #[test]
    fn test_set_motion_param_passes_through() {
        let mut generator = TrajectoryGenerator::new();
        generator.set_motion_param(1.0, 3.0, 1.5, 20.0, 0.1, 0.4).unwrap();
        let params = generator.model().params();
        assert_relative_eq!(params.max_yawrate, 1.0);
        assert_relative_eq!(params.max_d_yawrate, 3.0);
        assert_relative_eq!(params.max_acceleration, 1.5);
        assert_relative_eq!(params.max_wheel_angular_velocity, 20.0);
        assert_relative_eq!(params.wheel_radius, 0.1);
        assert_relative_eq!(params.tread, 0.4);

        assert!(generator.set_motion_param(-1.0, 3.0, 1.5, 20.0, 0.1, 0.4).is_err());
    }
}
