//! Differential drive motion model
//!
//! Integrates a unicycle whose curvature follows a quadratic profile over arc
//! length, subject to the yaw rate, yaw acceleration, linear acceleration and
//! wheel speed limits of a differential drive base.

use std::collections::HashMap;

use log::debug;

use super::{ControlParams, MotionModel, Trajectory};
use crate::common::types::Pose2D;
use crate::error::{require_positive, ConfigError};

/// Upper bound on integration steps per simulation
///
/// A path that would need more steps is cut short at this many.
pub const MAX_SIMULATION_STEPS: usize = 1 << 20;

/// Kinematic limits of the robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Maximum yaw rate [rad/s]
    pub max_yawrate: f64,
    /// Maximum yaw acceleration [rad/s^2]
    pub max_d_yawrate: f64,
    /// Maximum linear acceleration [m/s^2]
    pub max_acceleration: f64,
    /// Maximum angular velocity of either wheel [rad/s]
    pub max_wheel_angular_velocity: f64,
    /// Wheel radius [m]
    pub wheel_radius: f64,
    /// Distance between the wheels [m]
    pub tread: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        MotionParams {
            max_yawrate: 0.8,
            max_d_yawrate: 2.09,
            max_acceleration: 1.0,
            max_wheel_angular_velocity: 11.6,
            wheel_radius: 0.125,
            tread: 0.5,
        }
    }
}

impl MotionParams {
    /// Build a validated set of limits
    pub fn new(
        max_yawrate: f64,
        max_d_yawrate: f64,
        max_acceleration: f64,
        max_wheel_angular_velocity: f64,
        wheel_radius: f64,
        tread: f64,
    ) -> Result<Self, ConfigError> {
        Ok(MotionParams {
            max_yawrate: require_positive("max_yawrate", max_yawrate)?,
            max_d_yawrate: require_positive("max_d_yawrate", max_d_yawrate)?,
            max_acceleration: require_positive("max_acceleration", max_acceleration)?,
            max_wheel_angular_velocity: require_positive(
                "max_wheel_angular_velocity",
                max_wheel_angular_velocity,
            )?,
            wheel_radius: require_positive("wheel_radius", wheel_radius)?,
            tread: require_positive("tread", tread)?,
        })
    }

    /// Configure the limits with parameters
    ///
    /// Unknown keys are ignored. On error nothing is changed.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        let get = |key: &str, current: f64| params.get(key).copied().unwrap_or(current);

        *self = MotionParams::new(
            get("max_yawrate", self.max_yawrate),
            get("max_d_yawrate", self.max_d_yawrate),
            get("max_acceleration", self.max_acceleration),
            get("max_wheel_angular_velocity", self.max_wheel_angular_velocity),
            get("wheel_radius", self.wheel_radius),
            get("tread", self.tread),
        )?;
        Ok(())
    }
}

/// Forward simulator for a differential drive robot
#[derive(Debug, Clone, Default)]
pub struct DiffDriveModel {
    params: MotionParams,
}

impl DiffDriveModel {
    pub fn new(params: MotionParams) -> Self {
        DiffDriveModel { params }
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    /// Replace the kinematic limits
    pub fn set_param(
        &mut self,
        max_yawrate: f64,
        max_d_yawrate: f64,
        max_acceleration: f64,
        max_wheel_angular_velocity: f64,
        wheel_radius: f64,
        tread: f64,
    ) -> Result<(), ConfigError> {
        self.params = MotionParams::new(
            max_yawrate,
            max_d_yawrate,
            max_acceleration,
            max_wheel_angular_velocity,
            wheel_radius,
            tread,
        )?;
        Ok(())
    }

    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        self.params.configure(params)
    }

    /// Integrate from the origin, reporting every sample, and return the final pose
    fn simulate<F>(&self, dt: f64, control: &ControlParams, mut on_sample: F) -> Pose2D
    where
        F: FnMut(Pose2D, f64, f64),
    {
        let omega = &control.omega;
        let vel = control.vel;
        let sf = omega.sf;

        let mut pose = Pose2D::zeros();
        let mut v = vel;
        let mut w = omega.k0 * vel;
        on_sample(pose, v, w);

        if !(sf.is_finite() && sf > 0.0 && vel > 0.0 && dt > 0.0) {
            return pose;
        }

        let limits = &self.params;
        let half_tread = 0.5 * limits.tread;
        // Wheel saturation can slow the robot down, so allow for more steps than nominal
        let nominal_steps = ((sf / (vel * dt)).ceil() as usize)
            .saturating_mul(4)
            .saturating_add(1);
        if nominal_steps > MAX_SIMULATION_STEPS {
            debug!(
                "path length {} at {} m/s with dt {} truncated to {} steps",
                sf, vel, dt, MAX_SIMULATION_STEPS
            );
        }
        let max_steps = nominal_steps.min(MAX_SIMULATION_STEPS);

        let mut s = 0.0;
        for _ in 0..max_steps {
            if s >= sf {
                break;
            }

            let target_w = vel * curvature(omega.k0, omega.km, omega.kf, s / sf);
            w = target_w
                .max(w - limits.max_d_yawrate * dt)
                .min(w + limits.max_d_yawrate * dt);
            w = w.max(-limits.max_yawrate).min(limits.max_yawrate);

            let mut target_v = vel
                .max(v - limits.max_acceleration * dt)
                .min(v + limits.max_acceleration * dt);

            let left = (target_v - half_tread * w) / limits.wheel_radius;
            let right = (target_v + half_tread * w) / limits.wheel_radius;
            let fastest = left.abs().max(right.abs());
            if fastest > limits.max_wheel_angular_velocity {
                let scale = limits.max_wheel_angular_velocity / fastest;
                target_v *= scale;
                w *= scale;
            }
            v = target_v;
            if v <= 1e-9 {
                break;
            }

            // Shorten the last step so the path ends exactly at sf
            let mut step = dt;
            let mut last = false;
            if s + v * dt >= sf {
                step = (sf - s) / v;
                last = true;
            }

            pose.x += v * pose.z.cos() * step;
            pose.y += v * pose.z.sin() * step;
            pose.z += w * step;
            s += v * step;

            on_sample(pose, v, w);
            if last {
                break;
            }
        }

        pose
    }
}

/// Quadratic curvature through (0, k0), (0.5, km), (1, kf) at normalized arc length `u`
fn curvature(k0: f64, km: f64, kf: f64, u: f64) -> f64 {
    k0 * 2.0 * (u - 0.5) * (u - 1.0) - km * 4.0 * u * (u - 1.0) + kf * 2.0 * u * (u - 0.5)
}

impl MotionModel for DiffDriveModel {
    fn generate_trajectory(&self, dt: f64, control: &ControlParams, trajectory: &mut Trajectory) {
        self.simulate(dt, control, |pose, v, w| trajectory.push(pose, v, w));
    }

    fn generate_last_state(&self, dt: f64, sf: f64, vel: f64, k0: f64, km: f64, kf: f64) -> Pose2D {
        let control = ControlParams::new(vel, k0, km, kf, sf);
        self.simulate(dt, &control, |_, _, _| {})
    }
}
