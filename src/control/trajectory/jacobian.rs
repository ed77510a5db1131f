//! Numerical Jacobian of the terminal pose with respect to the free shape parameters

use nalgebra::{Matrix3, Vector3};

use super::FiniteDifferenceSteps;
use crate::motion_model::{ControlParams, MotionModel};

/// Estimate `d(terminal pose) / d(km, kf, sf)` by central differences.
///
/// Column `i` holds the derivative with respect to the `i`-th free parameter,
/// in the order (km, kf, sf); rows are (x, y, theta). Each column costs two
/// calls to [`MotionModel::generate_last_state`]. Non-finite model output is
/// passed through untouched.
pub fn estimate_jacobian<M: MotionModel + ?Sized>(
    model: &M,
    dt: f64,
    control: &ControlParams,
    steps: &FiniteDifferenceSteps,
) -> Matrix3<f64> {
    let omega = &control.omega;
    let free = Vector3::new(omega.km, omega.kf, omega.sf);
    let h = steps.as_vector();

    let last_state = |p: &Vector3<f64>| {
        model.generate_last_state(dt, p[2], control.vel, omega.k0, p[0], p[1])
    };

    let mut jacobian = Matrix3::zeros();
    for col in 0..3 {
        let mut plus = free;
        let mut minus = free;
        plus[col] += h[col];
        minus[col] -= h[col];

        let derivative = (last_state(&plus) - last_state(&minus)) / (2.0 * h[col]);
        jacobian.set_column(col, &derivative);
    }

    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Pose2D;
    use crate::motion_model::{DiffDriveModel, Trajectory};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Terminal pose (km, 2 kf, 3 sf), so every column is distinguishable
    struct ScaledModel {
        calls: AtomicUsize,
    }

    impl MotionModel for ScaledModel {
        fn generate_trajectory(&self, _dt: f64, _control: &ControlParams, _trajectory: &mut Trajectory) {
            panic!("jacobian must only query terminal states");
        }

        fn generate_last_state(&self, _dt: f64, sf: f64, _vel: f64, _k0: f64, km: f64, kf: f64) -> Pose2D {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Pose2D::new(km, 2.0 * kf, 3.0 * sf)
        }
    }

    /// Smooth closed-form terminal pose with known derivatives
    struct AnalyticModel;

    impl AnalyticModel {
        #[rustfmt::skip]
        fn derivative(km: f64, kf: f64, sf: f64) -> Matrix3<f64> {
            Matrix3::new(
                -sf * km.sin(), 0.0, km.cos(),
                sf * km.cos(), 0.0, km.sin(),
                0.0, sf * sf * kf.cos(), 2.0 * sf * kf.sin(),
            )
        }
    }

    impl MotionModel for AnalyticModel {
        fn generate_trajectory(&self, _dt: f64, _control: &ControlParams, _trajectory: &mut Trajectory) {}

        fn generate_last_state(&self, _dt: f64, sf: f64, _vel: f64, _k0: f64, km: f64, kf: f64) -> Pose2D {
            Pose2D::new(sf * km.cos(), sf * km.sin(), sf * sf * kf.sin())
        }
    }

    #[test]
    fn test_column_order_follows_km_kf_sf() {
        let model = ScaledModel {
            calls: AtomicUsize::new(0),
        };
        let control = ControlParams::new(0.5, 0.0, 0.3, -0.2, 1.0);
        let j = estimate_jacobian(&model, 0.1, &control, &FiniteDifferenceSteps::default());

        assert_relative_eq!(j, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)), epsilon = 1e-9);
        assert_eq!(model.calls.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_matches_analytic_derivative_to_second_order() {
        let (km, kf, sf) = (0.4, -0.7, 1.3);
        let control = ControlParams::new(0.5, 0.0, km, kf, sf);
        let exact = AnalyticModel::derivative(km, kf, sf);

        let coarse = FiniteDifferenceSteps::new(0.02, 0.02, 0.02).unwrap();
        let fine = FiniteDifferenceSteps::new(0.01, 0.01, 0.01).unwrap();
        let coarse_error = (estimate_jacobian(&AnalyticModel, 0.1, &control, &coarse) - exact).norm();
        let fine_error = (estimate_jacobian(&AnalyticModel, 0.1, &control, &fine) - exact).norm();

        assert!(coarse_error < 1e-3);
        // Halving h should cut the truncation error by about four
        let ratio = coarse_error / fine_error;
        assert!(ratio > 3.5 && ratio < 4.5, "error ratio {ratio}");
    }

    #[test]
    fn test_straight_line_sensitivity_to_path_length() {
        let model = DiffDriveModel::default();
        let control = ControlParams::new(0.5, 0.0, 0.0, 0.0, 1.118);
        let j = estimate_jacobian(&model, 0.1, &control, &FiniteDifferenceSteps::default());

        // Lengthening a straight path only moves it forward
        assert_relative_eq!(j[(0, 2)], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(j[(1, 2)], 0.0);
        assert_abs_diff_eq!(j[(2, 2)], 0.0);
        // Bending the middle pushes the end toward +y, both knots turn it toward +theta
        assert!(j[(1, 0)] > 0.0);
        assert!(j[(2, 0)] > 0.0 && j[(2, 1)] > 0.0);
        // Lateral effect of kf cancels over the profile up to yaw-rate lag
        assert!(j[(1, 1)].abs() < 0.1 * j[(1, 0)], "dy/dkf {}", j[(1, 1)]);
    }
}
