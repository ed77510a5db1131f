//! Build a lookup table of optimized control parameters
//!
//! Sweeps a grid of goal poses, optimizes each one concurrently from a
//! straight-line initial guess and prints the converged entries as CSV:
//! `v0,k0,x,y,yaw,km,kf,sf`.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use trajectory_generator::{optimize_batch, OptimizationRequest, Pose2D, TrajectoryGenerator};

const MIN_X: f64 = 1.0;
const MAX_X: f64 = 3.0;
const DELTA_X: f64 = 0.5;
const MAX_Y: f64 = 1.5;
const DELTA_Y: f64 = 0.5;
const MAX_YAW: f64 = std::f64::consts::FRAC_PI_4;
const DELTA_YAW: f64 = std::f64::consts::FRAC_PI_8;

const VELOCITY: f64 = 0.5;
const INITIAL_CURVATURE: f64 = 0.0;
const DT: f64 = 0.1;
const TOLERANCE: f64 = 0.1;
const MAX_ITERATIONS: usize = 100;

fn grid(min: f64, max: f64, delta: f64) -> Vec<f64> {
    let n = ((max - min) / delta).round() as i64;
    (0..=n).map(|i| min + i as f64 * delta).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut generator = TrajectoryGenerator::new();
    let mut params = HashMap::new();
    params.insert("max_yawrate".to_string(), 0.8);
    params.insert("max_d_yawrate".to_string(), 2.09);
    params.insert("max_acceleration".to_string(), 1.0);
    params.insert("max_wheel_angular_velocity".to_string(), 11.6);
    params.insert("wheel_radius".to_string(), 0.125);
    params.insert("tread".to_string(), 0.5);
    generator.configure(&params)?;

    let mut requests = Vec::new();
    for x in grid(MIN_X, MAX_X, DELTA_X) {
        for y in grid(-MAX_Y, MAX_Y, DELTA_Y) {
            for yaw in grid(-MAX_YAW, MAX_YAW, DELTA_YAW) {
                requests.push(OptimizationRequest::from_straight_line(
                    Pose2D::new(x, y, yaw),
                    VELOCITY,
                    INITIAL_CURVATURE,
                    DT,
                    TOLERANCE,
                    MAX_ITERATIONS,
                ));
            }
        }
    }

    eprintln!("Generating lookup table for {} goals", requests.len());
    let results = optimize_batch(Arc::new(generator), requests.clone()).await?;

    println!("v0,k0,x,y,yaw,km,kf,sf");
    let mut converged = 0;
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(optimized) => {
                converged += 1;
                let omega = &optimized.params.omega;
                println!(
                    "{},{},{},{},{},{},{},{}",
                    optimized.params.vel,
                    omega.k0,
                    request.goal.x,
                    request.goal.y,
                    request.goal.z,
                    omega.km,
                    omega.kf,
                    omega.sf
                );
            }
            Err(e) => eprintln!("Skipping goal {:?}: {}", request.goal.as_slice(), e),
        }
    }
    eprintln!("{} of {} goals converged", converged, requests.len());

    Ok(())
}
