use anyhow::Result;
use std::collections::HashMap;
use trajectory_generator::{ControlParams, Pose2D, TrajectoryGenerator};

fn main() -> Result<()> {
    env_logger::init();

    println!("Initializing trajectory generator...");

    let mut generator = TrajectoryGenerator::new();
    generator.set_verbose(true);

    // Configure the optimizer and the motion model
    let mut params = HashMap::new();
    params.insert("dkm".to_string(), 0.005);
    params.insert("dkf".to_string(), 0.005);
    params.insert("dsf".to_string(), 0.1);
    params.insert("max_yawrate".to_string(), 0.8);
    params.insert("max_d_yawrate".to_string(), 2.09);
    params.insert("max_acceleration".to_string(), 1.0);
    params.insert("max_wheel_angular_velocity".to_string(), 11.6);
    params.insert("wheel_radius".to_string(), 0.125);
    params.insert("tread".to_string(), 0.5);
    generator.configure(&params)?;

    let goal = Pose2D::new(1.0, 0.5, 0.3);
    let initial = ControlParams::new(0.5, 0.0, 0.0, 0.0, goal.xy().norm());

    println!(
        "Optimizing trajectory to ({}, {}, {}) from sf={:.3}",
        goal.x, goal.y, goal.z, initial.omega.sf
    );

    let result = generator.optimize(&goal, &initial, 0.1, 1e-2, 100)?;

    println!(
        "Converged in {} iterations with cost {:.6}",
        result.iterations, result.cost_norm
    );
    println!(
        "Control params: v={} k0={} km={:.4} kf={:.4} sf={:.4}",
        result.params.vel,
        result.params.omega.k0,
        result.params.omega.km,
        result.params.omega.kf,
        result.params.omega.sf
    );

    for ((pose, v), w) in result
        .trajectory
        .poses
        .iter()
        .zip(&result.trajectory.velocities)
        .zip(&result.trajectory.angular_velocities)
    {
        println!(
            "{:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            pose.x, pose.y, pose.z, v, w
        );
    }

    Ok(())
}
