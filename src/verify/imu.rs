//! Inertial sample verification.
//!
//! Built for the camera-held-still scenarios: readings across the collection
//! window should cluster tightly, so the checker averages the collected
//! vectors and compares component-wise against the expected triple.

use nalgebra::Vector3;

use crate::messages::{ImuMessage, SampleMessage};
use crate::scenario::ImuReference;
use crate::verify::FieldCheck;

fn mean_vector<F>(samples: &[&ImuMessage], pick: F) -> Vector3<f64>
where
    F: Fn(&ImuMessage) -> Vector3<f64>,
{
    let sum: Vector3<f64> = samples.iter().map(|m| pick(m)).sum();
    sum / samples.len() as f64
}

fn compare_axes(
    checks: &mut Vec<FieldCheck>,
    prefix: &str,
    observed: Vector3<f64>,
    expected: [f64; 3],
    epsilon: f64,
) {
    for (axis, (obs, exp)) in ["x", "y", "z"]
        .iter()
        .zip(observed.iter().zip(expected.iter()))
    {
        checks.push(FieldCheck::scalar(
            format!("{prefix}_{axis}"),
            *obs,
            *exp,
            epsilon,
        ));
    }
}

/// Compare collected inertial samples against the reference.
pub fn check(reference: &ImuReference, samples: &[SampleMessage]) -> Vec<FieldCheck> {
    let readings: Vec<&ImuMessage> = samples
        .iter()
        .filter_map(|s| match s {
            SampleMessage::Imu(imu) => Some(imu),
            _ => None,
        })
        .collect();

    if readings.is_empty() {
        return vec![FieldCheck::missing("chunks", "no inertial samples collected")];
    }

    let mut checks = Vec::new();
    if let Some(expected) = reference.linear_acceleration {
        let observed = mean_vector(&readings, |m| m.linear_acceleration);
        compare_axes(&mut checks, "accel", observed, expected, reference.epsilon);
    }
    if let Some(expected) = reference.angular_velocity {
        let observed = mean_vector(&readings, |m| m.angular_velocity);
        compare_axes(&mut checks, "gyro", observed, expected, reference.epsilon);
    }
    checks
}
