//! Static-transform verification.
//!
//! For each expected frame pair the checker queries the transform buffer. A
//! `None` reference asserts the lookup must come back unavailable; a concrete
//! reference asserts translation and rotation within epsilon. Quaternions are
//! sign-normalized before differencing, since `q` and `-q` encode the same
//! rotation.

use nalgebra::Vector3;

use crate::error::HarnessResult;
use crate::messages::Transform;
use crate::scenario::{FramePairExpectation, TransformExpectation, TransformReference};
use crate::transport::Transport;
use crate::verify::FieldCheck;

fn pair_label(pair: &FramePairExpectation) -> String {
    format!("{}->{}", pair.parent, pair.child)
}

/// Compare one looked-up transform (or its absence) against the expectation.
/// Pure so the sign-invariance property is unit-testable without a transport.
pub fn compare_pair(
    pair: &FramePairExpectation,
    observed: Option<&Transform>,
    epsilon: f64,
) -> Vec<FieldCheck> {
    let label = pair_label(pair);
    match (&pair.expected, observed) {
        (None, None) => vec![FieldCheck::exact(
            format!("{label}.available"),
            false,
            false,
        )],
        (None, Some(_)) => vec![FieldCheck::exact(format!("{label}.available"), true, false)],
        (Some(_), None) => vec![FieldCheck::exact(format!("{label}.available"), false, true)],
        (Some(expected), Some(transform)) => compare_values(&label, expected, transform, epsilon),
    }
}

fn compare_values(
    label: &str,
    expected: &TransformExpectation,
    observed: &Transform,
    epsilon: f64,
) -> Vec<FieldCheck> {
    let mut checks = Vec::with_capacity(2);

    let expected_t = Vector3::new(
        expected.translation[0],
        expected.translation[1],
        expected.translation[2],
    );
    let t_delta = (observed.translation - expected_t).amax();
    checks.push(FieldCheck {
        field: format!("{label}.translation"),
        observed: vec_json(&observed.translation),
        expected: vec_json(&expected_t),
        epsilon,
        passed: t_delta <= epsilon,
    });

    // Normalize quaternion sign onto the expected hemisphere before
    // differencing: q and -q are the same rotation.
    let q = observed.rotation.quaternion();
    let [ex, ey, ez, ew] = expected.rotation;
    let dot = q.i * ex + q.j * ey + q.k * ez + q.w * ew;
    let sign = if dot < 0.0 { -1.0 } else { 1.0 };
    let observed_q = [sign * q.i, sign * q.j, sign * q.k, sign * q.w];
    let q_delta = observed_q
        .iter()
        .zip(expected.rotation.iter())
        .map(|(o, e)| (o - e).abs())
        .fold(0.0f64, f64::max);
    checks.push(FieldCheck {
        field: format!("{label}.rotation"),
        observed: slice_json(&observed_q),
        expected: slice_json(&expected.rotation),
        epsilon,
        passed: q_delta <= epsilon,
    });

    checks
}

fn vec_json(v: &Vector3<f64>) -> serde_json::Value {
    slice_json(&[v.x, v.y, v.z])
}

fn slice_json(values: &[f64]) -> serde_json::Value {
    serde_json::Value::Array(
        values
            .iter()
            .map(|v| {
                serde_json::Number::from_f64(*v)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            })
            .collect(),
    )
}

/// Look up and compare every expected frame pair.
pub async fn check<T: Transport + ?Sized>(
    reference: &TransformReference,
    transport: &T,
) -> HarnessResult<Vec<FieldCheck>> {
    let mut checks = Vec::new();
    for pair in &reference.pairs {
        let observed = transport
            .lookup_transform(&pair.parent, &pair.child, reference.lookup_tolerance)
            .await?;
        checks.extend(compare_pair(pair, observed.as_ref(), reference.epsilon));
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(expected: Option<TransformExpectation>) -> FramePairExpectation {
        FramePairExpectation {
            parent: "camera_link".into(),
            child: "camera_color_frame".into(),
            expected,
        }
    }

    fn expectation() -> TransformExpectation {
        TransformExpectation {
            translation: [-0.000_101_6, 0.014_841_2, -0.000_226_7],
            rotation: [-0.000_833_7, 0.001_044_2, -0.000_992_1, 0.999_998_6],
        }
    }

    #[test]
    fn quaternion_comparison_is_sign_invariant() {
        let exp = expectation();
        let observed = Transform::new(exp.translation, exp.rotation);
        let negated = Transform::new(
            exp.translation,
            [
                -exp.rotation[0],
                -exp.rotation[1],
                -exp.rotation[2],
                -exp.rotation[3],
            ],
        );

        for transform in [&observed, &negated] {
            let checks = compare_pair(&pair(Some(exp.clone())), Some(transform), 1e-6);
            assert!(checks.iter().all(|c| c.passed), "{checks:?}");
        }
    }

    #[test]
    fn translation_outside_epsilon_fails() {
        let exp = expectation();
        let mut off = exp.clone();
        off.translation[1] += 0.01;
        let observed = Transform::new(off.translation, off.rotation);
        let checks = compare_pair(&pair(Some(exp)), Some(&observed), 1e-6);
        let translation = checks
            .iter()
            .find(|c| c.field.ends_with(".translation"))
            .unwrap();
        assert!(!translation.passed);
    }

    #[test]
    fn expected_unavailable_matches_none() {
        let checks = compare_pair(&pair(None), None, 1e-6);
        assert!(checks.iter().all(|c| c.passed));
    }

    #[test]
    fn unexpected_presence_fails() {
        let observed = Transform::identity();
        let checks = compare_pair(&pair(None), Some(&observed), 1e-6);
        assert!(!checks[0].passed);
    }

    #[test]
    fn expected_presence_but_unavailable_fails() {
        let checks = compare_pair(&pair(Some(expectation())), None, 1e-6);
        assert!(!checks[0].passed);
    }
}
