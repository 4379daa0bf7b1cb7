//! Point-cloud verification.
//!
//! Parses the cloud's field layout, checks the point count against the
//! acceptable-count list (exact match against ANY entry — replay is not
//! bit-deterministic in point count), checks the row count exactly, and
//! compares per-field averages: spatial fields under the position epsilon,
//! color channels under the usually-looser color epsilon.

use nalgebra::Vector3;

use crate::error::{HarnessError, HarnessResult};
use crate::messages::{PointCloudMessage, PointFieldType, SampleMessage};
use crate::scenario::PointCloudReference;
use crate::verify::FieldCheck;

/// Field statistics of one cloud: spatial centroid plus mean color, computed
/// over finite points only (invalid depth returns become NaN points in
/// non-dense clouds).
#[derive(Debug, Clone)]
pub struct CloudStats {
    pub finite_points: u64,
    pub centroid: Vector3<f64>,
    pub mean_color: Option<Vector3<f64>>,
}

fn read_f32(data: &[u8], at: usize, bigendian: bool) -> f32 {
    let raw = [data[at], data[at + 1], data[at + 2], data[at + 3]];
    if bigendian {
        f32::from_be_bytes(raw)
    } else {
        f32::from_le_bytes(raw)
    }
}

fn read_u32(data: &[u8], at: usize, bigendian: bool) -> u32 {
    let raw = [data[at], data[at + 1], data[at + 2], data[at + 3]];
    if bigendian {
        u32::from_be_bytes(raw)
    } else {
        u32::from_le_bytes(raw)
    }
}

/// Compute field averages for one cloud.
///
/// `with_color` asks for the packed `rgb` field as well; its absence is then
/// a payload defect rather than a silent skip.
pub fn cloud_stats(cloud: &PointCloudMessage, with_color: bool) -> HarnessResult<CloudStats> {
    let x = cloud.field_as("x", PointFieldType::Float32)?;
    let y = cloud.field_as("y", PointFieldType::Float32)?;
    let z = cloud.field_as("z", PointFieldType::Float32)?;
    let rgb = if with_color {
        // The driver packs color as a 4-byte rgb word; some publishers type
        // it float32, others uint32. Either layout reads the same bytes.
        let field = cloud.field("rgb").ok_or_else(|| HarnessError::MalformedPayload {
            topic: cloud.header.frame_id.clone(),
            reason: "point cloud has no field 'rgb'".to_string(),
        })?;
        if field.datatype.size() != 4 {
            return Err(HarnessError::MalformedPayload {
                topic: cloud.header.frame_id.clone(),
                reason: format!("field 'rgb' is {:?}, expected a 4-byte word", field.datatype),
            });
        }
        Some(field)
    } else {
        None
    };

    let point_step = cloud.point_step as usize;
    let total = cloud.point_count() as usize;
    if cloud.data.len() < total * point_step {
        return Err(HarnessError::MalformedPayload {
            topic: cloud.header.frame_id.clone(),
            reason: format!(
                "cloud payload too short: {} points of {} bytes but {} bytes",
                total,
                point_step,
                cloud.data.len()
            ),
        });
    }

    let mut finite = 0u64;
    let mut position_sum = Vector3::zeros();
    let mut color_sum = Vector3::zeros();
    for i in 0..total {
        let base = i * point_step;
        let px = f64::from(read_f32(&cloud.data, base + x.offset as usize, cloud.is_bigendian));
        let py = f64::from(read_f32(&cloud.data, base + y.offset as usize, cloud.is_bigendian));
        let pz = f64::from(read_f32(&cloud.data, base + z.offset as usize, cloud.is_bigendian));
        if !(px.is_finite() && py.is_finite() && pz.is_finite()) {
            continue;
        }
        finite += 1;
        position_sum += Vector3::new(px, py, pz);
        if let Some(rgb) = rgb {
            let word = read_u32(&cloud.data, base + rgb.offset as usize, cloud.is_bigendian);
            let r = f64::from((word >> 16) & 0xFF);
            let g = f64::from((word >> 8) & 0xFF);
            let b = f64::from(word & 0xFF);
            color_sum += Vector3::new(r, g, b);
        }
    }

    if finite == 0 {
        return Err(HarnessError::MalformedPayload {
            topic: cloud.header.frame_id.clone(),
            reason: "cloud contains no finite points".to_string(),
        });
    }

    let n = finite as f64;
    Ok(CloudStats {
        finite_points: finite,
        centroid: position_sum / n,
        mean_color: rgb.map(|_| color_sum / n),
    })
}

/// Compare collected clouds against the reference.
pub fn check(
    topic: &str,
    reference: &PointCloudReference,
    samples: &[SampleMessage],
) -> HarnessResult<Vec<FieldCheck>> {
    let clouds: Vec<&PointCloudMessage> = samples
        .iter()
        .filter_map(|s| match s {
            SampleMessage::PointCloud(cloud) => Some(cloud),
            _ => None,
        })
        .collect();

    if clouds.is_empty() {
        return Ok(vec![FieldCheck::missing("chunks", "no clouds collected")]);
    }

    let with_color = reference.average.len() == 6;
    let mut checks = Vec::new();

    // Structure is checked per cloud; exact-count semantics, no epsilon.
    for (i, cloud) in clouds.iter().enumerate() {
        let suffix = if clouds.len() == 1 {
            String::new()
        } else {
            format!("[{i}]")
        };
        let count = cloud.point_count();
        checks.push(FieldCheck {
            field: format!("points{suffix}"),
            observed: serde_json::Value::from(count),
            expected: serde_json::Value::from(reference.acceptable_counts.clone()),
            epsilon: 0.0,
            passed: reference.acceptable_counts.contains(&count),
        });
        checks.push(FieldCheck::exact(
            format!("rows{suffix}"),
            cloud.height,
            reference.rows,
        ));
    }

    // Field averages aggregate over every collected cloud, weighted by the
    // number of finite points each contributed.
    let mut finite_total = 0u64;
    let mut centroid_sum = Vector3::zeros();
    let mut color_sum = Vector3::zeros();
    for cloud in &clouds {
        let stats = cloud_stats(cloud, with_color)?;
        let weight = stats.finite_points as f64;
        finite_total += stats.finite_points;
        centroid_sum += stats.centroid * weight;
        if let Some(color) = stats.mean_color {
            color_sum += color * weight;
        }
    }
    let n = finite_total as f64;
    let centroid = centroid_sum / n;

    for (axis, (obs, exp)) in ["x", "y", "z"]
        .iter()
        .zip(centroid.iter().zip(reference.average.iter()))
    {
        checks.push(FieldCheck::scalar(
            format!("mean_{axis}"),
            *obs,
            *exp,
            reference.position_epsilon,
        ));
    }
    if with_color {
        // validate() guarantees a color epsilon whenever color is averaged
        let epsilon = reference.color_epsilon.unwrap_or(reference.position_epsilon);
        let mean_color = color_sum / n;
        for (label, (obs, exp)) in ["r", "g", "b"]
            .iter()
            .zip(mean_color.iter().zip(reference.average[3..].iter()))
        {
            checks.push(FieldCheck::scalar(
                format!("mean_{label}"),
                *obs,
                *exp,
                epsilon,
            ));
        }
    }

    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MessageHeader, PointField};
    use bytes::Bytes;

    /// Unorganized xyz+rgb cloud with every point at `position`/`rgb`.
    fn cloud(points: u32, position: [f32; 3], rgb: [u8; 3]) -> PointCloudMessage {
        let mut data = Vec::with_capacity(points as usize * 16);
        for _ in 0..points {
            for v in position {
                data.extend_from_slice(&v.to_le_bytes());
            }
            let word =
                (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2]);
            data.extend_from_slice(&word.to_le_bytes());
        }
        PointCloudMessage {
            header: MessageHeader::new("cam_depth_optical_frame"),
            height: 1,
            width: points,
            fields: vec![
                PointField::new("x", 0, PointFieldType::Float32),
                PointField::new("y", 4, PointFieldType::Float32),
                PointField::new("z", 8, PointFieldType::Float32),
                PointField::new("rgb", 12, PointFieldType::Float32),
            ],
            is_bigendian: false,
            point_step: 16,
            row_step: points * 16,
            data: Bytes::from(data),
            is_dense: true,
        }
    }

    fn reference() -> PointCloudReference {
        PointCloudReference {
            acceptable_counts: vec![660_353, 3300],
            rows: 1,
            average: vec![1.28, -0.16, 4.82, 80.0, 160.0, 240.0],
            position_epsilon: 0.04,
            color_epsilon: Some(5.0),
        }
    }

    #[test]
    fn count_matching_any_list_entry_passes() {
        let samples = vec![SampleMessage::PointCloud(cloud(
            3300,
            [1.28, -0.16, 4.82],
            [80, 160, 240],
        ))];
        let checks = check("/cam/depth/color/points", &reference(), &samples).unwrap();
        assert!(checks.iter().all(|c| c.passed), "{checks:?}");
    }

    #[test]
    fn count_off_by_one_fails() {
        let samples = vec![SampleMessage::PointCloud(cloud(
            3301,
            [1.28, -0.16, 4.82],
            [80, 160, 240],
        ))];
        let checks = check("/cam/depth/color/points", &reference(), &samples).unwrap();
        let points = checks.iter().find(|c| c.field == "points").unwrap();
        assert!(!points.passed);
    }

    #[test]
    fn nan_points_are_excluded_from_averages() {
        let mut c = cloud(4, [2.0, 2.0, 2.0], [10, 10, 10]);
        // poison the first point's x with NaN
        let mut data = c.data.to_vec();
        data[0..4].copy_from_slice(&f32::NAN.to_le_bytes());
        c.data = Bytes::from(data);

        let stats = cloud_stats(&c, true).unwrap();
        assert_eq!(stats.finite_points, 3);
        assert!((stats.centroid.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn spatial_epsilon_is_separate_from_color_epsilon() {
        // Color off by 3 (inside eps 5), position off by 0.1 (outside 0.04).
        let samples = vec![SampleMessage::PointCloud(cloud(
            3300,
            [1.38, -0.16, 4.82],
            [83, 160, 240],
        ))];
        let checks = check("/cam/depth/color/points", &reference(), &samples).unwrap();
        let mean_x = checks.iter().find(|c| c.field == "mean_x").unwrap();
        let mean_r = checks.iter().find(|c| c.field == "mean_r").unwrap();
        assert!(!mean_x.passed);
        assert!(mean_r.passed);
    }

    #[test]
    fn wrong_row_count_fails() {
        let mut reference = reference();
        reference.rows = 2;
        let samples = vec![SampleMessage::PointCloud(cloud(
            3300,
            [1.28, -0.16, 4.82],
            [80, 160, 240],
        ))];
        let checks = check("/cam/depth/color/points", &reference, &samples).unwrap();
        let rows = checks.iter().find(|c| c.field == "rows").unwrap();
        assert!(!rows.passed);
    }

    #[test]
    fn missing_rgb_field_is_a_payload_defect() {
        let mut c = cloud(10, [1.0, 1.0, 1.0], [0, 0, 0]);
        c.fields.retain(|f| f.name != "rgb");
        assert!(cloud_stats(&c, true).is_err());
    }
}
