//! Image verification.
//!
//! Decodes raw frame bytes into per-channel means and differences them
//! against the reference averages under an aggregate epsilon. Exact per-pixel
//! equality is deliberately not required: recompression and replay jitter
//! introduce small noise that a mean-absolute comparison absorbs.

use crate::error::{HarnessError, HarnessResult};
use crate::messages::{ImageEncoding, ImageMessage, SampleMessage};
use crate::scenario::ImageReference;
use crate::verify::FieldCheck;

/// Per-channel mean pixel values of one frame.
///
/// Honors the row stride, so padded rows do not skew the statistics, and the
/// byte order flag for 16-bit rasters.
pub fn channel_means(image: &ImageMessage) -> HarnessResult<Vec<f64>> {
    let channels = image.encoding.channels();
    let bpc = image.encoding.bytes_per_channel();
    let pixel_size = channels * bpc;
    let width = image.width as usize;
    let height = image.height as usize;
    let step = image.step as usize;

    if step < width * pixel_size || image.data.len() < step * height {
        return Err(HarnessError::MalformedPayload {
            topic: image.header.frame_id.clone(),
            reason: format!(
                "image payload too short: {}x{} step {} but {} bytes",
                image.width,
                image.height,
                image.step,
                image.data.len()
            ),
        });
    }
    if width == 0 || height == 0 {
        return Err(HarnessError::MalformedPayload {
            topic: image.header.frame_id.clone(),
            reason: "image has zero pixels".to_string(),
        });
    }

    let mut sums = vec![0.0f64; channels];
    for row in 0..height {
        let row_start = row * step;
        for col in 0..width {
            let px = row_start + col * pixel_size;
            for (ch, sum) in sums.iter_mut().enumerate() {
                let at = px + ch * bpc;
                let value = match image.encoding {
                    ImageEncoding::Mono16 => {
                        let raw = [image.data[at], image.data[at + 1]];
                        if image.is_bigendian {
                            f64::from(u16::from_be_bytes(raw))
                        } else {
                            f64::from(u16::from_le_bytes(raw))
                        }
                    }
                    _ => f64::from(image.data[at]),
                };
                *sum += value;
            }
        }
    }

    let pixels = (width * height) as f64;
    Ok(sums.into_iter().map(|s| s / pixels).collect())
}

/// Compare collected frames against the reference.
pub fn check(
    topic: &str,
    reference: &ImageReference,
    samples: &[SampleMessage],
) -> HarnessResult<Vec<FieldCheck>> {
    let images: Vec<&ImageMessage> = samples
        .iter()
        .filter_map(|s| match s {
            SampleMessage::Image(image) => Some(image),
            _ => None,
        })
        .collect();

    if images.is_empty() {
        return Ok(vec![FieldCheck::missing("chunks", "no image samples collected")]);
    }

    let mut checks = Vec::new();

    // Structural checks against the first frame; the driver does not change
    // geometry mid-stream.
    let first = images[0];
    if let Some(width) = reference.width {
        checks.push(FieldCheck::exact("width", first.width, width));
    }
    if let Some(height) = reference.height {
        checks.push(FieldCheck::exact("height", first.height, height));
    }

    let channels = first.encoding.channels();
    if reference.average.len() != channels {
        return Err(HarnessError::MalformedReference(format!(
            "image reference for '{topic}' has {} channel averages but frames carry {channels}",
            reference.average.len()
        )));
    }

    // Mean across every collected frame, channel by channel.
    let mut totals = vec![0.0f64; channels];
    for image in &images {
        let means = channel_means(image)?;
        if means.len() != channels {
            return Err(HarnessError::MalformedPayload {
                topic: topic.to_string(),
                reason: "frames in one stream disagree on channel count".to_string(),
            });
        }
        for (total, mean) in totals.iter_mut().zip(means) {
            *total += mean;
        }
    }
    let count = images.len() as f64;
    let labels = first.encoding.channel_labels();
    for (ch, total) in totals.iter().enumerate() {
        let label = labels.get(ch).copied().unwrap_or("channel");
        checks.push(FieldCheck::scalar(
            format!("mean_{label}"),
            total / count,
            reference.average[ch],
            reference.epsilon,
        ));
    }

    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageHeader;
    use bytes::Bytes;

    fn rgb_frame(width: u32, height: u32, rgb: [u8; 3]) -> ImageMessage {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        ImageMessage {
            header: MessageHeader::new("cam_color_frame"),
            width,
            height,
            encoding: ImageEncoding::Rgb8,
            is_bigendian: false,
            step: width * 3,
            data: Bytes::from(data),
        }
    }

    fn depth_frame(width: u32, height: u32, value: u16) -> ImageMessage {
        let mut data = Vec::with_capacity((width * height * 2) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&value.to_le_bytes());
        }
        ImageMessage {
            header: MessageHeader::new("cam_depth_frame"),
            width,
            height,
            encoding: ImageEncoding::Mono16,
            is_bigendian: false,
            step: width * 2,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn means_of_uniform_rgb_frame() {
        let means = channel_means(&rgb_frame(4, 2, [80, 160, 240])).unwrap();
        assert_eq!(means, vec![80.0, 160.0, 240.0]);
    }

    #[test]
    fn means_honor_row_padding() {
        // 2x1 rgb frame with 2 bytes of row padding; padding must not count.
        let mut data = vec![10, 20, 30, 10, 20, 30];
        data.extend_from_slice(&[255, 255]);
        let image = ImageMessage {
            header: MessageHeader::new("cam_color_frame"),
            width: 2,
            height: 1,
            encoding: ImageEncoding::Rgb8,
            is_bigendian: false,
            step: 8,
            data: Bytes::from(data),
        };
        assert_eq!(channel_means(&image).unwrap(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn means_of_depth_frame_are_16_bit() {
        let means = channel_means(&depth_frame(3, 3, 2500)).unwrap();
        assert_eq!(means, vec![2500.0]);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut image = rgb_frame(4, 4, [1, 2, 3]);
        image.data = image.data.slice(0..10);
        assert!(channel_means(&image).is_err());
    }

    #[test]
    fn matching_average_passes() {
        let reference = ImageReference {
            average: vec![80.0, 160.0, 240.0],
            epsilon: 1.0,
            width: Some(4),
            height: Some(2),
        };
        let samples = vec![SampleMessage::Image(rgb_frame(4, 2, [80, 160, 240]))];
        let checks = check("/cam/color/image_raw", &reference, &samples).unwrap();
        assert!(checks.iter().all(|c| c.passed));
    }

    #[test]
    fn mismatched_channel_fails_and_is_named() {
        let reference = ImageReference {
            average: vec![80.0, 160.0, 240.0],
            epsilon: 1.0,
            width: None,
            height: None,
        };
        let samples = vec![SampleMessage::Image(rgb_frame(4, 2, [80, 200, 240]))];
        let checks = check("/cam/color/image_raw", &reference, &samples).unwrap();
        let failing: Vec<_> = checks.iter().filter(|c| !c.passed).collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].field, "mean_g");
    }

    #[test]
    fn channel_count_mismatch_is_a_reference_defect() {
        let reference = ImageReference {
            average: vec![80.0],
            epsilon: 1.0,
            width: None,
            height: None,
        };
        let samples = vec![SampleMessage::Image(rgb_frame(2, 2, [1, 2, 3]))];
        assert!(matches!(
            check("/cam/color/image_raw", &reference, &samples),
            Err(HarnessError::MalformedReference(_))
        ));
    }

    #[test]
    fn no_samples_is_a_failing_check() {
        let reference = ImageReference {
            average: vec![80.0, 160.0, 240.0],
            epsilon: 1.0,
            width: None,
            height: None,
        };
        let checks = check("/cam/color/image_raw", &reference, &[]).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].passed);
    }
}
