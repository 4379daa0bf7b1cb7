//! Built-in scenario catalog.
//!
//! The demo suite mirrors a real regression run for a depth-camera driver:
//! color and depth averages, an inertial check for a camera standing still,
//! point-cloud structure and field averages, the static-transform catalog,
//! and the missing-source case. The golden numbers live here as declarative
//! constants, next to the session scripts the playback driver satisfies them
//! with, so the suite is self-contained and deterministic.

use std::collections::HashMap;
use std::time::Duration;

use crate::messages::{MessageKind, SampleMessage, Transform};
use crate::scenario::{
    FramePairExpectation, ImageReference, ImuReference, PointCloudReference, Reference, Scenario,
    TopicTheme, TransformExpectation, TransformReference,
};
use crate::transport::playback::{
    burst, color_image, depth_image, imu_sample, xyzrgb_cloud, SessionScript, StaticTransform,
    StreamScript,
};

const OUTDOORS_BAG: &str = "outdoors_1color.bag";
const IMU_BAG: &str = "D435i_Depth_and_IMU_Stands_still.bag";

// Golden values shared between the scripts and the references.
const COLOR_MEAN: [u8; 3] = [80, 160, 240];
const DEPTH_MEAN_MM: u16 = 2500;
const ACCEL_STANDING: [f64; 3] = [0.0, 9.81, 0.0];
const CLOUD_CENTROID: [f32; 3] = [1.282_518_1, -0.158_399_8, 4.822_351_8];
const CLOUD_POINTS: u32 = 3300;

/// The color-extrinsics transform from the recorded session, shared by every
/// frame pair that chains through the color sensor.
fn color_extrinsics() -> TransformExpectation {
    TransformExpectation {
        translation: [-0.000_101_587_836_979_888_38, 0.014_841_210_097_074_509, -0.000_226_713_003_939_948_98],
        rotation: [-0.000_833_744_299_598_038_2, 0.001_044_218_428_432_941_4, -0.000_992_065_062_746_405_6, 0.999_998_629_093_170_2],
    }
}

fn identity_expectation() -> TransformExpectation {
    TransformExpectation {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    }
}

fn color_reference() -> Reference {
    Reference::Image(ImageReference {
        average: COLOR_MEAN.map(f64::from).to_vec(),
        epsilon: 5.0,
        width: Some(640),
        height: Some(480),
    })
}

fn depth_reference(width: u32, height: u32) -> Reference {
    Reference::Image(ImageReference {
        average: vec![f64::from(DEPTH_MEAN_MM)],
        epsilon: 15.0,
        width: Some(width),
        height: Some(height),
    })
}

fn cloud_reference() -> Reference {
    Reference::PointCloud(PointCloudReference {
        // Replay yields either the full organized count or the sparse one;
        // both are acceptable, nothing in between is.
        acceptable_counts: vec![660_353, u64::from(CLOUD_POINTS)],
        rows: 1,
        average: vec![
            f64::from(CLOUD_CENTROID[0]),
            f64::from(CLOUD_CENTROID[1]),
            f64::from(CLOUD_CENTROID[2]),
            80.0,
            160.0,
            240.0,
        ],
        position_epsilon: 0.04,
        color_epsilon: Some(5.0),
    })
}

fn static_tf_reference() -> Reference {
    let chained = [
        ("camera_link", "camera_color_frame"),
        ("camera_depth_frame", "camera_color_frame"),
        ("camera_infra1_frame", "camera_color_frame"),
    ];
    let identity = [
        ("camera_link", "camera_depth_frame"),
        ("camera_link", "camera_infra1_frame"),
        ("camera_depth_frame", "camera_infra1_frame"),
    ];
    let unavailable = [
        ("camera_link", "camera_fisheye_frame"),
        ("camera_link", "camera_pose"),
    ];

    let mut pairs = Vec::new();
    for (parent, child) in chained {
        pairs.push(FramePairExpectation {
            parent: parent.into(),
            child: child.into(),
            expected: Some(color_extrinsics()),
        });
    }
    for (parent, child) in identity {
        pairs.push(FramePairExpectation {
            parent: parent.into(),
            child: child.into(),
            expected: Some(identity_expectation()),
        });
    }
    for (parent, child) in unavailable {
        pairs.push(FramePairExpectation {
            parent: parent.into(),
            child: child.into(),
            expected: None,
        });
    }

    Reference::Transform(TransformReference {
        pairs,
        epsilon: 1e-6,
        lookup_tolerance: Duration::from_millis(50),
    })
}

/// Session scripts keyed by bag file name.
pub fn session_library() -> HashMap<String, SessionScript> {
    let mut sessions = HashMap::new();

    let expectation_to_transform = |e: &TransformExpectation| Transform::new(e.translation, e.rotation);
    let color_tf = expectation_to_transform(&color_extrinsics());
    let identity_tf = Transform::identity();
    let transforms = vec![
        StaticTransform {
            parent: "camera_link".into(),
            child: "camera_color_frame".into(),
            transform: color_tf.clone(),
        },
        StaticTransform {
            parent: "camera_depth_frame".into(),
            child: "camera_color_frame".into(),
            transform: color_tf.clone(),
        },
        StaticTransform {
            parent: "camera_infra1_frame".into(),
            child: "camera_color_frame".into(),
            transform: color_tf,
        },
        StaticTransform {
            parent: "camera_link".into(),
            child: "camera_depth_frame".into(),
            transform: identity_tf.clone(),
        },
        StaticTransform {
            parent: "camera_link".into(),
            child: "camera_infra1_frame".into(),
            transform: identity_tf.clone(),
        },
        StaticTransform {
            parent: "camera_depth_frame".into(),
            child: "camera_infra1_frame".into(),
            transform: identity_tf,
        },
    ];

    sessions.insert(
        OUTDOORS_BAG.to_string(),
        SessionScript {
            ready: true,
            startup: Duration::from_millis(40),
            streams: vec![
                StreamScript::new(
                    "color/image_raw",
                    Duration::from_millis(60),
                    burst(
                        SampleMessage::Image(color_image(640, 480, COLOR_MEAN, 6, 0x0dd5)),
                        20,
                    ),
                ),
                StreamScript::new(
                    "depth/image_rect_raw",
                    Duration::from_millis(60),
                    burst(
                        SampleMessage::Image(depth_image(640, 480, DEPTH_MEAN_MM, 40, 0x0dd7)),
                        20,
                    ),
                )
                .unless("decimation_filter.enable"),
                // Decimation halves the raster; the mean is preserved.
                StreamScript::new(
                    "depth/image_rect_raw",
                    Duration::from_millis(60),
                    burst(
                        SampleMessage::Image(depth_image(320, 240, DEPTH_MEAN_MM, 40, 0x0dd8)),
                        20,
                    ),
                )
                .when("decimation_filter.enable"),
                StreamScript::new(
                    "depth/color/points",
                    Duration::from_millis(80),
                    burst(
                        SampleMessage::PointCloud(xyzrgb_cloud(
                            CLOUD_POINTS,
                            CLOUD_CENTROID,
                            0.5,
                            COLOR_MEAN,
                            0x0dd9,
                        )),
                        10,
                    ),
                )
                .when("pointcloud.enable"),
            ],
            transforms,
        },
    );

    sessions.insert(
        IMU_BAG.to_string(),
        SessionScript {
            ready: true,
            startup: Duration::from_millis(40),
            streams: vec![StreamScript::new(
                "accel/sample",
                Duration::from_millis(20),
                (0..15)
                    .map(|i| {
                        SampleMessage::Imu(imu_sample(
                            ACCEL_STANDING,
                            [0.0, 0.0, 0.0],
                            0.05,
                            0x1100 + i,
                        ))
                    })
                    .collect(),
            )
            .when("enable_accel")],
            transforms: Vec::new(),
        },
    );

    sessions
}

/// The demo scenarios, in execution order.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("vis_avg_2", OUTDOORS_BAG)
            .with_option("camera_name", "Vis2_Cam")
            .with_option("color_width", 0i64)
            .with_option("color_height", 0i64)
            .with_theme(
                TopicTheme::new("/Vis2_Cam/color/image_raw", MessageKind::Image)
                    .with_reference(color_reference()),
            ),
        Scenario::new("accel_up_1", IMU_BAG)
            .with_option("camera_name", "Accel_Cam")
            .with_option("enable_accel", true)
            .with_theme(
                TopicTheme::new("/Accel_Cam/accel/sample", MessageKind::Imu)
                    .with_chunks(5)
                    .with_reference(Reference::Imu(ImuReference {
                        linear_acceleration: Some(ACCEL_STANDING),
                        angular_velocity: Some([0.0, 0.0, 0.0]),
                        epsilon: 0.15,
                    })),
            ),
        Scenario::new("depth_w_cloud_1", OUTDOORS_BAG)
            .with_option("camera_name", "Depth_W_Cloud")
            .with_option("enable_pointcloud", true)
            .with_theme(
                TopicTheme::new("/Depth_W_Cloud/depth/image_rect_raw", MessageKind::Image)
                    .with_reference(depth_reference(640, 480)),
            ),
        Scenario::new("depth_avg_1", OUTDOORS_BAG)
            .with_option("camera_name", "Depth_Avg_1")
            .with_theme(
                TopicTheme::new("/Depth_Avg_1/depth/image_rect_raw", MessageKind::Image)
                    .with_reference(depth_reference(640, 480)),
            ),
        Scenario::new("depth_avg_decimation_1", OUTDOORS_BAG)
            .with_option("camera_name", "Decimation_1")
            .with_option("decimation_filter.enable", true)
            .with_theme(
                TopicTheme::new("/Decimation_1/depth/image_rect_raw", MessageKind::Image)
                    .with_reference(depth_reference(320, 240)),
            ),
        Scenario::new("points_cloud_1", OUTDOORS_BAG)
            .with_option("camera_name", "Points_cloud_1")
            .with_option("pointcloud.enable", true)
            .with_theme(
                TopicTheme::new("/Points_cloud_1/depth/color/points", MessageKind::PointCloud)
                    .with_reference(cloud_reference()),
            ),
        {
            let mut scenario = Scenario::new("depth_points_cloud_1", OUTDOORS_BAG)
                .with_option("camera_name", "Points_cloud_1")
                .with_option("pointcloud.enable", true)
                .with_theme(
                    TopicTheme::new(
                        "/Points_cloud_1/depth/color/points",
                        MessageKind::PointCloud,
                    )
                    .with_reference(cloud_reference()),
                )
                .with_theme(
                    TopicTheme::new("/Points_cloud_1/depth/image_rect_raw", MessageKind::Image)
                        .with_reference(depth_reference(640, 480)),
                );
            // Hold the driver back so subscription setup cannot race the
            // first chunks of either stream.
            scenario.launch_delay = Some(Duration::from_millis(200));
            scenario
        },
        Scenario::new("static_tf_1", OUTDOORS_BAG)
            .with_option("camera_name", "Static_tf_1")
            .with_option("enable_infra1", true)
            .with_option("enable_infra2", true)
            .with_theme(
                TopicTheme::new("/Static_tf_1/color/image_raw", MessageKind::Image)
                    .with_reference(color_reference()),
            )
            .with_theme(
                TopicTheme::new("/tf_static", MessageKind::Transform)
                    .with_chunks(0)
                    .with_reference(static_tf_reference()),
            ),
        {
            let mut scenario = Scenario::new("non_existing_rosbag", "non_existent.bag");
            scenario.expect_unready = true;
            scenario.ready_timeout = Duration::from_secs(2);
            scenario
        },
    ]
}
