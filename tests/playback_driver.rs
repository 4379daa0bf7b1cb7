//! Behavioral tests for the scripted playback driver.
//!
//! These verify that the test double itself is trustworthy: readiness
//! gating, option-gated streams, topic namespacing, and teardown.

use std::collections::BTreeMap;
use std::time::Duration;

use depthcam_verify::demo;
use depthcam_verify::messages::{MessageKind, SampleMessage};
use depthcam_verify::transport::{DriverConfig, DriverLauncher, PlaybackDriver, Transport};

fn config(name: &str, source: &str, options: &[(&str, toml::Value)]) -> DriverConfig {
    let mut map = BTreeMap::new();
    for (key, value) in options {
        map.insert((*key).to_string(), value.clone());
    }
    DriverConfig {
        name: name.to_string(),
        source: source.to_string(),
        options: map,
        launch_delay: None,
    }
}

#[tokio::test]
async fn known_source_becomes_ready() {
    let driver = PlaybackDriver::new(demo::session_library());
    let handle = driver
        .launch(&config("cam", "outdoors_1color.bag", &[]))
        .await
        .unwrap();

    assert!(driver.wait_until_ready(&handle, Duration::from_secs(1)).await);
    driver.shutdown(handle).await;
}

#[tokio::test]
async fn unknown_source_never_becomes_ready() {
    let driver = PlaybackDriver::new(demo::session_library());
    let handle = driver
        .launch(&config("cam", "non_existent.bag", &[]))
        .await
        .unwrap();

    assert!(!driver.wait_until_ready(&handle, Duration::from_millis(300)).await);
    driver.shutdown(handle).await;
}

#[tokio::test]
async fn source_paths_resolve_by_file_name() {
    let driver = PlaybackDriver::new(demo::session_library());
    let handle = driver
        .launch(&config("cam", "/data/bags/outdoors_1color.bag", &[]))
        .await
        .unwrap();

    assert!(driver.wait_until_ready(&handle, Duration::from_secs(1)).await);
    driver.shutdown(handle).await;
}

#[tokio::test]
async fn streams_are_namespaced_by_camera_name() {
    let driver = PlaybackDriver::new(demo::session_library());
    let mut rx = driver
        .subscribe("/MyCam/color/image_raw", MessageKind::Image)
        .await
        .unwrap();

    let handle = driver
        .launch(&config(
            "node",
            "outdoors_1color.bag",
            &[("camera_name", toml::Value::from("MyCam"))],
        ))
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("frame within deadline")
        .expect("channel open");
    assert!(matches!(message, SampleMessage::Image(_)));
    driver.shutdown(handle).await;
}

#[tokio::test]
async fn option_gated_stream_stays_silent_without_its_option() {
    let driver = PlaybackDriver::new(demo::session_library());
    let mut rx = driver
        .subscribe("/cam/depth/color/points", MessageKind::PointCloud)
        .await
        .unwrap();

    // pointcloud.enable is not set, so the points stream must not publish.
    let handle = driver
        .launch(&config("cam", "outdoors_1color.bag", &[]))
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(outcome.is_err(), "points stream published without its option");
    driver.shutdown(handle).await;
}

#[tokio::test]
async fn transforms_appear_with_readiness_and_vanish_on_shutdown() {
    let driver = PlaybackDriver::new(demo::session_library());
    let tolerance = Duration::from_millis(10);

    // Nothing launched yet: unavailable.
    assert!(driver
        .lookup_transform("camera_link", "camera_depth_frame", tolerance)
        .await
        .unwrap()
        .is_none());

    let handle = driver
        .launch(&config("cam", "outdoors_1color.bag", &[]))
        .await
        .unwrap();
    assert!(driver.wait_until_ready(&handle, Duration::from_secs(1)).await);

    let transform = driver
        .lookup_transform("camera_link", "camera_depth_frame", tolerance)
        .await
        .unwrap()
        .expect("static transform available while running");
    assert_eq!(transform.translation.norm(), 0.0);

    // Pairs with no topological link stay unavailable even while ready.
    assert!(driver
        .lookup_transform("camera_link", "camera_fisheye_frame", tolerance)
        .await
        .unwrap()
        .is_none());

    driver.shutdown(handle).await;
    assert!(driver
        .lookup_transform("camera_link", "camera_depth_frame", tolerance)
        .await
        .unwrap()
        .is_none());
}
