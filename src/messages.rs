//! Typed sensor messages.
//!
//! These are the message shapes the harness collects off topics: camera
//! images, inertial samples, and point clouds, plus the rigid-body transform
//! value returned by transform lookups. They mirror the driver's wire types
//! closely enough that reference statistics computed against a recording stay
//! meaningful, but carry no transport concerns — serialization and topic
//! discovery belong to the transport collaborator.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// The category of message expected on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Image,
    Imu,
    PointCloud,
    /// Transform themes collect nothing off the wire; verification queries
    /// the transform buffer instead.
    Transform,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Image => "image",
            MessageKind::Imu => "imu",
            MessageKind::PointCloud => "point_cloud",
            MessageKind::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Common message metadata.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    pub stamp: DateTime<Utc>,
    pub frame_id: String,
}

impl MessageHeader {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            stamp: Utc::now(),
            frame_id: frame_id.into(),
        }
    }
}

/// Pixel layout of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Rgb8,
    Bgr8,
    Mono8,
    /// 16-bit single channel, the driver's depth raster format.
    Mono16,
}

impl ImageEncoding {
    pub fn channels(self) -> usize {
        match self {
            ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => 3,
            ImageEncoding::Mono8 | ImageEncoding::Mono16 => 1,
        }
    }

    pub fn bytes_per_channel(self) -> usize {
        match self {
            ImageEncoding::Mono16 => 2,
            _ => 1,
        }
    }

    /// Channel labels in payload order, used in field-check names.
    pub fn channel_labels(self) -> &'static [&'static str] {
        match self {
            ImageEncoding::Rgb8 => &["r", "g", "b"],
            ImageEncoding::Bgr8 => &["b", "g", "r"],
            ImageEncoding::Mono8 | ImageEncoding::Mono16 => &["depth"],
        }
    }
}

/// A raster frame as published on an image topic.
#[derive(Debug, Clone)]
pub struct ImageMessage {
    pub header: MessageHeader,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub is_bigendian: bool,
    /// Row stride in bytes. Rows may carry padding past `width * pixel size`.
    pub step: u32,
    pub data: Bytes,
}

/// One inertial sample: linear acceleration plus angular velocity.
#[derive(Debug, Clone)]
pub struct ImuMessage {
    pub header: MessageHeader,
    pub linear_acceleration: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

/// Element type of a point-cloud field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFieldType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl PointFieldType {
    pub fn size(self) -> usize {
        match self {
            PointFieldType::UInt8 | PointFieldType::Int8 => 1,
            PointFieldType::UInt16 | PointFieldType::Int16 => 2,
            PointFieldType::UInt32 | PointFieldType::Int32 | PointFieldType::Float32 => 4,
            PointFieldType::Float64 => 8,
        }
    }
}

/// Layout of one field within a point record.
#[derive(Debug, Clone)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: PointFieldType,
    pub count: u32,
}

impl PointField {
    pub fn new(name: impl Into<String>, offset: u32, datatype: PointFieldType) -> Self {
        Self {
            name: name.into(),
            offset,
            datatype,
            count: 1,
        }
    }
}

/// A point cloud as published on a points topic.
///
/// `width` is the point count for unorganized clouds (`height == 1`);
/// organized clouds carry `height` rows of `width` points each.
#[derive(Debug, Clone)]
pub struct PointCloudMessage {
    pub header: MessageHeader,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Bytes,
    pub is_dense: bool,
}

impl PointCloudMessage {
    pub fn point_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn field(&self, name: &str) -> Option<&PointField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Locate a field and insist on its element type.
    pub fn field_as(&self, name: &str, datatype: PointFieldType) -> HarnessResult<&PointField> {
        let field = self.field(name).ok_or_else(|| HarnessError::MalformedPayload {
            topic: self.header.frame_id.clone(),
            reason: format!("point cloud has no field '{name}'"),
        })?;
        if field.datatype != datatype {
            return Err(HarnessError::MalformedPayload {
                topic: self.header.frame_id.clone(),
                reason: format!("field '{name}' is {:?}, expected {datatype:?}", field.datatype),
            });
        }
        Ok(field)
    }
}

/// A rigid-body transform between two named frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn new(translation: [f64; 3], rotation_xyzw: [f64; 4]) -> Self {
        let [x, y, z, w] = rotation_xyzw;
        Self {
            translation: Vector3::new(translation[0], translation[1], translation[2]),
            rotation: UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z)),
        }
    }
}

/// Any message a collector can hold.
#[derive(Debug, Clone)]
pub enum SampleMessage {
    Image(ImageMessage),
    Imu(ImuMessage),
    PointCloud(PointCloudMessage),
}

impl SampleMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SampleMessage::Image(_) => MessageKind::Image,
            SampleMessage::Imu(_) => MessageKind::Imu,
            SampleMessage::PointCloud(_) => MessageKind::PointCloud,
        }
    }
}
