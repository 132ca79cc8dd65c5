//! Output boundaries for emitted poses.

use std::io::Write;

use serde::Serialize;

use crate::emit::{PoseStamped, StampedTransform};

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialise message: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "image")]
    #[error("failed to write overlay image: {0}")]
    Image(#[from] ::image::ImageError),
}

/// Receives camera -> board transforms.
pub trait TransformSink {
    fn send_transform(&mut self, transform: &StampedTransform) -> Result<(), SinkError>;
}

/// Receives pose records.
pub trait PoseSink {
    fn publish(&mut self, pose: &PoseStamped) -> Result<(), SinkError>;
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Transform(&'a StampedTransform),
    Pose(&'a PoseStamped),
}

/// Writes one JSON object per line, tagged `"kind": "transform" | "pose"`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> TransformSink for JsonLinesSink<W> {
    fn send_transform(&mut self, transform: &StampedTransform) -> Result<(), SinkError> {
        self.write_record(&Record::Transform(transform))
    }
}

impl<W: Write> PoseSink for JsonLinesSink<W> {
    fn publish(&mut self, pose: &PoseStamped) -> Result<(), SinkError> {
        self.write_record(&Record::Pose(pose))
    }
}

/// Keeps every message in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub transforms: Vec<StampedTransform>,
    pub poses: Vec<PoseStamped>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransformSink for MemorySink {
    fn send_transform(&mut self, transform: &StampedTransform) -> Result<(), SinkError> {
        self.transforms.push(transform.clone());
        Ok(())
    }
}

impl PoseSink for MemorySink {
    fn publish(&mut self, pose: &PoseStamped) -> Result<(), SinkError> {
        self.poses.push(pose.clone());
        Ok(())
    }
}
