//! Segmented file sink (spec §4.4.5): writes `encoded_packet`s into
//! rotating container files. The actual container muxing is an external
//! collaborator (spec §1 Out-of-scope: "on-disk container muxing"); this
//! sink only owns segment-boundary decisions, filename conventions and
//! pts rebasing, driving a [`SegmentWriter`] trait seam for the muxing
//! itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use thiserror::Error;
use tracing::warn;
use vbot_media::{EncodedFrame, EncodedMetadata, EncodedPacket};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SegmentedFileSinkError {
    #[error("failed to finalize segment: {0}")]
    FinalizeFailed(String),
    #[error("failed to open segment: {0}")]
    OpenFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// External collaborator: remuxes `encoded_frame`s into a container file.
/// A real implementation wraps a muxing library; the sink only drives
/// segment lifecycle.
pub trait SegmentWriter: Send {
    fn open(path: &Path, metadata: &EncodedMetadata) -> Result<Self, SegmentedFileSinkError>
    where
        Self: Sized;
    fn write_frame(&mut self, frame: &EncodedFrame, rebased_pts_ms: i64) -> Result<(), SegmentedFileSinkError>;
    fn finalize(self) -> Result<(), SegmentedFileSinkError>;
    /// Learns the output image size from just enough decoding to size
    /// the container; returns `None` until enough has been decoded.
    fn probe_image_size(&self) -> Option<(u32, u32)> {
        None
    }
}

pub struct SegmentedFileSink<W> {
    stem: PathBuf,
    extension: String,
    segment_duration: Duration,
    metadata: Option<EncodedMetadata>,
    writer: Option<W>,
    current_temp_path: Option<PathBuf>,
    segment_start_pts: Option<f64>,
    segment_start_wall_ms: Option<i64>,
}

fn random_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("{nanos:x}")
}

impl<W: SegmentWriter> SegmentedFileSink<W> {
    /// `extension` must include the leading dot (e.g. `".mp4"`).
    pub fn new(stem: impl Into<PathBuf>, extension: impl Into<String>, segment_duration: Duration) -> Self {
        Self {
            stem: stem.into(),
            extension: extension.into(),
            segment_duration,
            metadata: None,
            writer: None,
            current_temp_path: None,
            segment_start_pts: None,
            segment_start_wall_ms: None,
        }
    }

    fn temp_dir(&self) -> PathBuf {
        self.stem
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("temp-recordings")
    }

    fn segment_name(&self, start_ms: i64, end_ms: i64) -> PathBuf {
        let stem = self.stem.to_string_lossy();
        PathBuf::from(format!("{stem}-{start_ms}-{end_ms}{}", self.extension))
    }

    fn open_new_segment(&mut self) -> Result<(), SegmentedFileSinkError> {
        let Some(metadata) = self.metadata.clone() else {
            return Ok(());
        };
        let temp_path = self
            .temp_dir()
            .join(format!("{}{}", random_suffix(), self.extension));
        let writer = W::open(&temp_path, &metadata)?;
        self.writer = Some(writer);
        self.current_temp_path = Some(temp_path);
        self.segment_start_pts = None;
        self.segment_start_wall_ms = None;
        Ok(())
    }

    fn close_current_segment(&mut self, end_ms: i64) -> Result<(), SegmentedFileSinkError> {
        let (Some(writer), Some(temp_path), Some(start_ms)) = (
            self.writer.take(),
            self.current_temp_path.take(),
            self.segment_start_wall_ms,
        ) else {
            return Ok(());
        };
        writer.finalize()?;
        let final_path = self.segment_name(start_ms, end_ms);
        std::fs::rename(&temp_path, &final_path)
            .map_err(|e| SegmentedFileSinkError::FinalizeFailed(e.to_string()))?;
        Ok(())
    }

    fn should_rotate(&self, frame_pts_ms: i64) -> bool {
        match self.segment_start_wall_ms {
            None => true,
            Some(start) => {
                Duration::from_millis((frame_pts_ms - start).max(0) as u64) >= self.segment_duration
            }
        }
    }

    fn handle_frame(&mut self, frame: EncodedFrame) -> Result<(), SegmentedFileSinkError> {
        let frame_pts_ms = (frame.pts * 1000.0).round() as i64;

        if frame.key_frame && self.should_rotate(frame_pts_ms) {
            if self.writer.is_some() {
                self.close_current_segment(frame_pts_ms)?;
            }
            self.open_new_segment()?;
            self.segment_start_pts = Some(frame.pts);
            self.segment_start_wall_ms = Some(frame_pts_ms);
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let rebased = frame_pts_ms - self.segment_start_wall_ms.unwrap_or(frame_pts_ms);
        writer.write_frame(&frame, rebased)
    }

    /// Consumes `upstream`, writing every frame until it completes, then
    /// closes any still-open segment.
    pub async fn run<S>(mut self, mut upstream: S) -> Result<(), SegmentedFileSinkError>
    where
        S: Stream<Item = EncodedPacket> + Unpin,
    {
        while let Some(packet) = upstream.next().await {
            match packet {
                EncodedPacket::Metadata(meta) => self.metadata = Some(meta),
                EncodedPacket::Frame(frame) => {
                    if let Err(err) = self.handle_frame(frame) {
                        warn!(error = %err, "segmented_file_sink: failed to write frame");
                    }
                }
            }
        }
        if let Some(end_ms) = self.segment_start_wall_ms {
            self.close_current_segment(end_ms)?;
        }
        Ok(())
    }
}

pub fn segmented_file_sink<W: SegmentWriter>(
    stem: impl Into<PathBuf>,
    extension: impl Into<String>,
    segment_duration: Duration,
) -> SegmentedFileSink<W> {
    SegmentedFileSink::new(stem, extension, segment_duration)
}
