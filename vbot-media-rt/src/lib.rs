mod file_sink;
mod sources;

pub use file_sink::{segmented_file_sink, SegmentedFileSink, SegmentedFileSinkError};
pub use sources::{camera_source, file_source, url_source, SourceConfig};
