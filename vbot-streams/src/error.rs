use thiserror::Error;

/// The closed set of error kinds a pipeline stage can signal, per spec §7.
///
/// `FrameNotReady` and `EndOfStream` are internal control values: a stage
/// that receives either from its decoder must not forward them as
/// `StreamError` downstream (`FrameNotReady` triggers another upstream
/// pull, `EndOfStream` becomes a clean completion).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("stream initialization failed: {0}")]
    StreamInit(String),

    #[error("frame generation failed: {0}")]
    FrameGeneration(String),

    /// Internal: decoder needs more input before it can yield a frame.
    #[error("decoder needs more input")]
    FrameNotReady,

    /// Internal: clean end of stream, converted to `on_complete`.
    #[error("end of stream")]
    EndOfStream,

    #[error("error_or value accessed after move")]
    ValueMoved,

    #[error("deferred accessed before it was resolved")]
    NotInitialized,

    #[error("operation timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    AsioError(String),
}

/// Top-level error type threaded through the reactive-streams pipeline.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct StreamError {
    pub kind: ErrorKind,
}

impl StreamError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn stream_init(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamInit(msg.into()))
    }

    pub fn frame_generation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::FrameGeneration(msg.into()))
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// `true` for the two kinds that are swallowed rather than surfaced as
    /// `on_error` (spec §7: `FrameNotReady` is internal, `EndOfStream`
    /// converts to `on_complete`).
    pub fn is_internal_control(&self) -> bool {
        matches!(self.kind, ErrorKind::FrameNotReady | ErrorKind::EndOfStream)
    }
}

impl From<ErrorKind> for StreamError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
