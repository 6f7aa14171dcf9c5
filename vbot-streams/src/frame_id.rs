use serde::{Deserialize, Serialize};

/// An inclusive interval `(i1, i2)` over an opaque stream position, used to
/// correlate analysis results with the source bytes they were computed from.
///
/// `(0, 0)` is the sentinel meaning "bind to the frame currently being
/// processed"; any negative component means "not associated with a frame".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId {
    pub i1: i64,
    pub i2: i64,
}

impl FrameId {
    pub const CURRENT: FrameId = FrameId { i1: 0, i2: 0 };

    pub const fn new(i1: i64, i2: i64) -> Self {
        Self { i1, i2 }
    }

    pub const fn is_current_sentinel(&self) -> bool {
        self.i1 == 0 && self.i2 == 0
    }

    pub const fn is_unassociated(&self) -> bool {
        self.i1 < 0 || self.i2 < 0
    }

    /// Resolves `self` against the id of the frame currently in flight:
    /// the `(0, 0)` sentinel inherits `current`, everything else passes
    /// through unchanged.
    pub fn resolve(self, current: FrameId) -> FrameId {
        if self.is_current_sentinel() {
            current
        } else {
            self
        }
    }
}

impl From<(i64, i64)> for FrameId {
    fn from((i1, i2): (i64, i64)) -> Self {
        Self { i1, i2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_resolves_to_current() {
        let current = FrameId::new(7, 9);
        assert_eq!(current, FrameId::CURRENT.resolve(current));
    }

    #[test]
    fn non_sentinel_passes_through() {
        let current = FrameId::new(7, 9);
        let explicit = FrameId::new(3, 4);
        assert_eq!(explicit, explicit.resolve(current));
    }

    #[test]
    fn negative_is_unassociated() {
        assert!(FrameId::new(-1, -1).is_unassociated());
        assert!(!FrameId::new(0, 5).is_unassociated());
    }
}
