use std::time::Instant;

use facetriage_template::MatchOutcome;

/// One matched face in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub frame: u64,
    /// Index of the face within the frame.
    pub face: usize,
    pub outcome: MatchOutcome,
    /// When the event was emitted.
    pub at: Instant,
}

impl MatchEvent {
    pub fn new(frame: u64, face: usize, outcome: MatchOutcome, at: Instant) -> Self {
        Self {
            frame,
            face,
            outcome,
            at,
        }
    }

    /// Distance to the matched template, or to the nearest one when
    /// unknown.
    pub fn distance(&self) -> Option<f32> {
        match &self.outcome {
            MatchOutcome::Known { distance, .. } => Some(*distance),
            MatchOutcome::Unknown { nearest } => *nearest,
        }
    }
}
