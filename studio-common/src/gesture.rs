//! Gesture acknowledgement types.

use serde::{Deserialize, Serialize};

/// Confidence reported for every acknowledged gesture.
pub const GESTURE_CONFIDENCE: f64 = 0.855;

/// Response body of `POST /api/recognize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub message: String,
    pub gesture: String,
    pub confidence: f64,
}

impl RecognizeResponse {
    pub fn acknowledge(gesture: impl Into<String>) -> Self {
        let gesture = gesture.into();
        Self {
            message: format!("Gesture '{}' recognized successfully", gesture),
            gesture,
            confidence: GESTURE_CONFIDENCE,
        }
    }
}
