//! Gesture Studio Common Types
//!
//! Shared types used by the studio server and its clients.

pub mod events;
pub mod gesture;
pub mod generation;

pub use events::{progress_percent, StreamEvent, STATUS_LOADING, STATUS_READY, STATUS_STARTING};
pub use gesture::{RecognizeResponse, GESTURE_CONFIDENCE};
pub use generation::{
    GenerateRequest, GenerateResponse, GenerateStreamQuery, ModelStatus, PNG_DATA_URL_PREFIX,
};
