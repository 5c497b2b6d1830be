//! Remote face recognition.
//!
//! The matching algorithm is a black box behind one HTTP call. This
//! module sends a frame, and turns whatever payload shape the backend
//! answers with into one normalized [`RecognitionResult`].

mod client;
mod result;
mod wire;

pub use client::{HttpRecognitionClient, RecognitionClient, RecognitionServiceError, RECOGNIZE_PATH};
pub use result::{BoundingBox, Identity, MatchScore, PersonId, RecognitionResult, Role};
