//! Normalized recognition result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which attendance register an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Parses a wire role name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend identifier of a student or teacher.
///
/// Numeric ids and string codes are both carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON form for request bodies: a number when the id is numeric.
    pub fn to_json(&self) -> serde_json::Value {
        match self.0.parse::<i64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::from(self.0.clone()),
        }
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recognized person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub person_id: PersonId,
    pub name: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn new(person_id: PersonId, name: Option<String>, role: Role) -> Self {
        Self {
            person_id,
            name,
            role,
        }
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.person_id.as_str())
    }
}

/// Match quality as reported by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchScore {
    /// Similarity in `[0, 1]`; higher is better.
    Confidence(f64),
    /// Embedding distance, `>= 0`; lower is better.
    Distance(f64),
}

impl MatchScore {
    /// Short label for the overlay, e.g. `87%` or `d=0.41`.
    pub fn label(&self) -> String {
        match self {
            MatchScore::Confidence(c) => format!("{:.0}%", c * 100.0),
            MatchScore::Distance(d) => format!("d={:.2}", d),
        }
    }
}

/// Face box in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    /// Builds a box from `[top, right, bottom, left]`, the order the
    /// matcher reports. Returns `None` for degenerate boxes.
    pub fn from_trbl(values: [i64; 4]) -> Option<Self> {
        let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
        let [top, right, bottom, left] = values.map(clamp);
        (right > left && bottom > top).then_some(Self {
            top,
            right,
            bottom,
            left,
        })
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Outcome of one recognition call.
///
/// Invariant: an unmatched result never carries an identity. The
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    matched: bool,
    face_detected: bool,
    identity: Option<Identity>,
    score: Option<MatchScore>,
    bounding_box: Option<BoundingBox>,
}

impl RecognitionResult {
    /// A face matched an enrolled identity.
    pub fn matched(identity: Identity, score: Option<MatchScore>) -> Self {
        Self {
            matched: true,
            face_detected: true,
            identity: Some(identity),
            score,
            bounding_box: None,
        }
    }

    /// A face was found but matched nobody.
    pub fn unknown(score: Option<MatchScore>) -> Self {
        Self {
            matched: false,
            face_detected: true,
            identity: None,
            score,
            bounding_box: None,
        }
    }

    /// No face in the frame.
    pub fn no_face() -> Self {
        Self {
            matched: false,
            face_detected: false,
            identity: None,
            score: None,
            bounding_box: None,
        }
    }

    /// Attaches the face box.
    pub fn with_bounding_box(mut self, bounding_box: Option<BoundingBox>) -> Self {
        self.bounding_box = bounding_box;
        self
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn score(&self) -> Option<MatchScore> {
        self.score
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_results_carry_no_identity() {
        assert!(RecognitionResult::unknown(None).identity().is_none());
        assert!(RecognitionResult::no_face().identity().is_none());
        assert!(!RecognitionResult::no_face().face_detected());
    }

    #[test]
    fn test_numeric_person_id_serializes_as_number() {
        assert_eq!(PersonId::new("42").to_json(), serde_json::json!(42));
        assert_eq!(PersonId::new("STU-7").to_json(), serde_json::json!("STU-7"));
    }

    #[test]
    fn test_degenerate_box_rejected() {
        assert!(BoundingBox::from_trbl([10, 5, 20, 5]).is_none());
        let b = BoundingBox::from_trbl([10, 60, 70, 20]).unwrap();
        assert_eq!((b.width(), b.height()), (40, 60));
    }

    #[test]
    fn test_score_labels() {
        assert_eq!(MatchScore::Confidence(0.874).label(), "87%");
        assert_eq!(MatchScore::Distance(0.4123).label(), "d=0.41");
        assert_eq!(Role::parse(" Teacher "), Some(Role::Teacher));
    }
}
