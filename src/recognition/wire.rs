//! Normalization of recognition payloads.
//!
//! Backend revisions disagree on field names (`match` vs `matched`,
//! `student_id` vs `person_id` vs `full_id`, flat vs nested under
//! `best_match`). All of that variance is absorbed here.

use super::{
    BoundingBox, Identity, MatchScore, PersonId, RecognitionResult, RecognitionServiceError, Role,
};
use serde_json::{Map, Value};

/// Id keys in lookup order, with the role each one implies.
const ID_KEYS: &[(&str, Option<Role>)] = &[
    ("person_id", None),
    ("student_id", Some(Role::Student)),
    ("teacher_id", Some(Role::Teacher)),
    ("full_id", None),
    ("id", None),
];

const NAME_KEYS: &[&str] = &["name", "student_name", "teacher_name", "full_name"];

/// Turns an HTTP status and JSON body into a [`RecognitionResult`].
pub(crate) fn normalize(status: u16, body: &Value) -> Result<RecognitionResult, RecognitionServiceError> {
    if !(200..300).contains(&status) {
        let message = error_message(body).unwrap_or_else(|| body.to_string());
        if status == 400 && says_no_face(&message) {
            return Ok(RecognitionResult::no_face());
        }
        return Err(RecognitionServiceError::Status { status, message });
    }

    let root = body
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object"))?;

    let matched = root
        .get("matched")
        .or_else(|| root.get("match"))
        .and_then(Value::as_bool)
        .ok_or_else(|| malformed("missing matched flag"))?;

    let source = match root.get("best_match") {
        Some(Value::Object(best)) => best,
        _ => root,
    };

    let bounding_box = parse_box(source).or_else(|| parse_box(root));
    let score = parse_score(source)?;

    if !matched {
        if error_message(body).is_some_and(|m| says_no_face(&m)) {
            return Ok(RecognitionResult::no_face());
        }
        return Ok(RecognitionResult::unknown(score).with_bounding_box(bounding_box));
    }

    let identity = parse_identity(source)?;
    Ok(RecognitionResult::matched(identity, score).with_bounding_box(bounding_box))
}

fn malformed(reason: impl Into<String>) -> RecognitionServiceError {
    RecognitionServiceError::Malformed(reason.into())
}

fn says_no_face(message: &str) -> bool {
    message.to_ascii_lowercase().contains("no face")
}

fn error_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    object
        .get("error")
        .or_else(|| object.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_identity(source: &Map<String, Value>) -> Result<Identity, RecognitionServiceError> {
    let (person_id, implied_role) = ID_KEYS
        .iter()
        .find_map(|(key, role)| {
            let id = match source.get(*key)? {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((PersonId::new(id), *role))
        })
        .ok_or_else(|| malformed("matched result without a person id"))?;

    let role = match source.get("role").and_then(Value::as_str) {
        Some(raw) => Role::parse(raw).ok_or_else(|| malformed(format!("unknown role {raw:?}")))?,
        None => implied_role.ok_or_else(|| malformed("matched result without a role"))?,
    };

    let name = NAME_KEYS
        .iter()
        .find_map(|key| source.get(*key).and_then(Value::as_str))
        .map(str::to_string);

    Ok(Identity::new(person_id, name, role))
}

fn parse_score(source: &Map<String, Value>) -> Result<Option<MatchScore>, RecognitionServiceError> {
    if let Some(confidence) = source.get("confidence").and_then(Value::as_f64) {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(malformed(format!("confidence {confidence} outside [0, 1]")));
        }
        return Ok(Some(MatchScore::Confidence(confidence)));
    }
    if let Some(distance) = source.get("distance").and_then(Value::as_f64) {
        if !distance.is_finite() || distance < 0.0 {
            return Err(malformed(format!("negative distance {distance}")));
        }
        return Ok(Some(MatchScore::Distance(distance)));
    }
    Ok(None)
}

fn parse_box(source: &Map<String, Value>) -> Option<BoundingBox> {
    let values = source
        .get("box")
        .or_else(|| source.get("bounding_box"))?
        .as_array()?;
    if values.len() != 4 {
        return None;
    }
    let mut trbl = [0i64; 4];
    for (slot, value) in trbl.iter_mut().zip(values) {
        *slot = value.as_f64()?.round() as i64;
    }
    BoundingBox::from_trbl(trbl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_best_match() {
        let body = json!({
            "message": "Face recognition complete",
            "matched": true,
            "best_match": {
                "student_id": 12,
                "student_name": "Asha",
                "class_name": "10-A",
                "confidence": 0.91,
                "distance": 0.09
            }
        });
        let result = normalize(200, &body).unwrap();
        let identity = result.identity().unwrap();

        assert!(result.is_matched());
        assert_eq!(identity.person_id.as_str(), "12");
        assert_eq!(identity.role, Role::Student);
        assert_eq!(identity.name.as_deref(), Some("Asha"));
        assert_eq!(result.score(), Some(MatchScore::Confidence(0.91)));
    }

    #[test]
    fn test_flat_match_alias_with_role() {
        let body = json!({
            "match": true,
            "full_id": "T-004",
            "name": "Mr. Rao",
            "role": "teacher",
            "distance": 0.38,
            "box": [40, 200, 180, 80]
        });
        let result = normalize(200, &body).unwrap();
        let identity = result.identity().unwrap();

        assert_eq!(identity.person_id.as_str(), "T-004");
        assert_eq!(identity.role, Role::Teacher);
        assert_eq!(result.score(), Some(MatchScore::Distance(0.38)));
        assert_eq!(result.bounding_box().unwrap().width(), 120);
    }

    #[test]
    fn test_unmatched_drops_identity_fields() {
        let body = json!({ "matched": false, "best_match": null, "name": "stale" });
        let result = normalize(200, &body).unwrap();
        assert!(!result.is_matched());
        assert!(result.face_detected());
        assert!(result.identity().is_none());
    }

    #[test]
    fn test_no_face_400_maps_to_no_face() {
        let body = json!({ "error": "No face detected in image" });
        let result = normalize(400, &body).unwrap();
        assert!(!result.face_detected());
    }

    #[test]
    fn test_no_face_message_on_success_maps_to_no_face() {
        let body = json!({ "match": false, "message": "No face detected" });
        let result = normalize(200, &body).unwrap();
        assert!(!result.face_detected());
        assert!(!result.is_matched());

        let body = json!({ "matched": false, "message": "Face not recognized" });
        assert!(normalize(200, &body).unwrap().face_detected());
    }

    #[test]
    fn test_server_error_is_status_error() {
        let body = json!({ "error": "db locked" });
        let err = normalize(503, &body).unwrap_err();
        assert!(matches!(err, RecognitionServiceError::Status { status: 503, .. }));
    }

    #[test]
    fn test_matched_without_id_is_malformed() {
        let body = json!({ "matched": true, "name": "Asha", "role": "student" });
        assert!(matches!(
            normalize(200, &body),
            Err(RecognitionServiceError::Malformed(_))
        ));
    }

    #[test]
    fn test_matched_without_role_hint_is_malformed() {
        let body = json!({ "matched": true, "person_id": "p1" });
        assert!(matches!(
            normalize(200, &body),
            Err(RecognitionServiceError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_confidence_is_malformed() {
        let body = json!({ "matched": true, "student_id": 1, "confidence": 87.0 });
        assert!(matches!(
            normalize(200, &body),
            Err(RecognitionServiceError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_flag_is_malformed() {
        assert!(normalize(200, &json!({ "faces": [] })).is_err());
        assert!(normalize(200, &json!("ok")).is_err());
    }
}
