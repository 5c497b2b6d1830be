//! Role-routed mark-attendance calls.

use crate::config::ApiConfig;
use crate::http;
use crate::recognition::{PersonId, Role};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Student register endpoint under the API base URL.
pub const STUDENT_MARK_PATH: &str = "student-attendance/mark";
/// Teacher register endpoint under the API base URL.
pub const TEACHER_MARK_PATH: &str = "teacher-attendance/mark";

/// A mark call that did not record attendance.
#[derive(Debug, Clone, Error)]
pub enum MarkError {
    #[error("mark request timed out after {0:?}")]
    Timeout(Duration),
    #[error("mark rejected with {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("mark transport failed: {0}")]
    Transport(String),
}

/// Server's answer to a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResponse {
    Marked,
    AlreadyMarked,
}

/// One mark-attendance request.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRequest {
    pub person_id: PersonId,
    pub role: Role,
    pub date: NaiveDate,
    pub status: String,
    pub class_name: Option<String>,
}

impl MarkRequest {
    /// Endpoint path for the request's role.
    pub fn path(&self) -> &'static str {
        match self.role {
            Role::Student => STUDENT_MARK_PATH,
            Role::Teacher => TEACHER_MARK_PATH,
        }
    }

    /// JSON body in the shape the role's endpoint expects.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        let id_key = match self.role {
            Role::Student => "student_id",
            Role::Teacher => "teacher_id",
        };
        body.insert(id_key.into(), self.person_id.to_json());
        body.insert("date".into(), Value::from(self.date.format("%Y-%m-%d").to_string()));
        body.insert("status".into(), Value::from(self.status.clone()));
        if self.role == Role::Student {
            if let Some(class_name) = &self.class_name {
                body.insert("class_name".into(), Value::from(class_name.clone()));
            }
            body.insert(
                "notes".into(),
                Value::from("Auto-marked via face recognition"),
            );
        }
        Value::Object(body)
    }
}

/// Submits one mark to the backend.
#[async_trait]
pub trait AttendanceApi {
    async fn submit(&self, request: &MarkRequest) -> Result<MarkResponse, MarkError>;
}

#[async_trait]
impl<T: AttendanceApi + Send + Sync + ?Sized> AttendanceApi for Arc<T> {
    async fn submit(&self, request: &MarkRequest) -> Result<MarkResponse, MarkError> {
        (**self).submit(request).await
    }
}

/// Maps an HTTP status and body onto a mark response.
pub(crate) fn interpret(status: u16, body: &Value) -> Result<MarkResponse, MarkError> {
    let message = body
        .get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    if (200..300).contains(&status) {
        if body.get("already_marked").and_then(Value::as_bool) == Some(true) {
            return Ok(MarkResponse::AlreadyMarked);
        }
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(MarkError::Rejected { status, message });
        }
        return Ok(MarkResponse::Marked);
    }

    let already = status == 409
        || ((400..500).contains(&status) && message.to_ascii_lowercase().contains("already marked"));
    if already {
        Ok(MarkResponse::AlreadyMarked)
    } else {
        Err(MarkError::Rejected { status, message })
    }
}

/// [`AttendanceApi`] over the backend's student and teacher registers.
#[derive(Debug, Clone)]
pub struct HttpAttendanceApi {
    http: reqwest::Client,
    config: ApiConfig,
}

impl HttpAttendanceApi {
    pub fn new(config: &ApiConfig) -> Result<Self, MarkError> {
        let http =
            http::build_client(config).map_err(|e| MarkError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn map_transport(&self, error: reqwest::Error) -> MarkError {
        if error.is_timeout() {
            MarkError::Timeout(self.config.request_timeout())
        } else {
            MarkError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn submit(&self, request: &MarkRequest) -> Result<MarkResponse, MarkError> {
        let url = self.config.endpoint(request.path());
        let call = self.http.post(&url).json(&request.body());

        let response = http::authorize(call, self.config.auth_token.as_deref())
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let (status, body) = http::read_json(response)
            .await
            .map_err(|e| self.map_transport(e))?;

        tracing::debug!(
            status,
            person = %request.person_id,
            role = %request.role,
            "Mark response received"
        );
        interpret(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn request(role: Role) -> MarkRequest {
        MarkRequest {
            person_id: PersonId::new("17"),
            role,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            status: "present".into(),
            class_name: Some("9-B".into()),
        }
    }

    #[test]
    fn test_student_body() {
        let body = request(Role::Student).body();
        assert_eq!(body["student_id"], json!(17));
        assert_eq!(body["date"], json!("2026-10-19"));
        assert_eq!(body["status"], json!("present"));
        assert_eq!(body["class_name"], json!("9-B"));
        assert!(body.get("teacher_id").is_none());
    }

    #[test]
    fn test_teacher_body_and_route() {
        let req = request(Role::Teacher);
        let body = req.body();
        assert_eq!(req.path(), TEACHER_MARK_PATH);
        assert_eq!(body["teacher_id"], json!(17));
        assert!(body.get("class_name").is_none());
    }

    #[test]
    fn test_interpret_statuses() {
        assert_eq!(interpret(201, &json!({"message": "ok"})).unwrap(), MarkResponse::Marked);
        assert_eq!(
            interpret(200, &json!({"success": true, "already_marked": true})).unwrap(),
            MarkResponse::AlreadyMarked
        );
        assert_eq!(
            interpret(400, &json!({"message": "Attendance already marked for today"})).unwrap(),
            MarkResponse::AlreadyMarked
        );
        assert_eq!(interpret(409, &json!({})).unwrap(), MarkResponse::AlreadyMarked);
        assert!(matches!(
            interpret(200, &json!({"success": false, "error": "closed"})),
            Err(MarkError::Rejected { status: 200, .. })
        ));
        assert!(matches!(
            interpret(403, &json!({"error": "Only teachers can mark attendance"})),
            Err(MarkError::Rejected { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_routes_by_role() {
        let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let students = Arc::clone(&seen);
        let teachers = Arc::clone(&seen);
        let app = Router::new()
            .route(
                "/api/student-attendance/mark",
                post(move |Json(body): Json<Value>| {
                    let students = Arc::clone(&students);
                    async move {
                        students.lock().unwrap().push(("student".into(), body));
                        Json(json!({"message": "Attendance marked successfully"}))
                    }
                }),
            )
            .route(
                "/api/teacher-attendance/mark",
                post(move |Json(body): Json<Value>| {
                    let teachers = Arc::clone(&teachers);
                    async move {
                        teachers.lock().unwrap().push(("teacher".into(), body));
                        (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({"message": "Attendance already marked for today"})),
                        )
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let api = HttpAttendanceApi::new(&ApiConfig {
            base_url: format!("http://{addr}/api"),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(api.submit(&request(Role::Student)).await.unwrap(), MarkResponse::Marked);
        assert_eq!(
            api.submit(&request(Role::Teacher)).await.unwrap(),
            MarkResponse::AlreadyMarked
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "student");
        assert_eq!(seen[0].1["student_id"], json!(17));
        assert_eq!(seen[1].0, "teacher");
        assert_eq!(seen[1].1["teacher_id"], json!(17));
    }
}
