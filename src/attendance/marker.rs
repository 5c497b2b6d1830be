//! Idempotent attendance marking.

use super::{AttendanceApi, DedupSet, MarkError, MarkRequest, MarkResponse, ScopeKey};
use crate::recognition::{PersonId, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Result class of a mark attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStatus {
    Marked,
    AlreadyMarked,
    Failed,
}

impl MarkStatus {
    /// Terminal outcomes end the identity's eligibility for the scope.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarkStatus::Marked | MarkStatus::AlreadyMarked)
    }
}

/// Outcome of [`AttendanceMarker::mark`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkOutcome {
    pub outcome: MarkStatus,
    pub person_id: PersonId,
    pub role: Role,
    /// When the deciding network call completed.
    pub timestamp: DateTime<Utc>,
    /// True when answered from the dedup set without a network call.
    pub from_cache: bool,
    /// Failure detail for display.
    pub detail: Option<String>,
}

/// Marks attendance at most once per identity per scope.
pub struct AttendanceMarker<A> {
    api: A,
    timeout: Duration,
    status: String,
    class_name: Option<String>,
}

impl<A: AttendanceApi> AttendanceMarker<A> {
    pub fn new(api: A, timeout: Duration) -> Self {
        Self {
            api,
            timeout,
            status: "present".to_string(),
            class_name: None,
        }
    }

    /// Status value sent with every mark.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Class attached to student marks.
    pub fn with_class_name(mut self, class_name: Option<String>) -> Self {
        self.class_name = class_name;
        self
    }

    /// Marks `person_id` under `scope`.
    ///
    /// A cached terminal outcome short-circuits to `already_marked`
    /// without a network call. Otherwise exactly one role-routed request
    /// is issued; failures are returned but never cached.
    pub async fn mark(
        &self,
        dedup: &mut DedupSet,
        person_id: &PersonId,
        role: Role,
        scope: ScopeKey,
    ) -> MarkOutcome {
        if let Some(cached) = dedup.get(person_id, role, &scope) {
            tracing::debug!(person = %person_id, %scope, "Mark served from cache");
            return MarkOutcome {
                outcome: MarkStatus::AlreadyMarked,
                from_cache: true,
                detail: None,
                ..cached.clone()
            };
        }

        let request = MarkRequest {
            person_id: person_id.clone(),
            role,
            date: scope.attendance_date(),
            status: self.status.clone(),
            class_name: self.class_name.clone(),
        };

        let result = match tokio::time::timeout(self.timeout, self.api.submit(&request)).await {
            Ok(result) => result,
            Err(_) => Err(MarkError::Timeout(self.timeout)),
        };

        let (outcome, detail) = match result {
            Ok(MarkResponse::Marked) => (MarkStatus::Marked, None),
            Ok(MarkResponse::AlreadyMarked) => (MarkStatus::AlreadyMarked, None),
            Err(e) => {
                tracing::warn!(person = %person_id, %role, error = %e, "Mark attempt failed");
                (MarkStatus::Failed, Some(e.to_string()))
            }
        };

        let outcome = MarkOutcome {
            outcome,
            person_id: person_id.clone(),
            role,
            timestamp: Utc::now(),
            from_cache: false,
            detail,
        };
        if dedup.record(scope, outcome.clone()) {
            tracing::info!(
                person = %person_id,
                %role,
                %scope,
                outcome = ?outcome.outcome,
                "Attendance outcome recorded"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    /// Scripted backend: pops one response per call, `Marked` when empty.
    #[derive(Default)]
    struct ScriptedApi {
        script: Mutex<VecDeque<Result<MarkResponse, MarkError>>>,
        calls: Mutex<Vec<MarkRequest>>,
    }

    impl ScriptedApi {
        fn with(script: Vec<Result<MarkResponse, MarkError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AttendanceApi for ScriptedApi {
        async fn submit(&self, request: &MarkRequest) -> Result<MarkResponse, MarkError> {
            self.calls.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(MarkResponse::Marked))
        }
    }

    struct HangingApi;

    #[async_trait]
    impl AttendanceApi for HangingApi {
        async fn submit(&self, _request: &MarkRequest) -> Result<MarkResponse, MarkError> {
            std::future::pending::<Result<MarkResponse, MarkError>>().await
        }
    }

    fn marker<A: AttendanceApi>(api: A) -> AttendanceMarker<A> {
        AttendanceMarker::new(api, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_second_mark_served_from_cache() {
        let marker = marker(ScriptedApi::default());
        let mut dedup = DedupSet::new();
        let id = PersonId::new("s1");
        let scope = ScopeKey::Session(1);

        let first = marker.mark(&mut dedup, &id, Role::Student, scope).await;
        let second = marker.mark(&mut dedup, &id, Role::Student, scope).await;

        assert_eq!(first.outcome, MarkStatus::Marked);
        assert!(!first.from_cache);
        assert_eq!(second.outcome, MarkStatus::AlreadyMarked);
        assert!(second.from_cache);
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(marker.api.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_id_under_both_roles_marks_twice() {
        let marker = marker(ScriptedApi::default());
        let mut dedup = DedupSet::new();
        let id = PersonId::new("5");
        let scope = ScopeKey::Session(1);

        let student = marker.mark(&mut dedup, &id, Role::Student, scope).await;
        let teacher = marker.mark(&mut dedup, &id, Role::Teacher, scope).await;

        assert_eq!(student.outcome, MarkStatus::Marked);
        assert_eq!(teacher.outcome, MarkStatus::Marked);
        assert!(!teacher.from_cache);
        assert_eq!(marker.api.calls(), 2);

        let calls = marker.api.calls.lock().unwrap();
        assert_eq!(calls[0].role, Role::Student);
        assert_eq!(calls[1].role, Role::Teacher);
        assert_eq!(calls[1].path(), crate::attendance::TEACHER_MARK_PATH);
    }

    #[tokio::test]
    async fn test_failed_mark_retried_later() {
        let marker = marker(ScriptedApi::with(vec![
            Err(MarkError::Transport("connection reset".into())),
            Ok(MarkResponse::Marked),
        ]));
        let mut dedup = DedupSet::new();
        let id = PersonId::new("s1");
        let scope = ScopeKey::Session(1);

        let first = marker.mark(&mut dedup, &id, Role::Student, scope).await;
        assert_eq!(first.outcome, MarkStatus::Failed);
        assert!(first.detail.is_some());

        let second = marker.mark(&mut dedup, &id, Role::Student, scope).await;
        assert_eq!(second.outcome, MarkStatus::Marked);
        assert_eq!(marker.api.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_already_marked_is_cached() {
        let marker = marker(ScriptedApi::with(vec![Ok(MarkResponse::AlreadyMarked)]));
        let mut dedup = DedupSet::new();
        let id = PersonId::new("t9");
        let scope = ScopeKey::Session(1);

        let first = marker.mark(&mut dedup, &id, Role::Teacher, scope).await;
        assert_eq!(first.outcome, MarkStatus::AlreadyMarked);
        assert!(!first.from_cache);

        marker.mark(&mut dedup, &id, Role::Teacher, scope).await;
        assert_eq!(marker.api.calls(), 1);
        assert_eq!(marker.api.calls.lock().unwrap()[0].role, Role::Teacher);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_times_out_as_failure() {
        let marker = AttendanceMarker::new(HangingApi, Duration::from_millis(500));
        let mut dedup = DedupSet::new();

        let outcome = marker
            .mark(&mut dedup, &PersonId::new("s1"), Role::Student, ScopeKey::Session(1))
            .await;

        assert_eq!(outcome.outcome, MarkStatus::Failed);
        assert!(dedup.is_empty());
    }

    proptest! {
        #[test]
        fn prop_one_network_call_per_identity(
            sightings in prop::collection::vec((0u8..4, any::<bool>()), 1..40)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            runtime.block_on(async {
                let marker = marker(ScriptedApi::default());
                let mut dedup = DedupSet::new();
                let scope = ScopeKey::Session(1);
                let mut expected: HashSet<(u8, bool)> = HashSet::new();

                for (person, teacher) in &sightings {
                    let role = if *teacher { Role::Teacher } else { Role::Student };
                    let id = PersonId::new(format!("p{person}"));
                    marker.mark(&mut dedup, &id, role, scope).await;
                    expected.insert((*person, *teacher));
                }

                let calls = marker.api.calls.lock().unwrap();
                prop_assert_eq!(calls.len(), expected.len());
                Ok(())
            })?;
        }
    }
}
