//! Metrics collection and registry.

use crate::controller::{ControllerSnapshot, LoopState, Status};
use crate::recognition::MatchScore;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of controller state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// 0 idle, 1 active, 2 suspended, 3 stopped.
    pub loop_state: i64,
    /// Whether the last start or tick failed on the camera.
    pub camera_error: bool,
    pub ticks: u64,
    pub frames_skipped: u64,
    pub recognitions: u64,
    pub recognition_failures: u64,
    pub unknown_faces: u64,
    pub matches: u64,
    pub mark_requests: u64,
    pub marks_recorded: u64,
    pub already_marked: u64,
    pub mark_failures: u64,
    pub discarded_responses: u64,
    /// Confidence of the latest result, when the matcher reports one.
    pub last_confidence: Option<f64>,
}

impl MetricsSnapshot {
    /// Flattens a controller snapshot.
    pub fn from_controller(snapshot: &ControllerSnapshot) -> Self {
        let c = &snapshot.counters;
        let last_confidence = snapshot
            .last_result
            .as_ref()
            .and_then(|r| r.score())
            .and_then(|score| match score {
                MatchScore::Confidence(value) => Some(value),
                MatchScore::Distance(_) => None,
            });

        Self {
            loop_state: match snapshot.state {
                LoopState::Idle => 0,
                LoopState::Active => 1,
                LoopState::Suspended => 2,
                LoopState::Stopped => 3,
            },
            camera_error: snapshot.status == Status::CameraError,
            ticks: c.ticks,
            frames_skipped: c.frames_skipped,
            recognitions: c.recognitions,
            recognition_failures: c.recognition_failures,
            unknown_faces: c.unknown_faces,
            matches: c.matches,
            mark_requests: c.mark_requests,
            marks_recorded: c.marks_recorded,
            already_marked: c.already_marked,
            mark_failures: c.mark_failures,
            discarded_responses: c.discarded_responses,
            last_confidence,
        }
    }
}

/// Prometheus metrics registry for the attendance station.
pub struct MetricsRegistry {
    registry: Registry,

    // Loop metrics
    loop_state: IntGauge,
    camera_error: IntGauge,
    ticks_total: IntCounter,
    frames_skipped_total: IntCounter,

    // Recognition metrics
    recognitions_total: IntCounter,
    recognition_failures_total: IntCounter,
    unknown_faces_total: IntCounter,
    matches_total: IntCounter,
    last_confidence: Gauge,

    // Attendance metrics
    mark_requests_total: IntCounter,
    marks_recorded_total: IntCounter,
    already_marked_total: IntCounter,
    mark_failures_total: IntCounter,
    discarded_responses_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all station metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let loop_state = IntGauge::new(
            "face_attendance_loop_state",
            "Loop state (0=idle, 1=active, 2=suspended, 3=stopped)",
        )?;
        let camera_error = IntGauge::new(
            "face_attendance_camera_error",
            "1 while the camera is unavailable",
        )?;
        let ticks_total = counter("face_attendance_ticks_total", "Recognition ticks started")?;
        let frames_skipped_total = counter(
            "face_attendance_frames_skipped_total",
            "Ticks that produced no encodable frame",
        )?;

        let recognitions_total = counter(
            "face_attendance_recognitions_total",
            "Recognition calls that returned a result",
        )?;
        let recognition_failures_total = counter(
            "face_attendance_recognition_failures_total",
            "Recognition calls that failed or timed out",
        )?;
        let unknown_faces_total = counter(
            "face_attendance_unknown_faces_total",
            "Faces that matched nobody",
        )?;
        let matches_total = counter(
            "face_attendance_matches_total",
            "Faces matched to an enrolled identity",
        )?;
        let last_confidence = Gauge::new(
            "face_attendance_last_confidence",
            "Confidence of the latest recognition result",
        )?;

        let mark_requests_total = counter(
            "face_attendance_mark_requests_total",
            "Mark calls sent to the backend",
        )?;
        let marks_recorded_total = counter(
            "face_attendance_marks_recorded_total",
            "Marks the backend accepted",
        )?;
        let already_marked_total = counter(
            "face_attendance_already_marked_total",
            "Sightings of people already marked in scope",
        )?;
        let mark_failures_total = counter(
            "face_attendance_mark_failures_total",
            "Mark calls that failed and stay eligible for retry",
        )?;
        let discarded_responses_total = counter(
            "face_attendance_discarded_responses_total",
            "Responses that arrived after their session ended",
        )?;

        registry.register(Box::new(loop_state.clone()))?;
        registry.register(Box::new(camera_error.clone()))?;
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(frames_skipped_total.clone()))?;
        registry.register(Box::new(recognitions_total.clone()))?;
        registry.register(Box::new(recognition_failures_total.clone()))?;
        registry.register(Box::new(unknown_faces_total.clone()))?;
        registry.register(Box::new(matches_total.clone()))?;
        registry.register(Box::new(last_confidence.clone()))?;
        registry.register(Box::new(mark_requests_total.clone()))?;
        registry.register(Box::new(marks_recorded_total.clone()))?;
        registry.register(Box::new(already_marked_total.clone()))?;
        registry.register(Box::new(mark_failures_total.clone()))?;
        registry.register(Box::new(discarded_responses_total.clone()))?;

        Ok(Self {
            registry,
            loop_state,
            camera_error,
            ticks_total,
            frames_skipped_total,
            recognitions_total,
            recognition_failures_total,
            unknown_faces_total,
            matches_total,
            last_confidence,
            mark_requests_total,
            marks_recorded_total,
            already_marked_total,
            mark_failures_total,
            discarded_responses_total,
        })
    }

    /// Updates all metrics from a snapshot of controller state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.loop_state.set(snapshot.loop_state);
        self.camera_error.set(i64::from(snapshot.camera_error));

        // Counters only move forward, by the difference
        advance(&self.ticks_total, snapshot.ticks);
        advance(&self.frames_skipped_total, snapshot.frames_skipped);
        advance(&self.recognitions_total, snapshot.recognitions);
        advance(&self.recognition_failures_total, snapshot.recognition_failures);
        advance(&self.unknown_faces_total, snapshot.unknown_faces);
        advance(&self.matches_total, snapshot.matches);
        advance(&self.mark_requests_total, snapshot.mark_requests);
        advance(&self.marks_recorded_total, snapshot.marks_recorded);
        advance(&self.already_marked_total, snapshot.already_marked);
        advance(&self.mark_failures_total, snapshot.mark_failures);
        advance(&self.discarded_responses_total, snapshot.discarded_responses);

        if let Some(confidence) = snapshot.last_confidence {
            self.last_confidence.set(confidence);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    IntCounter::new(name, help)
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LoopCounters;
    use crate::recognition::{Identity, PersonId, RecognitionResult, Role};

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_from_controller() {
        let registry = MetricsRegistry::new().unwrap();

        let controller = ControllerSnapshot {
            state: LoopState::Active,
            counters: LoopCounters {
                ticks: 12,
                matches: 3,
                marks_recorded: 2,
                already_marked: 1,
                ..LoopCounters::default()
            },
            last_result: Some(RecognitionResult::matched(
                Identity::new(PersonId::new("7"), None, Role::Teacher),
                Some(MatchScore::Confidence(0.8)),
            )),
            ..ControllerSnapshot::default()
        };
        registry.update(&MetricsSnapshot::from_controller(&controller));

        let output = registry.encode().unwrap();
        assert!(output.contains("face_attendance_loop_state 1"));
        assert!(output.contains("face_attendance_ticks_total 12"));
        assert!(output.contains("face_attendance_marks_recorded_total 2"));
        assert!(output.contains("face_attendance_last_confidence 0.8"));
        assert!(output.contains("face_attendance_camera_error 0"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            ticks: 10,
            ..MetricsSnapshot::default()
        });
        registry.update(&MetricsSnapshot {
            ticks: 4,
            camera_error: true,
            ..MetricsSnapshot::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("face_attendance_ticks_total 10"));
        assert!(output.contains("face_attendance_camera_error 1"));
    }
}
