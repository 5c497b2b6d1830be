//! Face Attendance CLI
//!
//! Runs one attendance station: opens the camera, scans on a fixed
//! interval and marks recognized people until interrupted.

use clap::Parser;
use face_attendance::{
    attendance::{AttendanceMarker, HttpAttendanceApi, ScopePolicy},
    capture::{Camera, CameraSession, FrameSampler, MockCamera},
    config::{ConfigError, FileConfig},
    controller::{ControllerConfig, LoopState, MatchPolicy, RecognitionController, Status},
    overlay::TracingOverlay,
    recognition::HttpRecognitionClient,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "face-attendance", version, about = "Face-recognition attendance station")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, including the /api prefix
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long)]
    token: Option<String>,

    /// Match tolerance forwarded to the recognizer
    #[arg(long)]
    tolerance: Option<f64>,

    /// Milliseconds between recognition ticks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Camera device index
    #[arg(long)]
    device: Option<u32>,

    /// Stop the session once someone has been marked
    #[arg(long)]
    stop_after_match: bool,

    /// Deduplicate per calendar day instead of per session
    #[arg(long)]
    daily: bool,

    /// Use the synthetic camera even when a real one is available
    #[arg(long)]
    mock: bool,
}

impl Cli {
    fn load_config(&self) -> Result<FileConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };

        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.api.auth_token = Some(token.clone());
        }
        if let Some(tolerance) = self.tolerance {
            config.recognition.tolerance = tolerance;
        }
        if let Some(interval) = self.interval_ms {
            config.recognition.interval_ms = interval;
        }
        if let Some(duration) = self.duration_secs {
            config.output.duration_secs = duration;
        }
        if let Some(device) = self.device {
            config.capture.device_id = device;
        }
        if self.stop_after_match {
            config.attendance.match_policy = MatchPolicy::StopAfterMatch;
        }
        if self.daily {
            config.attendance.scope = ScopePolicy::CalendarDay;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Face Attendance v{}", face_attendance::VERSION);

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    #[cfg(feature = "camera")]
    if !cli.mock {
        return run_station(face_attendance::capture::NativeCamera::new(), config, shutdown_rx)
            .await;
    }
    #[cfg(not(feature = "camera"))]
    if !cli.mock {
        info!("Built without camera support; using mock camera input");
    }

    run_station(MockCamera::new(), config, shutdown_rx).await
}

async fn run_station<C: Camera>(
    camera: C,
    config: FileConfig,
    mut shutdown: watch::Receiver<bool>,
) -> ExitCode {
    let recognizer = match HttpRecognitionClient::new(&config.api) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build recognition client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let api = match HttpAttendanceApi::new(&config.api) {
        Ok(api) => api,
        Err(e) => {
            error!("Failed to build attendance client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let marker = AttendanceMarker::new(api, config.api.request_timeout())
        .with_status(config.attendance.status.clone())
        .with_class_name(config.attendance.class_name.clone());

    let controller = RecognitionController::new(
        ControllerConfig::from_file(&config),
        CameraSession::new(camera, config.capture.clone()),
        FrameSampler::new(config.sampler.clone()),
        recognizer,
        marker,
        TracingOverlay::default(),
    );

    #[cfg(feature = "metrics")]
    spawn_metrics_server(&config, controller.subscribe(), shutdown.clone());

    if let Err(e) = controller.start() {
        error!("Cannot start station: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        backend = %config.api.base_url,
        interval_ms = config.recognition.interval_ms,
        "Station running"
    );

    let mut updates = controller.subscribe();
    let supervise = async {
        let deadline = async {
            match config.output.duration_secs {
                0 => std::future::pending::<()>().await,
                secs => tokio::time::sleep(Duration::from_secs(secs)).await,
            }
        };

        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => info!("Interrupt received"),
            _ = deadline => info!("Run duration elapsed"),
            _ = report_transitions(&mut updates) => {}
        }
        controller.stop();
    };

    tokio::join!(controller.run(), supervise);

    let snapshot = controller.snapshot();
    let c = &snapshot.counters;
    info!(
        ticks = c.ticks,
        matches = c.matches,
        marked = c.marks_recorded,
        already_marked = c.already_marked,
        failures = c.mark_failures + c.recognition_failures,
        "Station stopped"
    );

    if snapshot.status == Status::CameraError {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Logs status changes until the session ends on its own.
async fn report_transitions(
    updates: &mut watch::Receiver<face_attendance::ControllerSnapshot>,
) {
    let mut last = updates.borrow_and_update().status;
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.status != last {
            last = snapshot.status;
            info!(
                status = %snapshot.status,
                message = snapshot.message.as_deref().unwrap_or(""),
                "Status changed"
            );
        }
        if snapshot.state == LoopState::Stopped {
            break;
        }
    }
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(
    config: &FileConfig,
    snapshots: watch::Receiver<face_attendance::ControllerSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) {
    use face_attendance::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if config.output.metrics_port == 0 {
        return;
    }
    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            return;
        }
    };

    let server = MetricsServer::new(
        MetricsServerConfig::with_port(config.output.metrics_port),
        registry,
        snapshots,
    );
    tokio::spawn(async move {
        let stop = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        if let Err(e) = server.run(stop).await {
            warn!("Metrics server exited: {}", e);
        }
    });
}
