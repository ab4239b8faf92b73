//! Stand-in for the sensor and camera stations so the registration wizard can
//! be exercised without hardware. Point `sensor.address` and `camera.address`
//! at the emulator.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// 1x1 transparent GIF
const SAMPLE_IMAGE: &str = "R0lGODlhAQABAAAAACwAAAAAAQABAAA=";

#[derive(Parser, Debug, Clone)]
#[command(name = "device-emulator")]
#[command(about = "Emulates the Smart G-ID sensor and camera stations over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8090")]
    bind: String,

    /// Polls answered with "waiting" before each reading
    #[arg(long, default_value_t = 3)]
    waiting_polls: u64,

    /// Fail every Nth capture, 0 never fails
    #[arg(long, default_value_t = 5)]
    fail_every: u64,

    #[arg(long, default_value = "EMU-0001")]
    tag: String,

    #[arg(long, default_value_t = 42.5)]
    weight: f64,

    #[arg(long, default_value_t = 70.0)]
    height: f64,
}

#[derive(Clone)]
struct EmulatorState {
    args: Arc<Args>,
    polls: Arc<AtomicU64>,
    readings: Arc<AtomicU64>,
    captures: Arc<AtomicU64>,
}

async fn get_data_handler(State(state): State<EmulatorState>) -> impl IntoResponse {
    let poll = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if poll <= state.args.waiting_polls {
        debug!("Poll {}: waiting", poll);
        return Json(json!({ "status": "waiting" }));
    }

    // the next goat starts waiting again
    state.polls.store(0, Ordering::SeqCst);
    let reading = state.readings.fetch_add(1, Ordering::SeqCst) + 1;
    info!("Reading {} delivered for tag {}", reading, state.args.tag);
    Json(json!({
        "status": "ready",
        "uid": state.args.tag,
        "weight": state.args.weight,
        "height": state.args.height,
    }))
}

async fn capture_handler(State(state): State<EmulatorState>) -> impl IntoResponse {
    let shot = state.captures.fetch_add(1, Ordering::SeqCst) + 1;
    let fail_every = state.args.fail_every;
    if fail_every > 0 && shot % fail_every == 0 {
        info!("Capture {} failing on purpose", shot);
        return Json(json!({ "status": "error" }));
    }

    debug!("Capture {} ok", shot);
    Json(json!({ "status": "ok", "image": SAMPLE_IMAGE }))
}

async fn health_handler(State(state): State<EmulatorState>) -> impl IntoResponse {
    let health_info = json!({
        "status": "healthy",
        "readings_delivered": state.readings.load(Ordering::SeqCst),
        "captures_requested": state.captures.load(Ordering::SeqCst),
    });
    (StatusCode::OK, Json(health_info))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("device_emulator=info")),
        )
        .init();

    let args = Args::parse();
    let state = EmulatorState {
        args: Arc::new(args.clone()),
        polls: Arc::new(AtomicU64::new(0)),
        readings: Arc::new(AtomicU64::new(0)),
        captures: Arc::new(AtomicU64::new(0)),
    };

    let app = Router::new()
        .route("/get-data", get(get_data_handler))
        .route("/capture", get(capture_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("Device emulator listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving")?;

    Ok(())
}
