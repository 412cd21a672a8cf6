use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use fogrelay_api::{ErrorResponse, PredictResponse, Reading, round_to};

use crate::error::{EdgeError, PredictError};
use crate::model::LinearModel;

#[derive(Clone)]
struct AppState {
    model: Arc<LinearModel>,
}

pub fn router(model: Arc<LinearModel>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/predict", post(handle_predict))
        .with_state(AppState { model })
}

/// Serve until `shutdown` is cancelled.
pub async fn run(listen: &str, model: Arc<LinearModel>, shutdown: CancellationToken) -> Result<(), EdgeError> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|source| EdgeError::Bind { addr: listen.to_string(), source })?;
    tracing::info!(listen, features = model.features.len(), "edge node listening");

    axum::serve(listener, router(model))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

// --- POST /predict ---

async fn handle_predict(State(state): State<AppState>, body: Bytes) -> Response {
    match predict(&state.model, &body) {
        Ok(resp) => {
            tracing::debug!(prediction = resp.glucose_prediction, latency_s = resp.latency_seconds, "predicted");
            axum::Json(resp).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected prediction request");
            (StatusCode::BAD_REQUEST, axum::Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}

fn predict(model: &LinearModel, body: &[u8]) -> Result<PredictResponse, PredictError> {
    let text = std::str::from_utf8(body)?;
    let reading = Reading::parse(text)?;
    let x = reading.feature_vector(&model.features)?;

    let started = Instant::now();
    let prediction = model.predict(&x);
    let latency = started.elapsed().as_secs_f64();

    Ok(PredictResponse {
        glucose_prediction: round_to(prediction, 2),
        latency_seconds: round_to(latency, 4),
    })
}

// --- GET / ---

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    let example = state
        .model
        .features
        .iter()
        .map(|f| format!("    \"{f}\": {}", example_value(f)))
        .collect::<Vec<_>>()
        .join(",\n");
    Html(format!(
        "<h2>Edge Node is Running</h2>\n\
         <p>This server accepts sensor data via <code>POST /predict</code>.</p>\n\
         <p>Send a JSON payload with these features:</p>\n\
         <pre>\n{{\n{example}\n}}\n</pre>\n"
    ))
}

fn example_value(feature: &str) -> &'static str {
    match feature {
        "PPG_Signal" => "0.95",
        "Heart_Rate" => "75",
        "Systolic_Peak" => "120",
        "Diastolic_Peak" => "80",
        "Pulse_Area" => "23.5",
        "Age" => "40",
        "Weight" => "70",
        "Gender" => "1",
        _ => "0.0",
    }
}
