use axum::{
    body::Bytes,
    extract,
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::api::{api_error::ApiError, state::ApiServerState};

#[tracing::instrument(
    name = "mutate_timezone",
    fields(host=crate::config::HOSTNAME.as_str()),
    skip_all)]
/// Patch the Pod embedded in the AdmissionReview so it mounts the node timezone.
pub(crate) async fn mutate_timezone_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let response_body = state.patch_generator.transform(&body).map_err(|e| {
        error!(error = %e, "cannot mutate the admission review");
        ApiError::from(e)
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        response_body,
    ))
}

pub(crate) async fn hello_handler() -> &'static str {
    "Hello from the timezone webhook!"
}

pub(crate) async fn readiness_handler() -> StatusCode {
    StatusCode::OK
}
