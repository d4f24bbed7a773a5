use std::sync::Arc;

use axum::{
    body::Bytes,
    extract,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use lxcfs_mutator::{
    admission_request::AdmissionRequest,
    admission_response::AdmissionResponse,
    admission_review::{AdmissionReviewRequest, AdmissionReviewResponse},
};
use tracing::{debug, error, warn, Span};

use crate::api::{api_error::ApiError, state::ApiServerState};

#[tracing::instrument(
    name = "mutation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Answer an AdmissionReview, injecting the lxcfs volumes when the pod
/// asks for them.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        warn!("empty body");
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "empty body"));
    }

    if !is_json_content_type(&headers) {
        warn!(
            content_type = ?headers.get(header::CONTENT_TYPE),
            "invalid Content-Type"
        );
        return Err(ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid Content-Type, expect `application/json`",
        ));
    }

    let review_response = match state.scheme.decode_review(&body) {
        Ok(review) => evaluate(&state, &review),
        Err(e) => {
            error!(error = %e, "cannot decode admission review");
            AdmissionReviewResponse::new(AdmissionResponse::reject(String::new(), e.to_string()))
        }
    };

    populate_span_with_admission_response_data(&review_response.response);

    let payload = serde_json::to_vec(&review_response).map_err(|e| {
        error!(error = %e, "cannot encode admission review response");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("could not encode response: {e}"),
        )
    })?;

    Ok((
        [(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())],
        payload,
    )
        .into_response())
}

pub(crate) async fn readiness_handler() -> StatusCode {
    StatusCode::OK
}

fn evaluate(state: &ApiServerState, review: &AdmissionReviewRequest) -> AdmissionReviewResponse {
    populate_span_with_admission_request_data(&review.request);

    let response = state.engine.evaluate(&review.request);
    debug!(response =? &response, "admission review evaluated");

    AdmissionReviewResponse::for_request(review, response)
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|content_type| content_type.essence_str() == mime::APPLICATION_JSON.essence_str())
        .unwrap_or(false)
}

fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("kind", adm_req.kind.kind.as_str());
    Span::current().record("name", adm_req.name.clone().unwrap_or_default().as_str());
    Span::current().record(
        "namespace",
        adm_req.namespace.clone().unwrap_or_default().as_str(),
    );
    Span::current().record("operation", adm_req.operation.as_str());
}

fn populate_span_with_admission_response_data(adm_res: &AdmissionResponse) {
    Span::current().record("allowed", adm_res.allowed);
    Span::current().record("mutated", adm_res.is_mutation());
    if let Some(status) = &adm_res.status {
        if let Some(message) = &status.message {
            Span::current().record("response_message", message.as_str());
        }
    }
}
