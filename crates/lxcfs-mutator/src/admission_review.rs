use serde::{Deserialize, Serialize};

use crate::{admission_request::AdmissionRequest, admission_response::AdmissionResponse};

pub const ADMISSION_API_VERSION_V1: &str = "admission.k8s.io/v1";
pub const ADMISSION_API_VERSION_V1BETA1: &str = "admission.k8s.io/v1beta1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub request: AdmissionRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub response: AdmissionResponse,
}

impl AdmissionReviewResponse {
    /// Wrap a response using the `admission.k8s.io/v1` envelope.
    pub fn new(response: AdmissionResponse) -> Self {
        Self::with_api_version(ADMISSION_API_VERSION_V1, response)
    }

    /// The API server requires the response envelope to carry the same
    /// apiVersion it used for the request.
    pub fn with_api_version(api_version: &str, response: AdmissionResponse) -> Self {
        AdmissionReviewResponse {
            api_version: Some(api_version.to_owned()),
            kind: Some(String::from(ADMISSION_REVIEW_KIND)),
            response,
        }
    }

    /// Build the response envelope answering `review`, copying its uid
    /// and apiVersion.
    pub fn for_request(review: &AdmissionReviewRequest, mut response: AdmissionResponse) -> Self {
        response.uid = review.request.uid.clone();
        let api_version = review
            .api_version
            .as_deref()
            .unwrap_or(ADMISSION_API_VERSION_V1);
        Self::with_api_version(api_version, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission_request::Operation;

    #[test]
    fn response_envelope_copies_uid_and_version() {
        let review: AdmissionReviewRequest = serde_json::from_str(
            r#"{
                "apiVersion": "admission.k8s.io/v1beta1",
                "kind": "AdmissionReview",
                "request": {
                    "uid": "7d1ab2e2",
                    "kind": {"group": "", "version": "v1", "kind": "Pod"},
                    "operation": "CREATE"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(review.request.operation, Operation::Create);

        let envelope =
            AdmissionReviewResponse::for_request(&review, AdmissionResponse::allow(String::new()));

        assert_eq!(envelope.response.uid, "7d1ab2e2");
        assert_eq!(
            envelope.api_version.as_deref(),
            Some(ADMISSION_API_VERSION_V1BETA1)
        );
        assert_eq!(envelope.kind.as_deref(), Some(ADMISSION_REVIEW_KIND));
    }

    #[test]
    fn response_envelope_round_trip_keeps_patch() {
        let response =
            AdmissionResponse::allow_with_patch("uid-1".to_owned(), br#"[{"op":"add"}]"#);
        let envelope = AdmissionReviewResponse::new(response.clone());

        let encoded = serde_json::to_vec(&envelope).unwrap();
        let decoded: AdmissionReviewResponse = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.response.uid, response.uid);
        assert_eq!(decoded.response.allowed, response.allowed);
        assert_eq!(decoded.response.patch, response.patch);
        assert_eq!(decoded.response.patch_type, response.patch_type);
    }
}
