use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{
    admission_review::{
        AdmissionReviewRequest, ADMISSION_API_VERSION_V1, ADMISSION_API_VERSION_V1BETA1,
        ADMISSION_REVIEW_KIND,
    },
    errors::DecodeError,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    api_version: Option<String>,
    kind: Option<String>,
}

/// The set of envelope types the server accepts.
///
/// A `Scheme` is an ordinary value handed to the server when it is built,
/// tests can create as many as they need with different registrations.
#[derive(Clone, Debug)]
pub struct Scheme {
    known_types: BTreeSet<(String, String)>,
}

impl Default for Scheme {
    /// Register `AdmissionReview` for both `admission.k8s.io/v1` and
    /// `admission.k8s.io/v1beta1`.
    fn default() -> Self {
        Scheme::empty()
            .register(ADMISSION_API_VERSION_V1, ADMISSION_REVIEW_KIND)
            .register(ADMISSION_API_VERSION_V1BETA1, ADMISSION_REVIEW_KIND)
    }
}

impl Scheme {
    pub fn empty() -> Self {
        Scheme {
            known_types: BTreeSet::new(),
        }
    }

    pub fn register(mut self, api_version: &str, kind: &str) -> Self {
        self.known_types
            .insert((api_version.to_owned(), kind.to_owned()));
        self
    }

    pub fn is_registered(&self, api_version: &str, kind: &str) -> bool {
        self.known_types
            .contains(&(api_version.to_owned(), kind.to_owned()))
    }

    /// Decode an AdmissionReview envelope. The `apiVersion` and `kind`
    /// of the document must have been registered beforehand.
    pub fn decode_review(&self, body: &[u8]) -> Result<AdmissionReviewRequest, DecodeError> {
        let type_meta: TypeMeta = serde_json::from_slice(body).map_err(DecodeError::Malformed)?;

        let (api_version, kind) = match (type_meta.api_version, type_meta.kind) {
            (Some(api_version), Some(kind)) if !api_version.is_empty() && !kind.is_empty() => {
                (api_version, kind)
            }
            _ => {
                return Err(DecodeError::MissingTypeMeta(
                    String::from_utf8_lossy(body).into_owned(),
                ))
            }
        };

        if !self.is_registered(&api_version, &kind) {
            return Err(DecodeError::NotRegistered { api_version, kind });
        }

        serde_json::from_slice(body).map_err(|source| DecodeError::Schema { kind, source })
    }
}
