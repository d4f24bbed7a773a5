use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{
    admission_request::{AdmissionRequest, Operation},
    admission_response::AdmissionResponse,
    injection_table::InjectionTable,
    mutation_policy::MutationPolicy,
    patch::{self, PatchBuilder},
};

/// Turns an admission request into a verdict. Holds no per-request state
/// and can be shared between any number of concurrent handlers.
#[derive(Clone, Debug, Default)]
pub struct AdmissionDecisionEngine {
    policy: MutationPolicy,
    patch_builder: PatchBuilder,
}

impl AdmissionDecisionEngine {
    pub fn new(policy: MutationPolicy, table: InjectionTable) -> Self {
        AdmissionDecisionEngine {
            policy,
            patch_builder: PatchBuilder::new(table),
        }
    }

    pub fn policy(&self) -> &MutationPolicy {
        &self.policy
    }

    pub fn injection_table(&self) -> &InjectionTable {
        self.patch_builder.table()
    }

    pub fn evaluate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let uid = request.uid.clone();

        if request.operation != Operation::Create {
            debug!(
                operation = request.operation.as_str(),
                uid = uid.as_str(),
                "only CREATE operations are mutated"
            );
            return AdmissionResponse::allow(uid);
        }

        let raw_object = match request.object.as_ref() {
            Some(raw_object) => raw_object,
            None => {
                warn!(uid = uid.as_str(), "admission request without object");
                return AdmissionResponse::reject(
                    uid,
                    "admission request does not carry an object".to_owned(),
                );
            }
        };

        let pod = match Pod::deserialize(&raw_object.0) {
            Ok(pod) => pod,
            Err(e) => {
                error!(error = %e, uid = uid.as_str(), "could not unmarshal raw object");
                return AdmissionResponse::reject(uid, e.to_string());
            }
        };

        info!(
            kind = %request.kind,
            namespace = request.namespace.as_deref().unwrap_or_default(),
            name = request.name.as_deref().unwrap_or_default(),
            pod_name = pod.metadata.name.as_deref().unwrap_or_default(),
            uid = uid.as_str(),
            operation = request.operation.as_str(),
            user = request.user_info.username.as_deref().unwrap_or_default(),
            "admission review"
        );

        // Pods created through a namespaced endpoint usually don't carry
        // the namespace inside of their metadata
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .or(request.namespace.as_deref())
            .unwrap_or_default();
        let name = pod
            .metadata
            .name
            .as_deref()
            .or(request.name.as_deref())
            .unwrap_or_default();

        if !self
            .policy
            .decide_for(namespace, name, pod.metadata.annotations.as_ref())
        {
            info!(namespace, name, "skipping mutation due to policy check");
            return AdmissionResponse::allow(uid);
        }

        let patches = self.patch_builder.build(&pod);
        match patch::to_json(&patches) {
            Ok(patch) => {
                debug!(
                    patch = String::from_utf8_lossy(&patch).as_ref(),
                    operations = patches.len(),
                    "admission response"
                );
                AdmissionResponse::allow_with_patch(uid, &patch)
            }
            Err(e) => {
                warn!(error = %e, namespace, name, "cannot serialize patch");
                AdmissionResponse::reject(uid, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission_request::GroupVersionKind;
    use crate::admission_response::PatchType;
    use crate::mutation_policy::{MUTATE_ANNOTATION, STATUS_ANNOTATION};
    use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
    use serde_json::json;

    fn request(operation: Operation, object: Option<serde_json::Value>) -> AdmissionRequest {
        AdmissionRequest {
            uid: "b1a5c1e0".to_owned(),
            kind: GroupVersionKind {
                group: String::new(),
                version: "v1".to_owned(),
                kind: "Pod".to_owned(),
            },
            resource: None,
            name: None,
            namespace: Some("default".to_owned()),
            operation,
            user_info: Default::default(),
            object: object.map(RawExtension),
            dry_run: None,
        }
    }

    fn pod_object(namespace: &str, annotations: serde_json::Value) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "nginx",
                "namespace": namespace,
                "annotations": annotations
            },
            "spec": {
                "containers": []
            }
        })
    }

    fn decoded_patch(response: &AdmissionResponse) -> serde_json::Value {
        let patch = response
            .decoded_patch()
            .expect("patch should be set")
            .expect("patch should be valid base64");
        serde_json::from_slice(&patch).expect("patch should be valid json")
    }

    #[test]
    fn mutate_requested_pod() {
        let engine = AdmissionDecisionEngine::default();
        let object = pod_object("default", json!({MUTATE_ANNOTATION: "yes"}));

        let response = engine.evaluate(&request(Operation::Create, Some(object)));

        assert!(response.allowed);
        assert_eq!(response.uid, "b1a5c1e0");
        assert_eq!(response.patch_type, Some(PatchType::JSONPatch));
        assert!(response.status.is_none());

        let patch = decoded_patch(&response);
        let operations = patch.as_array().unwrap();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0]["path"], json!("/metadata/annotations"));
        assert_eq!(operations[1]["path"], json!("/spec/volumes"));
        assert_eq!(operations[1]["value"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn ignored_namespace_is_allowed_without_patch() {
        let engine = AdmissionDecisionEngine::default();
        let object = pod_object("kube-system", json!({MUTATE_ANNOTATION: "yes"}));

        let response = engine.evaluate(&request(Operation::Create, Some(object)));

        assert!(response.allowed);
        assert!(response.patch.is_none());
        assert!(response.patch_type.is_none());
    }

    #[test]
    fn already_mutated_pod_is_not_patched_again() {
        let engine = AdmissionDecisionEngine::default();
        let object = pod_object(
            "default",
            json!({MUTATE_ANNOTATION: "yes", STATUS_ANNOTATION: "mutated"}),
        );

        let response = engine.evaluate(&request(Operation::Create, Some(object)));

        assert_eq!(response, AdmissionResponse::allow("b1a5c1e0".to_owned()));
    }

    #[test]
    fn namespace_falls_back_to_the_request() {
        let engine = AdmissionDecisionEngine::default();
        let object = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"generateName": "nginx-", "annotations": {MUTATE_ANNOTATION: "true"}},
            "spec": {"containers": [{"name": "nginx", "image": "nginx"}]}
        });
        let mut req = request(Operation::Create, Some(object));

        req.namespace = Some("kube-public".to_owned());
        assert!(!engine.evaluate(&req).is_mutation());

        req.namespace = Some("team-a".to_owned());
        assert!(engine.evaluate(&req).is_mutation());
    }

    #[test]
    fn undecodable_object_is_rejected() {
        let engine = AdmissionDecisionEngine::default();
        let object = json!({"apiVersion": "v1", "kind": "Pod", "spec": {"containers": "nope"}});

        let response = engine.evaluate(&request(Operation::Create, Some(object)));

        assert!(!response.allowed);
        assert!(response.patch.is_none());
        assert!(response.status.unwrap().message.is_some());
    }

    #[test]
    fn missing_object_is_rejected() {
        let engine = AdmissionDecisionEngine::default();

        let response = engine.evaluate(&request(Operation::Create, None));

        assert!(!response.allowed);
        assert_eq!(
            response.status.unwrap().message.as_deref(),
            Some("admission request does not carry an object")
        );
    }

    #[test]
    fn non_create_operations_are_allowed() {
        let engine = AdmissionDecisionEngine::default();
        let object = pod_object("default", json!({MUTATE_ANNOTATION: "yes"}));

        let response = engine.evaluate(&request(Operation::Update, Some(object)));

        assert_eq!(response, AdmissionResponse::allow("b1a5c1e0".to_owned()));
    }
}
