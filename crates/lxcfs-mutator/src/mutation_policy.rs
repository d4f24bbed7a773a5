use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

/// Annotation used by pod authors to ask for the lxcfs volumes
pub const MUTATE_ANNOTATION: &str = "lxcfs-admission-webhook.caicloud.io/mutate";
/// Annotation written by the webhook once the pod has been mutated
pub const STATUS_ANNOTATION: &str = "lxcfs-admission-webhook.caicloud.io/status";
pub const STATUS_MUTATED: &str = "mutated";

pub const DEFAULT_IGNORED_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];

const TRUTHY_VALUES: [&str; 4] = ["y", "yes", "true", "on"];

/// Decides whether a pod has to receive the lxcfs volumes.
#[derive(Clone, Debug)]
pub struct MutationPolicy {
    ignored_namespaces: BTreeSet<String>,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_NAMESPACES.iter().map(|ns| ns.to_string()))
    }
}

impl MutationPolicy {
    pub fn new(ignored_namespaces: impl IntoIterator<Item = String>) -> Self {
        MutationPolicy {
            ignored_namespaces: ignored_namespaces.into_iter().collect(),
        }
    }

    pub fn ignored_namespaces(&self) -> impl Iterator<Item = &str> {
        self.ignored_namespaces.iter().map(String::as_str)
    }

    /// Returns `true` when the pod asked to be mutated and has not been
    /// mutated yet. Pods living inside of an ignored namespace are never
    /// mutated.
    pub fn decide(&self, namespace: &str, annotations: Option<&BTreeMap<String, String>>) -> bool {
        if self.ignored_namespaces.contains(namespace) {
            return false;
        }

        let annotation = |key: &str| {
            annotations
                .and_then(|annotations| annotations.get(key))
                .map(String::as_str)
                .unwrap_or_default()
        };

        if annotation(STATUS_ANNOTATION).eq_ignore_ascii_case(STATUS_MUTATED) {
            return false;
        }

        let requested = annotation(MUTATE_ANNOTATION);
        TRUTHY_VALUES
            .iter()
            .any(|truthy| requested.eq_ignore_ascii_case(truthy))
    }

    /// Same as [`MutationPolicy::decide`], logging the outcome
    pub fn decide_for(
        &self,
        namespace: &str,
        name: &str,
        annotations: Option<&BTreeMap<String, String>>,
    ) -> bool {
        if self.ignored_namespaces.contains(namespace) {
            info!(
                namespace,
                name, "skip mutation, pod lives inside of an ignored namespace"
            );
            return false;
        }

        let required = self.decide(namespace, annotations);
        let status = annotations
            .and_then(|annotations| annotations.get(STATUS_ANNOTATION))
            .map(String::as_str)
            .unwrap_or_default();
        info!(namespace, name, status, required, "mutation policy");

        required
    }
}
