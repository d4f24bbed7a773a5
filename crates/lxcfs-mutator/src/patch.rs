use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, Volume, VolumeMount};
use serde::{Deserialize, Serialize};

use crate::{
    injection_table::InjectionTable,
    mutation_policy::{STATUS_ANNOTATION, STATUS_MUTATED},
};

const ANNOTATIONS_PATH: &str = "/metadata/annotations";
const VOLUMES_PATH: &str = "/spec/volumes";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Replace,
}

/// The shapes a patch value can take, depending on the path it targets.
/// Serialized untagged: on the wire only the inner value is visible.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Annotations(BTreeMap<String, String>),
    VolumeMount(VolumeMount),
    VolumeMounts(Vec<VolumeMount>),
    Volume(Volume),
    Volumes(Vec<Volume>),
}

/// A single RFC 6902 operation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: Op,
    pub path: String,
    pub value: PatchValue,
}

impl PatchOperation {
    fn add(path: String, value: PatchValue) -> Self {
        PatchOperation {
            op: Op::Add,
            path,
            value,
        }
    }
}

/// Builds the JSON patch injecting the volumes of an [`InjectionTable`]
/// into a pod.
#[derive(Clone, Debug, Default)]
pub struct PatchBuilder {
    table: InjectionTable,
}

impl PatchBuilder {
    pub fn new(table: InjectionTable) -> Self {
        PatchBuilder { table }
    }

    pub fn table(&self) -> &InjectionTable {
        &self.table
    }

    /// The operations are emitted in this order: the status annotation,
    /// then the volume mounts of every container (in pod order), then the
    /// pod volumes.
    ///
    /// A JSON patch cannot append to an array that does not exist, hence a
    /// missing `volumeMounts`/`volumes` field is created with the whole
    /// table, while an existing one (even empty) gets one append per entry.
    pub fn build(&self, pod: &Pod) -> Vec<PatchOperation> {
        let mut patches = vec![self.status_annotation_patch(pod)];

        let (containers, volumes) = match pod.spec.as_ref() {
            Some(spec) => (spec.containers.as_slice(), spec.volumes.as_ref()),
            None => (&[][..], None),
        };

        for (index, container) in containers.iter().enumerate() {
            let path = format!("/spec/containers/{index}/volumeMounts");
            match container.volume_mounts {
                None => patches.push(PatchOperation::add(
                    path,
                    PatchValue::VolumeMounts(self.table.volume_mounts()),
                )),
                Some(_) => {
                    let path = format!("{path}/-");
                    patches.extend(self.table.volume_mounts().into_iter().map(|mount| {
                        PatchOperation::add(path.clone(), PatchValue::VolumeMount(mount))
                    }));
                }
            }
        }

        match volumes {
            None => patches.push(PatchOperation::add(
                VOLUMES_PATH.to_owned(),
                PatchValue::Volumes(self.table.volumes()),
            )),
            Some(_) => {
                let path = format!("{VOLUMES_PATH}/-");
                patches.extend(
                    self.table
                        .volumes()
                        .into_iter()
                        .map(|volume| PatchOperation::add(path.clone(), PatchValue::Volume(volume))),
                );
            }
        }

        patches
    }

    /// JSON Patch applies `add` on an object member by replacing it, so the
    /// value carries the pod's existing annotations plus the status marker.
    fn status_annotation_patch(&self, pod: &Pod) -> PatchOperation {
        let current = pod.metadata.annotations.as_ref();
        let has_status = current
            .and_then(|annotations| annotations.get(STATUS_ANNOTATION))
            .is_some_and(|status| !status.is_empty());

        let mut annotations = current.cloned().unwrap_or_default();
        annotations.insert(STATUS_ANNOTATION.to_owned(), STATUS_MUTATED.to_owned());

        PatchOperation {
            op: if has_status { Op::Replace } else { Op::Add },
            path: ANNOTATIONS_PATH.to_owned(),
            value: PatchValue::Annotations(annotations),
        }
    }
}

/// Serialize the operations into the JSON document sent to the API server
pub fn to_json(patches: &[PatchOperation]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(patches)
}
