use lxcfs_mutator::{
    admission_response::AdmissionResponse,
    mutation_policy::{MUTATE_ANNOTATION, STATUS_ANNOTATION},
    AdmissionDecisionEngine, InjectionTable, Scheme,
};
use rstest::rstest;
use serde_json::Value;

fn load_request_data(request_file_name: &str) -> Vec<u8> {
    let request_file_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(request_file_name);
    std::fs::read(request_file_path).expect("cannot read request file")
}

fn apply(object: &Value, response: &AdmissionResponse) -> Value {
    let patch = response
        .decoded_patch()
        .expect("response should carry a patch")
        .expect("patch should be base64");
    let patch: json_patch::Patch =
        serde_json::from_slice(&patch).expect("patch should be a RFC 6902 document");

    let mut patched = object.clone();
    json_patch::patch(&mut patched, &patch.0).expect("patch should apply cleanly");
    patched
}

fn names(items: &Value) -> Vec<String> {
    items
        .as_array()
        .expect("expected an array")
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn patch_applies_to_pod_with_mixed_mounts() {
    let scheme = Scheme::default();
    let engine = AdmissionDecisionEngine::default();
    let table = InjectionTable::lxcfs();
    let lxcfs_names: Vec<String> = table.entries().iter().map(|e| e.name.clone()).collect();

    let review = scheme
        .decode_review(&load_request_data("review_pod_mixed_mounts.json"))
        .expect("cannot decode review");
    let object = review.request.object.clone().unwrap().0;

    let response = engine.evaluate(&review.request);
    assert!(response.allowed);

    let patched = apply(&object, &response);

    let annotations = &patched["metadata"]["annotations"];
    assert_eq!(annotations[STATUS_ANNOTATION], "mutated");
    assert_eq!(annotations[MUTATE_ANNOTATION], "Yes");
    assert_eq!(annotations["prometheus.io/scrape"], "true");

    let containers = &patched["spec"]["containers"];
    let mut expected_first = vec!["default-token".to_owned()];
    expected_first.extend(lxcfs_names.clone());
    assert_eq!(names(&containers[0]["volumeMounts"]), expected_first);
    assert_eq!(names(&containers[1]["volumeMounts"]), lxcfs_names);
    assert_eq!(
        containers[0]["volumeMounts"][1]["mountPath"],
        "/proc/cpuinfo"
    );

    let volumes = &patched["spec"]["volumes"];
    let mut expected_volumes = vec!["default-token".to_owned()];
    expected_volumes.extend(lxcfs_names);
    assert_eq!(names(volumes), expected_volumes);
    assert_eq!(
        volumes[7]["hostPath"]["path"],
        "/var/lib/lxcfs/proc/uptime"
    );
}

#[test]
fn patch_applies_to_pod_without_volumes() {
    let review = Scheme::default()
        .decode_review(&load_request_data("review_pod_bare.json"))
        .expect("cannot decode review");
    let object = review.request.object.clone().unwrap().0;

    let response = AdmissionDecisionEngine::default().evaluate(&review.request);
    let patched = apply(&object, &response);

    assert_eq!(patched["spec"]["containers"][0]["volumeMounts"].as_array().unwrap().len(), 7);
    assert_eq!(patched["spec"]["volumes"].as_array().unwrap().len(), 7);
}

#[rstest]
#[case::mixed_mounts("review_pod_mixed_mounts.json")]
#[case::bare("review_pod_bare.json")]
fn mutated_pod_is_left_alone(#[case] request_file: &str) {
    let engine = AdmissionDecisionEngine::default();
    let mut review = Scheme::default()
        .decode_review(&load_request_data(request_file))
        .expect("cannot decode review");

    let first = engine.evaluate(&review.request);
    assert!(first.is_mutation());

    let patched = apply(&review.request.object.as_ref().unwrap().0, &first);
    review.request.object = Some(k8s_openapi::apimachinery::pkg::runtime::RawExtension(patched));

    let second = engine.evaluate(&review.request);
    assert!(second.allowed);
    assert!(!second.is_mutation());
}
