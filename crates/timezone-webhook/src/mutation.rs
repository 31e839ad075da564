pub mod errors;

use k8s_openapi::api::core::v1::{HostPathVolumeSource, Pod, Volume, VolumeMount};
use serde::Deserialize;
use tracing::{info, Span};

use crate::admission_review::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, PatchOp, PatchOperation, PatchValue,
};
use errors::{MutationError, Result};

pub const TIMEZONE_VOLUME_NAME: &str = "timezone";
pub const LOCALTIME_PATH: &str = "/etc/localtime";

/// Stateless generator of the timezone patch, shared by every request handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatchGenerator {
    verbose: bool,
}

impl PatchGenerator {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn transform(&self, request_body: &[u8]) -> Result<Vec<u8>> {
        transform(request_body, self.verbose)
    }
}

/// Turn the raw AdmissionReview sent by the API server into the raw
/// AdmissionReview to send back.
///
/// An empty body is returned when the review carries no request: there is
/// nothing to mutate and that is not an error.
#[tracing::instrument(
    name = "transform",
    fields(request_uid = tracing::field::Empty),
    skip_all
)]
pub fn transform(request_body: &[u8], verbose: bool) -> Result<Vec<u8>> {
    let mut review: AdmissionReview =
        serde_json::from_slice(request_body).map_err(MutationError::MalformedReview)?;

    let response_body = match review.request.as_ref() {
        None => Vec::new(),
        Some(request) => {
            Span::current().record("request_uid", request.uid.as_str());

            let pod = decode_pod(request)?;
            let container_count = pod.spec.as_ref().map_or(0, |spec| spec.containers.len());
            let patch = serde_json::to_vec(&timezone_patch(container_count))
                .map_err(MutationError::Encode)?;

            review.response = Some(AdmissionResponse::timezone_patched(
                request.uid.clone(),
                &patch,
            ));
            serde_json::to_vec(&review).map_err(MutationError::Encode)?
        }
    };

    if verbose {
        info!(
            response = %String::from_utf8_lossy(&response_body),
            "admission review processed"
        );
    }

    Ok(response_body)
}

fn decode_pod(request: &AdmissionRequest) -> Result<Pod> {
    let object = request.object.as_ref().ok_or_else(|| {
        MutationError::MalformedPodObject("the admission request has no object".to_owned())
    })?;

    Pod::deserialize(&object.0).map_err(|e| MutationError::MalformedPodObject(e.to_string()))
}

/// One volume mount per container, in declaration order, followed by the
/// host path volume backing them.
pub fn timezone_patch(container_count: usize) -> Vec<PatchOperation> {
    (0..container_count)
        .map(|index| PatchOperation {
            op: PatchOp::Add,
            path: format!("/spec/containers/{index}/volumeMounts"),
            value: PatchValue::VolumeMount(timezone_volume_mount()),
        })
        .chain(std::iter::once(PatchOperation {
            op: PatchOp::Add,
            path: "/spec/volumes".to_owned(),
            value: PatchValue::Volume(timezone_volume()),
        }))
        .collect()
}

fn timezone_volume_mount() -> VolumeMount {
    VolumeMount {
        name: TIMEZONE_VOLUME_NAME.to_owned(),
        read_only: Some(true),
        mount_path: LOCALTIME_PATH.to_owned(),
        ..Default::default()
    }
}

fn timezone_volume() -> Volume {
    Volume {
        name: TIMEZONE_VOLUME_NAME.to_owned(),
        host_path: Some(HostPathVolumeSource {
            path: LOCALTIME_PATH.to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use serde_json::{json, Value};
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    fn review_with_pod(uid: &str, pod: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1beta1",
            "kind": "AdmissionReview",
            "request": {
                "uid": uid,
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "operation": "CREATE",
                "object": pod
            }
        }))
        .unwrap()
    }

    fn pod_with_containers(names: &[&str]) -> Value {
        let containers: Vec<Value> = names
            .iter()
            .map(|name| json!({"name": name, "image": "busybox"}))
            .collect();
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "test", "namespace": "default"},
            "spec": {"containers": containers}
        })
    }

    fn output_review(body: &[u8]) -> AdmissionReview {
        serde_json::from_slice(body).expect("output must be an AdmissionReview")
    }

    fn output_patch(review: &AdmissionReview) -> Vec<Value> {
        let patch = review
            .response
            .as_ref()
            .expect("response should be set")
            .decoded_patch()
            .expect("patch should be base64");
        serde_json::from_slice(&patch).expect("patch should be a JSON array")
    }

    #[rstest]
    #[case::null_request(json!({"apiVersion": "admission.k8s.io/v1beta1", "kind": "AdmissionReview", "request": null}))]
    #[case::missing_request(json!({"apiVersion": "admission.k8s.io/v1beta1", "kind": "AdmissionReview"}))]
    fn review_without_request_is_a_no_op(
        #[case] review: Value,
        #[values(true, false)] verbose: bool,
    ) {
        let body = serde_json::to_vec(&review).unwrap();

        let response = transform(&body, verbose).unwrap();

        assert!(response.is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    fn one_mount_per_container_then_the_volume(#[case] containers: usize) {
        let names: Vec<String> = (0..containers).map(|i| format!("c{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let body = review_with_pod("uid", pod_with_containers(&names));

        let review = output_review(&transform(&body, false).unwrap());
        let patch = output_patch(&review);

        assert_eq!(patch.len(), containers + 1);
        for (index, operation) in patch.iter().take(containers).enumerate() {
            assert_eq!(operation["op"], "add");
            assert_eq!(
                operation["path"],
                format!("/spec/containers/{index}/volumeMounts")
            );
            assert_eq!(
                operation["value"],
                json!({"name": "timezone", "readOnly": true, "mountPath": "/etc/localtime"})
            );
        }
        assert_eq!(
            patch.last().unwrap(),
            &json!({
                "op": "add",
                "path": "/spec/volumes",
                "value": {"name": "timezone", "hostPath": {"path": "/etc/localtime"}}
            })
        );
    }

    #[test]
    fn app_and_sidecar() {
        let body = review_with_pod("uid", pod_with_containers(&["app", "sidecar"]));

        let review = output_review(&transform(&body, true).unwrap());
        let paths: Vec<Value> = output_patch(&review)
            .into_iter()
            .map(|op| op["path"].clone())
            .collect();

        assert_eq!(
            paths,
            vec![
                json!("/spec/containers/0/volumeMounts"),
                json!("/spec/containers/1/volumeMounts"),
                json!("/spec/volumes"),
            ]
        );
    }

    #[test]
    fn response_echoes_uid_and_always_allows() {
        let uid = "705ab4f5-6393-11e8-b7cc-42010a800002";
        let body = review_with_pod(uid, pod_with_containers(&["app"]));

        let review = output_review(&transform(&body, false).unwrap());
        let response = review.response.as_ref().unwrap();

        assert_eq!(response.uid, uid);
        assert!(response.allowed);
        assert_eq!(
            response.audit_annotations.get("timezone-webhook").map(String::as_str),
            Some("modified")
        );
        // the request travels back untouched
        let request = review.request.as_ref().unwrap();
        assert_eq!(request.uid, uid);
        assert_eq!(request.extra.get("operation").unwrap(), "CREATE");
        assert_eq!(review.api_version.as_deref(), Some("admission.k8s.io/v1beta1"));
    }

    #[test]
    fn pod_without_spec_gets_only_the_volume() {
        let body = review_with_pod(
            "uid",
            json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "test"}}),
        );

        let review = output_review(&transform(&body, false).unwrap());
        let patch = output_patch(&review);

        assert_eq!(patch.len(), 1);
        assert_eq!(patch[0]["path"], "/spec/volumes");
    }

    #[test]
    fn existing_volume_mounts_are_still_targeted() {
        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "test"},
            "spec": {
                "containers": [{
                    "name": "app",
                    "volumeMounts": [{"name": "data", "mountPath": "/data"}]
                }],
                "volumes": [{"name": "data", "emptyDir": {}}]
            }
        });
        let body = review_with_pod("uid", pod);

        let review = output_review(&transform(&body, false).unwrap());
        let patch = output_patch(&review);

        assert_eq!(patch.len(), 2);
        assert_eq!(patch[0]["path"], "/spec/containers/0/volumeMounts");
    }

    #[test]
    fn applying_the_patch_mounts_the_timezone() {
        let pod = pod_with_containers(&["app", "sidecar"]);
        let body = review_with_pod("uid", pod.clone());

        let review = output_review(&transform(&body, false).unwrap());
        let patch: json_patch::Patch =
            serde_json::from_value(Value::Array(output_patch(&review))).unwrap();

        let mut patched = pod;
        json_patch::patch(&mut patched, &patch.0).unwrap();

        for container in patched["spec"]["containers"].as_array().unwrap() {
            assert_eq!(container["volumeMounts"]["name"], "timezone");
            assert_eq!(container["volumeMounts"]["mountPath"], "/etc/localtime");
            assert_eq!(container["volumeMounts"]["readOnly"], true);
        }
        assert_eq!(patched["spec"]["volumes"]["name"], "timezone");
        assert_eq!(
            patched["spec"]["volumes"]["hostPath"]["path"],
            "/etc/localtime"
        );
    }

    #[rstest]
    #[case::truncated(br#"{"apiVersion": "admission.k8s.io/v1beta1", "request": {"uid": "#.to_vec())]
    #[case::not_json(b"hello world".to_vec())]
    #[case::empty(Vec::new())]
    #[case::wrong_shape(br#"{"request": "not-a-request"}"#.to_vec())]
    fn malformed_review(#[case] body: Vec<u8>) {
        let error = transform(&body, false).unwrap_err();

        assert!(matches!(error, MutationError::MalformedReview(_)));
    }

    #[rstest]
    #[case::string_object(json!("not-a-pod"))]
    #[case::containers_not_a_list(json!({"apiVersion": "v1", "kind": "Pod", "spec": {"containers": {"name": "app"}}}))]
    #[case::spec_not_an_object(json!({"apiVersion": "v1", "kind": "Pod", "spec": 42}))]
    fn malformed_pod_object(#[case] object: Value) {
        let body = review_with_pod("uid", object);

        let error = transform(&body, false).unwrap_err();

        assert!(matches!(error, MutationError::MalformedPodObject(_)));
    }

    #[test]
    fn request_without_object_is_malformed() {
        let body = serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1beta1",
            "kind": "AdmissionReview",
            "request": {"uid": "uid"}
        }))
        .unwrap();

        let error = transform(&body, false).unwrap_err();

        assert!(matches!(error, MutationError::MalformedPodObject(_)));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn transform_capturing_logs(body: &[u8], verbose: bool) -> (Vec<u8>, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let response = tracing::subscriber::with_default(subscriber, || {
            transform(body, verbose).unwrap()
        });
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();

        (response, output)
    }

    #[test]
    fn verbose_logs_the_response() {
        let uid = "705ab4f5-6393-11e8-b7cc-42010a800002";
        let body = review_with_pod(uid, pod_with_containers(&["app"]));

        let (verbose_response, verbose_logs) = transform_capturing_logs(&body, true);
        let (quiet_response, quiet_logs) = transform_capturing_logs(&body, false);

        assert!(verbose_logs.contains(uid), "missing uid in logs: {verbose_logs}");
        assert!(
            verbose_logs.contains(r#""patchType":"JSONPatch""#),
            "missing patch type in logs: {verbose_logs}"
        );
        assert!(quiet_logs.is_empty(), "unexpected logs: {quiet_logs}");
        assert_eq!(verbose_response, quiet_response);
    }

    #[test]
    fn generator_is_a_thin_wrapper() {
        let body = review_with_pod("uid", pod_with_containers(&["app"]));

        assert_eq!(
            PatchGenerator::new(false).transform(&body).unwrap(),
            transform(&body, false).unwrap()
        );
    }
}
