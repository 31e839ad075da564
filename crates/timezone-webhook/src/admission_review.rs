use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::core::v1::{Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// This models the admission/v1beta1/AdmissionReview object of Kubernetes.
/// The same envelope is used by admission/v1, the `apiVersion` received is
/// sent back untouched.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

/// The subset of the AdmissionRequest the webhook cares about. Every other
/// field sent by the API server is kept in `extra` so the request can be
/// serialized back verbatim.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// UID is an identifier for the individual request/response.
    #[serde(default)]
    pub uid: String,

    /// The object being admitted, expected to be a Pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<RawExtension>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// This models the admission/v1beta1/AdmissionResponse object of Kubernetes
/// See https://pkg.go.dev/k8s.io/api/admission/v1beta1#AdmissionResponse
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// UID is an identifier for the individual request/response.
    /// This must be copied over from the corresponding AdmissionRequest.
    pub uid: String,

    /// Allowed indicates whether or not the admission request was permitted.
    pub allowed: bool,

    pub patch_type: PatchType,

    /// The base64 encoded JSONPatch (RFC 6902) document.
    pub patch: String,

    /// AuditAnnotations are added to the audit log entry of the request.
    pub audit_annotations: BTreeMap<String, String>,

    #[serde(rename = "status")]
    pub result: AdmissionResponseStatus,
}

/// PatchType is the type of patch being used to represent the mutated object
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JSONPatch,
}

/// Value of Status.Status in an AdmissionResponse. The webhook never
/// rejects a Pod, so only success is reported.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum AdmissionResponseStatusValue {
    Success,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct AdmissionResponseStatus {
    pub status: AdmissionResponseStatusValue,
}

pub const AUDIT_ANNOTATION_KEY: &str = "timezone-webhook";
pub const AUDIT_ANNOTATION_VALUE: &str = "modified";

impl AdmissionResponse {
    /// Build the response accepting the request and carrying the given patch.
    pub fn timezone_patched(uid: String, patch: &[u8]) -> AdmissionResponse {
        AdmissionResponse {
            uid,
            allowed: true,
            patch_type: PatchType::JSONPatch,
            patch: general_purpose::STANDARD.encode(patch),
            audit_annotations: BTreeMap::from([(
                AUDIT_ANNOTATION_KEY.to_owned(),
                AUDIT_ANNOTATION_VALUE.to_owned(),
            )]),
            result: AdmissionResponseStatus {
                status: AdmissionResponseStatusValue::Success,
            },
        }
    }

    /// Raw JSONPatch document carried by the response.
    pub fn decoded_patch(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(&self.patch)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum PatchOp {
    #[serde(rename = "add")]
    Add,
}

/// The value of a patch operation, either the mount added to a container or
/// the volume added to the Pod.
#[derive(Serialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum PatchValue {
    VolumeMount(VolumeMount),
    Volume(Volume),
}

#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: PatchValue,
}
