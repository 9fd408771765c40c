use std::fmt;
use std::str::FromStr;

use reqwest::Method;

use crate::ClientError;
use crate::version::ApiVersion;

/// The REST API family a client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Product {
    FlashArray,
    FlashBlade,
    Pure1,
}

impl Product {
    /// Lowest and highest API version registered for this product.
    pub(crate) const fn version_range(self) -> (ApiVersion, ApiVersion) {
        match self {
            Self::FlashArray => (ApiVersion::new(2, 0), ApiVersion::new(2, 36)),
            Self::FlashBlade => (ApiVersion::new(2, 0), ApiVersion::new(2, 15)),
            Self::Pure1 => (ApiVersion::new(1, 0), ApiVersion::new(1, 4)),
        }
    }

    /// Endpoints registered for this product across all versions.
    pub(crate) fn endpoints(self) -> &'static [EndpointDefinition] {
        match self {
            Self::FlashArray => FLASHARRAY_ENDPOINTS,
            Self::FlashBlade => FLASHBLADE_ENDPOINTS,
            Self::Pure1 => PURE1_ENDPOINTS,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FlashArray => "flasharray",
            Self::FlashBlade => "flashblade",
            Self::Pure1 => "pure1",
        })
    }
}

impl FromStr for Product {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "flasharray" | "fa" => Ok(Self::FlashArray),
            "flashblade" | "fb" => Ok(Self::FlashBlade),
            "pure1" => Ok(Self::Pure1),
            other => Err(format!(
                "unknown product '{other}' (expected flasharray, flashblade or pure1)"
            )),
        }
    }
}

/// Metadata for one REST endpoint.
#[derive(Clone, Copy, Debug)]
pub struct EndpointDefinition {
    /// Stable operation identifier (for example `getVolumes`).
    pub operation_id: &'static str,
    /// Uppercase HTTP method.
    pub method: &'static str,
    /// Path relative to `/api/<version>/`.
    pub path: &'static str,
    /// Whether the response is a page of `items` that can be continued.
    pub paged: bool,
    /// First API version exposing the endpoint.
    pub since: ApiVersion,
}

impl EndpointDefinition {
    pub(crate) fn http_method(&self) -> Result<Method, ClientError> {
        Method::from_bytes(self.method.as_bytes())
            .map_err(|_| ClientError::UnsupportedMethod(self.method.to_owned()))
    }

    /// Path including the version prefix, e.g. `api/2.4/volumes`.
    pub(crate) fn versioned_path(&self, version: ApiVersion) -> String {
        format!("api/{version}/{}", self.path)
    }

    /// Whether a call with this method can be safely retried.
    pub(crate) fn is_idempotent(&self) -> bool {
        self.method == "GET"
    }
}

const fn get(
    operation_id: &'static str,
    path: &'static str,
    since: (u32, u32),
) -> EndpointDefinition {
    EndpointDefinition {
        operation_id,
        method: "GET",
        path,
        paged: true,
        since: ApiVersion::new(since.0, since.1),
    }
}

const fn write(
    operation_id: &'static str,
    method: &'static str,
    path: &'static str,
    since: (u32, u32),
) -> EndpointDefinition {
    EndpointDefinition {
        operation_id,
        method,
        path,
        paged: false,
        since: ApiVersion::new(since.0, since.1),
    }
}

static FLASHARRAY_ENDPOINTS: &[EndpointDefinition] = &[
    get("getAlerts", "alerts", (2, 0)),
    get("getArrays", "arrays", (2, 0)),
    get("getAudits", "audits", (2, 0)),
    get("getHostGroups", "host-groups", (2, 0)),
    get("getHosts", "hosts", (2, 0)),
    write("postHosts", "POST", "hosts", (2, 0)),
    write("deleteHosts", "DELETE", "hosts", (2, 0)),
    get("getPods", "pods", (2, 0)),
    get("getProtectionGroups", "protection-groups", (2, 0)),
    get("getSessions", "sessions", (2, 0)),
    get("getVolumeGroups", "volume-groups", (2, 0)),
    get("getVolumeSnapshots", "volume-snapshots", (2, 0)),
    get("getVolumes", "volumes", (2, 0)),
    write("postVolumes", "POST", "volumes", (2, 0)),
    write("patchVolumes", "PATCH", "volumes", (2, 0)),
    write("deleteVolumes", "DELETE", "volumes", (2, 0)),
    get("getRemoteVolumeSnapshots", "remote-volume-snapshots", (2, 2)),
    get("getSoftwareCheck", "software-check", (2, 16)),
    get("getRealms", "realms", (2, 33)),
    get("getFleets", "fleets", (2, 36)),
];

static FLASHBLADE_ENDPOINTS: &[EndpointDefinition] = &[
    get("getAlerts", "alerts", (2, 0)),
    get("getArrays", "arrays", (2, 0)),
    get("getBlades", "blades", (2, 0)),
    get("getBuckets", "buckets", (2, 0)),
    write("postBuckets", "POST", "buckets", (2, 0)),
    get("getFileSystems", "file-systems", (2, 0)),
    write("postFileSystems", "POST", "file-systems", (2, 0)),
    write("patchFileSystems", "PATCH", "file-systems", (2, 0)),
    write("deleteFileSystems", "DELETE", "file-systems", (2, 0)),
    get("getFileSystemSnapshots", "file-system-snapshots", (2, 0)),
    get("getNetworkInterfaces", "network-interfaces", (2, 0)),
    get("getObjectStoreAccounts", "object-store-accounts", (2, 0)),
    get("getPolicies", "policies", (2, 0)),
    get("getNodes", "nodes", (2, 14)),
];

static PURE1_ENDPOINTS: &[EndpointDefinition] = &[
    get("getAlerts", "alerts", (1, 0)),
    get("getArrays", "arrays", (1, 0)),
    get("getFileSystems", "file-systems", (1, 0)),
    get("getMetrics", "metrics", (1, 0)),
    get("getMetricsHistory", "metrics/history", (1, 0)),
    get("getPods", "pods", (1, 0)),
    get("getVolumes", "volumes", (1, 0)),
    get("getSubscriptions", "subscriptions", (1, 1)),
    get("getInvoices", "invoices", (1, 2)),
    get("getAssessmentSustainabilityArrays", "assessment/sustainability/arrays", (1, 3)),
];
