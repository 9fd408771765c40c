use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::blocking_client::BlockingApiClient;
use crate::error::{ClientError, VersionSide};

/// Version alias resolved to the newest version the client registers.
pub const DEV_VERSION: &str = "dev";

/// A REST API version in `<major>.<minor>` form.
///
/// Ordering is numeric, so `2.10` sorts after `2.9`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::InvalidVersion(value.to_owned());
        let (major, minor) = value.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Body of `GET /api/api_version`.
///
/// FlashArray answers with `version`, FlashBlade and Pure1 with `versions`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiVersionList {
    #[serde(default, alias = "versions")]
    version: Vec<String>,
}

impl ApiVersionList {
    pub(crate) fn into_versions(self) -> Vec<String> {
        self.version
    }
}

/// Asks the target which API versions it serves.
///
/// The probe is unauthenticated. An empty body counts as an empty list.
pub fn fetch_api_versions(transport: &BlockingApiClient) -> Result<Vec<String>, ClientError> {
    let versions = transport
        .get_json::<ApiVersionList>("api/api_version")?
        .unwrap_or_default()
        .into_versions();
    debug!(?versions, "target advertised API versions");
    Ok(versions)
}

/// Picks the API version to talk to a target.
///
/// `known` is the client's registered versions, `advertised` the list the
/// target returned from `api_version`. With an explicit `requested` version
/// (or [`DEV_VERSION`]) both sides must support it; otherwise the newest
/// advertised version the client also knows wins. Advertised entries that
/// do not parse are ignored.
pub fn choose_version(
    known: &[ApiVersion],
    advertised: &[String],
    requested: Option<&str>,
) -> Result<ApiVersion, ClientError> {
    let mut offered: Vec<ApiVersion> = advertised
        .iter()
        .filter_map(|raw| raw.parse().ok())
        .collect();

    if let Some(requested) = requested {
        let version = if requested == DEV_VERSION {
            known
                .iter()
                .max()
                .copied()
                .ok_or_else(|| ClientError::InvalidVersion(requested.to_owned()))?
        } else {
            requested.parse()?
        };

        if !known.contains(&version) {
            return Err(ClientError::UnsupportedVersion {
                version: version.to_string(),
                side: VersionSide::Client,
            });
        }
        if !offered.contains(&version) {
            return Err(ClientError::UnsupportedVersion {
                version: version.to_string(),
                side: VersionSide::Target,
            });
        }
        return Ok(version);
    }

    offered.sort_unstable_by(|a, b| b.cmp(a));
    let chosen = offered
        .into_iter()
        .find(|version| known.contains(version))
        .ok_or_else(|| ClientError::NoCompatibleVersion {
            advertised: advertised.join(", "),
        })?;
    debug!(version = %chosen, "negotiated API version");
    Ok(chosen)
}
