use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::target::Target;

/// The result of probing one target, written as one JSON line.
///
/// `error` is set exactly when some stage of the probe failed. Headers can
/// still be present alongside an error when only the body read failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Address the connection was made to.
    #[serde(rename = "ip")]
    pub address: String,
    /// Port as read from the entry.
    pub port: String,
    /// `Host` header that was sent.
    #[serde(rename = "host")]
    pub virtual_host: String,
    /// Response headers by canonical name, repeated headers keep every value.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Response body, decoded as lossy UTF-8.
    #[serde(rename = "indexpage", default)]
    pub body: String,
    /// What stopped the probe, written as `""` when nothing did.
    #[serde(with = "empty_as_none", default)]
    pub error: Option<String>,
    /// Status code of the response, only used for reporting.
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ProbeOutcome {
    /// An outcome echoing the target, with nothing observed yet.
    pub fn for_target(target: &Target) -> Self {
        Self {
            address: target.address.clone(),
            port: target.port.clone(),
            virtual_host: target.virtual_host.clone(),
            ..Self::default()
        }
    }

    /// An outcome for a target that was never requested.
    ///
    /// ```rust
    /// # use webscan::scanner::ProbeOutcome;
    /// # use webscan::target::Target;
    /// let target = Target::new("203.0.113.1", "21", "203.0.113.1");
    /// let outcome = ProbeOutcome::failed(&target, "unsupported port");
    /// assert!(!outcome.is_success());
    /// assert!(outcome.headers.is_empty());
    /// ```
    pub fn failed(target: &Target, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::for_target(target)
        }
    }

    /// Whether every stage completed.
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Absent errors are written as an empty string.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }
}
