//! XSLT engine abstraction trait

use crate::result::{EngineRun, RequestError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// XSLT version requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum XsltVersion {
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
}

impl XsltVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            XsltVersion::V1_0 => "1.0",
            XsltVersion::V2_0 => "2.0",
            XsltVersion::V3_0 => "3.0",
        }
    }

    /// True for the versions only the secondary engine implements
    pub fn wants_secondary(&self) -> bool {
        matches!(self, XsltVersion::V2_0 | XsltVersion::V3_0)
    }
}

impl fmt::Display for XsltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XsltVersion {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" => Ok(XsltVersion::V1_0),
            "2.0" => Ok(XsltVersion::V2_0),
            "3.0" => Ok(XsltVersion::V3_0),
            other => Err(RequestError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Which backend handled a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process XSLT 1.0 engine
    Primary,
    /// External XSLT 2.0/3.0 processor
    Secondary,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Primary => "primary",
            EngineKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for XSLT transformation backends.
///
/// Implementations must never panic or return early with an error: every
/// failure is folded into the returned [`EngineRun`], together with the log
/// lines produced up to that point.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Role of this engine in dispatch
    fn kind(&self) -> EngineKind;

    /// Human-readable engine name used in log lines and messages
    fn name(&self) -> &str;

    /// Highest XSLT version this engine implements
    fn xslt_version(&self) -> XsltVersion;

    /// Transform `xml` with the stylesheet `xslt`
    async fn run(&self, xml: &str, xslt: &str) -> EngineRun;
}
