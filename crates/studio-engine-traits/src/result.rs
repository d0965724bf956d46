//! Request and result types

use crate::error::TransformFailure;
use crate::log::LogLine;
use crate::xslt::{EngineKind, XsltVersion};
use serde::{Deserialize, Serialize};

/// Problems with a request that the caller detects before dispatch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Combined XML and XSLT input is {actual} characters; the limit is {limit}.")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("Unsupported XSLT version: {0:?} (expected 1.0, 2.0 or 3.0)")]
    UnsupportedVersion(String),
}

/// One transform request: a source document, a stylesheet and the XSLT
/// version the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub xml: String,
    pub xslt: String,
    #[serde(default, rename = "versionHint", alias = "version")]
    pub version: XsltVersion,
}

impl TransformRequest {
    pub fn new<X: Into<String>, S: Into<String>>(xml: X, xslt: S, version: XsltVersion) -> Self {
        Self {
            xml: xml.into(),
            xslt: xslt.into(),
            version,
        }
    }

    /// Combined character count of both documents
    pub fn input_chars(&self) -> usize {
        self.xml.chars().count() + self.xslt.chars().count()
    }

    /// Reject requests whose combined input exceeds `limit` characters
    pub fn check_size(&self, limit: usize) -> Result<(), RequestError> {
        let actual = self.input_chars();
        if actual > limit {
            return Err(RequestError::PayloadTooLarge { actual, limit });
        }
        Ok(())
    }
}

/// What a single engine produced: its log lines and either the output
/// document or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRun {
    pub log: Vec<LogLine>,
    pub outcome: Result<String, TransformFailure>,
}

impl EngineRun {
    pub fn success(log: Vec<LogLine>, html: String) -> Self {
        Self {
            log,
            outcome: Ok(html),
        }
    }

    pub fn failure(log: Vec<LogLine>, failure: TransformFailure) -> Self {
        Self {
            log,
            outcome: Err(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The normalized answer returned to the caller for every request.
///
/// Engines and the dispatcher build it through [`TransformResult::from_run`]
/// and [`TransformResult::failure`]. Those keep the shape consistent: a
/// success always carries non-empty html and no error message; a failure
/// carries empty html and an error message that is also the last log line.
/// The fields stay public so callers can deserialize a result they received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub success: bool,
    pub html: String,
    pub log_lines: Vec<LogLine>,
    pub engine_used: EngineKind,
    pub error_message: Option<String>,
}

impl TransformResult {
    /// Build a failed result, appending the message to the log unless it is
    /// already the last line.
    pub fn failure<S: Into<String>>(
        engine_used: EngineKind,
        mut log_lines: Vec<LogLine>,
        error_message: S,
    ) -> Self {
        let mut message = error_message.into();
        if message.trim().is_empty() {
            message = "Transform failed.".to_string();
        }
        if log_lines.last().map(LogLine::text) != Some(message.as_str()) {
            log_lines.push(LogLine::new(message.clone()));
        }
        Self {
            success: false,
            html: String::new(),
            log_lines,
            engine_used,
            error_message: Some(message),
        }
    }

    /// Normalize an engine's run, placing the dispatcher's own lines first.
    ///
    /// An engine that reports success with an empty document is turned into
    /// a failure: `"<engine_name> produced no output."`.
    pub fn from_run(
        engine_used: EngineKind,
        engine_name: &str,
        mut log_lines: Vec<LogLine>,
        run: EngineRun,
    ) -> Self {
        log_lines.extend(run.log);
        match run.outcome {
            Ok(html) if !html.is_empty() => {
                log_lines.push(LogLine::new("[INFO] Transform succeeded."));
                Self {
                    success: true,
                    html,
                    log_lines,
                    engine_used,
                    error_message: None,
                }
            }
            Ok(_) => Self::failure(
                engine_used,
                log_lines,
                format!("{engine_name} produced no output."),
            ),
            Err(failure) => Self::failure(engine_used, log_lines, failure.to_string()),
        }
    }
}
