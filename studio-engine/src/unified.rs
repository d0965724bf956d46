//! Dispatcher with per-request backend selection
//!
//! Picks the engine for each request from the requested XSLT version and
//! the configured availability of the secondary engine, runs it, and
//! normalizes the outcome into a [`TransformResult`].

use std::sync::Arc;

use studio_engine_traits::{
    EngineKind, LogLine, TransformEngine, TransformRequest, TransformResult, XsltVersion,
};

use crate::config::StudioConfig;
use crate::engine_saxon::SaxonEngine;
use crate::engine_xrust::XrustEngine;

/// Routes requests to the primary or secondary engine
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<StudioConfig>,
    primary: Arc<dyn TransformEngine>,
    secondary: Arc<dyn TransformEngine>,
}

impl Dispatcher {
    /// Dispatcher over the xrust and Saxon engines
    pub fn new(config: Arc<StudioConfig>) -> Self {
        let primary = Arc::new(XrustEngine::from_config(&config));
        let secondary = Arc::new(SaxonEngine::new(config.secondary.clone()));
        Self::with_engines(config, primary, secondary)
    }

    /// Dispatcher over arbitrary engines
    pub fn with_engines(
        config: Arc<StudioConfig>,
        primary: Arc<dyn TransformEngine>,
        secondary: Arc<dyn TransformEngine>,
    ) -> Self {
        Self {
            config,
            primary,
            secondary,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// The secondary engine is used only when it is enabled and the request
    /// asks for XSLT 2.0 or 3.0. Stylesheet content plays no part.
    pub fn select(&self, version: XsltVersion) -> EngineKind {
        if self.config.secondary.enabled && version.wants_secondary() {
            EngineKind::Secondary
        } else {
            EngineKind::Primary
        }
    }

    pub async fn dispatch(&self, request: &TransformRequest) -> TransformResult {
        let kind = self.select(request.version);
        let mut log = Vec::new();

        let engine = match kind {
            EngineKind::Secondary => {
                log.push(LogLine::new(format!(
                    "Using {} engine for XSLT {} (configured jar: {}).",
                    self.secondary.name(),
                    request.version,
                    self.config.secondary.saxon_jar.display()
                )));
                &self.secondary
            }
            EngineKind::Primary => {
                let mut info = format!("Using {}", self.primary.name());
                if request.version.wants_secondary() {
                    info.push_str(&format!(
                        " for XSLT {} [{} available but not selected: disabled in server configuration]",
                        request.version,
                        self.secondary.name()
                    ));
                }
                info.push('.');
                log.push(LogLine::new(info));
                &self.primary
            }
        };

        tracing::info!(
            engine = engine.name(),
            version = %request.version,
            input_chars = request.input_chars(),
            "dispatching transform"
        );

        let run = engine.run(&request.xml, &request.xslt).await;
        let result = TransformResult::from_run(kind, engine.name(), log, run);

        match &result.error_message {
            None => tracing::info!(engine = engine.name(), "transform succeeded"),
            Some(error) => tracing::warn!(engine = engine.name(), %error, "transform failed"),
        }
        result
    }
}
