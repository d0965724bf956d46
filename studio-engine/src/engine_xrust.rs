//! xrust engine wrapper (primary engine)
//!
//! Supports:
//! - XSLT ~1.0 transformation, in process or in a worker process
//!
//! Does NOT support:
//! - XSLT 2.0/3.0 (see the Saxon engine)
//! - external stylesheets, `document()` or DTDs; inputs are vetted by the
//!   hardened parser first and the library is given no fetcher
//!
//! xrust has no recursion limit of its own, so a runaway stylesheet ends in
//! a stack overflow. Configured with a worker, the engine runs each
//! transform in a separate process (see [`crate::worker`]) and turns an
//! aborted worker into an apply failure.

use std::cell::RefCell;
use std::process::Stdio;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use xrust::item::{Item, Node, SequenceTrait};
use xrust::parser::xml::parse as parse_xml;
use xrust::transform::context::StaticContextBuilder;
use xrust::trees::smite::RNode;
use xrust::xdmerror::{Error as XrustError, ErrorKind};
use xrust::xslt::from_document;

use studio_engine_traits::{
    Diagnostic, DiagnosticLevel, EngineKind, EngineRun, LogLine, SourceKind, SyntaxFailure,
    TransformEngine, TransformFailure, XsltVersion,
};

use crate::config::{LimitsConfig, StudioConfig, DEFAULT_PRIMARY_TIMEOUT_SECS};
use crate::diagnostics::record_failure;
use crate::hardened::HardenedParser;
use crate::worker::{WorkerCommand, WorkerRequest};

pub const ENGINE_NAME: &str = "xrust (XSLT 1.0)";

/// Textual marker for stylesheets that declare XSLT 2.0+ functions
pub const XSLT2_MARKER: &str = "xsl:function";

/// Stack for the thread that evaluates a stylesheet
pub const TRANSFORM_STACK_SIZE: usize = 32 * 1024 * 1024;

const XSLT2_NOTE: &str = "NOTE: Stylesheet uses xsl:function (XSLT 2.0/3.0 feature). \
The built-in engine (xrust) is XSLT 1.0 only, so advanced stylesheets may not work correctly here.";

const EXTERNAL_DISABLED: &str = "loading external documents is disabled";

/// xrust engine wrapper
#[derive(Debug, Clone)]
pub struct XrustEngine {
    parser: HardenedParser,
    worker: Option<WorkerCommand>,
    timeout: Duration,
}

impl Default for XrustEngine {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}

impl XrustEngine {
    /// Engine that runs transforms in the current process
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            parser: HardenedParser::new(limits.max_tree_nodes),
            worker: None,
            timeout: Duration::from_secs(DEFAULT_PRIMARY_TIMEOUT_SECS),
        }
    }

    /// Engine as configured: isolated in a worker process when one is
    /// configured or can be found.
    pub fn from_config(config: &StudioConfig) -> Self {
        let mut engine = Self::new(&config.limits).with_timeout(config.primary.timeout());
        match config.primary.worker_command() {
            Some(worker) => {
                tracing::debug!(worker = %worker.program.display(), "xrust transforms run in a worker");
                engine.worker = Some(worker);
            }
            None if config.primary.isolate => {
                tracing::warn!("no xrust worker found; transforms run in process")
            }
            None => {}
        }
        engine
    }

    pub fn with_worker(mut self, worker: WorkerCommand) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Time a worker gets before it is killed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn worker(&self) -> Option<&WorkerCommand> {
        self.worker.as_ref()
    }

    /// Run a transform on the current thread.
    ///
    /// CPU-bound and never suspends.
    pub fn transform_blocking(&self, xml: &str, xslt: &str) -> EngineRun {
        let mut log = Vec::new();
        match self.transform(xml, xslt, &mut log) {
            Ok(html) => EngineRun::success(log, html),
            Err(failure) => {
                tracing::debug!(kind = failure.kind_name(), error = %failure, "xrust transform failed");
                record_failure(&mut log, &failure);
                EngineRun::failure(log, failure)
            }
        }
    }

    /// Run a transform on a dedicated thread with a [`TRANSFORM_STACK_SIZE`]
    /// stack and wait for it. A panic in the engine becomes an unexpected
    /// failure.
    pub fn transform_on_thread(&self, xml: &str, xslt: &str) -> EngineRun {
        let joined = std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name("xrust-transform".to_string())
                .stack_size(TRANSFORM_STACK_SIZE)
                .spawn_scoped(scope, || self.transform_blocking(xml, xslt))
                .map(|handle| handle.join())
        });
        match joined {
            Ok(joined) => settle(joined),
            Err(e) => unexpected_run(e.to_string()),
        }
    }

    fn transform(
        &self,
        xml: &str,
        xslt: &str,
        log: &mut Vec<LogLine>,
    ) -> Result<String, TransformFailure> {
        if xml.trim().is_empty() {
            return Err(TransformFailure::validation("XML content is empty."));
        }
        if xslt.trim().is_empty() {
            return Err(TransformFailure::validation("XSLT content is empty."));
        }

        if xslt.contains(XSLT2_MARKER) {
            log.push(LogLine::new(XSLT2_NOTE));
        }

        // The stylesheet is only looked at once the source document is known good
        let source = self.parse(SourceKind::Xml, xml)?;
        let style = self.parse(SourceKind::Xslt, xslt)?;

        self.apply(source, style, log)
    }

    /// Vet `text` with the hardened parser, then build the xrust tree.
    fn parse(&self, kind: SourceKind, text: &str) -> Result<RNode, SyntaxFailure> {
        self.parser.check(kind, text)?;
        let doc = RNode::new_document();
        parse_xml(doc.clone(), text, None).map_err(|e| SyntaxFailure::new(kind, e.to_string()))?;
        Ok(doc)
    }

    fn apply(
        &self,
        source: RNode,
        style: RNode,
        log: &mut Vec<LogLine>,
    ) -> Result<String, TransformFailure> {
        let parser = self.parser;

        // Compile stylesheet
        let mut context = from_document(
            style,
            None,
            move |s: &str| {
                parser
                    .check(SourceKind::Xslt, s)
                    .map_err(|f| XrustError::new(ErrorKind::ParseError, f.raw.as_str()))?;
                let doc = RNode::new_document();
                parse_xml(doc.clone(), s, None)?;
                Ok(doc)
            },
            |_| Err(XrustError::new(ErrorKind::NotImplemented, EXTERNAL_DISABLED)),
        )
        .map_err(|e| TransformFailure::apply(format!("stylesheet compilation failed: {e}"), Vec::new()))?;

        context.context(vec![Item::Node(source)], 0);
        context.result_document(RNode::new_document());

        // xsl:message output, kept as diagnostics
        let messages = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = Rc::clone(&messages);
        let mut static_context = StaticContextBuilder::new()
            .message(move |m| {
                sink.borrow_mut().push(m.to_string());
                Ok(())
            })
            .fetcher(|_| Err(XrustError::new(ErrorKind::NotImplemented, EXTERNAL_DISABLED)))
            .parser(|_| Err(XrustError::new(ErrorKind::NotImplemented, EXTERNAL_DISABLED)))
            .build();

        let evaluated = context.evaluate(&mut static_context);
        drop(static_context);

        let diagnostics: Vec<Diagnostic> = messages
            .borrow()
            .iter()
            .map(|m| Diagnostic::new(DiagnosticLevel::Message, m.as_str()))
            .collect();

        match evaluated {
            Ok(sequence) => {
                for diagnostic in &diagnostics {
                    log.push(LogLine::new(format!(
                        "{}: {}",
                        diagnostic.level,
                        diagnostic.message.trim()
                    )));
                }
                Ok(sequence.to_xml())
            }
            Err(e) => Err(TransformFailure::apply(e.to_string(), diagnostics)),
        }
    }
}

#[async_trait]
impl TransformEngine for XrustEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Primary
    }

    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn xslt_version(&self) -> XsltVersion {
        XsltVersion::V1_0
    }

    async fn run(&self, xml: &str, xslt: &str) -> EngineRun {
        if let Some(worker) = &self.worker {
            return match self.run_in_worker(worker, xml, xslt).await {
                Ok(run) => run,
                Err(failure) => {
                    tracing::warn!(kind = failure.kind_name(), error = %failure, "xrust worker failed");
                    let mut log = Vec::new();
                    record_failure(&mut log, &failure);
                    EngineRun::failure(log, failure)
                }
            };
        }

        let engine = self.clone();
        let xml = xml.to_owned();
        let xslt = xslt.to_owned();
        match tokio::task::spawn_blocking(move || engine.transform_on_thread(&xml, &xslt)).await {
            Ok(run) => run,
            Err(join_error) if join_error.is_panic() => settle(Err(join_error.into_panic())),
            Err(join_error) => unexpected_run(join_error.to_string()),
        }
    }
}

impl XrustEngine {
    async fn run_in_worker(
        &self,
        worker: &WorkerCommand,
        xml: &str,
        xslt: &str,
    ) -> Result<EngineRun, TransformFailure> {
        let request = WorkerRequest {
            xml: xml.to_owned(),
            xslt: xslt.to_owned(),
            max_tree_nodes: self.parser.nodes_limit(),
        };
        let payload = serde_json::to_vec(&request).map_err(unexpected)?;

        let mut child = Command::new(&worker.program)
            .args(&worker.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TransformFailure::environment(format!(
                    "xrust worker not found at: {}",
                    worker.program.display()
                )),
                _ => unexpected(e),
            })?;
        tracing::debug!(pid = child.id(), "xrust worker started");

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!(error = %e, "xrust worker stopped reading its request");
                }
            }
            child.wait_with_output().await
        };

        // On timeout the future is dropped with the child, which kills it
        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(unexpected(e)),
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "xrust worker timed out");
                return Err(TransformFailure::execution(format!(
                    "{ENGINE_NAME} transformation timed out."
                )));
            }
        };

        if output.status.success() {
            return serde_json::from_slice(&output.stdout)
                .map_err(|e| unexpected(format!("unreadable worker reply: {e}")));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostics = stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Diagnostic::new(DiagnosticLevel::Error, line))
            .collect();
        Err(TransformFailure::apply(
            format!(
                "{ENGINE_NAME} aborted the transformation ({}); the stylesheet may recurse without end.",
                output.status
            ),
            diagnostics,
        ))
    }
}

fn unexpected<E: std::fmt::Display>(e: E) -> TransformFailure {
    TransformFailure::unexpected(format!("Unexpected error in {ENGINE_NAME} adapter: {e}"))
}

fn unexpected_run(reason: String) -> EngineRun {
    tracing::error!(error = %reason, "xrust transform aborted");
    let failure = unexpected(reason);
    let mut log = Vec::new();
    record_failure(&mut log, &failure);
    EngineRun::failure(log, failure)
}

/// Result of the transform thread, with a panic turned into a failure
fn settle(joined: std::thread::Result<EngineRun>) -> EngineRun {
    match joined {
        Ok(run) => run,
        Err(payload) => unexpected_run(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
    <xsl:template match="@*|node()">
        <xsl:copy>
            <xsl:apply-templates select="@*|node()"/>
        </xsl:copy>
    </xsl:template>
</xsl:stylesheet>"#;

    fn texts(run: &EngineRun) -> Vec<&str> {
        run.log.iter().map(LogLine::text).collect()
    }

    #[test]
    fn empty_xml_fails_before_anything_else() {
        let run = XrustEngine::default().transform_blocking("  \n\t", "<not even xml");
        assert_eq!(run.outcome, Err(TransformFailure::validation("XML content is empty.")));
        assert_eq!(texts(&run), vec!["XML content is empty."]);
    }

    #[test]
    fn empty_xslt_fails() {
        let run = XrustEngine::default().transform_blocking("<root/>", "   ");
        assert_eq!(run.outcome, Err(TransformFailure::validation("XSLT content is empty.")));
        assert_eq!(texts(&run), vec!["XSLT content is empty."]);
    }

    #[test]
    fn malformed_xml_is_attributed_to_xml() {
        let run = XrustEngine::default().transform_blocking("<root>\n<a></root>", "<also broken");
        match &run.outcome {
            Err(TransformFailure::Syntax(failure)) => {
                assert_eq!(failure.source_kind, SourceKind::Xml);
                assert_eq!(failure.line, Some(2));
            }
            other => panic!("expected syntax failure, got {other:?}"),
        }
        assert!(run.log[0].text.starts_with("[ERROR] [SRC:xml L:2 C:"));
    }

    #[test]
    fn malformed_xslt_is_attributed_to_xslt() {
        let run = XrustEngine::default().transform_blocking("<root/>", "<xsl:stylesheet>\n</oops>");
        match &run.outcome {
            Err(TransformFailure::Syntax(failure)) => {
                assert_eq!(failure.source_kind, SourceKind::Xslt)
            }
            other => panic!("expected syntax failure, got {other:?}"),
        }
        assert!(run.log[0].text.contains("[SRC:xslt L:"));
    }

    #[test]
    fn xsl_function_adds_advisory_note() {
        let xslt = "<xsl:stylesheet><xsl:function name=\"f:x\"/>";
        let run = XrustEngine::default().transform_blocking("<root/>", xslt);
        assert!(run.log[0].text.starts_with("NOTE: Stylesheet uses xsl:function"));
        // advisory only: the run still goes on to parse (and here fail on) the stylesheet
        assert!(matches!(run.outcome, Err(TransformFailure::Syntax(_))));
    }

    #[test]
    fn identity_transform_reserializes_content() {
        let run = XrustEngine::default().transform_blocking("<root>Hello</root>", IDENTITY);
        let html = run.outcome.expect("identity transform should succeed");
        assert!(html.contains("Hello"));
        assert!(html.contains("root"));
    }

    #[test]
    fn engine_panics_become_unexpected_failures() {
        let run = settle(Err(Box::new("index out of bounds")));
        assert_eq!(
            run.outcome.as_ref().unwrap_err().to_string(),
            "Unexpected error in xrust (XSLT 1.0) adapter: index out of bounds"
        );
        assert_eq!(
            texts(&run),
            vec!["Unexpected error in xrust (XSLT 1.0) adapter: index out of bounds"]
        );

        let run = settle(Err(Box::new(String::from("owned message"))));
        assert!(run.outcome.unwrap_err().to_string().ends_with("owned message"));

        let run = settle(Err(Box::new(42_u8)));
        assert!(run.outcome.unwrap_err().to_string().ends_with("engine panicked"));
    }

    #[test]
    fn dedicated_thread_gives_same_result() {
        let engine = XrustEngine::default();
        assert_eq!(
            engine.transform_on_thread("<root>Hi</root>", IDENTITY),
            engine.transform_blocking("<root>Hi</root>", IDENTITY)
        );
    }

    #[test]
    fn disabled_isolation_runs_in_process() {
        let mut config = StudioConfig::default();
        config.primary.isolate = false;
        assert!(XrustEngine::from_config(&config).worker().is_none());

        config.primary.isolate = true;
        config.primary.worker = Some("/opt/studio/worker".into());
        let engine = XrustEngine::from_config(&config);
        assert_eq!(
            engine.worker().map(|w| w.program.clone()),
            Some(std::path::PathBuf::from("/opt/studio/worker"))
        );
    }

    #[tokio::test]
    async fn async_run_matches_blocking_run() {
        let engine = XrustEngine::default();
        let run = engine.run("<root>Hi</root>", IDENTITY).await;
        assert!(run.is_success());
        assert_eq!(engine.kind(), EngineKind::Primary);
        assert_eq!(engine.xslt_version(), XsltVersion::V1_0);
    }
}
