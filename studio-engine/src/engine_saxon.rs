//! Saxon-HE engine wrapper (secondary engine)
//!
//! Runs `java -cp <saxon>:<xmlresolver> net.sf.saxon.Transform -s: -xsl: -o:`
//! against copies of the inputs in a per-call scratch directory. The
//! directory is removed and the child process reaped before `run` returns,
//! whichever way the call ends.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use studio_engine_traits::{
    EngineKind, EngineRun, LogLine, TransformEngine, TransformFailure, XsltVersion,
};

use crate::config::SecondaryEngineConfig;
use crate::diagnostics::{append_stream, record_failure, XML_FILE_NAME, XSLT_FILE_NAME};

pub const ENGINE_NAME: &str = "Saxon";
pub const OUTPUT_FILE_NAME: &str = "output.html";

/// Saxon-HE engine wrapper
#[derive(Debug, Clone)]
pub struct SaxonEngine {
    config: SecondaryEngineConfig,
}

impl SaxonEngine {
    pub fn new(config: SecondaryEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SecondaryEngineConfig {
        &self.config
    }

    fn check_availability(&self) -> Result<(), TransformFailure> {
        if !self.config.enabled {
            return Err(TransformFailure::environment(
                "Saxon engine is disabled in server configuration.",
            ));
        }
        if !self.config.saxon_jar.is_file() {
            return Err(TransformFailure::environment(format!(
                "Saxon jar not found at: {}",
                self.config.saxon_jar.display()
            )));
        }
        if !self.config.xmlresolver_jar.is_file() {
            return Err(TransformFailure::environment(format!(
                "XML Resolver jar not found at: {}",
                self.config.xmlresolver_jar.display()
            )));
        }
        Ok(())
    }

    async fn transform(
        &self,
        xml: &str,
        xslt: &str,
        log: &mut Vec<LogLine>,
    ) -> Result<String, TransformFailure> {
        self.check_availability()?;

        let scratch = tempfile::Builder::new()
            .prefix("stylesheet-studio-")
            .tempdir()
            .map_err(unexpected)?;

        let result = self.transform_in(scratch.path(), xml, xslt, log).await;

        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(dir = %path.display(), error = %e, "failed to remove Saxon scratch directory");
        }
        result
    }

    async fn transform_in(
        &self,
        dir: &Path,
        xml: &str,
        xslt: &str,
        log: &mut Vec<LogLine>,
    ) -> Result<String, TransformFailure> {
        let xml_path = dir.join(XML_FILE_NAME);
        let xslt_path = dir.join(XSLT_FILE_NAME);
        let out_path = dir.join(OUTPUT_FILE_NAME);

        tokio::fs::write(&xml_path, xml).await.map_err(unexpected)?;
        tokio::fs::write(&xslt_path, xslt).await.map_err(unexpected)?;

        let classpath = self.config.classpath().map_err(|e| {
            TransformFailure::environment(format!("Invalid Saxon classpath: {e}"))
        })?;

        let args: Vec<OsString> = vec![
            OsString::from("-cp"),
            classpath,
            OsString::from(&self.config.main_class),
            directive("-s:", &xml_path),
            directive("-xsl:", &xslt_path),
            directive("-o:", &out_path),
        ];

        log.push(LogLine::new(format!(
            "Running Saxon command: {}",
            render_command(&self.config.java, &args)
        )));

        let mut command = Command::new(&self.config.java);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TransformFailure::environment(format!(
                    "Could not run '{}'. Make sure Java is installed and on PATH.",
                    self.config.java.display()
                )));
            }
            Err(e) => return Err(unexpected(e)),
        };
        tracing::debug!(pid = child.id(), dir = %dir.display(), "Saxon process started");

        let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let waited = tokio::time::timeout(self.config.timeout(), async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match waited {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                reap(&mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(unexpected(e));
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.timeout_secs,
                    "Saxon transformation timed out"
                );
                reap(&mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(TransformFailure::execution("Saxon transformation timed out."));
            }
        };

        append_stream(log, "Saxon stdout", &stdout);
        append_stream(log, "Saxon stderr", &stderr);

        let exit_code = status.code();
        tracing::debug!(?exit_code, "Saxon process finished");
        match exit_code {
            Some(0) => {}
            Some(code) => {
                return Err(TransformFailure::Execution {
                    message: format!("Saxon exited with code {code}"),
                    stdout,
                    stderr,
                    exit_code: Some(code),
                });
            }
            None => {
                return Err(TransformFailure::Execution {
                    message: "Saxon terminated by signal".to_string(),
                    stdout,
                    stderr,
                    exit_code: None,
                });
            }
        }

        if !tokio::fs::try_exists(&out_path).await.unwrap_or(false) {
            return Err(TransformFailure::Execution {
                message: "Saxon did not produce an output file.".to_string(),
                stdout,
                stderr,
                exit_code,
            });
        }

        tokio::fs::read_to_string(&out_path).await.map_err(unexpected)
    }
}

#[async_trait]
impl TransformEngine for SaxonEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Secondary
    }

    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn xslt_version(&self) -> XsltVersion {
        XsltVersion::V3_0
    }

    async fn run(&self, xml: &str, xslt: &str) -> EngineRun {
        let mut log = Vec::new();
        match self.transform(xml, xslt, &mut log).await {
            Ok(html) => EngineRun::success(log, html),
            Err(failure) => {
                tracing::debug!(kind = failure.kind_name(), error = %failure, "Saxon transform failed");
                record_failure(&mut log, &failure);
                EngineRun::failure(log, failure)
            }
        }
    }
}

fn unexpected<E: std::fmt::Display>(e: E) -> TransformFailure {
    TransformFailure::unexpected(format!("Unexpected error in {ENGINE_NAME} adapter: {e}"))
}

/// `-s:` / `-xsl:` / `-o:` style argument with an absolute path
fn directive(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path);
    arg
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "stopped reading Saxon output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Kill the child and wait for it so no zombie outlives the call
async fn reap(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill Saxon process");
    }
}
