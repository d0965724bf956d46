//! Out-of-process hosting for the xrust engine
//!
//! A worker reads one [`WorkerRequest`] as JSON on stdin, runs the transform
//! and writes the resulting [`EngineRun`] as JSON on stdout. Unbounded
//! template recursion overflows the worker's stack and aborts the worker;
//! the parent sees the abnormal exit and reports it as a failed transform.

use std::env;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use studio_engine_traits::EngineRun;

use crate::config::LimitsConfig;
use crate::engine_xrust::XrustEngine;

/// File stem of the worker binary built by this crate
pub const WORKER_BIN_NAME: &str = "studio-xrust-worker";

/// What the parent sends to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub xml: String,
    pub xslt: String,
    pub max_tree_nodes: u32,
}

/// Program and leading arguments used to start a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Find the worker binary beside the running executable, or one directory
/// up (where test binaries sit relative to the crate's binaries).
pub fn locate() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let name = format!("{WORKER_BIN_NAME}{}", env::consts::EXE_SUFFIX);
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
}

/// Worker main loop: one request in, one run out.
pub fn serve<R: Read, W: Write>(input: R, mut output: W) -> io::Result<()> {
    let request: WorkerRequest = serde_json::from_reader(input).map_err(io::Error::other)?;

    let engine = XrustEngine::new(&LimitsConfig {
        max_tree_nodes: request.max_tree_nodes,
        ..LimitsConfig::default()
    });
    let run: EngineRun = engine.transform_on_thread(&request.xml, &request.xslt);

    serde_json::to_writer(&mut output, &run).map_err(io::Error::other)?;
    output.flush()
}
