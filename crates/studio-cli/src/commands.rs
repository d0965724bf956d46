use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use studio_engine::dependencies::{self, DependencyStatus};
use studio_engine::{
    worker, ConfigLoader, Dispatcher, PrimaryEngineConfig, SecondaryEngineConfig, StudioConfig,
    TransformRequest,
};

use crate::args::{EnginesArgs, TransformArgs};

/// Hidden subcommand this binary answers to when it hosts an xrust worker
const WORKER_SUBCOMMAND: &str = "xrust-worker";

const EXIT_TRANSFORM_FAILED: u8 = 2;
const EXIT_TOO_LARGE: u8 = 3;

fn load_config(path: Option<&Path>) -> Result<StudioConfig> {
    let mut config = ConfigLoader::load(path).context("failed to load configuration")?;
    // With no worker configured, this binary hosts its own
    if config.primary.isolate && config.primary.worker.is_none() {
        config.primary.worker =
            Some(std::env::current_exe().context("failed to locate the running executable")?);
        config.primary.worker_args = vec![WORKER_SUBCOMMAND.to_string()];
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub async fn transform(args: TransformArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let xml = read_input(&args.xml)?;
    let xslt = read_input(&args.xslt)?;

    let request = TransformRequest::new(xml, xslt, args.xslt_version);
    if let Err(e) = request.check_size(config.limits.max_input_chars) {
        tracing::warn!(error = %e, "request rejected");
        eprintln!("error: {e}");
        return Ok(ExitCode::from(EXIT_TOO_LARGE));
    }

    let dispatcher = Dispatcher::new(Arc::new(config));
    let result = dispatcher.dispatch(&request).await;

    if let Some(out) = &args.out {
        if result.success {
            std::fs::write(out, &result.html)
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in &result.log_lines {
            println!("{line}");
        }
        if result.success && args.out.is_none() {
            println!();
            println!("{}", result.html);
        }
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_TRANSFORM_FAILED))
    }
}

#[derive(Serialize)]
struct EnginesReport<'a> {
    primary: &'a PrimaryEngineConfig,
    secondary: &'a SecondaryEngineConfig,
    dependencies: Vec<DependencyStatus>,
}

pub fn xrust_worker() -> Result<ExitCode> {
    worker::serve(std::io::stdin().lock(), std::io::stdout().lock())
        .context("xrust worker failed")?;
    Ok(ExitCode::SUCCESS)
}

pub fn engines(args: EnginesArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let report = EnginesReport {
        primary: &config.primary,
        secondary: &config.secondary,
        dependencies: dependencies::check(&config.secondary),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    let primary = report.primary;
    match primary.worker_command() {
        Some(worker) => println!(
            "Primary engine (xrust): isolated worker {} (timeout {}s)",
            worker.program.display(),
            primary.timeout_secs
        ),
        None => println!("Primary engine (xrust): in process"),
    }

    let secondary = report.secondary;
    println!(
        "Secondary engine (Saxon-HE): {}",
        if secondary.enabled { "enabled" } else { "disabled" }
    );
    println!("  java:       {}", secondary.java.display());
    println!("  main class: {}", secondary.main_class);
    println!("  timeout:    {}s", secondary.timeout_secs);
    println!("Dependencies:");
    for dep in &report.dependencies {
        let status = if dep.present { "present" } else { "missing" };
        println!("  {} {}: {} ({})", dep.name, dep.version, status, dep.path.display());
        if !dep.present {
            println!("    download: {}", dep.url);
        }
    }
    Ok(ExitCode::SUCCESS)
}
