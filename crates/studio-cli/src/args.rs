use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use studio_engine::XsltVersion;

#[derive(Parser)]
#[command(name = "stylesheet-studio")]
#[command(version)]
#[command(about = "Apply XSLT stylesheets with xrust (1.0) or Saxon-HE (2.0/3.0)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Transform an XML document with a stylesheet",
        long_about = "Transform picks the engine from --xslt-version and the server configuration, \
                      then prints the log and the result (or the whole result as JSON).",
        after_help = "Exit codes:\n    0  transform succeeded\n    2  transform failed\n    3  input too large\n\n\
                      Example:\n    stylesheet-studio transform --xml data.xml --xslt report.xslt --xslt-version 3.0"
    )]
    Transform(TransformArgs),
    #[command(
        about = "Show the secondary engine configuration and jar status",
        after_help = "Example:\n    stylesheet-studio engines --config stylesheet-studio.toml"
    )]
    Engines(EnginesArgs),
    /// Serve one isolated xrust transform over stdin/stdout
    #[command(hide = true)]
    XrustWorker,
}

#[derive(Args)]
pub struct TransformArgs {
    /// XML document to transform
    #[arg(long, value_name = "FILE")]
    pub xml: PathBuf,

    /// Stylesheet to apply
    #[arg(long, value_name = "FILE")]
    pub xslt: PathBuf,

    /// XSLT version the stylesheet targets (1.0, 2.0 or 3.0)
    #[arg(long, value_name = "VERSION", default_value = "1.0")]
    pub xslt_version: XsltVersion,

    /// Configuration file (default: ./stylesheet-studio.toml if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the transform output here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct EnginesArgs {
    /// Configuration file (default: ./stylesheet-studio.toml if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
