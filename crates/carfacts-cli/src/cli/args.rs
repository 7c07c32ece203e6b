use carfacts_core::config::GeneratorProvider;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "carfacts",
    version,
    about = "Vehicle reports from a text query or a photo, cached per vehicle"
)]
pub struct Cli {
    #[arg(long, global = true, default_value = "carfacts.yaml")]
    pub config: PathBuf,

    /// tracing filter, e.g. `info` or `carfacts_core=debug`
    #[arg(long, global = true, env = "CARFACTS_LOG", default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Identify a vehicle and print its report
    Analyze(AnalyzeArgs),
    /// Autocomplete a partial vehicle description
    Suggest(SuggestArgs),
    /// Inspect stored reports
    Cache(CacheArgs),
    /// Print the narration text for a saved markdown report
    Strip(StripArgs),
    /// Write a sample config and prompt template
    Init,
    Version,
}

#[derive(Parser, Clone)]
#[command(group(ArgGroup::new("input").required(true).args(["query", "image"])))]
pub struct AnalyzeArgs {
    /// vehicle description, e.g. "2010 Honda Accord EX"
    #[arg(long)]
    pub query: Option<String>,

    /// JPEG or PNG photo of the vehicle
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// regenerate even if a report is stored
    #[arg(long)]
    pub refresh: bool,

    /// write the narration transcript to this file
    #[arg(long)]
    pub narrate: Option<PathBuf>,

    /// override generator.provider (openai|fake)
    #[arg(long)]
    pub generator: Option<GeneratorProvider>,

    /// print the analysis as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct SuggestArgs {
    pub partial: String,
}

#[derive(Parser)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub cmd: CacheSub,
}

#[derive(Subcommand)]
pub enum CacheSub {
    /// Print the stored report for a vehicle without generating
    Get { identifier: String },
}

#[derive(Parser, Clone)]
pub struct StripArgs {
    pub file: PathBuf,
}
