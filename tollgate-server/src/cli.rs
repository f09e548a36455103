use clap::Parser;
use std::path::PathBuf;
use tollgate_core::modules::logger::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "tollgate",
    about = "Tollgate - policy proxy for LLM APIs",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    #[arg(long, env = "TOLLGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "TOLLGATE_PORT", default_value = "8080")]
    pub port: u16,

    /// JSON file with local configuration; environment variables override it
    #[arg(short, long, env = "TOLLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "TOLLGATE_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
