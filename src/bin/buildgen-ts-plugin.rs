//! Serves the built-in TypeScript analyzer over stdin/stdout.
//!
//! Exits 0 when the host closes stdin, 1 on malformed input or I/O failure.

use clap::Parser;

use buildgen::plugin::remote::serve;
use buildgen::plugin::TypeScriptAnalyzer;

#[derive(Parser)]
#[command(name = "buildgen-ts-plugin")]
#[command(about = "TypeScript analyzer speaking the buildgen plugin protocol on stdio")]
struct Cli {
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let analyzer = TypeScriptAnalyzer::new();
    match serve(&analyzer, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(reason) => {
            tracing::info!(%reason, "Plugin exiting");
        }
        Err(e) => {
            tracing::error!(error = %e, "Plugin failed");
            std::process::exit(1);
        }
    }
}
