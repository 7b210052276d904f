use clap::Parser;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use buildgen::config::AppConfig;
use buildgen::lifecycle::{Component, ComponentRegistry, ShutdownCoordinator};
use buildgen::pipeline::{scan_packages, Pipeline};
use buildgen::plugin::{Analyzer, RemoteAnalyzer, TypeScriptAnalyzer};
use buildgen::resolve::{Redirect, RedirectTable};

#[derive(Parser)]
#[command(name = "buildgen")]
#[command(about = "Generate build rules and resolve their dependencies")]
struct Cli {
    #[arg(long, env = "BUILDGEN_REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// Repository name for rendered labels. Empty for the main repository.
    #[arg(long, env = "BUILDGEN_REPO_NAME", default_value = "")]
    repo_name: String,

    /// Plugin executable speaking the analyzer protocol on stdio. Repeatable.
    #[arg(long = "plugin", env = "BUILDGEN_PLUGINS", value_delimiter = ',')]
    plugins: Vec<PathBuf>,

    /// Extra redirect, `prefix=label` or `lang:prefix=label`. Repeatable.
    #[arg(long = "redirect")]
    redirects: Vec<Redirect>,

    /// Rule name suffix for guessed labels, `lang=suffix`. Repeatable.
    #[arg(long = "suffix", value_parser = parse_suffix)]
    suffixes: Vec<(String, String)>,

    /// Per-call plugin timeout. 0 = wait forever.
    #[arg(long, env = "BUILDGEN_CALL_TIMEOUT_MS", default_value = "30000")]
    call_timeout_ms: u64,

    #[arg(long, env = "BUILDGEN_SHUTDOWN_TIMEOUT_MS", default_value = "5000")]
    shutdown_timeout_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Skip the built-in TypeScript analyzer.
    #[arg(long)]
    no_typescript: bool,
}

fn parse_suffix(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((lang, suffix)) if !lang.is_empty() && !suffix.is_empty() => {
            Ok((lang.to_string(), suffix.to_string()))
        }
        _ => Err(format!("expected lang=suffix, got {}", s)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig {
        repo_root: cli.repo_root,
        repo_name: cli.repo_name,
        plugins: cli.plugins,
        redirects: cli.redirects,
        suffixes: cli.suffixes.into_iter().collect::<HashMap<_, _>>(),
        call_timeout_ms: cli.call_timeout_ms,
        shutdown_timeout_ms: cli.shutdown_timeout_ms,
        log_level: cli.log_level,
        typescript: !cli.no_typescript,
    };

    let registry = Arc::new(ComponentRegistry::new());
    let mut analyzers: Vec<Arc<dyn Analyzer>> = Vec::new();

    if config.typescript {
        analyzers.push(Arc::new(TypeScriptAnalyzer::new()));
    }
    // Analyzers add their own well-known redirects when the run starts.
    let redirects = RedirectTable::new(config.redirects.clone());

    for program in &config.plugins {
        let remote = Arc::new(RemoteAnalyzer::spawn(program, &[], config.call_timeout())?);
        registry.register(remote.clone() as Arc<dyn Component>).await;
        analyzers.push(remote);
    }

    let packages = scan_packages(&config.repo_root)?;
    tracing::info!(
        root = %config.repo_root.display(),
        packages = packages.len(),
        analyzers = analyzers.len(),
        configured_redirects = redirects.len(),
        "Starting run"
    );

    let mut pipeline =
        Pipeline::new(analyzers, redirects).with_repo_name(config.repo_name.as_str());
    for (lang, suffix) in &config.suffixes {
        pipeline = pipeline.with_suffix(lang.as_str(), suffix.as_str());
    }

    let report = tokio::select! {
        report = pipeline.run(&packages) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted (SIGINT)");
            None
        }
    };

    if let Some(report) = &report {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, report)?;
        writeln!(stdout)?;
    }

    for (name, reason) in registry.unhealthy().await {
        tracing::warn!(plugin = %name, %reason, "Plugin transport failed during run");
    }

    let coordinator = ShutdownCoordinator::new(registry);
    for (name, result) in coordinator.shutdown(config.shutdown_timeout()).await {
        if !result.is_clean() {
            tracing::warn!(plugin = %name, ?result, "Plugin did not exit cleanly");
        }
    }

    match report {
        Some(report) if !report.failed.is_empty() => {
            anyhow::bail!("{} analyzer(s) failed", report.failed.len())
        }
        Some(_) => Ok(()),
        None => anyhow::bail!("interrupted"),
    }
}
