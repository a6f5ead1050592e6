use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use routerbench::{
    implementation, BenchmarkConfig, ComparisonReport, Implementation, ProcessSampler, Target,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "routerbench",
    about = "Compare HTTP router implementations under an identical workload"
)]
struct Args {
    /// Process ids of the selected targets, one per target, in --targets order
    pids: Vec<u32>,

    /// Comma-separated implementations to benchmark (go, rust, python, nextjs)
    #[arg(long, value_delimiter = ',', default_value = "go,rust,python,nextjs")]
    targets: Vec<String>,

    /// Requests put in flight per repetition
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Repetitions per endpoint; each dispatches `concurrency` requests
    #[arg(long, default_value_t = 1000)]
    repetitions: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Where to write the markdown report
    #[arg(long, default_value = "results.md")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routerbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let implementations = resolve_implementations(&args.targets)?;
    if args.pids.len() != implementations.len() {
        let names: Vec<&str> = implementations.iter().map(|imp| imp.key).collect();
        eprintln!(
            "error: expected {} pids for targets {}, got {}",
            implementations.len(),
            names.join(","),
            args.pids.len()
        );
        eprintln!("usage: routerbench [--targets go,rust,python,nextjs] <PID>...");
        std::process::exit(2);
    }

    let config = BenchmarkConfig::try_new(args.concurrency, args.repetitions)?
        .with_request_timeout(Duration::from_secs(args.request_timeout_secs));

    let targets: Vec<Target> = implementations
        .iter()
        .zip(&args.pids)
        .map(|(imp, &pid)| imp.target(pid))
        .collect();

    let sampler = Arc::new(ProcessSampler::new());
    let mut aggregates = Vec::with_capacity(targets.len());
    for target in &targets {
        println!("Starting {} router benchmark...", target.name);
        let results = routerbench::run_target(target, &config, Arc::clone(&sampler))
            .await
            .with_context(|| format!("benchmark run against {} failed", target.name))?;
        aggregates.push(results);
    }

    let report = ComparisonReport::build(&aggregates);
    println!("\n{}", report.render_console());

    fs::write(&args.output, report.render_markdown())
        .with_context(|| format!("failed to write report to {}", args.output.display()))?;
    println!("Detailed results saved to {}", args.output.display());

    Ok(())
}

fn resolve_implementations(keys: &[String]) -> Result<Vec<&'static Implementation>> {
    if keys.is_empty() {
        return Err(anyhow!("at least one target must be selected"));
    }
    keys.iter()
        .map(|key| {
            implementation(key)
                .ok_or_else(|| anyhow!("unknown target {key}; known targets: go, rust, python, nextjs"))
        })
        .collect()
}
