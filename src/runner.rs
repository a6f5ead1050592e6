use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::{endpoints, BenchmarkConfig, Target};
use crate::error::RequestError;
use crate::results::{Sample, TargetResults};
use crate::sampler::ProcessSampler;

/// Runs the fixed workload against one target and returns its aggregate.
///
/// Endpoints are exercised sequentially in their declared order. Within an
/// endpoint, every one of `repetitions × concurrency` requests is dispatched
/// at once and the whole batch is awaited before the next endpoint starts, so
/// the aggregate never interleaves completions from two endpoints.
pub async fn run_target(
    target: &Target,
    config: &BenchmarkConfig,
    sampler: Arc<ProcessSampler>,
) -> Result<TargetResults> {
    let client = Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("failed to construct HTTP client")?;

    let mut results = TargetResults::new(&target.name);

    for spec in endpoints() {
        println!("Running {} benchmark for {}...", spec.key, target.name);
        let url = format!("{}{}", target.base_url, spec.path);

        let mut batch = JoinSet::new();
        for _ in 0..config.dispatched_per_endpoint() {
            let client = client.clone();
            let sampler = Arc::clone(&sampler);
            let url = url.clone();
            let method = spec.method.clone();
            let body = spec.body.clone();
            let pid = target.pid;
            batch.spawn(async move {
                execute_request(&client, method, &url, body.as_ref(), &sampler, pid).await
            });
        }

        while let Some(joined) = batch.join_next().await {
            let outcome = joined.context("request task panicked or was cancelled")?;
            match outcome {
                Ok(sample) => results.record_sample(spec.key, sample),
                // Already logged at the point of detection; count and move on.
                Err(_) => results.record_error(spec.key),
            }
        }
    }

    results.finish();
    Ok(results)
}

/// Issues one request and measures wall-clock time until the complete response
/// body has been received, then pairs the latency with a resource snapshot of
/// the target process.
///
/// Any failure (connection, timeout, non-2xx status, truncated body) becomes a
/// `RequestError`; there are no retries. Each failure is logged exactly once,
/// here.
pub async fn execute_request(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
    sampler: &ProcessSampler,
    pid: u32,
) -> Result<Sample, RequestError> {
    let start = Instant::now();
    match send_and_drain(client, method, url, body).await {
        Ok(()) => {
            let latency = start.elapsed();
            let snapshot = sampler.sample(pid);
            Ok(Sample {
                latency,
                memory_mb: snapshot.memory_mb,
                cpu_percent: snapshot.cpu_percent,
            })
        }
        Err(source) => {
            warn!(url, error = %source, "request failed");
            Err(RequestError {
                url: url.to_string(),
                source,
            })
        }
    }
}

async fn send_and_drain(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> Result<(), reqwest::Error> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?.error_for_status()?;
    // Latency covers the full transfer, not just the header round-trip.
    response.bytes().await?;
    Ok(())
}
