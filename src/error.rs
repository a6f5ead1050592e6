use thiserror::Error;

use crate::config::EndpointKey;

/// A single request that could not be completed: connection refused, timeout,
/// a non-2xx status, or a transport failure while reading the body.
#[derive(Debug, Error)]
#[error("request to {url} failed: {source}")]
pub struct RequestError {
    /// The URL the request was issued against.
    pub url: String,
    #[source]
    pub source: reqwest::Error,
}

/// Aggregate-level invariant violations surfaced to the reporter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    /// Statistics were requested for an endpoint with zero successful samples.
    #[error("no successful samples recorded for the {0} endpoint")]
    EmptySampleSet(EndpointKey),

    /// Throughput was requested for a run whose wall-clock window is not
    /// positive, so the division is undefined.
    #[error("run finished with a non-positive elapsed time")]
    DegenerateDuration,
}
