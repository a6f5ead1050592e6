use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

/// One server implementation under test, reached over HTTP and sampled for
/// resource usage through its OS process id.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    pub base_url: String,
    pub pid: u32,
}

impl Target {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            pid,
        }
    }
}

/// The closed set of endpoint identities. Every result is keyed by one of
/// these, so a misspelled endpoint name cannot silently produce missing data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKey {
    Ping,
    Data,
    Process,
}

impl EndpointKey {
    /// All endpoints in their declared order. The workload runner exercises
    /// them in exactly this order for every target.
    pub const ALL: [EndpointKey; 3] = [EndpointKey::Ping, EndpointKey::Data, EndpointKey::Process];

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKey::Ping => "ping",
            EndpointKey::Data => "data",
            EndpointKey::Process => "process",
        }
    }

    /// Capitalized form used for report section headings.
    pub fn title(self) -> &'static str {
        match self {
            EndpointKey::Ping => "Ping",
            EndpointKey::Data => "Data",
            EndpointKey::Process => "Process",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fixed HTTP route exercised identically against every target.
#[derive(Clone, Debug)]
pub struct EndpointSpec {
    pub key: EndpointKey,
    pub path: &'static str,
    pub method: Method,
    pub body: Option<Value>,
}

/// The fixed workload surface. Shared by every target so the comparison stays
/// valid: same paths, same methods, same bodies.
pub fn endpoints() -> [EndpointSpec; 3] {
    [
        EndpointSpec {
            key: EndpointKey::Ping,
            path: "/ping",
            method: Method::GET,
            body: None,
        },
        EndpointSpec {
            key: EndpointKey::Data,
            path: "/api/v1/data",
            method: Method::GET,
            body: None,
        },
        EndpointSpec {
            key: EndpointKey::Process,
            path: "/api/v1/process",
            method: Method::POST,
            body: Some(json!({"test": "data"})),
        },
    ]
}

/// A router implementation the harness knows how to reach, with its
/// conventional localhost port. Listed in report order.
#[derive(Clone, Copy, Debug)]
pub struct Implementation {
    pub name: &'static str,
    pub key: &'static str,
    pub port: u16,
}

pub static IMPLEMENTATIONS: [Implementation; 4] = [
    Implementation { name: "Go", key: "go", port: 3000 },
    Implementation { name: "Rust", key: "rust", port: 3001 },
    Implementation { name: "Python", key: "python", port: 3002 },
    Implementation { name: "Next.js", key: "nextjs", port: 3003 },
];

/// Look up a known implementation by its CLI key (e.g. "go", "nextjs").
pub fn implementation(key: &str) -> Option<&'static Implementation> {
    IMPLEMENTATIONS.iter().find(|imp| imp.key == key)
}

impl Implementation {
    /// Builds the target for this implementation from an operator-supplied
    /// process id.
    pub fn target(&self, pid: u32) -> Target {
        Target::new(self.name, format!("http://localhost:{}", self.port), pid)
    }
}

/// Run parameters shared by every target.
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub concurrency: usize,
    pub repetitions: usize,
    pub request_timeout: Duration,
}

impl BenchmarkConfig {
    pub fn try_new(concurrency: usize, repetitions: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(anyhow!("concurrency must be greater than zero"));
        }
        if repetitions == 0 {
            return Err(anyhow!("repetitions must be greater than zero"));
        }

        Ok(Self {
            concurrency,
            repetitions,
            request_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        if !request_timeout.is_zero() {
            self.request_timeout = request_timeout;
        }
        self
    }

    /// How many requests a single endpoint receives: every repetition puts
    /// `concurrency` requests in flight, and the whole batch is dispatched at
    /// once to model peak burst load.
    pub fn dispatched_per_endpoint(&self) -> usize {
        self.repetitions * self.concurrency
    }
}
