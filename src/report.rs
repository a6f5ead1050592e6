use std::fmt::Write as _;

use serde::Serialize;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::config::EndpointKey;
use crate::results::{EndpointStats, TargetResults};

/// Environment metadata recorded once, when the report is built.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub cpu: String,
    pub tool_version: String,
    pub timestamp: String,
}

impl EnvironmentInfo {
    pub fn collect() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::everything()),
        );
        let cpu = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| "unknown".to_string()),
            System::os_version().unwrap_or_else(|| "unknown".to_string()),
        );

        Self {
            os,
            cpu,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One target's difference against the baseline target for a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Diff {
    /// Percentage difference, `(value / baseline − 1) × 100`.
    Percent(f64),
    /// Raw signed delta, used for error counts.
    Delta(f64),
    /// The baseline value is zero, so the ratio is undefined.
    Undefined,
    /// Either side has no data for this metric.
    NoData,
}

impl Diff {
    fn render(&self) -> String {
        match self {
            Diff::Percent(pct) => format!("{:+.1}%", pct),
            Diff::Delta(delta) => format!("{:+.2}", delta),
            Diff::Undefined => "inf".to_string(),
            Diff::NoData => "n/a".to_string(),
        }
    }
}

/// One metric across all targets: absolute values in target order, plus one
/// diff per non-baseline target.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub label: String,
    pub values: Vec<Option<f64>>,
    pub diffs: Vec<Diff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSection {
    pub endpoint: EndpointKey,
    pub rows: Vec<MetricRow>,
}

/// The full cross-target comparison, computed once from the frozen aggregates.
/// Both renderings (durable markdown, interactive console) read from this same
/// snapshot so the two views cannot drift.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub environment: EnvironmentInfo,
    pub targets: Vec<String>,
    pub overall: MetricRow,
    pub endpoints: Vec<EndpointSection>,
}

type Extract = fn(&EndpointStats) -> f64;

const LATENCY_AND_RESOURCE_METRICS: [(&str, Extract); 8] = [
    ("Mean Latency (ms)", |stats| stats.mean_ms),
    ("Median Latency (ms)", |stats| stats.median_ms),
    ("P95 Latency (ms)", |stats| stats.p95_ms),
    ("P99 Latency (ms)", |stats| stats.p99_ms),
    ("Min Latency (ms)", |stats| stats.min_ms),
    ("Max Latency (ms)", |stats| stats.max_ms),
    ("Memory Usage (MB)", |stats| stats.avg_memory_mb),
    ("CPU Usage (%)", |stats| stats.avg_cpu_percent),
];

impl ComparisonReport {
    /// Builds the comparison from one frozen aggregate per target. The first
    /// aggregate is the baseline for every relative difference.
    pub fn build(aggregates: &[TargetResults]) -> Self {
        Self::build_with_environment(aggregates, EnvironmentInfo::collect())
    }

    pub fn build_with_environment(
        aggregates: &[TargetResults],
        environment: EnvironmentInfo,
    ) -> Self {
        let targets: Vec<String> = aggregates
            .iter()
            .map(|results| results.name().to_string())
            .collect();

        let throughput_values: Vec<Option<f64>> = aggregates
            .iter()
            .map(|results| results.throughput().ok())
            .collect();
        let overall = MetricRow {
            label: "Throughput (req/s)".to_string(),
            diffs: percent_diffs(&throughput_values),
            values: throughput_values,
        };

        let endpoints = EndpointKey::ALL
            .iter()
            .map(|&key| endpoint_section(aggregates, key))
            .collect();

        Self {
            environment,
            targets,
            overall,
            endpoints,
        }
    }

    /// The durable report body, in the `results.md` layout.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# API Router Performance Comparison\n\n");

        out.push_str("## System Information\n\n");
        let _ = writeln!(out, "- OS: {}", self.environment.os);
        let _ = writeln!(out, "- CPU: {}", self.environment.cpu);
        let _ = writeln!(out, "- routerbench version: {}", self.environment.tool_version);
        let _ = writeln!(out, "- Timestamp: {}", self.environment.timestamp);
        out.push('\n');

        out.push_str("## Overall Performance\n\n");
        markdown_table(&mut out, &self.headers(), &[cells(&self.overall)]);

        out.push_str("## Detailed Performance Metrics\n\n");
        for section in &self.endpoints {
            let _ = writeln!(out, "### {} Endpoint\n", section.endpoint.title());
            let rows: Vec<Vec<String>> = section.rows.iter().map(cells).collect();
            markdown_table(&mut out, &self.headers(), &rows);
        }

        out
    }

    /// The interactive view: the same tables, aligned for a terminal.
    pub fn render_console(&self) -> String {
        let mut out = String::new();
        out.push_str("Benchmark Results\n\n");

        console_table(
            &mut out,
            "Overall Performance",
            &self.headers(),
            &[cells(&self.overall)],
        );

        for section in &self.endpoints {
            let rows: Vec<Vec<String>> = section.rows.iter().map(cells).collect();
            console_table(
                &mut out,
                &format!("{} Endpoint Performance", section.endpoint.title()),
                &self.headers(),
                &rows,
            );
        }

        out
    }

    fn headers(&self) -> Vec<String> {
        let mut headers = vec!["Metric".to_string()];
        headers.extend(self.targets.iter().cloned());
        if let Some(baseline) = self.targets.first() {
            for name in &self.targets[1..] {
                headers.push(format!("{} vs {}", name, baseline));
            }
        }
        headers
    }
}

fn endpoint_section(aggregates: &[TargetResults], key: EndpointKey) -> EndpointSection {
    let stats: Vec<Option<EndpointStats>> = aggregates
        .iter()
        .map(|results| results.stats(key).ok())
        .collect();

    let mut rows = Vec::with_capacity(LATENCY_AND_RESOURCE_METRICS.len() + 1);
    for (label, extract) in LATENCY_AND_RESOURCE_METRICS {
        let values: Vec<Option<f64>> = stats
            .iter()
            .map(|stats| stats.as_ref().map(extract))
            .collect();
        rows.push(MetricRow {
            label: label.to_string(),
            diffs: percent_diffs(&values),
            values,
        });
    }

    // Error counts exist even when an endpoint produced no successful sample,
    // so they come from the aggregate's counters rather than its stats.
    let error_values: Vec<Option<f64>> = aggregates
        .iter()
        .map(|results| Some(results.error_count(key) as f64))
        .collect();
    rows.push(MetricRow {
        label: "Errors".to_string(),
        diffs: delta_diffs(&error_values),
        values: error_values,
    });

    EndpointSection {
        endpoint: key,
        rows,
    }
}

fn percent_diffs(values: &[Option<f64>]) -> Vec<Diff> {
    let baseline = values.first().copied().flatten();
    values
        .iter()
        .skip(1)
        .map(|value| match (baseline, *value) {
            (Some(base), Some(value)) => {
                if base == 0.0 {
                    Diff::Undefined
                } else {
                    Diff::Percent((value / base - 1.0) * 100.0)
                }
            }
            _ => Diff::NoData,
        })
        .collect()
}

fn delta_diffs(values: &[Option<f64>]) -> Vec<Diff> {
    let baseline = values.first().copied().flatten();
    values
        .iter()
        .skip(1)
        .map(|value| match (baseline, *value) {
            (Some(base), Some(value)) => Diff::Delta(value - base),
            _ => Diff::NoData,
        })
        .collect()
}

fn render_value(value: &Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}", value),
        None => "n/a".to_string(),
    }
}

fn cells(row: &MetricRow) -> Vec<String> {
    let mut cells = vec![row.label.clone()];
    cells.extend(row.values.iter().map(render_value));
    cells.extend(row.diffs.iter().map(Diff::render));
    cells
}

fn markdown_table(out: &mut String, headers: &[String], rows: &[Vec<String>]) {
    out.push('|');
    for header in headers {
        let _ = write!(out, " {} |", header);
    }
    out.push('\n');
    out.push('|');
    for _ in headers {
        out.push_str("--------|");
    }
    out.push('\n');
    for row in rows {
        out.push('|');
        for cell in row {
            let _ = write!(out, " {} |", cell);
        }
        out.push('\n');
    }
    out.push('\n');
}

fn console_table(out: &mut String, title: &str, headers: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.len());
        }
    }

    let _ = writeln!(out, "{}", title);
    for (idx, header) in headers.iter().enumerate() {
        let _ = write!(out, "{:<width$}  ", header, width = widths[idx]);
    }
    out.push('\n');
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len();
    out.push_str(&"-".repeat(total));
    out.push('\n');
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let _ = write!(out, "{:<width$}  ", cell, width = widths[idx]);
        }
        out.push('\n');
    }
    out.push('\n');
}
