//! Funnel analytics over all persisted script stats
//!
//! Answers "how far did the user get, and how long did it take". The
//! computation is pure: the same stats always yield the same report.
//! Every duration that cannot be computed, or would come out negative
//! (clock skew, missing setup data), is reported as `None`.

use crate::console::{Highlight, Style};
use chrono::{DateTime, Utc};
use hfw_core::{ScriptCategory, ScriptStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Explorer page for a telemetry topic
pub const TOPIC_EXPLORER_URL: &str = "https://hashscan.io/testnet/topic";

/// Stats of a completed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub script_id: String,

    /// First start to first completion, ms
    pub first_run_duration: Option<u64>,

    /// Most recent start to most recent completion, ms
    pub latest_run_duration: Option<u64>,

    pub errors_before_first_complete: u64,
}

/// Stats of a task that never completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteTask {
    pub script_id: String,

    /// First start to most recent error, ms
    pub time_to_latest_error: Option<u64>,

    pub error_count: u64,
}

/// Cross-script funnel report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    /// Completed setup script that started earliest
    pub reference_setup_script: Option<String>,

    /// When the reference setup script first started, epoch ms
    pub reference_setup_start: Option<u64>,

    /// Completed task that started earliest
    pub first_task_script: Option<String>,

    /// Completed task that finished most recently
    pub last_task_script: Option<String>,

    pub has_completed_first_task: bool,
    pub time_to_first_task_completion: Option<u64>,
    pub time_to_all_tasks_completion: Option<u64>,

    pub completed_task_count: usize,
    pub incomplete_task_count: usize,
    pub completed_tasks: Vec<CompletedTask>,
    pub incomplete_tasks: Vec<IncompleteTask>,
}

/// `to - from`, when both are known and the result is not negative
fn span(from: Option<u64>, to: Option<u64>) -> Option<u64> {
    to?.checked_sub(from?)
}

/// A `last*` timestamp, known once its `first*` counterpart is
fn last_seen(first: Option<u64>, last: u64) -> Option<u64> {
    first.map(|_| last)
}

/// Derive the funnel report from every script's stats
pub fn compute_summary(all_stats: &BTreeMap<String, ScriptStats>) -> SummaryReport {
    let mut reference_setup: Option<(&str, &ScriptStats)> = None;
    let mut first_task: Option<(&str, &ScriptStats)> = None;
    let mut last_task: Option<(&str, &ScriptStats)> = None;
    let mut completed_tasks = Vec::new();
    let mut incomplete_tasks = Vec::new();

    // never-started entries sort last
    let start_key = |stats: &ScriptStats| stats.first_start.unwrap_or(u64::MAX);

    for (script_id, stats) in all_stats {
        let script_id = script_id.as_str();
        match stats.script_category {
            ScriptCategory::Setup => {
                if !stats.has_completed() {
                    continue;
                }
                if reference_setup.map_or(true, |(_, r)| start_key(stats) < start_key(r)) {
                    reference_setup = Some((script_id, stats));
                }
            }
            ScriptCategory::Task if stats.has_completed() => {
                if first_task.map_or(true, |(_, f)| start_key(stats) < start_key(f)) {
                    first_task = Some((script_id, stats));
                }
                if last_task.map_or(true, |(_, l)| stats.last_complete > l.last_complete) {
                    last_task = Some((script_id, stats));
                }
                completed_tasks.push(CompletedTask {
                    script_id: script_id.to_string(),
                    first_run_duration: span(stats.first_start, stats.first_complete),
                    latest_run_duration: span(
                        last_seen(stats.first_start, stats.last_start),
                        last_seen(stats.first_complete, stats.last_complete),
                    ),
                    errors_before_first_complete: stats.count_error_before_first_complete,
                });
            }
            ScriptCategory::Task => {
                incomplete_tasks.push(IncompleteTask {
                    script_id: script_id.to_string(),
                    time_to_latest_error: span(
                        stats.first_start,
                        last_seen(stats.first_error, stats.last_error),
                    ),
                    error_count: stats.count_error,
                });
            }
        }
    }

    let reference_start = reference_setup.and_then(|(_, s)| s.first_start);
    let time_to_first_task_completion = first_task
        .and_then(|(_, task)| span(reference_start, task.first_complete));
    let time_to_all_tasks_completion = last_task
        .and_then(|(_, task)| span(reference_start, last_seen(task.first_complete, task.last_complete)));

    SummaryReport {
        reference_setup_script: reference_setup.map(|(id, _)| id.to_string()),
        reference_setup_start: reference_start,
        first_task_script: first_task.map(|(id, _)| id.to_string()),
        last_task_script: last_task.map(|(id, _)| id.to_string()),
        has_completed_first_task: time_to_first_task_completion.is_some(),
        time_to_first_task_completion,
        time_to_all_tasks_completion,
        completed_task_count: completed_tasks.len(),
        incomplete_task_count: incomplete_tasks.len(),
        completed_tasks,
        incomplete_tasks,
    }
}

/// Human readable duration, `n/a` when unknown
pub fn format_duration(ms: Option<u64>) -> String {
    let Some(ms) = ms else {
        return "n/a".to_string();
    };
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1_000;
    if secs < 60 {
        return format!("{:.1}s", ms as f64 / 1_000.0);
    }
    let (hours, mins, secs) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if hours == 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    }
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Render the report as console lines.
///
/// Order is fixed: overall funnel, completed tasks, incomplete tasks, then
/// the topic explorer link when `topic_id` is given.
pub fn render_summary(report: &SummaryReport, style: Style, topic_id: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    let or_none = |name: &Option<String>| name.clone().unwrap_or_else(|| "none".to_string());

    lines.push(style.apply(Highlight::Section, "Overall"));
    lines.push(format!(
        "  Reference setup script: {}",
        or_none(&report.reference_setup_script)
    ));
    if let Some(started) = report.reference_setup_start {
        lines.push(format!("  Setup started: {}", format_timestamp(started)));
    }
    lines.push(format!(
        "  Has completed first task: {}",
        report.has_completed_first_task
    ));
    lines.push(format!(
        "  Time to first task completion: {} ({})",
        format_duration(report.time_to_first_task_completion),
        or_none(&report.first_task_script)
    ));
    lines.push(format!(
        "  Time to all tasks completion: {} ({})",
        format_duration(report.time_to_all_tasks_completion),
        or_none(&report.last_task_script)
    ));

    lines.push(style.apply(
        Highlight::Complete,
        &format!("Completed tasks ({})", report.completed_task_count),
    ));
    for task in &report.completed_tasks {
        lines.push(format!(
            "  {}: first run {}, latest run {}, {} error(s) before first completion",
            task.script_id,
            format_duration(task.first_run_duration),
            format_duration(task.latest_run_duration),
            task.errors_before_first_complete
        ));
    }

    lines.push(style.apply(
        Highlight::Error,
        &format!("Incomplete tasks ({})", report.incomplete_task_count),
    ));
    for task in &report.incomplete_tasks {
        lines.push(format!(
            "  {}: {} error(s), latest {} after first start",
            task.script_id,
            task.error_count,
            format_duration(task.time_to_latest_error)
        ));
    }

    if let Some(topic_id) = topic_id {
        let url = format!("{}/{}", TOPIC_EXPLORER_URL, topic_id);
        lines.push(format!(
            "View all published metrics at {}",
            style.apply(Highlight::Url, &url)
        ));
    }

    lines
}
