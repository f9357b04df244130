//! Markdown and JSON report generation.
//!
//! This module renders an [`AnalysisReport`] for humans (Markdown) or
//! for other tools (JSON).

use crate::cli::OutputFormat;
use crate::models::{AnalysisOutcome, AnalysisReport, ReportMetadata, TraceStep, VerdictLabel};
use anyhow::{Context, Result};
use std::path::Path;

/// Characters of each observation shown in the Markdown trace.
const OBSERVATION_PREVIEW_CHARS: usize = 600;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# pkgwarden Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_verdict_section(&report.outcome));
    output.push_str(&generate_trace_section(&report.steps));
    if let Some(ref answer) = report.final_answer {
        output.push_str(&generate_final_answer_section(answer));
    }
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Package:** `{}`\n", metadata.package_path));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Tool Invocations:** {} (limit {})\n",
        metadata.tool_invocations, metadata.max_iterations
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the verdict section.
fn generate_verdict_section(outcome: &AnalysisOutcome) -> String {
    let mut section = String::new();

    section.push_str("## Verdict\n\n");
    let badge = match (outcome, outcome.label()) {
        (AnalysisOutcome::BackendError { .. }, _) => "⚠️ **ERROR**",
        (_, VerdictLabel::Malware) => "🔴 **MALWARE**",
        (_, VerdictLabel::NotMalware) => "🟢 **NOT MALWARE**",
        (_, VerdictLabel::Indeterminate) => "🟡 **INDETERMINATE**",
    };
    section.push_str(&format!("{}\n\n", badge));

    if outcome.label() == VerdictLabel::Indeterminate {
        section.push_str(&format!("> {}\n\n", outcome.summary()));
    }

    section
}

/// Generate the tool trace section.
fn generate_trace_section(steps: &[TraceStep]) -> String {
    let mut section = String::new();

    section.push_str("## Tool Trace\n\n");

    if steps.is_empty() {
        section.push_str("No tools were invoked.\n\n");
        return section;
    }

    for (i, step) in steps.iter().enumerate() {
        section.push_str(&format!("### {}. `{}`\n\n", i + 1, step.tool));
        if !step.thought.trim().is_empty() {
            section.push_str(&format!("*{}*\n\n", step.thought.trim()));
        }
        let observation = preview(&step.observation);
        let fence = code_fence(&observation);
        section.push_str(&format!(
            "<details>\n<summary>Observation</summary>\n\n{fence}\n{observation}\n{fence}\n</details>\n\n"
        ));
    }

    section
}

/// Generate the raw final answer section.
fn generate_final_answer_section(answer: &str) -> String {
    let mut section = String::new();

    section.push_str("## Final Answer\n\n");
    for line in answer.trim().lines() {
        section.push_str(&format!("> {}\n", line));
    }
    section.push('\n');

    section
}

/// Backtick fence longer than any backtick run in `content`.
fn code_fence(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn preview(observation: &str) -> String {
    match observation.char_indices().nth(OBSERVATION_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}\n...", &observation[..cut]),
        None => observation.to_string(),
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by pkgwarden*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render `report` in `format` and write it to `path`.
pub fn write_report(report: &AnalysisReport, format: OutputFormat, path: &Path) -> Result<()> {
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
