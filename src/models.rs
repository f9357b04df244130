//! Data models for package analysis.
//!
//! This module contains the verdict, the reasoning trace, the terminal
//! outcome of one analysis and the report built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification label of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLabel {
    Malware,
    NotMalware,
    Indeterminate,
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictLabel::Malware => write!(f, "malware"),
            VerdictLabel::NotMalware => write!(f, "not malware"),
            VerdictLabel::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Final classification, with a diagnostic when indeterminate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Verdict {
    pub fn malware() -> Self {
        Self {
            label: VerdictLabel::Malware,
            message: None,
        }
    }

    pub fn not_malware() -> Self {
        Self {
            label: VerdictLabel::NotMalware,
            message: None,
        }
    }

    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self {
            label: VerdictLabel::Indeterminate,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.label, &self.message) {
            (VerdictLabel::Indeterminate, Some(message)) => write!(f, "{}", message),
            (label, _) => write!(f, "{}", label),
        }
    }
}

/// One tool invocation recorded in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Tool name requested by the backend.
    pub tool: String,
    /// Free text the backend sent alongside the request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thought: String,
    /// Tool output.
    pub observation: String,
}

/// Instruction prompt plus every tool invocation of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub instruction: String,
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            steps: Vec::new(),
        }
    }

    /// Append one step. Steps are never removed or edited.
    pub fn record(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<TraceStep> {
        self.steps
    }
}

/// Terminal outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The backend gave a final answer.
    Verdict(Verdict),
    /// The backend could not be reached or understood.
    BackendError { message: String },
    /// The iteration cap was hit without a final answer.
    BoundExceeded { iterations: usize },
    /// The caller cancelled the analysis between iterations.
    Cancelled { iterations: usize },
}

impl AnalysisOutcome {
    /// One-line result: `malware`, `not malware` or a diagnostic.
    pub fn summary(&self) -> String {
        match self {
            AnalysisOutcome::Verdict(verdict) => verdict.to_string(),
            AnalysisOutcome::BackendError { message } => {
                format!("Error during agent execution: {}", message)
            }
            AnalysisOutcome::BoundExceeded { iterations } => format!(
                "Reached maximum iterations ({}) without a final answer",
                iterations
            ),
            AnalysisOutcome::Cancelled { iterations } => {
                format!("Analysis cancelled after {} iterations", iterations)
            }
        }
    }

    /// Label for reporting; every non-verdict outcome is indeterminate.
    pub fn label(&self) -> VerdictLabel {
        match self {
            AnalysisOutcome::Verdict(verdict) => verdict.label,
            _ => VerdictLabel::Indeterminate,
        }
    }

    /// Process exit code: 0 clean, 1 backend failure, 2 malware, 3 undecided.
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalysisOutcome::Verdict(v) if v.label == VerdictLabel::NotMalware => 0,
            AnalysisOutcome::Verdict(v) if v.label == VerdictLabel::Malware => 2,
            AnalysisOutcome::BackendError { .. } => 1,
            _ => 3,
        }
    }
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path to the unpacked package.
    pub package_path: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Model used for reasoning.
    pub model_used: String,
    /// Iteration cap in effect.
    pub max_iterations: usize,
    /// Tool invocations performed.
    pub tool_invocations: usize,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// Complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub outcome: AnalysisOutcome,
    /// Human-readable result line.
    pub result: String,
    pub steps: Vec<TraceStep>,
    /// Raw final text from the backend, when it answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

impl AnalysisReport {
    pub fn new(
        metadata: ReportMetadata,
        outcome: AnalysisOutcome,
        steps: Vec<TraceStep>,
        final_answer: Option<String>,
    ) -> Self {
        let result = outcome.summary();
        Self {
            metadata,
            outcome,
            result,
            steps,
            final_answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::malware().to_string(), "malware");
        assert_eq!(Verdict::not_malware().to_string(), "not malware");
        assert_eq!(Verdict::indeterminate("unsure").to_string(), "unsure");
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = AnalysisOutcome::BackendError {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            outcome.summary(),
            "Error during agent execution: connection refused"
        );

        let outcome = AnalysisOutcome::BoundExceeded { iterations: 10 };
        assert!(outcome.summary().contains("(10)"));
        assert_eq!(outcome.label(), VerdictLabel::Indeterminate);
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(AnalysisOutcome::Verdict(Verdict::not_malware()).exit_code(), 0);
        assert_eq!(AnalysisOutcome::Verdict(Verdict::malware()).exit_code(), 2);
        assert_eq!(
            AnalysisOutcome::Verdict(Verdict::indeterminate("?")).exit_code(),
            3
        );
        assert_eq!(
            AnalysisOutcome::BackendError {
                message: String::new()
            }
            .exit_code(),
            1
        );
        assert_eq!(AnalysisOutcome::Cancelled { iterations: 2 }.exit_code(), 3);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = AnalysisOutcome::Verdict(Verdict::malware());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "verdict");
        assert_eq!(json["label"], "malware");

        let json = serde_json::to_value(AnalysisOutcome::BoundExceeded { iterations: 3 }).unwrap();
        assert_eq!(json["kind"], "bound_exceeded");
        assert_eq!(json["iterations"], 3);
    }

    #[test]
    fn test_trace_records_in_order() {
        let mut trace = Trace::new("prompt");
        assert!(trace.is_empty());
        trace.record(TraceStep {
            tool: "inspect_metadata".to_string(),
            thought: String::new(),
            observation: "name: demo".to_string(),
        });
        trace.record(TraceStep {
            tool: "inspect_setup_py".to_string(),
            thought: String::new(),
            observation: "setup.py not found".to_string(),
        });
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps()[1].tool, "inspect_setup_py");
    }
}
