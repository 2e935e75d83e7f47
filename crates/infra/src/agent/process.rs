//! Spawns one analysis process per request and collects its stdout.
//!
//! The bridge keeps no state between calls. Output is read in full; size
//! limits belong to the submission path and the interpreter.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument};

use cifixer_ai::{AgentError, AnalysisAgent};

/// Wait bound applied unless configured otherwise. Kept well below the
/// default job TTL so a hung agent fails its job before the record expires.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// How the error log reaches the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentInput {
    /// Appended as the final command-line argument
    #[default]
    Argument,
    /// Written to stdin, which is then closed
    Stdin,
}

#[derive(Debug, Clone)]
pub struct ProcessAgentConfig {
    pub program: String,
    pub args: Vec<String>,
    pub input: AgentInput,
    /// `None` waits indefinitely; only set it that way deliberately.
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessAgentConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input: AgentInput::default(),
            timeout: Some(DEFAULT_AGENT_TIMEOUT),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessAgentBridge {
    config: ProcessAgentConfig,
}

impl ProcessAgentBridge {
    pub fn new(config: ProcessAgentConfig) -> Self {
        Self { config }
    }

    fn command(&self, error_text: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        if self.config.input == AgentInput::Argument {
            cmd.arg(error_text);
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        // `kill_on_drop` reaps the child when the wait below times out.
        let stdin = match self.config.input {
            AgentInput::Stdin => Stdio::piped(),
            AgentInput::Argument => Stdio::null(),
        };
        cmd.stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AnalysisAgent for ProcessAgentBridge {
    fn name(&self) -> &str {
        &self.config.program
    }

    #[instrument(skip(self, error_text), fields(program = %self.config.program, input_len = error_text.len()), err)]
    async fn run(&self, error_text: &str) -> Result<String, AgentError> {
        let start = Instant::now();
        let mut child = self.command(error_text).spawn().map_err(|source| AgentError::Launch {
            program: self.config.program.clone(),
            source,
        })?;

        // Written from its own task so a child that fills its stdout pipe
        // before draining stdin cannot deadlock us.
        let stdin_task = child.stdin.take().map(|mut stdin| {
            let payload = error_text.as_bytes().to_vec();
            tokio::spawn(async move {
                // The process may exit without reading its input.
                let _ = stdin.write_all(&payload).await;
            })
        });

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let status = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_elapsed) => {
                    return Err(AgentError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            },
            None => child.wait().await?,
        };

        if let Some(task) = stdin_task {
            let _ = task.await;
        }
        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

        debug!(
            exit_code = status.code(),
            stdout_len = stdout.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "agent process exited"
        );

        if !status.success() {
            return Err(AgentError::Failure {
                exit_code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, input: AgentInput) -> ProcessAgentBridge {
        ProcessAgentBridge::new(ProcessAgentConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            input,
            timeout: Some(Duration::from_secs(10)),
            working_dir: None,
        })
    }

    #[tokio::test]
    async fn error_text_passed_as_argument() {
        // With `sh -c`, the first trailing argument becomes `$0`.
        let agent = sh(r#"printf '{"seen":"%s"}' "$0""#, AgentInput::Argument);
        let out = agent.run("npm ERR! boom").await.unwrap();
        assert_eq!(out, r#"{"seen":"npm ERR! boom"}"#);
    }

    #[tokio::test]
    async fn error_text_passed_on_stdin() {
        let agent = sh("cat", AgentInput::Stdin);
        let out = agent.run("line 1\nline 2").await.unwrap();
        assert_eq!(out, "line 1\nline 2");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_code_and_stderr() {
        let agent = sh("echo 'model quota exceeded' >&2; exit 3", AgentInput::Stdin);
        match agent.run("x").await.unwrap_err() {
            AgentError::Failure { exit_code, stderr } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "model quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_launch_failure() {
        let agent = ProcessAgentBridge::new(ProcessAgentConfig::new("/nonexistent/ci-agent"));
        let err = agent.run("x").await.unwrap_err();
        assert!(matches!(err, AgentError::Launch { .. }), "{err}");
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let mut config = ProcessAgentConfig::new("sh");
        config.args = vec!["-c".to_string(), "sleep 5".to_string()];
        config.timeout = Some(Duration::from_millis(100));

        let err = ProcessAgentBridge::new(config).run("x").await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }), "{err}");
    }

    #[test]
    fn new_config_has_bounded_wait() {
        assert_eq!(ProcessAgentConfig::new("python3").timeout, Some(DEFAULT_AGENT_TIMEOUT));
    }

    #[tokio::test]
    async fn large_output_is_not_capped() {
        let agent = sh("head -c 200000 /dev/zero | tr '\\0' 'a'", AgentInput::Stdin);
        assert_eq!(agent.run("").await.unwrap().len(), 200_000);
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let agent = sh("cat", AgentInput::Stdin);
        let (a, b) = tokio::join!(agent.run("first"), agent.run("second"));
        assert_eq!(a.unwrap(), "first");
        assert_eq!(b.unwrap(), "second");
    }
}
