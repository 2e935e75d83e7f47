//! Environment-driven configuration.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::agent::{AgentInput, DEFAULT_AGENT_TIMEOUT, ProcessAgentConfig};
use crate::jobs::{OrchestratorConfig, StoreMode, StoreSettings};

#[derive(Debug, Clone)]
pub struct CiFixerConfig {
    pub store: StoreSettings,
    pub orchestrator: OrchestratorConfig,
    /// `None` runs the offline rule-based agent.
    pub agent: Option<ProcessAgentConfig>,
    pub port: u16,
}

impl Default for CiFixerConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            orchestrator: OrchestratorConfig::default(),
            agent: None,
            port: 3000,
        }
    }
}

impl CiFixerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to their
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parsed = |key: &str| parse::<u64>(key, var(key));
        let defaults = Self::default();

        let redis_url = var("REDIS_URL").unwrap_or_else(|| {
            let host = var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
            let port = var("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
            match var("REDIS_PASSWORD") {
                Some(password) => format!("redis://:{password}@{host}:{port}"),
                None => format!("redis://{host}:{port}"),
            }
        });

        let mode = match var("JOB_STORE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("auto") | Some("redis") => StoreMode::Auto,
            Some("memory") => StoreMode::Memory,
            Some(other) => {
                warn!(key = "JOB_STORE", value = other, "unknown job store mode; using auto");
                StoreMode::Auto
            }
        };

        let max_history = parse("MAX_HISTORY_SIZE", var("MAX_HISTORY_SIZE"))
            .unwrap_or(defaults.orchestrator.max_history)
            .max(1);

        let store = StoreSettings {
            mode,
            redis_url,
            connect_timeout: parsed("REDIS_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store.connect_timeout),
            max_history,
        };

        let orchestrator = OrchestratorConfig {
            job_ttl: parsed("JOB_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.orchestrator.job_ttl),
            stored_log_length: parse("STORED_LOG_LENGTH", var("STORED_LOG_LENGTH"))
                .unwrap_or(defaults.orchestrator.stored_log_length),
            agent_log_length: parse("AI_LOG_LENGTH", var("AI_LOG_LENGTH"))
                .unwrap_or(defaults.orchestrator.agent_log_length),
            max_history,
            max_concurrent_agents: parse("MAX_CONCURRENT_AGENTS", var("MAX_CONCURRENT_AGENTS")),
        };

        let agent = var("AGENT_PROGRAM").map(|program| ProcessAgentConfig {
            program,
            args: var("AGENT_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            input: match var("AGENT_INPUT").as_deref() {
                Some("stdin") => AgentInput::Stdin,
                None | Some("argument") => AgentInput::Argument,
                Some(other) => {
                    warn!(key = "AGENT_INPUT", value = other, "unknown agent input; using argument");
                    AgentInput::Argument
                }
            },
            timeout: agent_timeout(var("AGENT_TIMEOUT_SECS")),
            working_dir: None,
        });
        if let Some(limit) = agent.as_ref().and_then(|a| a.timeout) {
            if limit >= orchestrator.job_ttl {
                warn!(
                    agent_timeout_secs = limit.as_secs(),
                    job_ttl_secs = orchestrator.job_ttl.as_secs(),
                    "agent timeout is not shorter than the job TTL; hung jobs may expire before failing"
                );
            }
        }

        let port = parse("PORT", var("PORT")).unwrap_or(defaults.port);

        Self {
            store,
            orchestrator,
            agent,
            port,
        }
    }
}

/// Unset means the default bound; `0` or `none` opts out of waiting limits.
fn agent_timeout(value: Option<String>) -> Option<Duration> {
    match value.as_deref() {
        None => Some(DEFAULT_AGENT_TIMEOUT),
        Some("0") | Some("none") => None,
        Some(_) => Some(
            parse::<u64>("AGENT_TIMEOUT_SECS", value)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_AGENT_TIMEOUT),
        ),
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = key, value = %value, "invalid configuration value; using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> CiFixerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CiFixerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let c = config(&[]);
        assert_eq!(c.store.mode, StoreMode::Auto);
        assert_eq!(c.store.redis_url, "redis://localhost:6379");
        assert_eq!(c.store.connect_timeout, Duration::from_secs(2));
        assert_eq!(c.orchestrator.job_ttl, Duration::from_secs(3600));
        assert_eq!(c.orchestrator.max_history, 100);
        assert_eq!(c.orchestrator.stored_log_length, 2000);
        assert_eq!(c.orchestrator.agent_log_length, 5000);
        assert_eq!(c.orchestrator.max_concurrent_agents, None);
        assert!(c.agent.is_none());
        assert_eq!(c.port, 3000);
    }

    #[test]
    fn redis_url_built_from_parts() {
        let c = config(&[("REDIS_HOST", "cache"), ("REDIS_PORT", "6380"), ("REDIS_PASSWORD", "s3cret")]);
        assert_eq!(c.store.redis_url, "redis://:s3cret@cache:6380");

        let c = config(&[("REDIS_URL", "redis://redis:6379/2"), ("REDIS_HOST", "ignored")]);
        assert_eq!(c.store.redis_url, "redis://redis:6379/2");
    }

    #[test]
    fn agent_program_enables_process_bridge() {
        let c = config(&[
            ("AGENT_PROGRAM", "python3"),
            ("AGENT_ARGS", "agent/main.py --quiet"),
            ("AGENT_INPUT", "stdin"),
            ("AGENT_TIMEOUT_SECS", "120"),
        ]);
        let agent = c.agent.unwrap();
        assert_eq!(agent.program, "python3");
        assert_eq!(agent.args, vec!["agent/main.py", "--quiet"]);
        assert_eq!(agent.input, AgentInput::Stdin);
        assert_eq!(agent.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn agent_wait_is_bounded_by_default() {
        let agent = config(&[("AGENT_PROGRAM", "sh")]).agent.unwrap();
        assert_eq!(agent.timeout, Some(DEFAULT_AGENT_TIMEOUT));
        assert!(DEFAULT_AGENT_TIMEOUT < OrchestratorConfig::default().job_ttl);

        let agent = config(&[("AGENT_PROGRAM", "sh"), ("AGENT_TIMEOUT_SECS", "soon")]).agent.unwrap();
        assert_eq!(agent.timeout, Some(DEFAULT_AGENT_TIMEOUT));

        let agent = config(&[("AGENT_PROGRAM", "sh"), ("AGENT_TIMEOUT_SECS", "0")]).agent.unwrap();
        assert_eq!(agent.timeout, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let c = config(&[
            ("PORT", "http"),
            ("MAX_HISTORY_SIZE", "0"),
            ("JOB_STORE", "postgres"),
            ("MAX_CONCURRENT_AGENTS", "-3"),
        ]);
        assert_eq!(c.port, 3000);
        assert_eq!(c.orchestrator.max_history, 1);
        assert_eq!(c.store.max_history, 1);
        assert_eq!(c.store.mode, StoreMode::Auto);
        assert_eq!(c.orchestrator.max_concurrent_agents, None);
    }

    #[test]
    fn memory_mode_and_gate() {
        let c = config(&[("JOB_STORE", "Memory"), ("MAX_CONCURRENT_AGENTS", "4")]);
        assert_eq!(c.store.mode, StoreMode::Memory);
        assert_eq!(c.orchestrator.max_concurrent_agents, Some(4));
    }
}
