//! Command-line interface.

use std::collections::BTreeSet;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use verse_relay_core::capability::CapabilityPolicy;
use verse_relay_core::orchestrator::OrchestratorConfig;
use verse_relay_core::retry::RetryPolicy;

/// Relays chat requests to an LLM endpoint, augmented with tools
/// discovered from an upstream resource server.
#[derive(Debug, Parser)]
#[command(name = "verse-relay", version, about)]
pub struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub options: RelayOptions,

    /// What to run.
    #[command(subcommand)]
    pub command: Command,
}

/// The serving mode.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP chat-completion proxy.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8380")]
        listen: String,
    },
    /// Serve the line-oriented tool protocol on stdin/stdout.
    Stdio,
}

/// Everything the relay needs to talk to its two remote collaborators
/// and to restrict what callers can reach.
#[derive(Debug, Args)]
pub struct RelayOptions {
    /// Upstream tool-resource server URL.
    #[arg(long, env = "VERSE_RELAY_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Chat endpoint base URL.
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    pub llm_base_url: String,

    /// Chat endpoint API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Default model when the caller does not name one.
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Expose only this tool (repeatable). All tools when omitted.
    #[arg(long = "allow-tool", value_name = "NAME")]
    pub allow_tools: Vec<String>,

    /// Hide this parameter from every exposed tool schema (repeatable).
    #[arg(long = "hide-param", value_name = "NAME")]
    pub hide_params: Vec<String>,

    /// Drop book- and chapter-level annotations from tool results.
    #[arg(long)]
    pub suppress_annotations: bool,

    /// Force an argument field on every tool invocation (repeatable,
    /// `name=json`; bare values are taken as strings).
    #[arg(long = "force-arg", value_name = "NAME=JSON", value_parser = parse_force_arg)]
    pub force_args: Vec<(String, Value)>,

    /// Maximum tool-executing round-trips per request.
    #[arg(long, default_value_t = 5)]
    pub max_tool_iterations: u32,

    /// Per-attempt upstream timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Upstream retries after the initial attempt.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base upstream retry delay in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub retry_base_ms: u64,

    /// Backoff multiplier between upstream retries.
    #[arg(long, default_value_t = 2)]
    pub backoff_factor: u32,
}

impl RelayOptions {
    /// The capability policy these flags describe.
    pub fn capability_policy(&self) -> CapabilityPolicy {
        CapabilityPolicy {
            allowed_tools: if self.allow_tools.is_empty() {
                None
            } else {
                Some(self.allow_tools.iter().cloned().collect::<BTreeSet<_>>())
            },
            hidden_params: self.hide_params.iter().cloned().collect(),
            suppress_broad_annotations: self.suppress_annotations,
        }
    }

    /// The upstream retry policy these flags describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_ms),
            backoff_factor: self.backoff_factor,
            timeout: Duration::from_millis(self.timeout_ms),
            ..Default::default()
        }
    }

    /// The orchestrator configuration these flags describe.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut argument_overrides = Map::new();
        for (name, value) in &self.force_args {
            argument_overrides.insert(name.clone(), value.clone());
        }
        OrchestratorConfig {
            max_iterations: self.max_tool_iterations,
            argument_overrides,
        }
    }
}

fn parse_force_arg(raw: &str) -> Result<(String, Value), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err("expected NAME=JSON".to_owned());
    };
    if name.is_empty() {
        return Err("argument name is empty".to_owned());
    }
    // `--force-arg language=eng` is more convenient than requiring the
    // quotes a strict JSON string would need.
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((name.to_owned(), value))
}
