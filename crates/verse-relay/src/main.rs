//! The relay CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use verse_relay::cli::{Cli, Command};
use verse_relay::{server, stdio};
use verse_relay_core::Orchestrator;
use verse_relay_core::upstream::{HttpTransport, UpstreamClient};
use verse_relay_openai_backend::{OpenAIBackend, OpenAIConfigBuilder};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let options = &cli.options;

    let transport = HttpTransport::new(
        reqwest::Client::new(),
        options.upstream_url.clone(),
        options.retry_policy(),
    );
    let upstream = Arc::new(UpstreamClient::new(Arc::new(transport)));
    let policy = options.capability_policy();

    let result = match cli.command {
        Command::Serve { ref listen } => {
            let config = OpenAIConfigBuilder::with_api_key(&options.api_key)
                .with_model(&options.model)
                .with_base_url(&options.llm_base_url)
                .build();
            let orchestrator = Orchestrator::new(
                OpenAIBackend::new(config),
                upstream,
                policy,
                options.orchestrator_config(),
            );
            let state = Arc::new(server::AppState { orchestrator });
            server::run(state, listen).await
        }
        Command::Stdio => {
            let overrides = options.orchestrator_config().argument_overrides;
            stdio::StdioServer::new(upstream, policy, overrides)
                .run()
                .await
        }
    };

    if let Err(err) = result {
        eprintln!("verse-relay: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
