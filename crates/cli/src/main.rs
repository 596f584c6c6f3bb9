// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Thin entry point (§2): translates environment variables into a
//! [`config::Config`], wires the concrete gateway/repo/LLM-dispatch
//! implementations into one [`cco_engine::Reactor`], and maps its
//! [`cco_engine::ReactorOutcome`] to a process exit code (§6).

mod config;
mod exit_error;

use std::sync::Arc;

use cco_core::{CredentialRing, SystemClock};
use cco_engine::{Reactor, ReactorOutcome};
use cco_git::Git2Repo;
use cco_llm::CodingAgentDispatch;
use cco_vcs::GithubGateway;
use tracing::{error, info};

use config::Config;
use exit_error::ExitError;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let code = match try_main().await {
        Ok(outcome) => {
            info!(?outcome, "reactor run finished");
            outcome.exit_code()
        }
        Err(e) => {
            error!(error = %e, "cco exited with an error");
            e.code
        }
    };
    std::process::exit(code);
}

async fn try_main() -> Result<ReactorOutcome, ExitError> {
    let config = Config::from_env().map_err(|e| ExitError::new(1, e.to_string()))?;
    run(config).await.map_err(|e| ExitError::new(1, e.to_string()))
}

async fn run(config: Config) -> anyhow::Result<ReactorOutcome> {
    let gateway = GithubGateway::new(config.github_token.clone(), config.repo_owner.clone(), config.repo_name.clone())?;

    let repo = Git2Repo::open(&config.workdir, config.github_token.clone())?;

    let ring = CredentialRing::new(config.claude_configs.clone())
        .map_err(|e| cco_core::Error::Config(format!("claude-configs: {e}")))?;
    let clock: Arc<dyn cco_core::Clock> = Arc::new(SystemClock);
    let llm = CodingAgentDispatch::new(config.coding_agent_executable.clone(), ring, clock.clone());

    let reactor = Reactor::new(
        gateway,
        repo,
        llm,
        clock,
        config.workflow_id.clone(),
        config.stall_timeout_minutes,
        config.orchestration.clone(),
        config.dispatch_stagger_ms,
    );

    let outcome = reactor.handle_event(config.event).await;
    Ok(outcome)
}
