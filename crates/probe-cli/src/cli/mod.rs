use anyhow::Context;
use clap::Parser;
use probe_core::backoff::BackoffState;
use probe_core::config::{ProbeConfig, default_config_path, from_addr_from_env};
use probe_core::lockfile::RunLock;
use probe_core::scheduler::{Scheduler, SchedulerSettings, ThreadSleeper};
use probe_core::trial::TrialContext;
use probe_core::trial_log::{CsvTrialLog, TrialLog};
use probe_providers::GmailCredentials;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod args;
mod log_cmd;
mod run_cmd;
#[cfg(test)]
mod tests;
mod token_cmd;

use args::*;

use log_cmd::{handle_last_trial, handle_summary};
use run_cmd::handle_run;
use token_cmd::handle_token;

pub fn run() -> anyhow::Result<()> {
    app::run()
}
