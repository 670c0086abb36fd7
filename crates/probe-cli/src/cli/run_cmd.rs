use super::*;

pub(super) fn handle_run(args: RunArgs, mut config: ProbeConfig) -> anyhow::Result<()> {
    let from_addr = from_addr_from_env()?;
    apply_run_overrides(&mut config, &args);
    config.validate()?;

    let _lock = RunLock::acquire(&config.log_path)?;
    let credentials = GmailCredentials::load(&config.token_path, config.send_endpoint.clone())
        .context("load mail credentials")?;
    let log = CsvTrialLog::new(config.log_path.clone());
    let backoff = BackoffState::new();
    let sleeper = ThreadSleeper;
    let ctx = TrialContext {
        pid: std::process::id(),
        from_addr: &from_addr,
        credentials: &credentials,
        log: &log,
    };

    let settings = SchedulerSettings::from(&config);
    let mut scheduler = Scheduler::start(ctx, &backoff, settings, &sleeper)?;
    info!(
        from = %from_addr,
        log = %config.log_path.display(),
        first_trial = scheduler.next_sequence(),
        "probe running"
    );
    scheduler.run_forever()
}

pub(super) fn apply_run_overrides(config: &mut ProbeConfig, args: &RunArgs) {
    if let Some(log) = &args.log {
        config.log_path = log.clone();
    }
    if let Some(token) = &args.token {
        config.token_path = token.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
}
