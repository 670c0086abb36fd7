use crate::backoff::{BackoffPolicy, BackoffState};
use crate::config::ProbeConfig;
use crate::trial::{TrialContext, TrialReport, run_trial};
use anyhow::Context;
use std::ops::Range;
use std::panic;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerSettings {
    pub batch_size: usize,
    pub policy: BackoffPolicy,
    pub credential_refresh: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            policy: BackoffPolicy::default(),
            credential_refresh: Duration::from_secs(600),
        }
    }
}

impl From<&ProbeConfig> for SchedulerSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            policy: config.backoff_policy(),
            credential_refresh: config.credential_refresh_interval(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Batch { sequences: Range<u64> },
    Single { sequence: u64, delay: Duration },
}

#[derive(Debug)]
pub struct IterationReport {
    pub step: Step,
    pub trials: Vec<TrialReport>,
}

pub struct Scheduler<'a> {
    ctx: TrialContext<'a>,
    backoff: &'a BackoffState,
    settings: SchedulerSettings,
    sleeper: &'a dyn Sleeper,
    next_sequence: u64,
    last_refresh: Option<Instant>,
}

impl<'a> Scheduler<'a> {
    pub fn start(
        ctx: TrialContext<'a>,
        backoff: &'a BackoffState,
        settings: SchedulerSettings,
        sleeper: &'a dyn Sleeper,
    ) -> anyhow::Result<Self> {
        let last = ctx
            .log
            .last_sequence()
            .context("read last trial number from log")?;
        info!(
            last_trial = last,
            batch_size = settings.batch_size,
            "scheduler starting"
        );
        Ok(Self {
            ctx,
            backoff,
            settings,
            sleeper,
            next_sequence: last + 1,
            last_refresh: None,
        })
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn plan(&mut self) -> Step {
        let state = self.backoff.snapshot();
        if state.active {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            return Step::Single {
                sequence,
                delay: self.settings.policy.delay(state.retries),
            };
        }
        self.backoff.reset_retries();
        let start = self.next_sequence;
        self.next_sequence += self.settings.batch_size as u64;
        Step::Batch {
            sequences: start..self.next_sequence,
        }
    }

    pub fn run_iteration(&mut self) -> IterationReport {
        self.refresh_credentials_if_due();
        let before = self.backoff.snapshot().mode();
        let step = self.plan();
        let trials = match &step {
            Step::Single { sequence, delay } => {
                info!(
                    sequence,
                    mode = %before,
                    delay_ms = delay.as_millis() as u64,
                    "backing off"
                );
                println!("Sleeping for {:.3} seconds...", delay.as_secs_f64());
                self.sleeper.sleep(*delay);
                let report = run_trial(&self.ctx, *sequence);
                if report.succeeded() {
                    self.backoff.record_success();
                } else {
                    self.backoff.record_failure();
                }
                self.backoff.advance_retry();
                vec![report]
            }
            Step::Batch { sequences } => {
                debug!(
                    mode = %before,
                    first = sequences.start,
                    count = sequences.end - sequences.start,
                    "dispatching batch"
                );
                let reports = run_batch(&self.ctx, sequences.clone());
                // any failure in the round wins over its successes
                if reports.iter().all(TrialReport::succeeded) {
                    self.backoff.record_success();
                } else {
                    self.backoff.record_failure();
                }
                reports
            }
        };
        let after = self.backoff.snapshot().mode();
        if after != before {
            info!(from = %before, to = %after, "mode changed");
        }
        IterationReport { step, trials }
    }

    pub fn run_forever(&mut self) -> ! {
        loop {
            self.run_iteration();
        }
    }

    fn refresh_credentials_if_due(&mut self) {
        let due = self
            .last_refresh
            .is_none_or(|last| last.elapsed() >= self.settings.credential_refresh);
        if !due {
            return;
        }
        match self.ctx.credentials.ensure_valid() {
            Ok(()) => self.last_refresh = Some(Instant::now()),
            Err(err) => warn!(error = ?err, "credential refresh failed; will retry"),
        }
    }
}

fn run_batch(ctx: &TrialContext<'_>, sequences: Range<u64>) -> Vec<TrialReport> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = sequences
            .map(|sequence| scope.spawn(move || run_trial(ctx, sequence)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            })
            .collect()
    })
}
