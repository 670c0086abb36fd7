use crate::mailer::{CredentialProvider, OutgoingMail};
use crate::model::{STATUS_TRANSPORT_ERROR, Trial, TrialMessage};
use crate::trial_log::{TrialLog, TrialLogError};
use time::OffsetDateTime;
use tracing::{error, info, warn};

#[derive(Clone, Copy)]
pub struct TrialContext<'a> {
    pub pid: u32,
    pub from_addr: &'a str,
    pub credentials: &'a dyn CredentialProvider,
    pub log: &'a dyn TrialLog,
}

#[derive(Debug)]
pub struct TrialReport {
    pub trial: Trial,
    pub logged: Result<(), TrialLogError>,
}

impl TrialReport {
    pub fn status(&self) -> u16 {
        self.trial.status
    }

    pub fn succeeded(&self) -> bool {
        self.trial.succeeded()
    }
}

/// Sends one message and logs it. The outcome goes back to the scheduler,
/// which owns the backoff state. Never sleeps and never retries.
pub fn run_trial(ctx: &TrialContext<'_>, sequence: u64) -> TrialReport {
    let started_at = OffsetDateTime::now_utc();
    let message = TrialMessage::for_sequence(sequence);
    let status = send_status(ctx, sequence, &message);
    let trial = Trial {
        pid: ctx.pid,
        sequence,
        started_at,
        message,
        status,
    };

    let logged = ctx.log.append(&trial);
    if let Err(err) = &logged {
        error!(sequence, status, error = %err, "failed to record trial");
    }

    if trial.succeeded() {
        info!(sequence, status, "trial succeeded");
        println!("{sequence}: Message sent successfully");
    } else {
        warn!(sequence, status, "trial failed");
        println!("{sequence}: Message send failed (status {status})");
    }

    TrialReport { trial, logged }
}

fn send_status(ctx: &TrialContext<'_>, sequence: u64, message: &TrialMessage) -> u16 {
    let mail = OutgoingMail {
        from: ctx.from_addr,
        to: &message.recipient,
        subject: &message.subject,
        body: &message.body,
    };
    match ctx
        .credentials
        .sender()
        .and_then(|sender| sender.send(&mail))
    {
        Ok(status) => status,
        Err(err) => {
            warn!(sequence, error = ?err, "send did not complete");
            STATUS_TRANSPORT_ERROR
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::mailer::{CredentialProvider, MailSender, OutgoingMail};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Returns scripted statuses keyed by recipient, 200 when unscripted.
    #[derive(Default)]
    pub(crate) struct ScriptedSender {
        by_recipient: Mutex<HashMap<String, VecDeque<anyhow::Result<u16>>>>,
        pub(crate) sent: Mutex<Vec<String>>,
    }

    impl ScriptedSender {
        pub(crate) fn fail_sequence(&self, sequence: u64, status: u16) {
            self.script(sequence, Ok(status));
        }

        pub(crate) fn transport_error(&self, sequence: u64) {
            self.script(sequence, Err(anyhow::anyhow!("connection reset")));
        }

        fn script(&self, sequence: u64, outcome: anyhow::Result<u16>) {
            self.by_recipient
                .lock()
                .unwrap()
                .entry(format!("test{sequence}@example.com"))
                .or_default()
                .push_back(outcome);
        }
    }

    impl MailSender for ScriptedSender {
        fn send(&self, mail: &OutgoingMail<'_>) -> anyhow::Result<u16> {
            self.sent.lock().unwrap().push(mail.to.to_string());
            self.by_recipient
                .lock()
                .unwrap()
                .get_mut(mail.to)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Ok(200))
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeCredentials {
        pub(crate) sender: Arc<ScriptedSender>,
        pub(crate) refreshes: AtomicUsize,
        pub(crate) broken: bool,
    }

    impl FakeCredentials {
        pub(crate) fn refresh_count(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    impl CredentialProvider for FakeCredentials {
        fn ensure_valid(&self) -> anyhow::Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn sender(&self) -> anyhow::Result<Arc<dyn MailSender>> {
            if self.broken {
                anyhow::bail!("token revoked");
            }
            let sender: Arc<dyn MailSender> = self.sender.clone();
            Ok(sender)
        }
    }
}
