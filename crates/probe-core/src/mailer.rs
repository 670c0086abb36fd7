use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct OutgoingMail<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

pub trait MailSender: Send + Sync {
    /// HTTP-style status of the send. `Err` means no status was obtained.
    fn send(&self, mail: &OutgoingMail<'_>) -> anyhow::Result<u16>;
}

pub trait CredentialProvider: Send + Sync {
    fn ensure_valid(&self) -> anyhow::Result<()>;

    fn sender(&self) -> anyhow::Result<Arc<dyn MailSender>>;
}
