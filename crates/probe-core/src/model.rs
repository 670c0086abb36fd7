use std::fmt;
use time::OffsetDateTime;

pub const STATUS_OK: u16 = 200;

/// Status recorded when the send never produced an HTTP response.
pub const STATUS_TRANSPORT_ERROR: u16 = 0;

pub fn is_success(status: u16) -> bool {
    status == STATUS_OK
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrialMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl TrialMessage {
    pub fn for_sequence(sequence: u64) -> Self {
        Self {
            recipient: format!("test{sequence}@example.com"),
            subject: format!("Test email {sequence}"),
            body: format!("This is test email #{sequence}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trial {
    pub pid: u32,
    pub sequence: u64,
    pub started_at: OffsetDateTime,
    pub message: TrialMessage,
    pub status: u16,
}

impl Trial {
    pub fn succeeded(&self) -> bool {
        is_success(self.status)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Normal,
    Degraded,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Degraded => "degraded",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
