pub mod auth;
pub mod credentials;
pub mod gmail;
pub mod http;
pub mod message;

pub use credentials::GmailCredentials;
pub use gmail::GmailSender;
