pub mod backoff;
pub mod config;
pub mod lockfile;
pub mod mailer;
pub mod model;
pub mod scheduler;
pub mod trial;
pub mod trial_log;
