//! SMTP email delivery adapter implementing the `habit_notifier::Notifier`
//! port.

mod config;
mod smtp;

pub use config::SmtpConfig;
pub use smtp::EmailNotifier;
