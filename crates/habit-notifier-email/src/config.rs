/// SMTP connection settings for the email notifier adapter.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub from_address: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".into(),
            smtp_port: 587,
            username: None,
            password: None,
            tls: true,
            from_address: "reminders@habits.example".into(),
        }
    }
}
