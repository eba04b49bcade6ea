use serde::Deserialize;

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_tick_interval_seconds() -> u64 {
    60
}

fn default_notifier_max_concurrency() -> usize {
    16
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

fn default_sse_queue_depth() -> usize {
    64
}

fn default_store_backend() -> String {
    "memory".into()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_smtp_from() -> String {
    "reminders@habits.example".into()
}

fn default_pool_size() -> u32 {
    5
}

/// Top-level configuration, loaded from an optional TOML file and layered
/// over defaults matching the behavior of every field below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HabitConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub smtp: SmtpSection,
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    #[serde(default = "default_notifier_max_concurrency")]
    pub notifier_max_concurrency: usize,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    #[serde(default = "default_sse_queue_depth")]
    pub sse_queue_depth: usize,
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            smtp: SmtpSection::default(),
            tick_interval_seconds: default_tick_interval_seconds(),
            notifier_max_concurrency: default_notifier_max_concurrency(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            sse_queue_depth: default_sse_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Persistence backend selection. `backend` is either `"memory"` or
/// `"postgres"`; `url`/`pool_size` only matter for the latter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub tls: bool,
    #[serde(default = "default_smtp_from")]
    pub from_address: String,
}

impl Default for SmtpSection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: default_smtp_port(),
            username: None,
            password: None,
            tls: default_smtp_tls(),
            from_address: default_smtp_from(),
        }
    }
}

impl From<SmtpSection> for habit_notifier_email::SmtpConfig {
    fn from(section: SmtpSection) -> Self {
        habit_notifier_email::SmtpConfig {
            smtp_host: section.host,
            smtp_port: section.port,
            username: section.username,
            password: section.password,
            tls: section.tls,
            from_address: section.from_address,
        }
    }
}
