use std::env;
use std::time::Duration;

/// Configuration for the delivery worker pool and its retry behavior.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Maximum number of deliveries in flight at once.
    pub workers: usize,
    /// Initial backoff duration before the first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
    /// Per-attempt delivery timeout; an elapsed timeout counts as a
    /// transient failure.
    pub delivery_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();
        let config = Self {
            workers: parse_env("DISPATCH_WORKERS", defaults.workers)?,
            initial_backoff: Duration::from_millis(parse_env(
                "DISPATCH_INITIAL_BACKOFF_MS",
                defaults.initial_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(parse_env(
                "DISPATCH_MAX_BACKOFF_MS",
                defaults.max_backoff.as_millis() as u64,
            )?),
            backoff_multiplier: parse_env(
                "DISPATCH_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
            add_jitter: parse_env("DISPATCH_ADD_JITTER", defaults.add_jitter)?,
            delivery_timeout: Duration::from_secs(parse_env(
                "DISPATCH_DELIVERY_TIMEOUT_SECONDS",
                defaults.delivery_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.workers == 0 {
            anyhow::bail!("DISPATCH_WORKERS must be greater than 0");
        }
        if self.backoff_multiplier < 1.0 {
            anyhow::bail!("DISPATCH_BACKOFF_MULTIPLIER must be at least 1.0");
        }
        Ok(())
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand_jitter()) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external dependencies.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// SMTP relay settings for the production mail transport.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Self {
            host: require_env("SMTP_HOST")?,
            port: parse_env("SMTP_PORT", 587u16)?,
            user: require_env("SMTP_USER")?,
            password: require_env("SMTP_PASSWORD")?,
            from_email: require_env("SMTP_FROM_EMAIL")?,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Notifications".to_string()),
            timeout: Duration::from_secs(parse_env("SMTP_TIMEOUT_SECONDS", 10u64)?),
        })
    }
}

fn require_env(key: &str) -> Result<String, anyhow::Error> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} is required but not set", key))
}

fn parse_env<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
