//! Synthetic notification traffic for exercising a running server.
//!
//! Generation is a pure function of a [`GeneratorConfig`], a reference instant
//! and a caller-supplied RNG; delivery goes through the public ingestion
//! endpoint with bounded retries.

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime, Time};
use tracing::{info, warn};

use crate::models::NewNotification;

/// Upper bound for `days_before` and `days_after`.
pub const MAX_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub days_before: i64,
    pub days_after: i64,
    pub min_per_day: u32,
    pub max_per_day: u32,
    pub delay: Duration,
    pub server_url: String,
    pub devices: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            days_before: 14,
            days_after: 14,
            min_per_day: 2,
            max_per_day: 5,
            delay: Duration::from_millis(500),
            server_url: "http://localhost:8080".to_string(),
            devices: vec!["phone1".into(), "phone2".into(), "tablet1".into()],
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.days_before < 0 {
            bail!("days-before must be non-negative");
        }
        if self.days_after < 0 {
            bail!("days-after must be non-negative");
        }
        if self.days_before > MAX_WINDOW_DAYS || self.days_after > MAX_WINDOW_DAYS {
            bail!("days-before and days-after must be at most {}", MAX_WINDOW_DAYS);
        }
        if self.min_per_day < 1 {
            bail!("min-per-day must be at least 1");
        }
        if self.max_per_day < self.min_per_day {
            bail!("max-per-day must be greater than or equal to min-per-day");
        }
        if self.server_url.trim().is_empty() {
            bail!("server URL cannot be empty");
        }
        if self.devices.iter().all(|d| d.trim().is_empty()) {
            bail!("devices cannot be empty");
        }
        Ok(())
    }
}

struct AppInfo {
    package_name: &'static str,
    name: &'static str,
}

const MESSAGING_APPS: &[AppInfo] = &[
    AppInfo { package_name: "com.whatsapp", name: "WhatsApp" },
    AppInfo { package_name: "com.facebook.orca", name: "Messenger" },
    AppInfo { package_name: "com.telegram", name: "Telegram" },
    AppInfo { package_name: "com.snapchat.android", name: "Snapchat" },
    AppInfo { package_name: "com.instagram.android", name: "Instagram" },
];

const EMAIL_APPS: &[AppInfo] = &[
    AppInfo { package_name: "com.google.android.gm", name: "Gmail" },
    AppInfo { package_name: "com.microsoft.office.outlook", name: "Outlook" },
    AppInfo { package_name: "com.yahoo.mobile.client.android.mail", name: "Yahoo Mail" },
];

const SYSTEM_APPS: &[AppInfo] = &[
    AppInfo { package_name: "com.android.systemui", name: "System" },
    AppInfo { package_name: "com.google.android.apps.nexuslauncher", name: "Launcher" },
    AppInfo { package_name: "com.android.settings", name: "Settings" },
];

const ENTERTAINMENT_APPS: &[AppInfo] = &[
    AppInfo { package_name: "com.netflix.mediaclient", name: "Netflix" },
    AppInfo { package_name: "com.spotify.music", name: "Spotify" },
    AppInfo { package_name: "com.google.android.youtube", name: "YouTube" },
    AppInfo { package_name: "com.amazon.avod.thirdpartyclient", name: "Prime Video" },
];

const MESSAGING_SENDERS: &[&str] = &["John", "Alice", "Bob", "Charlie", "Diana", "Emma"];
const EMAIL_SENDERS: &[&str] = &[
    "boss@company.com",
    "hr@company.com",
    "team@project.com",
    "support@service.com",
];

fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> &'a T {
    // Every table above is non-empty.
    &items[rng.gen_range(0..items.len())]
}

fn random_time_on<R: Rng + ?Sized>(day: OffsetDateTime, rng: &mut R) -> OffsetDateTime {
    let time = Time::from_hms(rng.gen_range(0..24), rng.gen_range(0..60), rng.gen_range(0..60))
        .unwrap_or(Time::MIDNIGHT);
    day.to_offset(time::UtcOffset::UTC).replace_time(time)
}

fn random_notification<R: Rng + ?Sized>(
    device_id: &str,
    day: OffsetDateTime,
    rng: &mut R,
) -> NewNotification {
    let timestamp = random_time_on(day, rng);
    let (title, message, package_name, from) = match rng.gen_range(0..4) {
        0 => {
            let app = pick(MESSAGING_APPS, rng);
            let sender = *pick(MESSAGING_SENDERS, rng);
            (
                format!("New message from {}", sender),
                "Hey, how are you?".to_string(),
                app.package_name,
                sender.to_string(),
            )
        }
        1 => {
            let app = pick(EMAIL_APPS, rng);
            let sender = *pick(EMAIL_SENDERS, rng);
            (
                format!("New email from {}", sender),
                "Important update about the project".to_string(),
                app.package_name,
                sender.to_string(),
            )
        }
        2 => {
            let app = pick(SYSTEM_APPS, rng);
            (
                "System Update Available".to_string(),
                "A new system update is ready to install".to_string(),
                app.package_name,
                "System".to_string(),
            )
        }
        _ => {
            let app = pick(ENTERTAINMENT_APPS, rng);
            (
                "New content available".to_string(),
                "Check out the latest releases".to_string(),
                app.package_name,
                app.name.to_string(),
            )
        }
    };

    NewNotification {
        title,
        message,
        timestamp,
        package_name: package_name.to_string(),
        from,
        device_id: device_id.to_string(),
    }
}

/// Builds the full batch for every device and every day in
/// `[now - days_before, now + days_after)`. Days that fall outside the
/// representable calendar are skipped.
pub fn generate<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    now: OffsetDateTime,
    rng: &mut R,
) -> Vec<NewNotification> {
    let mut batch = Vec::new();
    let devices = config.devices.iter().map(|d| d.trim()).filter(|d| !d.is_empty());

    for device in devices {
        for offset in -config.days_before..config.days_after {
            let Some(day) = now.checked_add(TimeDuration::days(offset)) else {
                continue;
            };
            let count = rng.gen_range(config.min_per_day..=config.max_per_day);
            for _ in 0..count {
                batch.push(random_notification(device, day, rng));
            }
        }
    }

    batch
}

/// Shuffled copy of `batch`, so that ingestion order differs from time order.
pub fn shuffled<R: Rng + ?Sized>(mut batch: Vec<NewNotification>, rng: &mut R) -> Vec<NewNotification> {
    batch.shuffle(rng);
    batch
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Polls `{server_url}/health` until it answers 200.
pub async fn wait_for_server(
    client: &Client,
    server_url: &str,
    max_retries: u32,
    retry_delay: Duration,
) -> Result<()> {
    let url = format!("{}/health", server_url.trim_end_matches('/'));
    for attempt in 1..=max_retries {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => warn!(status = %resp.status(), "Server not ready"),
            Err(e) => warn!(error = %e, "Server not reachable"),
        }
        info!("Waiting for server to be ready (attempt {}/{})...", attempt, max_retries);
        tokio::time::sleep(retry_delay).await;
    }
    bail!("server not ready after {} attempts", max_retries)
}

/// POSTs one notification, retrying transport failures and non-2xx answers
/// with exponential backoff.
pub async fn send_with_retry(
    client: &Client,
    server_url: &str,
    notification: &NewNotification,
    policy: &RetryPolicy,
) -> Result<()> {
    let url = format!("{}/api/notifications", server_url.trim_end_matches('/'));

    for attempt in 0..policy.attempts {
        let last = attempt + 1 == policy.attempts;
        match client.post(&url).json(notification).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status();
                if last {
                    bail!("unexpected status code: {}", status);
                }
                let delay = policy.backoff(attempt);
                warn!(%status, ?delay, "Unexpected status code, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if last {
                    return Err(e).context("error sending notification");
                }
                let delay = policy.backoff(attempt);
                warn!(error = %e, ?delay, "Error sending notification, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }

    bail!("failed to send notification after {} attempts", policy.attempts)
}

/// Sends `batch` one by one, pausing `delay` between requests.
pub async fn send_all(
    client: &Client,
    config: &GeneratorConfig,
    batch: &[NewNotification],
    policy: &RetryPolicy,
) -> Result<usize> {
    for (sent, notification) in batch.iter().enumerate() {
        send_with_retry(client, &config.server_url, notification, policy)
            .await
            .with_context(|| format!("notification {} of {}", sent + 1, batch.len()))?;
        if !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
    }
    Ok(batch.len())
}
