use std::time::Duration;

use reqwest::Client;

/// Outcome of a [`ping`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReport {
    pub attempts: u32,
    pub succeeded: u32,
}

impl PingReport {
    /// True when at least one attempt got a 2xx response.
    pub fn any_ok(&self) -> bool {
        self.succeeded > 0
    }
}

/// `GET {base_url}/health` `count` times in sequence, logging each status and
/// body. Failed attempts are logged and do not stop the run.
pub async fn ping(base_url: &str, count: u32) -> PingReport {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new());
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let mut report = PingReport {
        attempts: 0,
        succeeded: 0,
    };
    for attempt in 1..=count {
        report.attempts += 1;
        match client.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status();
                tracing::info!(attempt, "Status: {}", status.as_u16());
                match resp.text().await {
                    Ok(body) => tracing::info!(attempt, "Body: {body}"),
                    Err(e) => tracing::warn!(attempt, "failed to read body: {e}"),
                }
                if status.is_success() {
                    report.succeeded += 1;
                }
            }
            Err(e) => tracing::error!(attempt, "request to {url} failed: {e}"),
        }
    }
    report
}
