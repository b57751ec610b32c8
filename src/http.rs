use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tracing::debug;

use crate::config::{SiteProfile, USER_AGENT};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fetches decoded page text with whatever authentication the implementor holds.
pub trait PageFetcher {
    fn fetch_text(&self, url: &str) -> Result<String>;
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

pub(crate) fn build_agent(connect_timeout: Duration, read_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .timeout_read(read_timeout)
        .timeout_write(read_timeout)
        .user_agent(USER_AGENT)
        .build()
}

enum Attempt {
    Done(String),
    Retry(String),
    Fail(String),
}

fn attempt_get(agent: &ureq::Agent, url: &str, headers: &[(String, String)]) -> Attempt {
    let mut request = agent.get(url);
    for (key, value) in headers {
        request = request.set(key, value);
    }

    match request.call() {
        Ok(response) => match response.into_string() {
            Ok(body) => Attempt::Done(body),
            Err(err) => Attempt::Fail(format!("response decode failed: {err}")),
        },
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            let body = body.trim();
            let detail = if body.is_empty() {
                format!("HTTP status {status}")
            } else {
                let excerpt = body.chars().take(240).collect::<String>();
                format!("HTTP status {status} ({excerpt})")
            };
            if should_retry_http_status(status) {
                Attempt::Retry(detail)
            } else {
                Attempt::Fail(detail)
            }
        }
        Err(ureq::Error::Transport(err)) => Attempt::Retry(format!("transport error: {err}")),
    }
}

/// GETs `url`, retrying throttling, server errors and transport failures.
pub(crate) fn get_text_with_retries(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(String, String)],
    attempts: usize,
    retry_delay: Duration,
) -> Result<String, String> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match attempt_get(agent, url, headers) {
            Attempt::Done(body) => return Ok(body),
            Attempt::Fail(err) => return Err(format!("request failed: {err}")),
            Attempt::Retry(err) => {
                debug!(url, attempt, "retryable failure: {err}");
                last_error = err;
                if attempt < attempts {
                    thread::sleep(retry_delay);
                }
            }
        }
    }

    Err(format!(
        "request failed after {attempts} attempt(s): {last_error}"
    ))
}

/// Pulls a named cookie value out of raw `Set-Cookie` header values.
pub(crate) fn cookie_value(set_cookie_headers: &[&str], name: &str) -> Option<String> {
    set_cookie_headers.iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

/// Interprets the JSON body returned by `login_ajax`.
pub(crate) fn check_login_response(raw: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(raw).context("login response is not valid JSON")?;
    if parsed.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let message = parsed
        .get("value")
        .and_then(Value::as_str)
        .unwrap_or("Wrong Email or Password.");
    bail!("{message}")
}

/// Authenticated session against one Open edX site; cookies live in the agent.
pub struct Session {
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
}

impl Session {
    pub fn login(site: &SiteProfile, username: &str, password: &str) -> Result<Self> {
        let agent = build_agent(CONNECT_TIMEOUT, READ_TIMEOUT);
        let login_url = site.login_url();

        debug!(site = site.name, url = %login_url, "requesting initial csrf token");
        let csrf_token = match agent.get(&login_url).call() {
            Ok(response) => cookie_value(&response.all("set-cookie"), "csrftoken"),
            Err(ureq::Error::Status(_, response)) => {
                cookie_value(&response.all("set-cookie"), "csrftoken")
            }
            Err(err) => {
                return Err(anyhow!(err))
                    .with_context(|| format!("failed to reach {}", site.base_url));
            }
        }
        .unwrap_or_default();

        let headers = vec![
            (
                "Accept".to_string(),
                "application/json, text/javascript, */*; q=0.01".to_string(),
            ),
            ("Referer".to_string(), login_url.clone()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
            ("X-CSRFToken".to_string(), csrf_token),
        ];

        let mut request = agent.post(&login_url);
        for (key, value) in &headers {
            request = request.set(key, value);
        }
        let body = match request.send_form(&[
            ("email", username),
            ("password", password),
            ("remember", "false"),
        ]) {
            Ok(response) => response.into_string(),
            Err(ureq::Error::Status(_, response)) => response.into_string(),
            Err(err) => return Err(anyhow!(err)).context("login request failed"),
        }
        .context("failed to read login response")?;
        check_login_response(&body)?;

        Ok(Self { agent, headers })
    }
}

impl PageFetcher for Session {
    fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url, "fetching page");
        get_text_with_retries(&self.agent, url, &self.headers, ATTEMPTS, RETRY_DELAY)
            .map_err(|err| anyhow!("{url}: {err}"))
    }
}
