use crate::error::{AppError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Characters `encodeURIComponent` leaves untouched.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const USER_AGENT: &str = "newsmill/0.1 (feed aggregator)";

/// Build the shared HTTP client. Timeouts are applied per proxy attempt, not here.
pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .build()?)
}

/// Fetches a URL through an ordered list of CORS proxies.
///
/// Each template contains `{url}`, which is replaced with the percent-encoded
/// target. Proxies are tried in order; a failed or timed-out attempt moves on
/// to the next one. There are no retries beyond the list.
#[derive(Clone)]
pub struct ProxyFetcher {
    client: Client,
    templates: Vec<String>,
    timeout: Duration,
}

impl ProxyFetcher {
    pub fn new(client: Client, templates: Vec<String>, timeout: Duration) -> Self {
        Self {
            client,
            templates,
            timeout,
        }
    }

    pub fn proxied_url(template: &str, target: &str) -> String {
        let encoded = utf8_percent_encode(target, URL_COMPONENT).to_string();
        template.replace("{url}", &encoded)
    }

    /// Returns the body from the first proxy that answers with a success status
    /// within the timeout, or [`AppError::FetchExhausted`].
    pub async fn fetch(&self, url: &str) -> Result<String> {
        for (index, template) in self.templates.iter().enumerate() {
            let proxied = Self::proxied_url(template, url);
            match tokio::time::timeout(self.timeout, self.attempt(&proxied)).await {
                Ok(Ok(body)) => {
                    debug!(url = %url, proxy = index, bytes = body.len(), "Fetched via proxy");
                    return Ok(body);
                }
                Ok(Err(e)) => {
                    warn!(url = %url, proxy = index, error = %e, "Proxy attempt failed");
                }
                Err(_) => {
                    warn!(
                        url = %url,
                        proxy = index,
                        timeout_secs = self.timeout.as_secs(),
                        "Proxy attempt timed out"
                    );
                }
            }
        }

        Err(AppError::FetchExhausted {
            url: url.to_string(),
        })
    }

    async fn attempt(&self, proxied: &str) -> std::result::Result<String, reqwest::Error> {
        let response = self.client.get(proxied).send().await?.error_for_status()?;
        response.text().await
    }
}
