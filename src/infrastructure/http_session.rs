//! Static HTTP session for server-rendered listings
//!
//! A `BrowserPage` backed by `reqwest`: navigation fetches the document, the
//! network is idle as soon as the body arrived, and "clicking" follows the
//! control's link or submits its enclosing GET form. Script-driven controls
//! report `Unsupported`, which the pagination controller treats as a failed
//! activation.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::browser::{BrowserPage, SessionError, SessionFactory, SessionResult, Snapshot};
use crate::domain::SiteTarget;
use crate::extraction::text::resolve_href;

/// Configuration for the static HTTP session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSessionConfig {
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Redirect hops followed per request (0 disables redirects)
    pub max_redirects: usize,
    pub accept_language: String,
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 30,
            max_redirects: 10,
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

/// Opens one `HttpPage` per run; pages share the connection pool only
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    client: Client,
    request_timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(config: &HttpSessionConfig) -> SessionResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&config.accept_language) {
            headers.insert(reqwest::header::ACCEPT_LANGUAGE, value);
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.max_redirects > 0 {
                reqwest::redirect::Policy::limited(config.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| SessionError::Transport(format!("Failed to create HTTP client: {e}")))?;

        info!("🌐 HTTP session factory ready (timeout {}s)", config.request_timeout_secs);
        Ok(Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, target: &SiteTarget) -> SessionResult<Box<dyn BrowserPage>> {
        debug!("Opening HTTP page for {}", target.company);
        Ok(Box::new(HttpPage::new(self.client.clone(), self.request_timeout)))
    }
}

pub struct HttpPage {
    client: Client,
    /// Bound for navigations triggered by `click`
    click_timeout: Duration,
    url: String,
    html: String,
    closed: bool,
}

impl HttpPage {
    pub fn new(client: Client, click_timeout: Duration) -> Self {
        Self {
            client,
            click_timeout,
            url: "about:blank".to_string(),
            html: String::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn fetch(&mut self, url: &str, timeout: Duration) -> SessionResult<()> {
        self.ensure_open()?;
        let to_session_error = |e: reqwest::Error| {
            if e.is_timeout() {
                SessionError::timeout("goto", timeout)
            } else {
                SessionError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(to_session_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(to_session_error)?;
        debug!("Fetched {} ({} bytes)", final_url, body.len());

        self.url = final_url;
        self.html = body;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> SessionResult<()> {
        self.fetch(url, timeout).await
    }

    async fn reload(&mut self, timeout: Duration) -> SessionResult<()> {
        let url = self.url.clone();
        self.fetch(&url, timeout).await
    }

    async fn wait_for_network_idle(&mut self, _timeout: Duration) -> SessionResult<bool> {
        self.ensure_open()?;
        Ok(true)
    }

    async fn content(&mut self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.html.clone())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn is_visible(&mut self, selector: &str) -> SessionResult<bool> {
        self.ensure_open()?;
        Ok(visible_in(&self.html, selector))
    }

    async fn click(&mut self, selector: &str) -> SessionResult<()> {
        self.ensure_open()?;
        let target = click_target(&self.html, &self.url, selector)?;
        debug!("Following '{}' to {}", selector, target);
        self.fetch(target.as_str(), self.click_timeout).await
    }

    async fn snapshot(&mut self) -> SessionResult<Snapshot> {
        Ok(Snapshot {
            bytes: self.html.clone().into_bytes(),
            extension: "html".to_string(),
        })
    }

    async fn close(&mut self) -> SessionResult<()> {
        self.closed = true;
        Ok(())
    }
}

fn parse_selector(selector: &str) -> SessionResult<Selector> {
    Selector::parse(selector).map_err(|_| SessionError::Unsupported {
        operation: format!("selector '{selector}'"),
    })
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    let style: String = value
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    value.attr("hidden").is_some()
        || value.attr("aria-hidden").is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || (value.name() == "input" && value.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")))
        || style.contains("display:none")
        || style.contains("visibility:hidden")
}

/// First match exists and neither it nor an ancestor is hidden by markup
fn visible_in(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    let document = Html::parse_document(html);
    document.select(&selector).next().is_some_and(|element| {
        !is_hidden(element) && !element.ancestors().filter_map(ElementRef::wrap).any(is_hidden)
    })
}

/// URL a click on the first `selector` match leads to
fn click_target(html: &str, page_url: &str, selector: &str) -> SessionResult<Url> {
    let parsed = parse_selector(selector)?;
    let base = Url::parse(page_url).map_err(|e| SessionError::Navigation {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    let document = Html::parse_document(html);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| SessionError::ElementNotFound {
            selector: selector.to_string(),
        })?;

    if let Some(href) = element.value().attr("href") {
        if let Ok(Some(url)) = resolve_href(&base, href) {
            return Ok(url);
        }
    }

    let form = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "form");
    if let Some(form) = form {
        let method = form.value().attr("method").unwrap_or("get");
        if method.eq_ignore_ascii_case("get") {
            return form_submission(form, element, &base);
        }
    }

    Err(SessionError::Unsupported {
        operation: format!("click on script-driven control '{selector}'"),
    })
}

fn form_submission(form: ElementRef<'_>, submitter: ElementRef<'_>, base: &Url) -> SessionResult<Url> {
    let action = form.value().attr("action").unwrap_or_default();
    let mut url = if action.trim().is_empty() {
        base.clone()
    } else {
        base.join(action).map_err(|e| SessionError::Navigation {
            url: action.to_string(),
            reason: e.to_string(),
        })?
    };

    let fields = Selector::parse("input[name], select[name]")
        .map_err(|_| SessionError::Unsupported { operation: "form fields".to_string() })?;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for field in form.select(&fields) {
        let value = field.value();
        let Some(name) = value.attr("name") else { continue };
        let kind = value.attr("type").unwrap_or("text").to_ascii_lowercase();
        if matches!(kind.as_str(), "submit" | "button" | "image" | "reset") {
            continue;
        }
        if matches!(kind.as_str(), "checkbox" | "radio") && value.attr("checked").is_none() {
            continue;
        }
        pairs.push((name.to_string(), value.attr("value").unwrap_or_default().to_string()));
    }
    if let (Some(name), Some(value)) = (submitter.value().attr("name"), submitter.value().attr("value")) {
        pairs.push((name.to_string(), value.to_string()));
    }

    url.set_query(None);
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url)
}
