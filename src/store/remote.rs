use super::{Query, Table, TableStore};
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MIN_TIMEOUT_SECONDS: u64 = 5;

/// Client for a PostgREST-style hosted-table API:
/// `GET|POST|PATCH|DELETE {base}/{table}?column=eq.value`.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    base_url: Url,
    api_key: Option<String>,
    timeout_seconds: u64,
}

#[derive(Debug)]
struct RemoteRequest {
    method: Method,
    url: Url,
    body: Option<Value>,
}

impl RemoteStore {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid remote base URL: {base_url}"))?;

        if base_url.cannot_be_a_base() {
            bail!("Remote base URL must be hierarchical, e.g. https://example.com/rest/v1");
        }

        Ok(Self {
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout_seconds: timeout_seconds.max(MIN_TIMEOUT_SECONDS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.remote_base_url,
            config.resolve_api_key(),
            config.remote_timeout_seconds,
        )
    }

    fn send(&self, request: RemoteRequest) -> Result<Vec<Value>> {
        let api_key = self.api_key.clone();
        let timeout_seconds = self.timeout_seconds;

        // The blocking client owns a runtime and must stay off tokio worker threads.
        std::thread::spawn(move || send_blocking(request, api_key.as_deref(), timeout_seconds))
            .join()
            .map_err(|_| anyhow!("Remote store worker thread panicked"))?
    }
}

impl TableStore for RemoteStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let mut url = table_url(&self.base_url, table, query)?;
        url.query_pairs_mut().append_pair("select", "*");

        self.send(RemoteRequest {
            method: Method::GET,
            url,
            body: None,
        })
    }

    fn insert(&self, table: Table, record: &Value) -> Result<Value> {
        let url = table_url(&self.base_url, table, &Query::new())?;

        self.send(RemoteRequest {
            method: Method::POST,
            url,
            body: Some(record.clone()),
        })?
        .into_iter()
        .next()
        .with_context(|| format!("Remote insert into {} returned no record", table.name()))
    }

    fn update(&self, table: Table, patch: &Value, filters: &Query) -> Result<Vec<Value>> {
        require_filters(table, filters)?;
        let url = table_url(&self.base_url, table, filters)?;

        self.send(RemoteRequest {
            method: Method::PATCH,
            url,
            body: Some(patch.clone()),
        })
    }

    fn delete(&self, table: Table, filters: &Query) -> Result<()> {
        require_filters(table, filters)?;
        let url = table_url(&self.base_url, table, filters)?;

        self.send(RemoteRequest {
            method: Method::DELETE,
            url,
            body: None,
        })
        .map(|_| ())
    }
}

fn send_blocking(
    request: RemoteRequest,
    api_key: Option<&str>,
    timeout_seconds: u64,
) -> Result<Vec<Value>> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("prefer"),
        HeaderValue::from_static("return=representation"),
    );

    if let Some(key) = api_key {
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(key).context("Failed to build apikey header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .context("Failed to build Authorization header")?,
        );
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create remote store HTTP client")?;

    debug!(method = %request.method, url = %request.url, "remote store request");

    let mut builder = client.request(request.method.clone(), request.url.clone());
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .with_context(|| format!("Remote store request failed: {} {}", request.method, request.url))?;

    let status = response.status();
    let body = response
        .text()
        .context("Failed to read remote store response body")?;

    if !status.is_success() {
        bail!("Remote store error {}: {}", status, body);
    }

    parse_records(&body)
}

pub fn table_url(base: &Url, table: Table, query: &Query) -> Result<Url> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| anyhow!("Remote base URL cannot hold a table path: {base}"))?
        .pop_if_empty()
        .push(table.name());

    {
        let mut pairs = url.query_pairs_mut();
        query.filters.iter().for_each(|(column, value)| {
            pairs.append_pair(column, &filter_operand(value));
        });

        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.append_pair("order", &format!("{}.{direction}", order.column));
        }
    }

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

fn filter_operand(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(text) => format!("eq.{text}"),
        other => format!("eq.{other}"),
    }
}

fn parse_records(body: &str) -> Result<Vec<Value>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed: Value = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse remote store response: {body}"))?;

    match parsed {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![parsed]),
        Value::Null => Ok(Vec::new()),
        other => bail!("Unexpected remote store response: {other}"),
    }
}

fn require_filters(table: Table, query: &Query) -> Result<()> {
    if query.filters.is_empty() {
        bail!("{} writes require at least one filter", table.name());
    }

    Ok(())
}
