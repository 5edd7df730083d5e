use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub method: QueryMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl QueryRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: QueryMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: QueryMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Issues one JSON request. No retries; every failure is terminal.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn request(&self, request: QueryRequest) -> Result<Value, QueryError>;
}

pub async fn fetch_json<T>(
    transport: &dyn QueryTransport,
    request: QueryRequest,
) -> Result<T, QueryError>
where
    T: DeserializeOwned,
{
    let value = transport.request(request).await?;
    Ok(serde_json::from_value(value)?)
}

pub struct QueryClient {
    http: Client,
    base_url: Url,
}

impl QueryClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl QueryTransport for QueryClient {
    async fn request(&self, request: QueryRequest) -> Result<Value, QueryError> {
        let url = self.endpoint(&request.path);
        let mut builder = match request.method {
            QueryMethod::Get => self.http.get(&url),
            QueryMethod::Post => self.http.post(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = ?request.method, %url, "query: sending");
        let response = builder.send().await.map_err(|err| {
            warn!(%url, error = %err, "query: transport failure");
            QueryError::network(err)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!(%url, error = %err, "query: failed reading response body");
            QueryError::network(err)
        })?;

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "query: non-success status");
            return Err(QueryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
