use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::ValueList;
use super::TransportError;

/// Thin JSON-over-HTTP wrapper shared by the REST and extension transports.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(concat!("pr-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Absolute URL for a path relative to the collection endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `url`, failing on any non-2xx status.
    pub async fn send(&self, url: &str, accept: Option<&str>) -> Result<Response, TransportError> {
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = &self.token {
            request = request.basic_auth("", Some(token));
        }

        debug!(url = %url, "GET");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// GET and return only the response headers.
    pub async fn headers(&self, url: &str) -> Result<HeaderMap, TransportError> {
        let response = self.send(url, None).await?;
        Ok(response.headers().clone())
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> Result<T, TransportError> {
        let body = self.send(url, accept).await?.text().await?;
        serde_json::from_str(&body).map_err(|source| TransportError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// GET a `{ "value": [...] }` list body.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> Result<Vec<T>, TransportError> {
        let list: ValueList<T> = self.get_json(url, accept).await?;
        debug!(url = %url, items = list.value.len(), "received list");
        Ok(list.value)
    }
}
