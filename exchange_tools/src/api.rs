use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{header::HeaderMap, Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::ExchangeApiError;

/// A thin JSON-over-HTTP client bound to a base URL. Every request is bounded by the timeout given at construction.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration, headers: HeaderMap) -> Result<Self, ExchangeApiError> {
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeApiError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<B>,
    ) -> Result<T, ExchangeApiError> {
        self.rest_query_with_auth(method, path, params, body, None).await
    }

    /// As [`Self::rest_query`], with optional HTTP basic credentials.
    pub async fn rest_query_with_auth<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<B>,
        basic_auth: Option<(&str, &str)>,
    ) -> Result<T, ExchangeApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        if let Some((user, password)) = basic_auth {
            req = req.basic_auth(user, Some(password));
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeApiError::Timeout(e.to_string())
            } else {
                ExchangeApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ExchangeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ExchangeApiError::RestResponseError(e.to_string()))?;
            Err(ExchangeApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
