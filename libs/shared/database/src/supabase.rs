use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

const UNIQUE_VIOLATION_CODE: &str = "23505";
/// Raised by `apply_clinic_mutations` when a row version no longer matches.
const STALE_WRITE_CODE: &str = "40001";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Result<Self, DatabaseError> {
        let timeout = config.persistence_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DatabaseError::Unavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_api_key().to_string(),
            timeout,
        })
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| DatabaseError::Query("API key is not a valid header value".to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Fall back to the API key so PostgREST sees the service role when no user token is given
        let bearer = auth_token.unwrap_or(&self.api_key);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|_| DatabaseError::Query("Bearer token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let timeout_ms = self.timeout.as_millis() as u64;
        let response = tokio::time::timeout(self.timeout, req.send())
            .await
            .map_err(|_| DatabaseError::Timeout(timeout_ms))?
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::Timeout(_) => DatabaseError::Timeout(timeout_ms),
                other => other,
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(DatabaseError::from)?;

        if !status.is_success() {
            let error_text = String::from_utf8_lossy(&bytes).to_string();
            error!("PostgREST error ({}): {}", status, error_text);
            return Err(map_error_status(status, &error_text));
        }

        // Void RPCs answer 204 with no body
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }

        Ok(serde_json::from_slice::<T>(&bytes)?)
    }

    /// Call a Postgres function through `/rest/v1/rpc/{function}`.
    pub async fn rpc<T>(&self, function: &str, args: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, None, Some(args)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn map_error_status(status: StatusCode, body: &str) -> DatabaseError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    if code == STALE_WRITE_CODE {
        return DatabaseError::StaleWrite(message);
    }
    if code == UNIQUE_VIOLATION_CODE || status == StatusCode::CONFLICT {
        return DatabaseError::UniqueViolation(message);
    }

    match status.as_u16() {
        401 | 403 => DatabaseError::Query(format!("Authentication error: {}", message)),
        404 => DatabaseError::NotFound(message),
        502..=504 => DatabaseError::Unavailable(message),
        _ => DatabaseError::Query(format!("API error ({}): {}", status, message)),
    }
}
