// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Send a request and turn non-success statuses into `AppError::Api`.
pub async fn send(request: RequestBuilder, context: &str) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    Err(AppError::api(context, status.as_u16(), message))
}

/// Sleep for a configured number of milliseconds, skipping zero.
pub async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
