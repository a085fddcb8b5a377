use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// Both api.z.ai and z.ai answer, but api.z.ai is more consistent
const API_BASE: &str = "https://api.z.ai";

// Quota dimension tags the tool consumes. Other tags are ignored.
pub const TOKENS_LIMIT: &str = "TOKENS_LIMIT";
pub const TIME_LIMIT: &str = "TIME_LIMIT";

// The upstream service rejects requests that don't look like its own web UI
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: HTTP status {0}")]
    Http(u16),
    #[error("{msg}")]
    Rejected {
        msg: String,
        code: Option<i64>,
        payload: Value,
    },
    #[error("API request failed: {0}")]
    Transport(#[from] ureq::Error),
    #[error("Error de-serialising API response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub product_name: String,
    pub status: String,
    #[serde(default)]
    pub valid: String,
    pub next_renew_time: String,
    pub billing_cycle: String,
    #[serde(default)]
    pub actual_price: f64,
    #[serde(default)]
    pub auto_renew: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimit {
    #[serde(rename = "type")]
    pub limit_type: String,
    #[serde(default)]
    pub unit: i64,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub usage: i64,
    #[serde(default)]
    pub current_value: i64,
    #[serde(default)]
    pub remaining: i64,
    // 0-100, but the service happily reports past 100
    #[serde(default)]
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_details: Option<Vec<UsageDetail>>,
    // epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reset_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDetail {
    pub model_code: String,
    #[serde(default)]
    pub usage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    #[serde(rename = "x_time", default)]
    pub x_time: Vec<String>,
    #[serde(default)]
    pub model_call_count: Vec<Option<i64>>,
    #[serde(default)]
    pub tokens_usage: Vec<Option<i64>>,
    #[serde(default)]
    pub total_usage: Option<TotalUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalUsage {
    #[serde(default)]
    pub total_model_call_count: i64,
    #[serde(default)]
    pub total_tokens_usage: i64,
}

pub fn get_subscription(token: &str) -> Result<Vec<Subscription>, ApiError> {
    let data = api_request("/api/biz/subscription/list", token, &[])?;
    Ok(serde_json::from_value(data)?)
}

pub fn get_quota_limit(token: &str) -> Result<Vec<QuotaLimit>, ApiError> {
    let mut data = api_request("/api/monitor/usage/quota/limit", token, &[])?;
    Ok(serde_json::from_value(data["limits"].take())?)
}

pub fn get_model_usage(
    token: &str,
    start_time: &str,
    end_time: &str,
) -> Result<UsageData, ApiError> {
    let data = api_request(
        "/api/monitor/usage/model-usage",
        token,
        &[("startTime", start_time), ("endTime", end_time)],
    )?;
    Ok(serde_json::from_value(data)?)
}

// One authenticated GET, single attempt. Any failure is the caller's problem.
fn api_request(endpoint: &str, token: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
    let url = format!("{}{}", API_BASE, endpoint);
    let mut request = ureq::get(url.as_str())
        .header("accept", "application/json, text/plain, */*")
        .header("accept-language", "en")
        .header("authorization", &format!("Bearer {}", token.trim()))
        .header("origin", "https://z.ai")
        .header("referer", "https://z.ai/manage-apikey/subscription")
        .header("user-agent", USER_AGENT);
    for (key, value) in query {
        request = request.query(*key, *value);
    }
    debug!("GET {}", url);
    let mut response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(status)) => return Err(ApiError::Http(status)),
        Err(e) => return Err(ApiError::Transport(e)),
    };
    let body = response.body_mut().read_to_string()?;
    parse_envelope(&body)
}

// The service wraps every response in {code, msg, data}; 200 is the success
// sentinel regardless of the HTTP status
fn parse_envelope(body: &str) -> Result<Value, ApiError> {
    let mut payload: Value = serde_json::from_str(body)?;
    let code = payload["code"].as_i64();
    if code != Some(200) {
        let msg = payload["msg"]
            .as_str()
            .unwrap_or("API request failed")
            .to_owned();
        return Err(ApiError::Rejected { msg, code, payload });
    }
    Ok(payload["data"].take())
}
