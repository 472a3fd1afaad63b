pub mod cache;

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::core::billing::cache::ReportCache;
use crate::core::models::usage::{LineItemRecord, UsageQuery, UsageReport};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const USAGE_PATH: &str = "/dashboard/billing/usage";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} from billing endpoint: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),
    #[error("endpoint must use HTTPS, got: {0}")]
    InsecureEndpoint(String),
}

#[derive(Deserialize)]
struct UsageResponse {
    /// Aggregate cost for the range, in cents
    total_usage: f64,
    daily_costs: Vec<DailyCost>,
}

#[derive(Deserialize)]
struct DailyCost {
    timestamp: i64,
    line_items: Vec<LineItem>,
}

#[derive(Deserialize)]
struct LineItem {
    name: String,
    cost: CentAmount,
}

/// Cent amounts arrive as numbers or numeric strings depending on the
/// endpoint vintage; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum CentAmount {
    Number(f64),
    Text(String),
}

impl CentAmount {
    fn cents(&self) -> Result<f64, FetchError> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(s) => s.trim().parse().map_err(|_| {
                FetchError::MalformedResponse(format!("non-numeric cost: {:?}", s))
            }),
        }
    }
}

/// Client for the billing-usage endpoint.
///
/// Holds the bearer credential explicitly; nothing here reads the process
/// environment. One instance serves any number of independent fetches.
pub struct UsageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Option<Mutex<ReportCache>>,
}

impl UsageClient {
    /// Build a client. `cache_ttl` of zero disables caching, so every fetch
    /// hits the endpoint.
    pub fn new(api_key: String, base_url: String, cache_ttl: Duration) -> Result<Self, FetchError> {
        if !base_url.starts_with("https://") {
            return Err(FetchError::InsecureEndpoint(base_url));
        }
        let cache = if cache_ttl.is_zero() {
            None
        } else {
            Some(Mutex::new(ReportCache::new(cache_ttl)))
        };
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            cache,
        })
    }

    pub fn usage_url(&self) -> String {
        format!("{}{}", self.base_url, USAGE_PATH)
    }

    /// Fetch and normalize usage for one date range.
    ///
    /// Any failure (transport, non-2xx status, unexpected shape) aborts this
    /// fetch; there is no retry and no partial result. The caller decides
    /// whether the render pass survives.
    pub async fn fetch(&self, query: &UsageQuery) -> Result<UsageReport, FetchError> {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                if let Some(report) = cache.get(query) {
                    return Ok(report);
                }
            }
        }

        let response = self
            .http
            .get(self.usage_url())
            .query(&[
                ("start_date", query.start_param()),
                ("end_date", query.end_param()),
            ])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = check_status(status, response.text().await?)?;

        let payload: UsageResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        let report = normalize(payload)?;

        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                cache.insert(*query, report.clone());
            }
        }
        Ok(report)
    }
}

/// Pass the body through on a success status; anything else becomes an
/// `Http` error carrying the original status code and body text.
fn check_status(status: reqwest::StatusCode, body: String) -> Result<String, FetchError> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(FetchError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// Flatten the two-level (day, line item) nesting into one record per
/// (timestamp, model) pair and convert cents to dollars.
fn normalize(payload: UsageResponse) -> Result<UsageReport, FetchError> {
    let mut records: Vec<LineItemRecord> = Vec::new();
    for day in payload.daily_costs {
        let datetime: DateTime<Utc> = DateTime::from_timestamp(day.timestamp, 0).ok_or_else(
            || FetchError::MalformedResponse(format!("timestamp out of range: {}", day.timestamp)),
        )?;
        for item in day.line_items {
            records.push(LineItemRecord {
                timestamp: day.timestamp,
                datetime,
                name: item.name,
                cost: item.cost.cents()? / 100.0,
            });
        }
    }
    // Stable sort keeps same-day items in payload order
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(UsageReport {
        records,
        total_cost: round_to_cents(payload.total_usage / 100.0),
    })
}

/// Round half-up to two decimals.
fn round_to_cents(dollars: f64) -> f64 {
    (dollars * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> UsageResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn deserialize_usage_response() {
        let resp = parse(
            r#"{
                "total_usage": 12345,
                "daily_costs": [
                    {"timestamp": 1700000000, "line_items": [
                        {"name": "gpt-4", "cost": 500},
                        {"name": "gpt-3.5", "cost": 200}
                    ]}
                ]
            }"#,
        );
        assert!((resp.total_usage - 12345.0).abs() < 1e-10);
        assert_eq!(resp.daily_costs.len(), 1);
        assert_eq!(resp.daily_costs[0].line_items.len(), 2);
    }

    #[test]
    fn deserialize_ignores_extra_line_item_fields() {
        let resp = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [
                    {"timestamp": 1700000000, "line_items": [
                        {"name": "gpt-4", "cost": 500, "currency": "usd"}
                    ]}
                ]
            }"#,
        );
        assert_eq!(resp.daily_costs[0].line_items[0].name, "gpt-4");
    }

    #[test]
    fn deserialize_missing_line_items_fails() {
        let result: Result<UsageResponse, _> = serde_json::from_str(
            r#"{"total_usage": 100, "daily_costs": [{"timestamp": 1700000000}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_missing_total_usage_fails() {
        let result: Result<UsageResponse, _> =
            serde_json::from_str(r#"{"daily_costs": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn cent_amount_accepts_number_and_string() {
        let resp = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [
                    {"timestamp": 1700000000, "line_items": [
                        {"name": "a", "cost": 512.5},
                        {"name": "b", "cost": "33.7"}
                    ]}
                ]
            }"#,
        );
        assert!((resp.daily_costs[0].line_items[0].cost.cents().unwrap() - 512.5).abs() < 1e-10);
        assert!((resp.daily_costs[0].line_items[1].cost.cents().unwrap() - 33.7).abs() < 1e-10);
    }

    #[test]
    fn cent_amount_rejects_garbage_string() {
        let amount = CentAmount::Text("lots".to_string());
        let err = amount.cents().unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn normalize_end_to_end_example() {
        let payload = parse(
            r#"{
                "total_usage": 12345,
                "daily_costs": [
                    {"timestamp": 1700000000, "line_items": [
                        {"name": "gpt-4", "cost": 500},
                        {"name": "gpt-3.5", "cost": 200}
                    ]}
                ]
            }"#,
        );
        let report = normalize(payload).unwrap();
        assert!((report.total_cost - 123.45).abs() < 1e-10);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].name, "gpt-4");
        assert!((report.records[0].cost - 5.0).abs() < 1e-10);
        assert_eq!(report.records[0].timestamp, 1700000000);
        assert_eq!(report.records[1].name, "gpt-3.5");
        assert!((report.records[1].cost - 2.0).abs() < 1e-10);
        assert_eq!(report.records[1].timestamp, 1700000000);
    }

    #[test]
    fn normalize_flattening_is_complete() {
        let payload = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [
                    {"timestamp": 100, "line_items": [
                        {"name": "a", "cost": 1}, {"name": "b", "cost": 2}
                    ]},
                    {"timestamp": 200, "line_items": []},
                    {"timestamp": 300, "line_items": [
                        {"name": "a", "cost": 3}, {"name": "b", "cost": 4}, {"name": "c", "cost": 5}
                    ]}
                ]
            }"#,
        );
        let report = normalize(payload).unwrap();
        assert_eq!(report.records.len(), 5);
    }

    #[test]
    fn normalize_sorts_newest_first_regardless_of_input_order() {
        let payload = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [
                    {"timestamp": 100, "line_items": [{"name": "a", "cost": 1}]},
                    {"timestamp": 300, "line_items": [{"name": "a", "cost": 3}]},
                    {"timestamp": 200, "line_items": [{"name": "a", "cost": 2}]}
                ]
            }"#,
        );
        let report = normalize(payload).unwrap();
        let timestamps: Vec<i64> = report.records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[test]
    fn normalize_copies_day_timestamp_onto_each_item() {
        let payload = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [
                    {"timestamp": 1700000000, "line_items": [
                        {"name": "a", "cost": 1}, {"name": "b", "cost": 2}
                    ]}
                ]
            }"#,
        );
        let report = normalize(payload).unwrap();
        for record in &report.records {
            assert_eq!(record.timestamp, 1700000000);
            assert_eq!(record.datetime.timestamp(), 1700000000);
        }
    }

    #[test]
    fn normalize_total_independent_of_line_items() {
        let payload = parse(
            r#"{
                "total_usage": 12345,
                "daily_costs": [
                    {"timestamp": 100, "line_items": [{"name": "a", "cost": 700}]}
                ]
            }"#,
        );
        let report = normalize(payload).unwrap();
        // 123.45 reported vs 7.00 itemized; the aggregate wins untouched
        assert!((report.total_cost - 123.45).abs() < 1e-10);
        assert!((report.itemized_total() - 7.0).abs() < 1e-10);
    }

    #[test]
    fn normalize_rejects_out_of_range_timestamp() {
        let payload = parse(
            r#"{
                "total_usage": 0,
                "daily_costs": [{"timestamp": 9223372036854775807, "line_items": []}]
            }"#,
        );
        let err = normalize(payload).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn round_to_cents_half_up() {
        // 0.125 is exactly representable, so the half-way case is real
        assert!((round_to_cents(0.125) - 0.13).abs() < 1e-10);
        assert!((round_to_cents(123.449) - 123.45).abs() < 1e-10);
        assert!((round_to_cents(123.45) - 123.45).abs() < 1e-10);
    }

    #[test]
    fn check_status_passes_success_body_through() {
        let body = check_status(reqwest::StatusCode::OK, "{}".to_string()).unwrap();
        assert_eq!(body, "{}");
    }

    #[test]
    fn check_status_client_error_keeps_status_and_body() {
        let err =
            check_status(reqwest::StatusCode::UNAUTHORIZED, "invalid key".to_string()).unwrap_err();
        match err {
            FetchError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("expected Http error, got: {}", other),
        }
    }

    #[test]
    fn check_status_server_error_is_http_error() {
        let err = check_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "upstream down".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 500, .. }));
    }

    #[test]
    fn http_error_keeps_status_and_body() {
        let err = FetchError::Http {
            status: 401,
            body: "invalid key".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("invalid key"));
    }

    #[test]
    fn client_rejects_plain_http_endpoint() {
        let result = UsageClient::new(
            "sk-test".to_string(),
            "http://evil.example".to_string(),
            Duration::ZERO,
        );
        assert!(matches!(result, Err(FetchError::InsecureEndpoint(_))));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = UsageClient::new(
            "sk-test".to_string(),
            "https://api.openai.com/".to_string(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(
            client.usage_url(),
            "https://api.openai.com/dashboard/billing/usage"
        );
    }
}
