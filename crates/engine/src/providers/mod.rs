//! Upstream market-data adapters, one per provider.

pub mod binance;
pub mod twelvedata;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use common::{Error, Result};

pub use binance::BinanceKlines;
pub use twelvedata::TwelveData;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::Other(format!("Failed to build HTTP client: {e}")))
}

/// GET `url` and decode the JSON body, mapping HTTP failures onto the
/// provider error taxonomy. `query` may carry credentials and is never logged.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let resp = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| Error::provider(e.status().map(|s| s.as_u16()), e.without_url().to_string()))?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimitExceeded);
    }

    let body = resp
        .text()
        .await
        .map_err(|e| Error::provider(None, e.without_url().to_string()))?;

    if !status.is_success() {
        return Err(Error::provider(Some(status.as_u16()), truncate(&body, 200)));
    }

    serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
}

/// Numeric field that providers send either as a JSON number or a string.
pub(crate) fn parse_price(value: &serde_json::Value, field: &str) -> Result<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::MalformedResponse(format!("{field} is not a number: {value}")))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prices_parse_from_strings_and_numbers() {
        assert_eq!(parse_price(&json!("1.25"), "open").unwrap(), 1.25);
        assert_eq!(parse_price(&json!(3), "open").unwrap(), 3.0);
        assert!(matches!(
            parse_price(&json!(null), "open"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
