//! Response envelopes.
//!
//! Liqui wraps failures as `{"success": 0, "error": "..."}` on every endpoint
//! and private results as `{"success": 1, "return": {...}}`. Poloniex reports
//! failures through a top-level `error` string. A failure in the envelope wins
//! over the HTTP status.

use serde::de::DeserializeOwned;
use serde_json::Value;

use bourse_domain::ExchangeId;
use bourse_exec::{ExchangeError, ExchangeResult, HttpResponse};

const BODY_PREVIEW_LEN: usize = 200;

/// Public payload: the whole body once the envelope reports no failure.
pub(crate) fn public_payload(exchange: ExchangeId, response: HttpResponse) -> ExchangeResult<Value> {
    let body = parse(&response)?;
    check_failure(exchange, &body)?;
    check_status(&response)?;
    Ok(body)
}

/// Private Liqui payload: requires a truthy `success` and returns `return`.
pub(crate) fn private_payload(exchange: ExchangeId, response: HttpResponse) -> ExchangeResult<Value> {
    let mut body = parse(&response)?;
    check_failure(exchange, &body)?;
    check_status(&response)?;

    match body.get("success") {
        Some(flag) if is_truthy(flag) => {}
        _ => {
            return Err(ExchangeError::Decode(
                "response carries no success flag".to_string(),
            ))
        }
    }
    body.get_mut("return")
        .map(Value::take)
        .ok_or_else(|| ExchangeError::Decode("response carries no `return` payload".to_string()))
}

/// Decode a payload value into a venue type.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> ExchangeResult<T> {
    serde_json::from_value(value).map_err(|e| ExchangeError::Decode(e.to_string()))
}

/// `true`, a non-zero number, or `"1"`/`"true"`.
pub(crate) fn is_truthy(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

fn parse(response: &HttpResponse) -> ExchangeResult<Value> {
    serde_json::from_str(&response.body).map_err(|e| {
        if response.is_success() {
            ExchangeError::Decode(format!("invalid JSON: {}", e))
        } else {
            ExchangeError::Transport(format!(
                "HTTP {}: {}",
                response.status,
                preview(&response.body)
            ))
        }
    })
}

fn check_failure(exchange: ExchangeId, body: &Value) -> ExchangeResult<()> {
    let error = body.get("error").and_then(Value::as_str);
    match body.get("success") {
        Some(flag) if !is_truthy(flag) => Err(ExchangeError::api(
            exchange,
            error.unwrap_or("request failed without an error message"),
        )),
        None if error.is_some() => Err(ExchangeError::api(exchange, error.unwrap_or_default())),
        _ => Ok(()),
    }
}

fn check_status(response: &HttpResponse) -> ExchangeResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ExchangeError::Transport(format!(
            "HTTP {}: {}",
            response.status,
            preview(&response.body)
        )))
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

// =============================================================================
// Tests
// =============================================================================
