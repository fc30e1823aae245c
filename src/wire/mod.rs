//! JSON wire types exchanged with one-shot TCP clients, grounded in
//! `rsql::server::types`'s request/response structs. One connection carries
//! exactly one `Request`/`Response` pair (see `crate::server`).

use crate::common::{DbError, Row, Value};
use crate::processor::QueryProcessor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "TransactionId")]
    pub transaction_id: i64,
    #[serde(rename = "Query")]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "TransactionId")]
    pub transaction_id: i64,
    #[serde(rename = "Query")]
    pub query: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "ExecutedAt")]
    pub executed_at: String,
    pub data: Option<Vec<EncodedRow>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedValue {
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedRow {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Columns")]
    pub columns: HashMap<String, EncodedValue>,
}

impl From<&Value> for EncodedValue {
    fn from(value: &Value) -> Self {
        EncodedValue { ty: value.type_name().to_string(), value: value.to_string() }
    }
}

impl From<&Row> for EncodedRow {
    fn from(row: &Row) -> Self {
        EncodedRow {
            id: row.id.to_string(),
            columns: row.columns.iter().map(|(k, v)| (k.clone(), EncodedValue::from(v))).collect(),
        }
    }
}

impl Response {
    pub(crate) fn success(transaction_id: i64, query: &str, message: impl Into<String>, data: Option<Vec<EncodedRow>>) -> Self {
        Response {
            transaction_id,
            query: query.to_string(),
            success: true,
            message: message.into(),
            executed_at: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    pub(crate) fn failure(transaction_id: i64, query: &str, error: &DbError) -> Self {
        Response {
            transaction_id,
            query: query.to_string(),
            success: false,
            message: error.to_string(),
            executed_at: chrono::Utc::now().to_rfc3339(),
            data: None,
        }
    }
}

/// Built when the connection's bytes don't even parse as a `Request`; there
/// is no `Query` string to echo back, so the raw payload stands in for it.
pub fn malformed_request(raw: &str) -> Response {
    Response::failure(-1, raw, &DbError::SyntaxError("malformed JSON request".to_string()))
}

/// Runs one request against the process-wide `QueryProcessor` and converts
/// the outcome into a wire `Response`. Kept free of I/O so it can be driven
/// directly by tests without a socket.
pub fn dispatch(request: &Request) -> Response {
    match QueryProcessor::global().execute(&request.query, request.transaction_id) {
        Ok(outcome) => {
            let data = if outcome.rows.is_empty() {
                None
            } else {
                Some(outcome.rows.iter().map(EncodedRow::from).collect())
            };
            let message = outcome
                .message
                .unwrap_or_else(|| format!("{} row(s) affected", outcome.affected));
            Response::success(outcome.tx_id, &request.query, message, data)
        }
        Err(e) => Response::failure(request.transaction_id, &request.query, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_pascal_case_fields() {
        let req: Request = serde_json::from_str(r#"{"TransactionId": -1, "Query": "SELECT 1"}"#).unwrap();
        assert_eq!(req.transaction_id, -1);
        assert_eq!(req.query, "SELECT 1");
    }

    #[test]
    fn failure_response_carries_error_kind_message() {
        let resp = Response::failure(-1, "COMMIT", &DbError::ProtocolError("no active transaction".to_string()));
        assert!(!resp.success);
        assert!(resp.message.contains("no active transaction"));
        assert!(resp.data.is_none());
    }

    #[test]
    fn encoded_row_round_trips_through_json() {
        let row = Row::new(crate::common::RowId::from_location(0, 1), {
            let mut m = HashMap::new();
            m.insert("id".to_string(), Value::Int32(5));
            m
        });
        let encoded = EncodedRow::from(&row);
        let json = serde_json::to_string(&encoded).unwrap();
        let back: EncodedRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "0:1");
        assert_eq!(back.columns["id"].ty, "int32");
        assert_eq!(back.columns["id"].value, "5");
    }
}
