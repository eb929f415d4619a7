#![forbid(unsafe_code)]

//! Classification of plain-text service replies.
//!
//! The service answers every request with a text body and signals failure
//! in-band. The rules, applied in order:
//!
//! | reply text                          | result                      |
//! |-------------------------------------|-----------------------------|
//! | starts with `ERROR`                 | [`StoreError::Service`]     |
//! | exactly `false`                     | [`StoreError::Rejected`]    |
//! | empty, for `writeFile`              | [`StoreError::Rejected`]    |
//! | `query returned an empty result`    | [`StoreReply::Empty`]       |
//! | JSON array of objects               | [`StoreReply::Rows`]        |
//! | any other JSON (except file reads)  | [`StoreReply::Json`]        |
//! | anything else                       | [`StoreReply::Text`]        |
//!
//! Callers only ever see the typed result; the sentinels stop here.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Reply text the service uses for a query with no rows.
pub const EMPTY_QUERY_RESULT: &str = "query returned an empty result";

/// A successful reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreReply {
    /// A query matched nothing.
    Empty,
    /// Query rows.
    Rows(Vec<Map<String, Value>>),
    Json(Value),
    Text(String),
}

impl StoreReply {
    /// Reply as text, re-encoding JSON if needed.
    pub fn into_text(self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Rows(rows) => {
                Value::Array(rows.into_iter().map(Value::Object).collect()).to_string()
            }
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text,
        }
    }

    /// String items of a JSON array reply (e.g. a file listing).
    pub fn strings(&self) -> Option<Vec<String>> {
        match self {
            Self::Json(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            Self::Empty => Some(Vec::new()),
            _ => None,
        }
    }
}

/// Turn a raw reply to `action` into a typed result.
pub fn classify(action: &str, raw: &str) -> Result<StoreReply> {
    let trimmed = raw.trim();

    if trimmed.starts_with("ERROR") {
        return Err(StoreError::Service {
            action: action.to_string(),
            message: trimmed.to_string(),
        });
    }
    if trimmed == "false" || (trimmed.is_empty() && action == "writeFile") {
        return Err(StoreError::Rejected {
            action: action.to_string(),
        });
    }
    if trimmed == EMPTY_QUERY_RESULT {
        return Ok(StoreReply::Empty);
    }
    if action == "readTextFile" || trimmed.is_empty() {
        return Ok(StoreReply::Text(raw.to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let rows = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            Ok(StoreReply::Rows(rows))
        }
        Ok(value) => Ok(StoreReply::Json(value)),
        Err(_) => Ok(StoreReply::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_prefix_is_a_service_error() {
        let err = classify("query", "ERROR: relation does not exist").unwrap_err();
        assert!(matches!(err, StoreError::Service { ref message, .. } if message.contains("relation")));
    }

    #[test]
    fn false_is_rejected() {
        assert!(matches!(
            classify("deleteFile", "false"),
            Err(StoreError::Rejected { .. })
        ));
    }

    #[test]
    fn empty_write_reply_is_rejected_but_empty_read_is_text() {
        assert!(matches!(
            classify("writeFile", ""),
            Err(StoreError::Rejected { .. })
        ));
        assert_eq!(
            classify("readTextFile", "").unwrap(),
            StoreReply::Text(String::new())
        );
    }

    #[test]
    fn empty_query_sentinel() {
        assert_eq!(classify("query", EMPTY_QUERY_RESULT).unwrap(), StoreReply::Empty);
    }

    #[test]
    fn rows_and_json() {
        let reply = classify("query", r#"[{"code":"A"},{"code":"B"}]"#).unwrap();
        match reply {
            StoreReply::Rows(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected rows, got {other:?}"),
        }
        let reply = classify("getFiles", r#"["data/a_geojsons.json"]"#).unwrap();
        assert_eq!(reply, StoreReply::Json(json!(["data/a_geojsons.json"])));
        assert_eq!(reply.strings().unwrap(), ["data/a_geojsons.json"]);
    }

    #[test]
    fn file_reads_are_never_parsed() {
        assert_eq!(
            classify("readTextFile", "[1, 2]").unwrap(),
            StoreReply::Text("[1, 2]".into())
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            classify("importData", "\tImported 3 tracks\n").unwrap().into_text(),
            "\tImported 3 tracks\n"
        );
    }
}
