#![forbid(unsafe_code)]

//! Requests understood by the persistence service.
//!
//! The service speaks form-encoded POSTs with an `action` discriminator.
//! [`StoreRequest`] is the typed form of those requests; it serializes to
//! JSON with the same tag so request logs read like the wire traffic.

use serde::{Deserialize, Serialize};

/// One call to the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreRequest {
    /// List editable files (`data/*geojsons.json`).
    GetFiles,
    ReadTextFile {
        text_path: String,
    },
    WriteFile {
        file_path: String,
        json_string: String,
    },
    DeleteFile {
        file_path: String,
    },
    Query {
        query_string: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dbname: Option<String>,
    },
    ParametrizedQuery {
        query_string: String,
        params: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dbname: Option<String>,
    },
    /// Run the conversion script over previously written files.
    ImportData {
        geojson_string: String,
        track_info_string: String,
        stderr_path: String,
    },
}

impl StoreRequest {
    /// Wire name of the action.
    pub const fn action(&self) -> &'static str {
        match self {
            Self::GetFiles => "getFiles",
            Self::ReadTextFile { .. } => "readTextFile",
            Self::WriteFile { .. } => "writeFile",
            Self::DeleteFile { .. } => "deleteFile",
            Self::Query { .. } => "query",
            Self::ParametrizedQuery { .. } => "parametrizedQuery",
            Self::ImportData { .. } => "importData",
        }
    }

    pub fn read_text_file(path: impl Into<String>) -> Self {
        Self::ReadTextFile {
            text_path: path.into(),
        }
    }

    pub fn write_file(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self::WriteFile {
            file_path: path.into(),
            json_string: contents.into(),
        }
    }

    pub fn delete_file(path: impl Into<String>) -> Self {
        Self::DeleteFile {
            file_path: path.into(),
        }
    }

    /// Form fields for the POST body.
    ///
    /// Query parameters travel as a JSON array in a single `params` field.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("action", self.action().to_string())];
        match self {
            Self::GetFiles => {}
            Self::ReadTextFile { text_path } => fields.push(("textPath", text_path.clone())),
            Self::WriteFile {
                file_path,
                json_string,
            } => {
                fields.push(("filePath", file_path.clone()));
                fields.push(("jsonString", json_string.clone()));
            }
            Self::DeleteFile { file_path } => fields.push(("filePath", file_path.clone())),
            Self::Query {
                query_string,
                dbname,
            } => {
                fields.push(("queryString", query_string.clone()));
                if let Some(db) = dbname {
                    fields.push(("dbname", db.clone()));
                }
            }
            Self::ParametrizedQuery {
                query_string,
                params,
                dbname,
            } => {
                fields.push(("queryString", query_string.clone()));
                fields.push((
                    "params",
                    serde_json::Value::from(params.clone()).to_string(),
                ));
                if let Some(db) = dbname {
                    fields.push(("dbname", db.clone()));
                }
            }
            Self::ImportData {
                geojson_string,
                track_info_string,
                stderr_path,
            } => {
                fields.push(("geojsonString", geojson_string.clone()));
                fields.push(("trackInfoString", track_info_string.clone()));
                fields.push(("stderrPath", stderr_path.clone()));
            }
        }
        fields
    }

    /// Short form for logs: action plus the path it touches, never bodies.
    pub fn summary(&self) -> String {
        match self {
            Self::GetFiles => "getFiles".to_string(),
            Self::ReadTextFile { text_path } => format!("readTextFile {text_path}"),
            Self::WriteFile {
                file_path,
                json_string,
            } => format!("writeFile {file_path} ({} bytes)", json_string.len()),
            Self::DeleteFile { file_path } => format!("deleteFile {file_path}"),
            Self::Query { .. } => "query".to_string(),
            Self::ParametrizedQuery { params, .. } => {
                format!("parametrizedQuery ({} params)", params.len())
            }
            Self::ImportData { geojson_string, .. } => format!("importData {geojson_string}"),
        }
    }
}
