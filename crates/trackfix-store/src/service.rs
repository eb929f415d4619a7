#![forbid(unsafe_code)]

//! The persistence service seam.

use crate::error::Result;
use crate::reply::{StoreReply, classify};
use crate::request::StoreRequest;

/// Anything that can answer [`StoreRequest`]s.
///
/// Implementors only move text; [`call`](Self::call) classifies the raw
/// reply so no caller ever compares against `"false"` or `"ERROR"`.
pub trait PersistenceService: Send + Sync {
    /// Perform the request and return the raw reply body.
    fn send(&self, request: &StoreRequest) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Perform the request and classify the reply.
    fn call(&self, request: &StoreRequest) -> Result<StoreReply> {
        let raw = self.send(request)?;
        let reply = classify(request.action(), &raw);
        match &reply {
            Ok(_) => tracing::debug!(
                target: "trackfix.store",
                service = self.name(),
                request = %request.summary(),
                "request succeeded"
            ),
            Err(error) => tracing::warn!(
                target: "trackfix.store",
                service = self.name(),
                request = %request.summary(),
                %error,
                "request failed"
            ),
        }
        reply
    }

    /// Paths of the editable files.
    fn list_files(&self) -> Result<Vec<String>> {
        let reply = self.call(&StoreRequest::GetFiles)?;
        reply
            .strings()
            .ok_or_else(|| crate::error::StoreError::UnexpectedReply {
                action: "getFiles".into(),
                reply: reply.into_text(),
            })
    }

    fn read_text_file(&self, path: &str) -> Result<String> {
        Ok(self.call(&StoreRequest::read_text_file(path))?.into_text())
    }

    fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        self.call(&StoreRequest::write_file(path, contents)).map(|_| ())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        self.call(&StoreRequest::delete_file(path)).map(|_| ())
    }
}
