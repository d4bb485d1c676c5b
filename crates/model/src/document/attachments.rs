//! Attachments
//!
//! Two ways to attach a file:
//!
//! - **staged**: before the document exists, payloads are staged and travel
//!   inline (base64) with `create`
//! - **standalone**: once the document exists, each attachment is its own
//!   sub-resource and every put/delete creates a new document revision
//!
//! Local documents cannot carry attachments.

use super::{Document, DocumentCell, StagedAttachment};
use crate::lifecycle::Event;
use serde_json::Value;
use settee_core::{Error, JsonMap, Result, KEY_ATTACHMENTS, KEY_REV};
use settee_transport::{encode_path, Body};
use std::path::Path;

/// Content type used when none is given
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Attachment content read from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name
    pub name: String,
    /// MIME type reported by the server
    pub content_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

fn reject_local(cell: &DocumentCell) -> Result<()> {
    match &cell.id {
        Some(id) if id.is_local() => Err(Error::invalid_input(format!(
            "local document {} cannot have attachments",
            id
        ))),
        _ => Ok(()),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("attachment name cannot be empty"));
    }
    if name.starts_with('_') {
        return Err(Error::invalid_input(format!(
            "attachment name {:?} cannot start with an underscore",
            name
        )));
    }
    Ok(())
}

/// Edit the `_attachments` map, dropping it when it ends up empty
fn edit_stubs(body: &mut JsonMap, edit: impl FnOnce(&mut JsonMap)) {
    let mut stubs = match body.remove(KEY_ATTACHMENTS) {
        Some(Value::Object(existing)) => existing,
        _ => JsonMap::new(),
    };
    edit(&mut stubs);
    if !stubs.is_empty() {
        body.insert(KEY_ATTACHMENTS.to_string(), Value::Object(stubs));
    }
}

impl Document {
    /// Read one attachment
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a reserved or empty name; `IllegalTransition`
    /// from FRESH; `NotFound` when there is no such attachment.
    pub fn attachment(&self, name: &str) -> Result<Attachment> {
        validate_name(name)?;
        let event = Event::AttachmentGet;
        let cell = self.lock();
        cell.check(event)?;
        reject_local(&cell)?;
        let id = cell.require_id(event)?;
        let db = self.database()?;

        let path = db.attachment_path(&id, name);
        let response = db
            .transport
            .read_raw(path.clone(), &cell.headers, &[])?
            .error_for_status(&encode_path(&path))?;
        let declared = response
            .header("content-type")
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let (content_type, data) = match response.body {
            Body::Bytes { content_type, data } => (content_type, data),
            Body::Json(value) => {
                let data = serde_json::to_vec(&value)
                    .map_err(|e| Error::protocol(format!("unreadable attachment: {}", e)))?;
                (declared, data)
            }
            Body::Empty => (declared, Vec::new()),
        };
        Ok(Attachment {
            name: name.to_string(),
            content_type,
            data,
        })
    }

    /// Upload an attachment as its own sub-resource
    ///
    /// Creates a new revision on the server, which the document adopts.
    /// VALID and STALE documents end VALID; DIRTY ones stay DIRTY.
    pub fn put_attachment(
        &self,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        validate_name(name)?;
        let event = Event::AttachmentPut;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        reject_local(&cell)?;
        let id = cell.require_id(event)?;
        let rev = cell.require_rev(event)?;
        let db = self.database()?;

        let data = data.into();
        let length = data.len();
        let path = db.attachment_path(&id, name);
        let ack = db
            .transport
            .write(
                path.clone(),
                &cell.headers,
                Body::Bytes {
                    content_type: content_type.to_string(),
                    data,
                },
                &[("rev".to_string(), rev.to_string())],
            )?
            .error_for_status(&encode_path(&path))?
            .write_ack()?;

        cell.body
            .insert(KEY_REV.to_string(), Value::String(ack.rev.to_string()));
        let mut stub = serde_json::json!({
            "content_type": content_type,
            "length": length,
            "stub": true,
        });
        if let (Some(revpos), Value::Object(meta)) = (ack.rev.generation(), &mut stub) {
            meta.insert("revpos".to_string(), Value::from(revpos));
        }
        edit_stubs(&mut cell.body, |stubs| {
            stubs.insert(name.to_string(), stub);
        });
        cell.apply(next, event);
        Ok(())
    }

    /// Remove an attachment on the server
    ///
    /// Same state rules as [`Document::put_attachment`].
    pub fn delete_attachment(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let event = Event::AttachmentDelete;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        reject_local(&cell)?;
        let id = cell.require_id(event)?;
        let rev = cell.require_rev(event)?;
        let db = self.database()?;

        let path = db.attachment_path(&id, name);
        let ack = db
            .transport
            .delete(
                path.clone(),
                &cell.headers,
                &[("rev".to_string(), rev.to_string())],
            )?
            .error_for_status(&encode_path(&path))?
            .write_ack()?;

        cell.body
            .insert(KEY_REV.to_string(), Value::String(ack.rev.to_string()));
        edit_stubs(&mut cell.body, |stubs| {
            stubs.remove(name);
        });
        cell.apply(next, event);
        Ok(())
    }

    /// Stage an attachment to be sent inline with `create`
    ///
    /// Staging the same name twice keeps the last payload.
    pub fn stage_attachment(
        &self,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        validate_name(name)?;
        let event = Event::StageAttachment;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        reject_local(&cell)?;
        cell.staged.insert(
            name.to_string(),
            StagedAttachment {
                content_type: content_type.to_string(),
                data: data.into(),
            },
        );
        cell.apply(next, event);
        Ok(())
    }

    /// Stage a file from disk, named after its file name
    ///
    /// `content_type` defaults to `application/octet-stream`.
    pub fn stage_file(&self, path: &Path, content_type: Option<&str>) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::invalid_input(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        let data = std::fs::read(path)?;
        self.stage_attachment(&name, content_type.unwrap_or(DEFAULT_CONTENT_TYPE), data)
    }

    /// Names of attachments staged for creation
    pub fn staged_attachments(&self) -> Vec<String> {
        self.lock().staged.keys().cloned().collect()
    }
}
