//! Account records and log payload annotations.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload flag set on a soft-deleted log collection.
pub const LOGS_DELETED_FLAG: &str = "__deleted";
/// Payload timestamp set on a soft-deleted log collection.
pub const LOGS_DELETED_AT: &str = "__deletedAt";

/// A live account, stored as JSON under `user:{username}`.
///
/// Fields this version does not know about are kept in `extra` and written
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Credential hash (hex SHA-256), or a legacy plaintext password.
    #[serde(default)]
    pub password: String,
    /// Session token; also names the account's log collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Credential used to reset a forgotten password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_key: Option<String>,
    /// Creation instant, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Set by soft-delete.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    /// When the account was soft-deleted, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    /// Unrecognised fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    /// Creates a fresh account record.
    pub fn new(password_hash: String, token: String, reset_key: String, created_at: String) -> Self {
        Self {
            password: password_hash,
            token: Some(token),
            reset_key: Some(reset_key),
            created_at: Some(created_at),
            deleted: false,
            deleted_at: None,
            extra: Map::new(),
        }
    }

    /// Parses the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedData`] if the value is not a JSON
    /// object with the expected field types.
    pub fn parse(key: &str, raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|e| CoreError::malformed(key, e.to_string()))
    }

    /// Serializes the record for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true if either deletion marker is present.
    pub fn is_marked_deleted(&self) -> bool {
        self.deleted || self.deleted_at.is_some()
    }

    /// Sets the deletion markers.
    pub fn mark_deleted(&mut self, at: String) {
        self.deleted = true;
        self.deleted_at = Some(at);
    }

    /// Clears the deletion markers.
    pub fn clear_deleted(&mut self) {
        self.deleted = false;
        self.deleted_at = None;
    }

    /// Returns the non-empty session token, if any.
    pub fn log_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Adds deletion markers to a log payload.
///
/// Only JSON objects can carry the markers. Returns `None` for arrays,
/// scalars and non-JSON payloads, which are left as they are.
pub fn annotate_logs_deleted(raw: &str, at: &str) -> Option<String> {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(raw) else {
        return None;
    };
    map.insert(LOGS_DELETED_FLAG.to_string(), Value::Bool(true));
    map.insert(LOGS_DELETED_AT.to_string(), Value::String(at.to_string()));
    serde_json::to_string(&Value::Object(map)).ok()
}

/// Removes deletion markers from a log payload.
///
/// Payloads without markers are returned unchanged, byte for byte.
pub fn strip_logs_deleted(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(mut map))
            if map.contains_key(LOGS_DELETED_FLAG) || map.contains_key(LOGS_DELETED_AT) =>
        {
            map.remove(LOGS_DELETED_FLAG);
            map.remove(LOGS_DELETED_AT);
            serde_json::to_string(&Value::Object(map)).unwrap_or_else(|_| raw.to_string())
        }
        _ => raw.to_string(),
    }
}
