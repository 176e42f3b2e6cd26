//! Request routing and handlers.
//!
//! A transport hands over a [`RawRequest`] (method, path, query, the
//! `Authorization` header and the body). It is parsed into a typed
//! [`Request`] and dispatched to the core services; every outcome,
//! including errors, becomes a [`Response`].

use crate::auth::AdminGuard;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use routelog_core::{AccountService, BackupScheduler, Clock, Exporter, SnapshotManager};
use routelog_storage::{KeyValueStore, ObjectStore, JSON_CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Content type of plain-text responses.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A request as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// HTTP method, upper case.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Value of the `Authorization` header.
    pub authorization: Option<String>,
    /// Request body.
    pub body: String,
}

impl RawRequest {
    /// Creates a request with an empty body.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets the `Authorization` header.
    #[must_use]
    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// A typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `POST /api/signup`
    Signup {
        /// Requested username.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// `POST /api/login`
    Login {
        /// Username.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// `POST /api/change-password`
    ChangePassword {
        /// Username.
        username: String,
        /// Session token from the `Authorization` header.
        token: Option<String>,
        /// Current password.
        current_password: String,
        /// Replacement password.
        new_password: String,
    },
    /// `POST /api/reset-password`
    ResetPassword {
        /// Username.
        username: String,
        /// Reset key issued at signup.
        reset_key: String,
        /// Replacement password.
        new_password: String,
    },
    /// `POST /api/delete-account`
    DeleteAccount {
        /// Username.
        username: String,
        /// Session token from the `Authorization` header.
        token: Option<String>,
        /// Current password.
        password: String,
    },
    /// `GET /logs`
    GetLogs {
        /// Session token from the `Authorization` header.
        token: Option<String>,
    },
    /// `POST /logs`
    SaveLogs {
        /// Session token from the `Authorization` header.
        token: Option<String>,
        /// Serialized log collection.
        body: String,
    },
    /// `GET /admin/users`
    AdminListUsers {
        /// Admin token from the query string.
        admin_token: Option<String>,
    },
    /// `POST /admin/users`
    AdminUserAction {
        /// Admin token from the query string.
        admin_token: Option<String>,
        /// `delete` or `reset-password`.
        action: String,
        /// Target account.
        username: String,
        /// New password for `reset-password`.
        temp_password: Option<String>,
    },
    /// `GET /admin/deleted`
    AdminListDeleted {
        /// Admin token from the query string.
        admin_token: Option<String>,
    },
    /// `POST /admin/restore`
    AdminRestore {
        /// Admin token from the query string.
        admin_token: Option<String>,
        /// Account to restore.
        username: Option<String>,
        /// Explicit snapshot key.
        deleted_key: Option<String>,
    },
    /// `GET /admin/export`
    AdminExport {
        /// Admin token from the query string.
        admin_token: Option<String>,
    },
    /// `POST /admin/backup-now`
    AdminBackupNow {
        /// Admin token from the query string.
        admin_token: Option<String>,
    },
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    reset_key: String,
    #[serde(default)]
    new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserActionBody {
    #[serde(default)]
    action: String,
    #[serde(default)]
    username: String,
    temp_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreBody {
    username: Option<String>,
    deleted_key: Option<String>,
}

fn body<T: DeserializeOwned>(raw: &RawRequest) -> ServerResult<T> {
    Ok(serde_json::from_str(&raw.body)?)
}

impl Request {
    /// Parses a raw request.
    ///
    /// # Errors
    ///
    /// [`ServerError::NotFound`] for unknown routes and
    /// [`ServerError::InvalidRequest`] for bodies that do not parse.
    pub fn from_raw(raw: &RawRequest) -> ServerResult<Self> {
        let token = raw.authorization.clone().filter(|t| !t.is_empty());
        let admin_token = raw.query.get("adminToken").cloned();

        let request = match (raw.method.as_str(), raw.path.as_str()) {
            ("POST", "/api/signup") => {
                let Credentials { username, password } = body(raw)?;
                Request::Signup { username, password }
            }
            ("POST", "/api/login") => {
                let Credentials { username, password } = body(raw)?;
                Request::Login { username, password }
            }
            ("POST", "/api/change-password") => {
                let b: ChangePasswordBody = body(raw)?;
                Request::ChangePassword {
                    username: b.username,
                    token,
                    current_password: b.current_password,
                    new_password: b.new_password,
                }
            }
            ("POST", "/api/reset-password") => {
                let b: ResetPasswordBody = body(raw)?;
                Request::ResetPassword {
                    username: b.username,
                    reset_key: b.reset_key,
                    new_password: b.new_password,
                }
            }
            ("POST", "/api/delete-account") => {
                let Credentials { username, password } = body(raw)?;
                Request::DeleteAccount {
                    username,
                    token,
                    password,
                }
            }
            ("GET", "/logs") => Request::GetLogs { token },
            ("POST", "/logs") => Request::SaveLogs {
                token,
                body: raw.body.clone(),
            },
            ("GET", "/admin/users") => Request::AdminListUsers { admin_token },
            ("POST", "/admin/users") => {
                let b: UserActionBody = body(raw)?;
                Request::AdminUserAction {
                    admin_token,
                    action: b.action,
                    username: b.username,
                    temp_password: b.temp_password,
                }
            }
            ("GET", "/admin/deleted") => Request::AdminListDeleted { admin_token },
            ("POST", "/admin/restore") => {
                let b: RestoreBody = body(raw)?;
                Request::AdminRestore {
                    admin_token,
                    username: b.username,
                    deleted_key: b.deleted_key,
                }
            }
            ("GET", "/admin/export") => Request::AdminExport { admin_token },
            ("POST", "/admin/backup-now") => Request::AdminBackupNow { admin_token },
            _ => return Err(ServerError::NotFound("Not Found".into())),
        };
        Ok(request)
    }

    fn admin_token(&self) -> Option<Option<&str>> {
        match self {
            Request::AdminListUsers { admin_token }
            | Request::AdminUserAction { admin_token, .. }
            | Request::AdminListDeleted { admin_token }
            | Request::AdminRestore { admin_token, .. }
            | Request::AdminExport { admin_token }
            | Request::AdminBackupNow { admin_token } => Some(admin_token.as_deref()),
            _ => None,
        }
    }
}

/// A response ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `Content-Type` header.
    pub content_type: &'static str,
    /// Response body.
    pub body: String,
}

impl Response {
    /// A 200 plain-text response.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: TEXT_CONTENT_TYPE,
            body: body.into(),
        }
    }

    /// A 200 JSON response with a pre-serialized body.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: JSON_CONTENT_TYPE,
            body: body.into(),
        }
    }

    /// Converts an error into its client-facing response.
    pub fn from_error(err: &ServerError) -> Self {
        let (content_type, body) = match err {
            ServerError::UsernameTaken => (
                JSON_CONTENT_TYPE,
                serde_json::json!({ "error": err.to_string() }).to_string(),
            ),
            _ => (TEXT_CONTENT_TYPE, err.to_string()),
        };
        Self {
            status: err.status_code(),
            content_type,
            body,
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Dispatches requests to the core services.
pub struct RequestHandler {
    accounts: AccountService,
    snapshots: SnapshotManager,
    backups: Arc<BackupScheduler>,
    admin: AdminGuard,
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl RequestHandler {
    /// Creates a handler over the given stores.
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn KeyValueStore>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts =
            AccountService::new(store.clone(), clock.clone()).with_pager_config(config.pager.clone());
        let snapshots = accounts.snapshots().clone();
        let exporter = Exporter::with_config(store, config.export.clone());
        let backups = Arc::new(BackupScheduler::new(exporter, objects, clock));
        Self {
            accounts,
            snapshots,
            backups,
            admin: AdminGuard::new(config.admin_token.as_deref()),
        }
    }

    /// Returns the backup scheduler, for spawning the daily task.
    pub fn backups(&self) -> Arc<BackupScheduler> {
        self.backups.clone()
    }

    /// Parses and handles a raw request.
    pub async fn handle_raw(&self, raw: &RawRequest) -> Response {
        match Request::from_raw(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!(method = %raw.method, path = %raw.path, error = %e, "rejected request");
                Response::from_error(&e)
            }
        }
    }

    /// Handles a typed request.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    error!(error = %e, "request failed");
                } else {
                    debug!(status = e.status_code(), error = %e, "request refused");
                }
                Response::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> ServerResult<Response> {
        if let Some(presented) = request.admin_token() {
            if let Err(e) = self.admin.verify(presented) {
                warn!("admin request with bad token");
                return Err(e);
            }
        }

        match request {
            Request::Signup { username, password } => {
                let receipt = self.accounts.signup(&username, &password).await?;
                let body = serde_json::json!({ "token": receipt.token, "resetKey": receipt.reset_key });
                Ok(Response::json(body.to_string()))
            }
            Request::Login { username, password } => {
                let token = self.accounts.login(&username, &password).await?;
                Ok(Response::json(serde_json::json!({ "token": token }).to_string()))
            }
            Request::ChangePassword {
                username,
                token,
                current_password,
                new_password,
            } => {
                self.accounts
                    .change_password(
                        &username,
                        token.as_deref().unwrap_or_default(),
                        &current_password,
                        &new_password,
                    )
                    .await?;
                Ok(Response::text("Password changed"))
            }
            Request::ResetPassword {
                username,
                reset_key,
                new_password,
            } => {
                self.accounts
                    .reset_password(&username, &reset_key, &new_password)
                    .await
                    .map_err(|e| match e {
                        routelog_core::CoreError::InvalidCredentials => {
                            ServerError::NotAuthorized("Invalid reset key".into())
                        }
                        other => other.into(),
                    })?;
                Ok(Response::text("Password reset"))
            }
            Request::DeleteAccount {
                username,
                token,
                password,
            } => {
                self.accounts
                    .delete_account(&username, token.as_deref().unwrap_or_default(), &password)
                    .await?;
                Ok(Response::text("Account soft-deleted (recycle bin)"))
            }
            Request::GetLogs { token } => {
                let token = require_token(token)?;
                Ok(Response::json(self.accounts.load_logs(&token).await?))
            }
            Request::SaveLogs { token, body } => {
                let token = require_token(token)?;
                self.accounts.save_logs(&token, &body).await?;
                Ok(Response::text("Logs saved"))
            }
            Request::AdminListUsers { .. } => {
                let users = self.accounts.list_users().await?;
                Ok(Response::json(pretty(&users)?))
            }
            Request::AdminUserAction {
                action,
                username,
                temp_password,
                ..
            } => self.user_action(&action, &username, temp_password).await,
            Request::AdminListDeleted { .. } => {
                let keys = self.snapshots.list_all_snapshots().await?;
                Ok(Response::json(pretty(&keys)?))
            }
            Request::AdminRestore {
                username,
                deleted_key,
                ..
            } => {
                let username = username
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| ServerError::InvalidRequest("Missing username".into()))?;
                let deleted_key = deleted_key.filter(|k| !k.is_empty());
                if !self.snapshots.restore(&username, deleted_key.as_deref()).await? {
                    return Err(ServerError::NotFound(
                        "Restore failed or snapshot not found".into(),
                    ));
                }
                info!(username = %username, "admin restore");
                Ok(Response::text("Restore successful"))
            }
            Request::AdminExport { .. } => {
                let receipt = self.backups.backup_now().await?;
                Ok(Response::text(format!("Exported as {}", receipt.name)))
            }
            Request::AdminBackupNow { .. } => {
                let receipt = self.backups.backup_now().await?;
                Ok(Response::text(format!("Backup written as {}", receipt.name)))
            }
        }
    }

    async fn user_action(
        &self,
        action: &str,
        username: &str,
        temp_password: Option<String>,
    ) -> ServerResult<Response> {
        match action {
            "delete" => {
                if !self.snapshots.soft_delete(username).await? {
                    return Err(ServerError::NotFound("User not found".into()));
                }
                info!(username, "admin soft-delete");
                Ok(Response::text("User soft-deleted (snapshot kept)."))
            }
            "reset-password" => {
                let temp = temp_password
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| ServerError::InvalidRequest("Missing tempPassword".into()))?;
                self.accounts.admin_reset_password(username, &temp).await?;
                Ok(Response::text("Password reset."))
            }
            _ => Err(ServerError::InvalidRequest("Unknown action".into())),
        }
    }
}

fn require_token(token: Option<String>) -> ServerResult<String> {
    token.ok_or_else(|| ServerError::AuthenticationFailed("Missing token".into()))
}

fn pretty<T: serde::Serialize>(value: &T) -> ServerResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ServerError::Internal(e.to_string()))
}
