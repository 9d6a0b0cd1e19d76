use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notifications are not authorized")]
    NotAuthorized,

    #[error("notification backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub thread_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once after a delay.
    OneShot { delay_secs: u64 },
    /// Fire at a time of day; `weekday` (ISO 1-7) narrows to one day of
    /// the week, `repeats` keeps the trigger alive after it fires.
    Calendar {
        time: NaiveTime,
        weekday: Option<u8>,
        repeats: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

/// The platform notification capability. Scheduling is best-effort:
/// callers get errors back as values and decide what to report.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn authorization_status(&self) -> AuthorizationStatus;
    async fn request_authorization(&self) -> Result<bool, DispatchError>;
    async fn schedule(&self, request: NotificationRequest) -> Result<(), DispatchError>;
    async fn cancel(&self, identifiers: &[String]) -> Result<(), DispatchError>;
    async fn pending(&self) -> Result<Vec<NotificationRequest>, DispatchError>;
}

/// Bookkeeping implementation of the port: keeps the scheduled-request
/// table in memory so the service (and tests) can introspect it. Real
/// delivery adapters implement the same trait out of tree.
pub struct InProcessDispatcher {
    status: RwLock<AuthorizationStatus>,
    scheduled: RwLock<HashMap<String, NotificationRequest>>,
}

impl InProcessDispatcher {
    pub fn new() -> Arc<Self> {
        Self::with_status(AuthorizationStatus::Authorized)
    }

    pub fn with_status(status: AuthorizationStatus) -> Arc<Self> {
        Arc::new(Self {
            status: RwLock::new(status),
            scheduled: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl NotificationPort for InProcessDispatcher {
    async fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.read().await
    }

    async fn request_authorization(&self) -> Result<bool, DispatchError> {
        let mut status = self.status.write().await;
        match *status {
            AuthorizationStatus::Denied => Ok(false),
            _ => {
                *status = AuthorizationStatus::Authorized;
                Ok(true)
            }
        }
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<(), DispatchError> {
        if *self.status.read().await != AuthorizationStatus::Authorized {
            return Err(DispatchError::NotAuthorized);
        }
        self.scheduled
            .write()
            .await
            .insert(request.identifier.clone(), request);
        Ok(())
    }

    async fn cancel(&self, identifiers: &[String]) -> Result<(), DispatchError> {
        let mut scheduled = self.scheduled.write().await;
        for id in identifiers {
            scheduled.remove(id);
        }
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<NotificationRequest>, DispatchError> {
        let mut requests: Vec<NotificationRequest> =
            self.scheduled.read().await.values().cloned().collect();
        requests.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(requests)
    }
}
