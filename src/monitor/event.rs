//! Events pushed to observers and their wire framing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::ScanReport;

/// Everything the pipeline can tell an observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A new newest item appeared in the inbox.
    #[serde(rename = "email_received", rename_all = "camelCase")]
    ItemObserved {
        #[serde(rename = "emailId")]
        id: String,
        subject: String,
        has_body: bool,
    },
    /// The item's body was evaluated.
    #[serde(rename = "scan_complete")]
    ScanCompleted {
        #[serde(rename = "emailId")]
        id: String,
        subject: String,
        #[serde(rename = "results")]
        report: ScanReport,
    },
    /// The rule engine rejected the item's body.
    #[serde(rename = "scan_error")]
    ScanFailed {
        #[serde(rename = "emailId")]
        id: String,
        #[serde(rename = "error")]
        reason: String,
    },
    /// The inbox could not be fetched this tick.
    #[serde(rename = "status_update")]
    PollFailed {
        message: String,
        #[serde(rename = "error")]
        reason: String,
    },
    #[serde(rename = "status_update")]
    StatusUpdate { message: String },
}

impl Event {
    pub fn poll_failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::PollFailed {
            message: format!("Inbox poll failed: {reason}"),
            reason,
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::StatusUpdate {
            message: message.into(),
        }
    }

    /// Wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ItemObserved { .. } => "email_received",
            Self::ScanCompleted { .. } => "scan_complete",
            Self::ScanFailed { .. } => "scan_error",
            Self::PollFailed { .. } | Self::StatusUpdate { .. } => "status_update",
        }
    }
}

/// An event stamped with the time it was produced. Immutable once built and
/// shared between observers behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }

    /// JSON payload: `{"type", "data", "timestamp"}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
