//! Wire-level request and reply types.
//!
//! - [`Message`]: what a client submits after the handshake.
//! - [`Outcome`]: what the manager reports when the work completes.
//! - [`ManagerAck`]: what the originating client receives after `on_finish`.

use serde::{Deserialize, Serialize};

use super::petition::{Action, Petition, PetitionId};

/// Client request: `{id, action}` plus an optional priority hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique while the petition is pending or running.
    pub id: PetitionId,
    /// Priority hint used by the default conversion (lower is served earlier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Opaque payload.
    #[serde(default)]
    pub action: Action,
}

impl Message {
    /// Creates a message without a priority hint.
    pub fn new(id: impl Into<PetitionId>, action: Action) -> Self {
        Self {
            id: id.into(),
            priority: None,
            action,
        }
    }

    /// Attaches a priority hint.
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl From<Message> for Petition {
    /// Default 1:1 conversion: priority hint or `0`.
    fn from(m: Message) -> Self {
        Petition::new(m.id, m.priority.unwrap_or_default(), m.action)
    }
}

/// Result of the externally performed work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Work completed.
    Succeeded {
        /// Optional explanation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Work failed.
    Failed {
        /// Why it failed.
        reason: String,
    },
}

impl Outcome {
    /// Success without detail.
    pub fn success() -> Self {
        Outcome::Succeeded { detail: None }
    }

    /// Failure with a reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
        }
    }

    /// `true` for [`Outcome::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }
}

/// Reply delivered to the originating client: `{id, success, detail?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerAck {
    /// Petition id.
    pub id: PetitionId,
    /// Whether the petition completed successfully.
    pub success: bool,
    /// Optional human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ManagerAck {
    /// Failure ack with an explanation.
    pub fn failure(id: PetitionId, detail: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            detail: Some(detail.into()),
        }
    }

    /// Ack mirroring a work outcome.
    pub fn from_outcome(id: PetitionId, outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Succeeded { detail } => Self {
                id,
                success: true,
                detail: detail.clone(),
            },
            Outcome::Failed { reason } => Self::failure(id, reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_defaults_missing_fields() {
        let m: Message = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(m.id, PetitionId::Int(7));
        assert_eq!(m.priority, None);
        assert_eq!(m.action, serde_json::Value::Null);
    }

    #[test]
    fn default_conversion_uses_priority_hint() {
        let p: Petition = Message::new("a", json!("run")).with_priority(3).into();
        assert_eq!(p.priority(), 3);
        let q: Petition = Message::new("b", json!("run")).into();
        assert_eq!(q.priority(), 0);
    }

    #[test]
    fn ack_wire_shape() {
        let ack = ManagerAck::from_outcome("a".into(), &Outcome::failure("exit code 2"));
        let v = serde_json::to_value(&ack).unwrap();
        assert_eq!(v, json!({"id": "a", "success": false, "detail": "exit code 2"}));
    }
}
