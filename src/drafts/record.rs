use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The record persisted for every draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEnvelope {
    pub data: Value,
    /// Last write time, epoch milliseconds
    pub timestamp: i64,
    pub draft_id: String,
    pub owner_id: String,
    pub wizard_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    /// First write time, epoch milliseconds. Absent on records written by
    /// older clients, in which case `timestamp` stands in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl DraftEnvelope {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Expired once the last write is more than `ttl` old
    pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.timestamp) > ttl.num_milliseconds()
    }

    /// Whether every stored time maps to a representable date, including
    /// the expiry derived from `ttl`
    pub fn has_valid_times(&self, ttl: Duration) -> bool {
        let Some(updated_at) = DateTime::from_timestamp_millis(self.timestamp) else {
            return false;
        };
        let created_ok = self
            .created_at
            .map_or(true, |ms| DateTime::from_timestamp_millis(ms).is_some());
        created_ok && updated_at.checked_add_signed(ttl).is_some()
    }

    pub fn to_draft(&self, ttl: Duration) -> WizardDraft {
        let updated_at = millis_to_datetime(self.timestamp);
        WizardDraft {
            id: self.draft_id.clone(),
            wizard_type: self.wizard_type.clone(),
            owner_id: self.owner_id.clone(),
            current_step_id: self.current_step_id.clone(),
            payload: self.data.clone(),
            created_at: millis_to_datetime(self.created_at.unwrap_or(self.timestamp)),
            updated_at,
            expires_at: updated_at + ttl,
        }
    }

    pub fn to_summary(&self, ttl: Duration) -> DraftSummary {
        let updated_at = millis_to_datetime(self.timestamp);
        DraftSummary {
            id: self.draft_id.clone(),
            wizard_type: self.wizard_type.clone(),
            owner_id: self.owner_id.clone(),
            current_step_id: self.current_step_id.clone(),
            updated_at,
            expires_at: updated_at + ttl,
        }
    }
}

/// A loaded draft with its lifecycle timestamps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDraft {
    pub id: String,
    pub wizard_type: String,
    pub owner_id: String,
    pub current_step_id: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Draft metadata for picker lists, without the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: String,
    pub wizard_type: String,
    pub owner_id: String,
    pub current_step_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
