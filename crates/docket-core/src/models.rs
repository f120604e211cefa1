//! Record types persisted inside the vault.
//!
//! The wire shapes are owned by the surrounding application; unknown keys
//! pass through untouched so an older build never strips fields written by
//! a newer one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::VaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatterType {
    Civil,
    Criminal,
    Administrative,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Active,
    Closed,
}

/// One legal matter with its running annexes. Tasks, diary and deadlines
/// are host-defined shapes the vault stores opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
    pub id: Uuid,
    pub matter: MatterType,
    pub client: String,
    #[serde(default)]
    pub counterparty: String,
    #[serde(default)]
    pub court: String,
    pub subject: String,
    /// Court registry or file reference number.
    #[serde(default)]
    pub docket_number: String,
    pub status: CaseStatus,
    #[serde(default)]
    pub tasks: Vec<Value>,
    #[serde(default)]
    pub diary: Vec<Value>,
    #[serde(default)]
    pub deadlines: Vec<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaseFile {
    pub fn new(
        matter: MatterType,
        client: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            matter,
            client: client.into(),
            counterparty: String::new(),
            court: String::new(),
            subject: subject.into(),
            docket_number: String::new(),
            status: CaseStatus::Active,
            tasks: Vec::new(),
            diary: Vec::new(),
            deadlines: Vec::new(),
            created_at: Utc::now(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Hearing,
    Study,
    Deadline,
    Meeting,
    Personal,
    Other,
}

/// One calendar entry. Times are `HH:MM` strings as the host writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEvent {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time_start: String,
    #[serde(default)]
    pub time_end: String,
    pub category: EventCategory,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub case_id: Option<Uuid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgendaEvent {
    pub fn new(title: impl Into<String>, date: NaiveDate, category: EventCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            date,
            time_start: String::new(),
            time_end: String::new(),
            category,
            notes: String::new(),
            completed: false,
            case_id: None,
            extra: Map::new(),
        }
    }
}

impl fmt::Display for MatterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatterType::Civil => "civil",
            MatterType::Criminal => "criminal",
            MatterType::Administrative => "administrative",
            MatterType::Advisory => "advisory",
        };
        f.write_str(name)
    }
}

impl FromStr for MatterType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "civil" => Ok(MatterType::Civil),
            "criminal" => Ok(MatterType::Criminal),
            "administrative" => Ok(MatterType::Administrative),
            "advisory" => Ok(MatterType::Advisory),
            other => Err(VaultError::Malformed(format!("unknown matter type {other:?}"))),
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::Hearing => "hearing",
            EventCategory::Study => "study",
            EventCategory::Deadline => "deadline",
            EventCategory::Meeting => "meeting",
            EventCategory::Personal => "personal",
            EventCategory::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for EventCategory {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hearing" => Ok(EventCategory::Hearing),
            "study" => Ok(EventCategory::Study),
            "deadline" => Ok(EventCategory::Deadline),
            "meeting" => Ok(EventCategory::Meeting),
            "personal" => Ok(EventCategory::Personal),
            "other" => Ok(EventCategory::Other),
            unknown => Err(VaultError::Malformed(format!(
                "unknown event category {unknown:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_wire_shape_is_camel_case() {
        let case = CaseFile::new(MatterType::Administrative, "Comune di Roma", "Appeal");
        let value = serde_json::to_value(&case).unwrap();
        assert_eq!(value["matter"], "administrative");
        assert_eq!(value["status"], "active");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("docketNumber").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn unknown_keys_round_trip() {
        let raw = r#"{
            "id": "9f8b6a9c-3a67-4f0b-8d2e-3a1b5c7d9e01",
            "matter": "civil",
            "client": "Allianz SPA",
            "subject": "Damages",
            "status": "closed",
            "createdAt": "2026-01-10T09:30:00Z",
            "folderPath": "/archive/2026"
        }"#;
        let case: CaseFile = serde_json::from_str(raw).unwrap();
        assert_eq!(case.status, CaseStatus::Closed);
        assert_eq!(case.extra["folderPath"], "/archive/2026");

        let back = serde_json::to_value(&case).unwrap();
        assert_eq!(back["folderPath"], "/archive/2026");
    }

    #[test]
    fn event_defaults_fill_missing_fields() {
        let raw = r#"{
            "id": "9f8b6a9c-3a67-4f0b-8d2e-3a1b5c7d9e02",
            "title": "Udienza Tribunale",
            "date": "2026-09-01",
            "category": "hearing"
        }"#;
        let event: AgendaEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.time_start, "");
        assert!(!event.completed);
        assert!(event.case_id.is_none());
    }

    #[test]
    fn category_and_matter_parse_case_insensitively() {
        assert_eq!("Hearing".parse::<EventCategory>().unwrap(), EventCategory::Hearing);
        assert_eq!("CIVIL".parse::<MatterType>().unwrap(), MatterType::Civil);
        assert!("somethingelse".parse::<EventCategory>().is_err());
    }
}
