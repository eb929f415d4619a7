#![forbid(unsafe_code)]

//! Per-track flight metadata.
//!
//! Every track in a file starts with a copy of the file-level `track_info`
//! record. Tracks hold it behind an `Arc` so snapshots taken for undo are
//! cheap; a split deep-copies it so the two halves diverge from then on.
//!
//! # Validation
//!
//! [`TrackInfo::validate`] applies the rules the import step enforces:
//!
//! - every text field is mandatory except `submitter_notes`,
//! - `nps_mission_code` is only mandatory when the operator is the
//!   National Park Service,
//! - the registration (tail number) must contain an `N`-number.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Operator name that makes a mission code mandatory.
pub const NPS_OPERATOR: &str = "National Park Service";

fn registration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"N\d{2,5}[A-Z]{0,2}").expect("static pattern compiles"))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

/// Flight metadata attached to a track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackInfo {
    #[serde(deserialize_with = "null_as_empty")]
    pub registration: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub operator_code: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub nps_mission_code: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub aircraft_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub submitter: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub submission_time: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub submitter_notes: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub track_editor: String,
    /// Timestamp of the first vertex, or of the cut vertex after a split.
    pub departure_datetime: Option<String>,
    /// Timestamp of the cut vertex on the earlier half of a split.
    pub landing_datetime: Option<String>,
    /// Whether the metadata form is unlocked for editing.
    #[serde(rename = "trackInfoUnlocked")]
    pub unlocked: bool,
    /// Columns this editor does not interpret; passed through to import.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Editable metadata fields, as exposed by the track info form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoField {
    Registration,
    OperatorCode,
    MissionCode,
    AircraftType,
    SubmitterNotes,
    TrackEditor,
}

impl InfoField {
    pub const ALL: [InfoField; 6] = [
        InfoField::Registration,
        InfoField::OperatorCode,
        InfoField::MissionCode,
        InfoField::AircraftType,
        InfoField::SubmitterNotes,
        InfoField::TrackEditor,
    ];

    /// Field name as used in the JSON record.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::OperatorCode => "operator_code",
            Self::MissionCode => "nps_mission_code",
            Self::AircraftType => "aircraft_type",
            Self::SubmitterNotes => "submitter_notes",
            Self::TrackEditor => "track_editor",
        }
    }

    /// Form label shown to the operator.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Registration => "Tail number",
            Self::OperatorCode => "Operator",
            Self::MissionCode => "NPS mission code",
            Self::AircraftType => "Aircraft type",
            Self::SubmitterNotes => "Submitter notes",
            Self::TrackEditor => "Track editor",
        }
    }

    /// Look a field up by its JSON key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// A reason the metadata cannot be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoIssue {
    /// A mandatory field is empty.
    Missing(InfoField),
    /// The registration does not contain an N-number.
    BadRegistration(String),
    /// NPS flights must name a mission code.
    MissingMissionCode,
}

impl fmt::Display for InfoIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(
                f,
                "The \"{}\" field is empty but all track info fields are mandatory.",
                field.label()
            ),
            Self::BadRegistration(_) => write!(f, "The \"Tail number\" field entry isn't valid."),
            Self::MissingMissionCode => write!(
                f,
                "You must select an \"NPS mission code\" if the operator is the National Park Service"
            ),
        }
    }
}

impl TrackInfo {
    /// Read a field's current value.
    pub fn get(&self, field: InfoField) -> &str {
        match field {
            InfoField::Registration => &self.registration,
            InfoField::OperatorCode => &self.operator_code,
            InfoField::MissionCode => &self.nps_mission_code,
            InfoField::AircraftType => &self.aircraft_type,
            InfoField::SubmitterNotes => &self.submitter_notes,
            InfoField::TrackEditor => &self.track_editor,
        }
    }

    /// Overwrite a field.
    pub fn set(&mut self, field: InfoField, value: impl Into<String>) {
        let value = value.into();
        match field {
            InfoField::Registration => self.registration = value,
            InfoField::OperatorCode => self.operator_code = value,
            InfoField::MissionCode => self.nps_mission_code = value,
            InfoField::AircraftType => self.aircraft_type = value,
            InfoField::SubmitterNotes => self.submitter_notes = value,
            InfoField::TrackEditor => self.track_editor = value,
        }
    }

    /// Whether the operator is the National Park Service.
    pub fn is_nps(&self) -> bool {
        self.operator_code == NPS_OPERATOR
    }

    /// Collect every reason this record would be rejected by import.
    ///
    /// An empty result means the record is importable.
    #[must_use]
    pub fn validate(&self) -> Vec<InfoIssue> {
        let mut issues = Vec::new();
        for field in InfoField::ALL {
            match field {
                InfoField::SubmitterNotes | InfoField::MissionCode => continue,
                _ => {}
            }
            if self.get(field).trim().is_empty() {
                issues.push(InfoIssue::Missing(field));
            }
        }

        if !self.registration.trim().is_empty()
            && !registration_pattern().is_match(&self.registration)
        {
            issues.push(InfoIssue::BadRegistration(self.registration.clone()));
        }

        if self.is_nps() && self.nps_mission_code.trim().is_empty() {
            issues.push(InfoIssue::MissingMissionCode);
        }

        issues
    }
}
