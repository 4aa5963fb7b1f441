use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::actor::AuditStamp;
use crate::ids::SuspectId;

/// Display name used when a suspect has no recorded name.
pub const UNNAMED_SUSPECT: &str = "Unnamed Suspect";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustodyStatus {
    #[serde(rename = "Police Custody (Active Investigation)")]
    PoliceCustody,
    #[serde(rename = "Remanded (Police Custody)")]
    RemandedPolice,
    #[serde(rename = "Remanded (Prison Custody)")]
    RemandedPrison,
    #[serde(rename = "Bail (Court)")]
    CourtBail,
    #[serde(rename = "Bail (Police Enquiry)")]
    PoliceBail,
    Released,
    Wanted,
    Deceased,
    Other,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImage {
    pub url: String,
    pub storage_path: String,
}

/// A person of interest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspect {
    pub id: SuspectId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub offences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custody_status: Option<CustodyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custody_location: Option<String>,
    /// Reference numbers of cases this suspect is tied to.
    #[serde(default)]
    pub linked_case_reference_numbers: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<ProfileImage>,
    #[serde(flatten)]
    pub stamp: AuditStamp,
}

impl Suspect {
    pub fn display_name(&self) -> &str {
        display_name(&self.full_name)
    }
}

pub(crate) fn display_name(full_name: &str) -> &str {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        UNNAMED_SUSPECT
    } else {
        trimmed
    }
}

/// Requested change to a suspect's profile image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ProfileImageChange {
    #[default]
    Keep,
    Clear,
    /// A new image carried inline as a `data:` URI.
    Replace {
        #[serde(rename = "dataUri")]
        data_uri: String,
    },
}

/// The editable form of a suspect, as submitted by a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuspectDraft {
    pub full_name: String,
    pub nickname: Option<String>,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub occupation: Option<String>,
    pub phone_numbers: Vec<String>,
    pub offences: Vec<String>,
    pub custody_status: Option<CustodyStatus>,
    pub custody_location: Option<String>,
    /// Reference number of a case this suspect belongs to, as typed.
    pub linked_reference_number: Option<String>,
    pub profile_image: ProfileImageChange,
}

impl SuspectDraft {
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.full_name)
    }
}
