use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Marker rendered in place of a timestamp the backend sent in an unreadable shape.
pub const INVALID_DATE: &str = "Invalid date";

pub(crate) const SEARCH_PREFIX: &str = "search-";
pub(crate) const HANDOFF_PREFIX: &str = "handoff-";

/// Identifier of the account owning the tracked applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for tracked applications. Backend rows carry the id the backend
/// assigned; listings that only live in memory carry a provenance prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn provenance(&self) -> Provenance {
        if self.0.starts_with(SEARCH_PREFIX) {
            Provenance::Search
        } else if self.0.starts_with(HANDOFF_PREFIX) {
            Provenance::Handoff
        } else {
            Provenance::Persisted
        }
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an application record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Persisted,
    Search,
    Handoff,
}

impl Provenance {
    pub(crate) const fn id_prefix(self) -> &'static str {
        match self {
            Provenance::Persisted => "",
            Provenance::Search => SEARCH_PREFIX,
            Provenance::Handoff => HANDOFF_PREFIX,
        }
    }
}

/// Stage of a job application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ApplicationStatus {
    #[default]
    NotApplied,
    Applied,
    Screening,
    Interview,
    Offer,
    Rejected,
    Accepted,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::NotApplied,
        ApplicationStatus::Applied,
        ApplicationStatus::Screening,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Accepted,
        ApplicationStatus::Withdrawn,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::NotApplied => "not_applied",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screening => "screening",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Whether moving an in-memory listing to this status means it must be persisted.
    pub const fn is_committed(self) -> bool {
        matches!(self, ApplicationStatus::Applied)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A tracked job application, either mirrored from the backend or held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub company_name: String,
    pub position: String,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: ApplicationStatus,
    pub application_date: String,
    #[serde(default)]
    pub job_posting_url: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl JobApplication {
    pub fn provenance(&self) -> Provenance {
        self.id.provenance()
    }

    pub fn application_date_label(&self) -> String {
        display_date(&self.application_date)
    }

    pub fn updated_at_label(&self) -> String {
        display_date(&self.updated_at)
    }

    /// Draft carrying this record's fields, used when an in-memory listing is persisted.
    pub fn to_draft(&self, status: ApplicationStatus, application_date: String) -> NewApplication {
        NewApplication {
            company_name: self.company_name.clone(),
            position: self.position.clone(),
            status,
            application_date: Some(application_date),
            job_posting_url: self.job_posting_url.clone(),
            job_description: self.job_description.clone(),
            notes: self.notes.clone(),
        }
    }
}

fn status_or_default<'de, D>(deserializer: D) -> Result<ApplicationStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ApplicationStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields required to create an application on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub company_name: String,
    pub position: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_posting_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewApplication {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("company_name", &self.company_name)?;
        require_text("position", &self.position)
    }
}

/// Partial update of an application; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_posting_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ApplicationPatch {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if let Some(company_name) = &self.company_name {
            require_text("company_name", company_name)?;
        }
        if let Some(position) = &self.position {
            require_text("position", position)?;
        }
        Ok(())
    }

    /// Applies the patch to an in-memory record, stamping `updated_at`.
    pub fn apply_to(&self, application: &mut JobApplication, now: &str) {
        if let Some(company_name) = &self.company_name {
            application.company_name = company_name.clone();
        }
        if let Some(position) = &self.position {
            application.position = position.clone();
        }
        if let Some(status) = self.status {
            application.status = status;
        }
        if let Some(date) = &self.application_date {
            application.application_date = date.clone();
        }
        if let Some(url) = &self.job_posting_url {
            application.job_posting_url = non_blank(url);
        }
        if let Some(description) = &self.job_description {
            application.job_description = non_blank(description);
        }
        if let Some(notes) = &self.notes {
            application.notes = non_blank(notes);
        }
        application.updated_at = now.to_string();
    }
}

/// Input rejected before any backend call is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("patch does not change any field")]
    EmptyPatch,
    #[error("status '{0}' does not commit an application")]
    NotCommitted(ApplicationStatus),
    #[error("application {0} is already stored on the backend")]
    AlreadyPersisted(ApplicationId),
    #[error("application {0} has no job description to interview against")]
    MissingJobDescription(ApplicationId),
    #[error("invalid hand-off payload: {0}")]
    Handoff(String),
    #[error("listing {0} already tracks this company and position")]
    DuplicateListing(ApplicationId),
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Renders a backend timestamp as `MMM d, yyyy`, or [`INVALID_DATE`] when it cannot be read.
pub fn display_date(raw: &str) -> String {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|value| value.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|v| v.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"));

    match date {
        Ok(date) => date.format("%b %-d, %Y").to_string(),
        Err(_) => INVALID_DATE.to_string(),
    }
}
