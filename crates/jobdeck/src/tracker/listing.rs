use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::domain::{
    non_blank, ApplicationId, ApplicationStatus, JobApplication, Provenance, UserId,
    ValidationError,
};

const UNKNOWN_COMPANY: &str = "Unknown Company";
const UNKNOWN_POSITION: &str = "Unknown Position";
const UNSPECIFIED: &str = "Not specified";

/// Issues ids for in-memory listings. Each tracker owns one, so a reset starts over.
#[derive(Debug, Default)]
pub struct CandidateSequence {
    issued: u64,
}

impl CandidateSequence {
    pub fn next_id(&mut self, provenance: Provenance) -> ApplicationId {
        self.issued += 1;
        ApplicationId(format!("{}{:06}", provenance.id_prefix(), self.issued))
    }
}

/// Job listing as returned by the third-party search API. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalListing {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub employer_name: Option<String>,
    #[serde(default)]
    pub job_apply_link: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub job_city: Option<String>,
    #[serde(default)]
    pub job_state: Option<String>,
    #[serde(default)]
    pub job_country: Option<String>,
    #[serde(default)]
    pub job_is_remote: Option<bool>,
    #[serde(default)]
    pub job_employment_type: Option<String>,
}

impl ExternalListing {
    pub fn company_name(&self) -> String {
        self.employer_name
            .as_deref()
            .and_then(non_blank)
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
    }

    pub fn position(&self) -> String {
        self.job_title
            .as_deref()
            .and_then(non_blank)
            .unwrap_or_else(|| UNKNOWN_POSITION.to_string())
    }

    /// `City, State` when both are known, otherwise the country, with a remote marker.
    pub fn location_label(&self) -> String {
        let city = self.job_city.as_deref().and_then(non_blank);
        let state = self.job_state.as_deref().and_then(non_blank);
        let country = self.job_country.as_deref().and_then(non_blank);

        let mut label = match (city, state, country) {
            (Some(city), Some(state), _) => format!("{city}, {state}"),
            (_, _, Some(country)) => country,
            _ => UNSPECIFIED.to_string(),
        };
        if self.job_is_remote.unwrap_or(false) {
            label.push_str(" (Remote)");
        }
        label
    }

    fn notes(&self, provenance: Provenance) -> String {
        let source = match provenance {
            Provenance::Handoff => "Selected in job matching",
            Provenance::Search | Provenance::Persisted => "Saved from job search",
        };
        let employment_type = self
            .job_employment_type
            .as_deref()
            .and_then(non_blank)
            .unwrap_or_else(|| UNSPECIFIED.to_string());
        format!(
            "{source}:\nLocation: {}\nEmployment Type: {employment_type}",
            self.location_label()
        )
    }

    /// Maps the listing into an in-memory application with defaults for every missing field.
    pub fn to_candidate(
        &self,
        id: ApplicationId,
        user_id: &UserId,
        provenance: Provenance,
        now: &str,
    ) -> JobApplication {
        JobApplication {
            id,
            user_id: user_id.clone(),
            company_name: self.company_name(),
            position: self.position(),
            status: ApplicationStatus::NotApplied,
            application_date: now.to_string(),
            job_posting_url: self.job_apply_link.as_deref().and_then(non_blank),
            job_description: self.job_description.as_deref().and_then(non_blank),
            notes: Some(self.notes(provenance)),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

/// Listings selected in an earlier workflow step and handed to the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    #[serde(default)]
    pub selected_jobs: Vec<ExternalListing>,
}

impl HandoffPayload {
    /// Accepts either `{"selected_jobs": [...]}` or a bare array of listings.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Wrapped(HandoffPayload),
            Bare(Vec<ExternalListing>),
        }

        match serde_json::from_str::<Shape>(raw) {
            Ok(Shape::Wrapped(payload)) => Ok(payload),
            Ok(Shape::Bare(selected_jobs)) => Ok(Self { selected_jobs }),
            Err(err) => Err(ValidationError::Handoff(err.to_string())),
        }
    }
}

/// Normalized `(company_name, position)` pair used to de-duplicate in-memory listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
    company: String,
    position: String,
}

impl CandidateKey {
    pub fn new(company_name: &str, position: &str) -> Self {
        Self {
            company: normalize(company_name),
            position: normalize(position),
        }
    }

    pub fn of(application: &JobApplication) -> Self {
        Self::new(&application.company_name, &application.position)
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Maps listings into candidates, keeping only those whose key is not already taken by
/// `existing` or by an earlier listing in the same batch.
pub fn admit_candidates<'a, I>(
    existing: I,
    listings: &[ExternalListing],
    sequence: &mut CandidateSequence,
    user_id: &UserId,
    provenance: Provenance,
    now: &str,
) -> Vec<JobApplication>
where
    I: IntoIterator<Item = &'a JobApplication>,
{
    let mut seen: HashSet<CandidateKey> = existing.into_iter().map(CandidateKey::of).collect();

    listings
        .iter()
        .filter(|listing| seen.insert(CandidateKey::new(&listing.company_name(), &listing.position())))
        .map(|listing| listing.to_candidate(sequence.next_id(provenance), user_id, provenance, now))
        .collect()
}
