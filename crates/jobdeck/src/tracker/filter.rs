use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationStatus, JobApplication, UnknownStatus};

/// Status selector of the applications view; `all` disables status filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Only(ApplicationStatus),
}

impl StatusFilter {
    pub fn matches(self, status: ApplicationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(expected) => expected == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        trimmed.parse().map(StatusFilter::Only)
    }
}

impl TryFrom<String> for StatusFilter {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StatusFilter> for String {
    fn from(value: StatusFilter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => f.write_str(status.label()),
        }
    }
}

/// Case-insensitive substring match on company or position, combined with the status filter.
/// Order of the input is preserved.
pub fn filter_applications<'a, I>(
    applications: I,
    term: &str,
    status: StatusFilter,
) -> Vec<JobApplication>
where
    I: IntoIterator<Item = &'a JobApplication>,
{
    let needle = term.to_lowercase();
    applications
        .into_iter()
        .filter(|application| status.matches(application.status))
        .filter(|application| {
            needle.is_empty()
                || application.position.to_lowercase().contains(&needle)
                || application.company_name.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
