use serde::{Deserialize, Serialize};

use super::domain::{ApplicationStatus, JobApplication};

/// Dashboard counters derived from the combined application list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub total: usize,
    pub interviews: usize,
    pub offers: usize,
    /// Applications sitting in `applied`. Screening and interview stages are not included.
    pub pending: usize,
}

pub fn compute_stats<'a, I>(applications: I) -> ApplicationStats
where
    I: IntoIterator<Item = &'a JobApplication>,
{
    applications
        .into_iter()
        .fold(ApplicationStats::default(), |mut stats, application| {
            stats.total += 1;
            match application.status {
                ApplicationStatus::Interview => stats.interviews += 1,
                ApplicationStatus::Offer => stats.offers += 1,
                ApplicationStatus::Applied => stats.pending += 1,
                _ => {}
            }
            stats
        })
}
