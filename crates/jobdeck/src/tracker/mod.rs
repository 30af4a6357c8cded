//! Application tracking: backend rows and in-memory listings reconciled into one view.
//!
//! Listings found through search or handed over from job matching live only in memory
//! until the user commits to them; committing persists the listing through the
//! [`ApplicationGateway`] and swaps the in-memory record for the backend row.

pub mod domain;
pub mod filter;
pub mod gateway;
pub mod listing;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod stats;

#[cfg(test)]
mod tests;

pub use domain::{
    display_date, ApplicationId, ApplicationPatch, ApplicationStatus, JobApplication,
    NewApplication, Provenance, UnknownStatus, UserId, ValidationError, INVALID_DATE,
};
pub use filter::{filter_applications, StatusFilter};
pub use gateway::{ApplicationGateway, GatewayError};
pub use listing::{
    admit_candidates, CandidateKey, CandidateSequence, ExternalListing, HandoffPayload,
};
pub use reconciler::{ApplicationReconciler, TrackerError, TrackerSnapshot};
pub use registry::TrackerRegistry;
pub use router::tracker_router;
pub use stats::{compute_stats, ApplicationStats};
