use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::search::{JobSearchGateway, SearchError, SearchRequest, SearchResponse};
use crate::tracker::domain::{
    ApplicationId, ApplicationPatch, ApplicationStatus, JobApplication, NewApplication, UserId,
};
use crate::tracker::gateway::{ApplicationGateway, GatewayError};
use crate::tracker::listing::ExternalListing;
use crate::tracker::reconciler::ApplicationReconciler;
use crate::tracker::{tracker_router, TrackerRegistry};

pub(super) const NOW: &str = "2025-05-01T09:30:00.000Z";

pub(super) fn user() -> UserId {
    UserId("user-1".to_string())
}

pub(super) fn listing(company: &str, title: &str) -> ExternalListing {
    ExternalListing {
        employer_name: Some(company.to_string()),
        job_title: Some(title.to_string()),
        job_apply_link: Some(format!("https://jobs.example.com/{}", title.to_lowercase())),
        job_description: Some(format!("{title} at {company}")),
        job_city: Some("Austin".to_string()),
        job_state: Some("TX".to_string()),
        job_employment_type: Some("FULLTIME".to_string()),
        ..ExternalListing::default()
    }
}

pub(super) fn stored(id: &str, company: &str, position: &str, status: ApplicationStatus) -> JobApplication {
    JobApplication {
        id: ApplicationId(id.to_string()),
        user_id: user(),
        company_name: company.to_string(),
        position: position.to_string(),
        status,
        application_date: NOW.to_string(),
        job_posting_url: None,
        job_description: None,
        notes: None,
        created_at: NOW.to_string(),
        updated_at: NOW.to_string(),
    }
}

/// Backend double assigning `srv-N` ids. A configured failure is returned by every call
/// until cleared.
#[derive(Default)]
pub(super) struct MemoryGateway {
    rows: Mutex<Vec<JobApplication>>,
    sequence: AtomicU64,
    failure: Mutex<Option<GatewayError>>,
}

impl MemoryGateway {
    pub(super) fn seeded(rows: Vec<JobApplication>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub(super) fn fail_with(&self, failure: Option<GatewayError>) {
        *self.failure.lock().expect("failure lock") = failure;
    }

    pub(super) fn rows(&self) -> Vec<JobApplication> {
        self.rows.lock().expect("rows lock").clone()
    }

    fn check(&self) -> Result<(), GatewayError> {
        match self.failure.lock().expect("failure lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ApplicationGateway for MemoryGateway {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
        self.check()?;
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| &row.user_id == user_id)
            .collect())
    }

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError> {
        self.check()?;
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let row = JobApplication {
            id: ApplicationId(format!("srv-{id}")),
            user_id: user_id.clone(),
            company_name: draft.company_name,
            position: draft.position,
            status: draft.status,
            application_date: draft.application_date.unwrap_or_else(|| NOW.to_string()),
            job_posting_url: draft.job_posting_url,
            job_description: draft.job_description,
            notes: draft.notes,
            created_at: NOW.to_string(),
            updated_at: NOW.to_string(),
        };
        self.rows.lock().expect("rows lock").insert(0, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError> {
        self.check()?;
        let mut rows = self.rows.lock().expect("rows lock");
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or(GatewayError::NotFound)?;
        patch.apply_to(row, "2025-05-02T10:00:00.000Z");
        Ok(row.clone())
    }

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError> {
        self.check()?;
        let mut rows = self.rows.lock().expect("rows lock");
        let before = rows.len();
        rows.retain(|row| &row.id != id);
        if rows.len() == before {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }
}

/// Search double replaying a canned result.
pub(super) struct StaticSearch {
    result: Result<SearchResponse, SearchError>,
}

impl StaticSearch {
    pub(super) fn returning(jobs: Vec<ExternalListing>) -> Self {
        Self {
            result: Ok(SearchResponse {
                success: true,
                jobs,
            }),
        }
    }

    pub(super) fn failing(err: SearchError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait]
impl JobSearchGateway for StaticSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        request.validate()?;
        self.result.clone()
    }
}

pub(super) fn reconciler(gateway: Arc<MemoryGateway>) -> ApplicationReconciler<MemoryGateway> {
    ApplicationReconciler::new(user(), gateway)
}

pub(super) fn router_with(gateway: Arc<MemoryGateway>, search: StaticSearch) -> axum::Router {
    tracker_router(Arc::new(TrackerRegistry::new(gateway)), Arc::new(search))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn offline() -> GatewayError {
    GatewayError::Unavailable {
        message: "connection refused".to_string(),
        code: Some("08006".to_string()),
    }
}
