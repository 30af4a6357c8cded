use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jobdeck::tracker::{
    ApplicationGateway, ApplicationId, ApplicationPatch, ApplicationStats, ApplicationStatus,
    ExternalListing, GatewayError, HandoffPayload, JobApplication, NewApplication, Provenance,
    StatusFilter, TrackerError, TrackerRegistry, UserId,
};

#[derive(Default)]
struct FlakyBackend {
    rows: Mutex<Vec<JobApplication>>,
    sequence: AtomicU64,
    offline: Mutex<bool>,
}

impl FlakyBackend {
    fn set_offline(&self, offline: bool) {
        *self.offline.lock().expect("offline lock") = offline;
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if *self.offline.lock().expect("offline lock") {
            Err(GatewayError::unavailable("backend offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ApplicationGateway for FlakyBackend {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
        self.ensure_online()?;
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError> {
        self.ensure_online()?;
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let row = JobApplication {
            id: ApplicationId(format!("srv-{id}")),
            user_id: user_id.clone(),
            company_name: draft.company_name,
            position: draft.position,
            status: draft.status,
            application_date: draft
                .application_date
                .unwrap_or_else(|| "2025-05-01T00:00:00Z".to_string()),
            job_posting_url: draft.job_posting_url,
            job_description: draft.job_description,
            notes: draft.notes,
            created_at: "2025-05-01T00:00:00Z".to_string(),
            updated_at: "2025-05-01T00:00:00Z".to_string(),
        };
        self.rows.lock().expect("rows lock").push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError> {
        self.ensure_online()?;
        let mut rows = self.rows.lock().expect("rows lock");
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or(GatewayError::NotFound)?;
        patch.apply_to(row, "2025-05-03T00:00:00Z");
        Ok(row.clone())
    }

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError> {
        self.ensure_online()?;
        self.rows
            .lock()
            .expect("rows lock")
            .retain(|row| &row.id != id);
        Ok(())
    }
}

fn listing(company: &str, title: &str) -> ExternalListing {
    ExternalListing {
        employer_name: Some(company.to_string()),
        job_title: Some(title.to_string()),
        job_description: Some(format!("{title} at {company}")),
        ..ExternalListing::default()
    }
}

#[tokio::test]
async fn search_to_offer_lifecycle() {
    let backend = Arc::new(FlakyBackend::default());
    let registry = TrackerRegistry::new(Arc::clone(&backend));
    let user = UserId("user-42".to_string());
    let tracker = registry.session(&user);

    let snapshot = tracker.load_persisted().await.expect("initial load");
    assert!(snapshot.applications.is_empty());

    let admitted = tracker.ingest_candidates(&[
        listing("Acme", "Rust Engineer"),
        listing("Acme", "Rust Engineer"),
        listing("Globex", "SRE"),
    ]);
    assert_eq!(admitted.len(), 2);

    let handoff = HandoffPayload::from_json(
        r#"[{"employer_name":"Globex","job_title":"sre"},{"employer_name":"Initech"}]"#,
    )
    .expect("hand-off parses");
    let handed_over = tracker.ingest_handoff(&handoff);
    assert_eq!(handed_over.len(), 1);
    assert_eq!(handed_over[0].position, "Unknown Position");
    assert_eq!(handed_over[0].provenance(), Provenance::Handoff);

    backend.set_offline(true);
    let failed = tracker
        .promote(&admitted[0].id, ApplicationStatus::Applied)
        .await;
    assert!(matches!(failed, Err(TrackerError::RemoteUnavailable { .. })));
    assert_eq!(tracker.ephemeral().len(), 3);

    backend.set_offline(false);
    let applied = tracker
        .promote(&admitted[0].id, ApplicationStatus::Applied)
        .await
        .expect("promotion succeeds");
    let offer = tracker
        .update_status(&applied.id, ApplicationStatus::Offer)
        .await
        .expect("status update succeeds");
    assert_eq!(offer.updated_at, "2025-05-03T00:00:00Z");

    assert_eq!(
        tracker.stats(),
        ApplicationStats {
            total: 3,
            interviews: 0,
            offers: 1,
            pending: 0,
        }
    );
    assert_eq!(
        tracker
            .filter("", StatusFilter::Only(ApplicationStatus::NotApplied))
            .len(),
        2
    );

    // Reloading keeps in-memory listings alongside the refreshed backend rows.
    let reloaded = tracker.load_persisted().await.expect("reload");
    assert_eq!(reloaded.applications, vec![offer]);
    assert_eq!(reloaded.stats.total, 3);

    assert!(registry.reset(&user));
    assert_eq!(registry.session(&user).stats(), ApplicationStats::default());
}
