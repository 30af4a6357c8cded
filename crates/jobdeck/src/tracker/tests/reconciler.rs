use std::sync::Arc;
use std::time::{Duration, Instant};

use super::common::*;
use crate::tracker::domain::{
    ApplicationId, ApplicationPatch, ApplicationStatus, NewApplication, Provenance, UserId,
    ValidationError,
};
use crate::tracker::filter::StatusFilter;
use crate::tracker::gateway::GatewayError;
use crate::tracker::listing::HandoffPayload;
use crate::tracker::reconciler::{ApplicationReconciler, TrackerError};
use crate::tracker::stats::ApplicationStats;
use crate::tracker::TrackerRegistry;

#[tokio::test]
async fn load_replaces_persisted_set_and_reports_stats() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![
        stored("srv-a", "Acme", "Engineer", ApplicationStatus::Applied),
        stored("srv-b", "Globex", "Designer", ApplicationStatus::Offer),
    ]));
    let tracker = reconciler(gateway);
    assert!(!tracker.is_loaded());

    let snapshot = tracker.load_persisted().await.expect("load succeeds");
    assert_eq!(snapshot.applications.len(), 2);
    assert_eq!(snapshot.stats.offers, 1);
    assert_eq!(snapshot.stats.pending, 1);
    assert!(tracker.is_loaded());
}

#[tokio::test]
async fn failed_load_keeps_previous_rows() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(Arc::clone(&gateway));
    tracker.load_persisted().await.expect("first load");

    gateway.fail_with(Some(offline()));
    let err = tracker.load_persisted().await.expect_err("load fails");

    assert_eq!(
        err,
        TrackerError::RemoteUnavailable {
            message: "connection refused".to_string(),
            code: Some("08006".to_string()),
        }
    );
    assert_eq!(tracker.persisted().len(), 1);
}

#[tokio::test]
async fn duplicate_listings_yield_a_single_record() {
    let tracker = reconciler(Arc::new(MemoryGateway::default()));

    let first = tracker.ingest_candidates(&[listing("Acme", "Engineer"), listing("Acme", "Engineer")]);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].provenance(), Provenance::Search);
    assert_eq!(first[0].status, ApplicationStatus::NotApplied);

    let second = tracker.ingest_candidates(&[listing(" acme ", "ENGINEER")]);
    assert!(second.is_empty());
    assert_eq!(tracker.ephemeral().len(), 1);
}

#[tokio::test]
async fn handoff_listings_carry_their_own_prefix() {
    let tracker = reconciler(Arc::new(MemoryGateway::default()));
    tracker.ingest_candidates(&[listing("Acme", "Engineer")]);

    let payload = HandoffPayload {
        selected_jobs: vec![listing("Acme", "Engineer"), listing("Initech", "Analyst")],
    };
    let admitted = tracker.ingest_handoff(&payload);

    assert_eq!(admitted.len(), 1);
    assert!(admitted[0].id.0.starts_with("handoff-"));
    assert!(admitted[0]
        .notes
        .as_deref()
        .is_some_and(|notes| notes.starts_with("Selected in job matching")));
}

#[tokio::test]
async fn promote_swaps_listing_for_backend_row() {
    let gateway = Arc::new(MemoryGateway::default());
    let tracker = reconciler(Arc::clone(&gateway));
    let candidate = tracker
        .ingest_candidates(&[listing("Acme", "Engineer")])
        .remove(0);

    let promoted = tracker
        .promote(&candidate.id, ApplicationStatus::Applied)
        .await
        .expect("promote succeeds");

    assert_eq!(promoted.id, ApplicationId("srv-1".to_string()));
    assert_eq!(promoted.status, ApplicationStatus::Applied);
    assert_eq!(promoted.job_posting_url, candidate.job_posting_url);
    assert!(tracker.ephemeral().is_empty());
    assert!(tracker.find(&candidate.id).is_none());
    assert_eq!(tracker.persisted(), vec![promoted.clone()]);
    assert_eq!(gateway.rows(), vec![promoted]);
}

#[tokio::test]
async fn failed_promote_leaves_state_unchanged() {
    let gateway = Arc::new(MemoryGateway::default());
    let tracker = reconciler(Arc::clone(&gateway));
    let candidate = tracker
        .ingest_candidates(&[listing("Acme", "Engineer")])
        .remove(0);
    gateway.fail_with(Some(offline()));

    let err = tracker
        .promote(&candidate.id, ApplicationStatus::Applied)
        .await
        .expect_err("promote fails");

    assert!(matches!(err, TrackerError::RemoteUnavailable { .. }));
    assert_eq!(tracker.ephemeral(), vec![candidate]);
    assert!(tracker.persisted().is_empty());
}

#[tokio::test]
async fn promote_rejects_non_committing_status_and_persisted_ids() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(gateway);
    tracker.load_persisted().await.expect("load");
    let candidate = tracker
        .ingest_candidates(&[listing("Globex", "Designer")])
        .remove(0);

    assert_eq!(
        tracker
            .promote(&candidate.id, ApplicationStatus::Interview)
            .await,
        Err(TrackerError::Validation(ValidationError::NotCommitted(
            ApplicationStatus::Interview
        )))
    );

    let persisted = ApplicationId("srv-a".to_string());
    assert_eq!(
        tracker.promote(&persisted, ApplicationStatus::Applied).await,
        Err(TrackerError::Validation(ValidationError::AlreadyPersisted(
            persisted.clone()
        )))
    );

    let missing = ApplicationId("search-999999".to_string());
    assert_eq!(
        tracker.promote(&missing, ApplicationStatus::Applied).await,
        Err(TrackerError::NotFound(missing.clone()))
    );
}

#[tokio::test]
async fn update_status_merges_backend_row() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(gateway);
    tracker.load_persisted().await.expect("load");

    let id = ApplicationId("srv-a".to_string());
    let updated = tracker
        .update_status(&id, ApplicationStatus::Interview)
        .await
        .expect("update succeeds");

    assert_eq!(updated.status, ApplicationStatus::Interview);
    assert_eq!(updated.updated_at, "2025-05-02T10:00:00.000Z");
    assert_eq!(tracker.find(&id), Some(updated));
    assert_eq!(tracker.stats().interviews, 1);
}

#[tokio::test]
async fn failed_update_keeps_prior_status() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(Arc::clone(&gateway));
    tracker.load_persisted().await.expect("load");
    gateway.fail_with(Some(offline()));

    let id = ApplicationId("srv-a".to_string());
    let err = tracker
        .update_status(&id, ApplicationStatus::Offer)
        .await
        .expect_err("update fails");

    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    assert_eq!(
        tracker.find(&id).map(|application| application.status),
        Some(ApplicationStatus::Applied)
    );
}

#[tokio::test]
async fn backend_missing_row_surfaces_as_not_found() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(Arc::clone(&gateway));
    tracker.load_persisted().await.expect("load");
    gateway.fail_with(Some(GatewayError::NotFound));

    let id = ApplicationId("srv-a".to_string());
    let err = tracker
        .update_status(&id, ApplicationStatus::Offer)
        .await
        .expect_err("row is gone remotely");

    assert_eq!(err, TrackerError::NotFound(id.clone()));
    assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    assert_eq!(
        tracker.find(&id).map(|application| application.status),
        Some(ApplicationStatus::Applied)
    );
}

#[tokio::test]
async fn ephemeral_status_changes_stay_local_until_committed() {
    let gateway = Arc::new(MemoryGateway::default());
    let tracker = reconciler(Arc::clone(&gateway));
    let candidate = tracker
        .ingest_candidates(&[listing("Acme", "Engineer")])
        .remove(0);

    let withdrawn = tracker
        .update_status(&candidate.id, ApplicationStatus::Withdrawn)
        .await
        .expect("local update");
    assert_eq!(withdrawn.id, candidate.id);
    assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);
    assert!(gateway.rows().is_empty());

    let applied = tracker
        .update_status(&candidate.id, ApplicationStatus::Applied)
        .await
        .expect("promotion");
    assert!(applied.id.0.starts_with("srv-"));
    assert!(tracker.ephemeral().is_empty());
    assert_eq!(gateway.rows().len(), 1);
}

#[tokio::test]
async fn edit_with_committing_status_promotes_edited_fields() {
    let gateway = Arc::new(MemoryGateway::default());
    let tracker = reconciler(gateway);
    let candidate = tracker
        .ingest_candidates(&[listing("Acme", "Engineer")])
        .remove(0);

    let patch = ApplicationPatch {
        position: Some("Staff Engineer".to_string()),
        notes: Some("Referred by Sam".to_string()),
        status: Some(ApplicationStatus::Applied),
        ..ApplicationPatch::default()
    };
    let persisted = tracker.edit(&candidate.id, patch).await.expect("edit");

    assert_eq!(persisted.position, "Staff Engineer");
    assert_eq!(persisted.notes.as_deref(), Some("Referred by Sam"));
    assert!(tracker.find(&candidate.id).is_none());

    assert_eq!(
        tracker
            .edit(&persisted.id, ApplicationPatch::default())
            .await,
        Err(TrackerError::Validation(ValidationError::EmptyPatch))
    );
}

#[tokio::test]
async fn add_validates_then_prepends_backend_row() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(gateway);
    tracker.load_persisted().await.expect("load");

    let invalid = NewApplication {
        company_name: "  ".to_string(),
        position: "Engineer".to_string(),
        status: ApplicationStatus::Applied,
        application_date: None,
        job_posting_url: None,
        job_description: None,
        notes: None,
    };
    assert_eq!(
        tracker.add(invalid.clone()).await,
        Err(TrackerError::Validation(ValidationError::MissingField(
            "company_name"
        )))
    );

    let created = tracker
        .add(NewApplication {
            company_name: "Globex".to_string(),
            ..invalid
        })
        .await
        .expect("add succeeds");
    assert_eq!(tracker.persisted()[0], created);
    assert_eq!(tracker.persisted().len(), 2);
}

#[tokio::test]
async fn delete_removes_locally_only_after_backend_confirms() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![stored(
        "srv-a",
        "Acme",
        "Engineer",
        ApplicationStatus::Applied,
    )]));
    let tracker = reconciler(Arc::clone(&gateway));
    tracker.load_persisted().await.expect("load");
    let candidate = tracker
        .ingest_candidates(&[listing("Globex", "Designer")])
        .remove(0);
    let persisted = ApplicationId("srv-a".to_string());

    gateway.fail_with(Some(offline()));
    assert!(tracker.delete(&persisted).await.is_err());
    assert!(tracker.find(&persisted).is_some());

    tracker.delete(&candidate.id).await.expect("ephemeral delete needs no backend");
    assert!(tracker.ephemeral().is_empty());

    gateway.fail_with(None);
    tracker.delete(&persisted).await.expect("delete succeeds");
    assert!(tracker.persisted().is_empty());
    assert!(gateway.rows().is_empty());

    assert_eq!(
        tracker.delete(&persisted).await,
        Err(TrackerError::NotFound(persisted.clone()))
    );
}

#[tokio::test]
async fn stats_and_filter_cover_both_sets_in_order() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![
        stored("srv-a", "Acme", "Engineer", ApplicationStatus::Interview),
        stored("srv-b", "Globex", "Designer", ApplicationStatus::Applied),
    ]));
    let tracker = reconciler(gateway);
    tracker.load_persisted().await.expect("load");
    tracker.ingest_candidates(&[listing("Initech", "Platform Engineer")]);

    assert_eq!(
        tracker.stats(),
        ApplicationStats {
            total: 3,
            interviews: 1,
            offers: 0,
            pending: 1,
        }
    );

    let everything = tracker.filter("", StatusFilter::All);
    assert_eq!(everything, tracker.snapshot().applications);
    let companies = everything
        .iter()
        .map(|application| application.company_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(companies, vec!["Acme", "Globex", "Initech"]);

    let engineers = tracker.filter("engineer", StatusFilter::Only(ApplicationStatus::NotApplied));
    assert_eq!(engineers.len(), 1);
    assert_eq!(engineers[0].company_name, "Initech");
}

#[tokio::test]
async fn registry_isolates_users_and_resets_state() {
    let registry = TrackerRegistry::new(Arc::new(MemoryGateway::default()));
    let alice = UserId("alice".to_string());
    let bob = UserId("bob".to_string());

    registry
        .session(&alice)
        .ingest_candidates(&[listing("Acme", "Engineer")]);
    assert_eq!(registry.session(&alice).ephemeral().len(), 1);
    assert!(registry.session(&bob).ephemeral().is_empty());
    assert_eq!(registry.active_sessions(), 2);

    let held = registry.session(&alice);
    assert!(registry.reset(&alice));
    assert!(held.snapshot().applications.is_empty());
    assert!(registry.existing(&alice).is_none());
    assert!(!registry.reset(&alice));
}

#[tokio::test]
async fn edit_cannot_give_a_listing_another_listings_key() {
    let tracker = reconciler(Arc::new(MemoryGateway::default()));
    let admitted =
        tracker.ingest_candidates(&[listing("Acme", "Engineer"), listing("Globex", "Designer")]);
    let (first, second) = (&admitted[0], &admitted[1]);

    let patch = ApplicationPatch {
        company_name: Some("ACME".to_string()),
        position: Some(" engineer ".to_string()),
        ..ApplicationPatch::default()
    };
    assert_eq!(
        tracker.edit(&second.id, patch).await,
        Err(TrackerError::Validation(ValidationError::DuplicateListing(
            first.id.clone()
        )))
    );
    assert_eq!(tracker.find(&second.id).as_ref(), Some(second));

    let renamed = tracker
        .edit(
            &second.id,
            ApplicationPatch {
                position: Some("Engineer".to_string()),
                ..ApplicationPatch::default()
            },
        )
        .await
        .expect("distinct company keeps the key unique");
    assert_eq!(renamed.company_name, "Globex");
    assert_eq!(renamed.position, "Engineer");
}

#[tokio::test]
async fn backend_rows_are_reachable_before_any_explicit_load() {
    let gateway = Arc::new(MemoryGateway::seeded(vec![
        stored("srv-8", "Acme", "Engineer", ApplicationStatus::Applied),
        stored("srv-9", "Globex", "Designer", ApplicationStatus::Applied),
    ]));
    let tracker = reconciler(Arc::clone(&gateway));
    assert!(!tracker.is_loaded());

    let updated = tracker
        .update_status(&ApplicationId("srv-9".to_string()), ApplicationStatus::Interview)
        .await
        .expect("row found after on-demand load");
    assert_eq!(updated.status, ApplicationStatus::Interview);
    assert!(tracker.is_loaded());

    tracker
        .delete(&ApplicationId("srv-9".to_string()))
        .await
        .expect("delete succeeds");
    assert_eq!(gateway.rows().len(), 1);
    assert_eq!(tracker.stats().interviews, 0);
    assert_eq!(tracker.stats().total, 1);
}

#[tokio::test]
async fn unknown_id_on_unloaded_tracker_reports_unreachable_backend() {
    let gateway = Arc::new(MemoryGateway::default());
    gateway.fail_with(Some(offline()));
    let tracker = reconciler(Arc::clone(&gateway));

    let err = tracker
        .delete(&ApplicationId("srv-1".to_string()))
        .await
        .expect_err("backend unreachable");
    assert!(matches!(err, TrackerError::RemoteUnavailable { .. }));

    let candidate = tracker
        .ingest_candidates(&[listing("Acme", "Engineer")])
        .remove(0);
    tracker
        .update_status(&candidate.id, ApplicationStatus::Screening)
        .await
        .expect("in-memory listings need no backend");
}

#[tokio::test]
async fn listing_ids_are_scoped_to_the_tracker() {
    let gateway = Arc::new(MemoryGateway::default());
    let first = reconciler(Arc::clone(&gateway));
    let second = ApplicationReconciler::new(UserId("user-2".to_string()), gateway);

    let a = first.ingest_candidates(&[listing("Acme", "Engineer")]);
    let b = second.ingest_candidates(&[listing("Acme", "Engineer")]);
    assert_eq!(a[0].id, ApplicationId("search-000001".to_string()));
    assert_eq!(b[0].id, ApplicationId("search-000001".to_string()));

    let handed = first.ingest_handoff(&HandoffPayload {
        selected_jobs: vec![listing("Initech", "Analyst")],
    });
    assert_eq!(handed[0].id, ApplicationId("handoff-000002".to_string()));

    first.reset();
    let again = first.ingest_candidates(&[listing("Acme", "Engineer")]);
    assert_eq!(again[0].id, ApplicationId("search-000001".to_string()));
}

#[test]
fn idle_sessions_are_evicted_and_recreated_empty() {
    let registry = TrackerRegistry::new(Arc::new(MemoryGateway::default()));
    let alice = UserId("alice".to_string());
    let bob = UserId("bob".to_string());
    let start = Instant::now();

    registry
        .session_at(&alice, start)
        .ingest_candidates(&[listing("Acme", "Engineer")]);
    registry.session_at(&bob, start);
    registry.session_at(&bob, start + Duration::from_secs(50));

    let evicted =
        registry.evict_idle_at(Duration::from_secs(30), start + Duration::from_secs(60));
    assert_eq!(evicted, 1);
    assert!(registry.existing(&alice).is_none());
    assert!(registry.existing(&bob).is_some());

    assert!(registry.session(&alice).ephemeral().is_empty());
    assert_eq!(registry.active_sessions(), 2);
}
