use crate::infra::InMemoryApplicationGateway;
use clap::Args;
use jobdeck::config::AppConfig;
use jobdeck::error::AppError;
use jobdeck::search::{ExperienceLevel, HttpJobSearchClient, JobSearchGateway, SearchRequest};
use jobdeck::tracker::{
    ApplicationReconciler, ApplicationStatus, ExternalListing, HandoffPayload, JobApplication,
    StatusFilter, UserId,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct SearchArgs {
    /// Job title or keywords to search for
    pub(crate) query: String,
    /// Location appended to the query, e.g. "Berlin" or "Remote"
    #[arg(long)]
    pub(crate) location: Option<String>,
    /// Only return listings that require no prior experience
    #[arg(long)]
    pub(crate) fresher: bool,
    /// Result page to fetch
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// User the demo session belongs to
    #[arg(long)]
    pub(crate) user: Option<String>,
    /// Only print the final application list when filtering by this term
    #[arg(long)]
    pub(crate) term: Option<String>,
}

pub(crate) async fn run_search(args: SearchArgs) -> Result<(), AppError> {
    let SearchArgs {
        query,
        location,
        fresher,
        page,
    } = args;

    let config = AppConfig::load()?;
    let client = HttpJobSearchClient::from_config(&config.search)?;
    let request = SearchRequest {
        query,
        location,
        experience_level: if fresher {
            ExperienceLevel::Fresher
        } else {
            ExperienceLevel::Experienced
        },
        page,
    };

    let response = client.search(&request).await?;
    if !response.success {
        println!("Job search returned an unsuccessful status; no listings to show.");
        return Ok(());
    }

    println!("{} listings for '{}'", response.jobs.len(), request.query);
    for listing in &response.jobs {
        println!(
            "- {} @ {} ({})",
            listing.position(),
            listing.company_name(),
            listing.location_label()
        );
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { user, term } = args;
    let user_id = UserId(user.unwrap_or_else(|| "demo-user".to_string()));
    let tracker =
        ApplicationReconciler::new(user_id, Arc::new(InMemoryApplicationGateway::default()));

    println!("Application tracker demo");
    let snapshot = tracker.load_persisted().await?;
    println!(
        "- Loaded {} stored applications",
        snapshot.applications.len()
    );

    let found = demo_listings();
    let admitted = tracker.ingest_candidates(&found);
    println!(
        "- Search returned {} listings, {} admitted after de-duplication",
        found.len(),
        admitted.len()
    );

    let handoff = HandoffPayload {
        selected_jobs: vec![demo_listing(
            "Initech",
            "Platform Engineer",
            Some("Austin"),
            Some("TX"),
        )],
    };
    let handed_over = tracker.ingest_handoff(&handoff);
    println!("- Job matching handed over {} listing(s)", handed_over.len());

    if let Some(first) = admitted.first() {
        let promoted = tracker
            .promote(&first.id, ApplicationStatus::Applied)
            .await?;
        println!(
            "- Applied to {} at {}: listing {} stored as {}",
            promoted.position, promoted.company_name, first.id, promoted.id
        );

        let interview = tracker
            .update_status(&promoted.id, ApplicationStatus::Interview)
            .await?;
        println!(
            "  Status moved to {} (updated {})",
            interview.status,
            interview.updated_at_label()
        );
    }

    if let Some(second) = admitted.get(1) {
        tracker.delete(&second.id).await?;
        println!("- Dismissed listing {}", second.id);
    }

    let stats = tracker.stats();
    println!(
        "\nDashboard: {} total | {} interviews | {} offers | {} pending",
        stats.total, stats.interviews, stats.offers, stats.pending
    );

    let term = term.unwrap_or_default();
    println!("Applications:");
    for application in tracker.filter(&term, StatusFilter::All) {
        print_application(&application);
    }
    Ok(())
}

fn print_application(application: &JobApplication) {
    println!(
        "  - [{}] {} @ {} | {} | {:?}",
        application.status,
        application.position,
        application.company_name,
        application.application_date_label(),
        application.provenance()
    );
}

fn demo_listing(
    company: &str,
    title: &str,
    city: Option<&str>,
    state: Option<&str>,
) -> ExternalListing {
    ExternalListing {
        employer_name: Some(company.to_string()),
        job_title: Some(title.to_string()),
        job_apply_link: Some(format!(
            "https://jobs.example.com/{}",
            title.to_lowercase().replace(' ', "-")
        )),
        job_description: Some(format!("{title} role at {company}.")),
        job_city: city.map(str::to_string),
        job_state: state.map(str::to_string),
        job_country: Some("US".to_string()),
        job_is_remote: Some(city.is_none()),
        job_employment_type: Some("FULLTIME".to_string()),
        ..ExternalListing::default()
    }
}

fn demo_listings() -> Vec<ExternalListing> {
    vec![
        demo_listing("Acme", "Backend Engineer", Some("Denver"), Some("CO")),
        demo_listing("ACME", "backend  engineer", Some("Denver"), Some("CO")),
        demo_listing("Globex", "Site Reliability Engineer", None, None),
        demo_listing("Umbrella", "Data Engineer", Some("Boston"), Some("MA")),
    ]
}
