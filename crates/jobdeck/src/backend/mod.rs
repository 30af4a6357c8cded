//! PostgREST (Supabase) implementations of the backend gateways.

mod profiles;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{endpoint, BackendConfig};
use crate::tracker::{
    ApplicationGateway, ApplicationId, ApplicationPatch, GatewayError, JobApplication,
    NewApplication, UserId,
};

const REST_PATH: &str = "rest/v1";
const APPLICATIONS_TABLE: &str = "job_applications";
const PROFILES_TABLE: &str = "profiles";
const PREFERENCES_TABLE: &str = "job_preferences";
const NO_ROWS_CODE: &str = "PGRST116";

struct Tables {
    applications: Url,
    profiles: Url,
    preferences: Url,
}

/// Client for the `job_applications`, `profiles` and `job_preferences` tables.
pub struct PostgrestClient {
    client: reqwest::Client,
    tables: Tables,
    api_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendSetupError {
    #[error("SUPABASE_URL cannot address table {table}: {reason}")]
    TableUrl { table: &'static str, reason: String },
    #[error("backend http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct CreateRow<'a> {
    user_id: &'a UserId,
    #[serde(flatten)]
    draft: &'a NewApplication,
}

#[derive(Serialize)]
struct UpdateRow<'a> {
    #[serde(flatten)]
    patch: &'a ApplicationPatch,
    updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PostgrestClient {
    /// Returns `None` when the backend URL or key is missing.
    pub fn from_config(config: &BackendConfig) -> Result<Option<Self>, BackendSetupError> {
        let (Some(url), Some(api_key)) = (&config.url, &config.api_key) else {
            return Ok(None);
        };
        let tables = Tables {
            applications: table_url(url, APPLICATIONS_TABLE)?,
            profiles: table_url(url, PROFILES_TABLE)?,
            preferences: table_url(url, PREFERENCES_TABLE)?,
        };
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Some(Self {
            client,
            tables,
            api_key: api_key.clone(),
        }))
    }

    fn request(&self, method: Method, table: &Url) -> RequestBuilder {
        self.client
            .request(method, table.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn returning(&self, method: Method, table: &Url) -> RequestBuilder {
        self.request(method, table)
            .header("Prefer", "return=representation")
    }

    async fn rows<T>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Vec<T>, GatewayError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|err| {
            warn!(operation, error = %err, "backend request failed");
            GatewayError::unavailable(err.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;

        if !status.is_success() {
            return Err(decode_error(status.as_u16(), &body));
        }
        let rows = decode_rows(&body)?;
        debug!(operation, rows = rows.len(), "backend request completed");
        Ok(rows)
    }
}

#[async_trait]
impl ApplicationGateway for PostgrestClient {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
        let request = self.request(Method::GET, &self.tables.applications).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "created_at.desc".to_string()),
        ]);
        self.rows("list", request).await
    }

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError> {
        let request = self
            .returning(Method::POST, &self.tables.applications)
            .json(&CreateRow {
            user_id,
            draft: &draft,
        });
        first_row(self.rows("create", request).await?)
    }

    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError> {
        let request = self
            .returning(Method::PATCH, &self.tables.applications)
            .query(&[("id", format!("eq.{id}"))])
            .json(&UpdateRow {
                patch: &patch,
                updated_at: timestamp(),
            });
        first_row(self.rows("update", request).await?)
    }

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError> {
        let request = self
            .returning(Method::DELETE, &self.tables.applications)
            .query(&[("id", format!("eq.{id}"))]);
        first_row(self.rows::<JobApplication>("delete", request).await?).map(|_| ())
    }
}

fn table_url(base: &Url, table: &'static str) -> Result<Url, BackendSetupError> {
    if base.cannot_be_a_base() || base.query().is_some() || base.fragment().is_some() {
        return Err(BackendSetupError::TableUrl {
            table,
            reason: format!("{base} is not a plain base URL"),
        });
    }
    endpoint(base, &format!("{REST_PATH}/{table}"))
        .map_err(|reason| BackendSetupError::TableUrl { table, reason })
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::Unavailable {
        message: format!("unreadable backend response: {err}"),
        code: None,
    })
}

/// Writes return the affected rows; none means the target id does not exist.
pub fn first_row<T>(rows: Vec<T>) -> Result<T, GatewayError> {
    rows.into_iter().next().ok_or(GatewayError::NotFound)
}

/// Maps a PostgREST error body (`{code, message, details, hint}`) to a gateway error.
pub fn decode_error(status: u16, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<PostgrestErrorBody>(body).unwrap_or_default();
    if status == 404 || parsed.code.as_deref() == Some(NO_ROWS_CODE) {
        return GatewayError::NotFound;
    }
    GatewayError::Unavailable {
        message: parsed
            .message
            .unwrap_or_else(|| format!("backend returned HTTP {status}")),
        code: parsed.code,
    }
}
