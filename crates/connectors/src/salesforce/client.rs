use crate::{
    error::RemoteError,
    remote::{RemoteClient, RemoteSchema},
    salesforce::credentials::OrgCredentials,
};
use async_trait::async_trait;
use model::{
    execution::write::{QueryResult, RecordError, WriteOperation, WriteOutcome},
    records::record::Record,
    schema::describe::EntityDescribe,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on records per sObject Collections request.
pub const MAX_COLLECTION_SIZE: usize = 200;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionRequest {
    all_or_none: bool,
    records: Vec<serde_json::Value>,
}

/// REST client for one org.
///
/// Owns its own HTTP connection pool; create one per worker.
pub struct SalesforceClient {
    http: reqwest::Client,
    creds: OrgCredentials,
    timeout: Duration,
}

impl SalesforceClient {
    pub fn new(creds: OrgCredentials, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Connectivity(e.to_string()))?;

        Ok(Self {
            http,
            creds,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.creds.instance_url.trim_end_matches('/'),
            self.creds.api_version,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.creds.access_token)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(status_error(status, body));
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Connectivity(err.to_string())
        }
    }

    async fn write_chunk(
        &self,
        entity: &str,
        operation: WriteOperation,
        external_id_field: Option<&str>,
        records: &[Record],
    ) -> Result<Vec<WriteOutcome>, RemoteError> {
        let payload = CollectionRequest {
            all_or_none: false,
            records: records
                .iter()
                .map(|r| {
                    let mut obj = r.to_json();
                    obj.insert(
                        "attributes".to_string(),
                        serde_json::json!({ "type": entity }),
                    );
                    serde_json::Value::Object(obj)
                })
                .collect(),
        };

        let builder = match operation {
            WriteOperation::Insert => self.request(Method::POST, "composite/sobjects"),
            WriteOperation::Upsert => {
                let ext = external_id_field.ok_or_else(|| {
                    RemoteError::MalformedPayload("upsert requires an external id field".into())
                })?;
                self.request(Method::PATCH, &format!("composite/sobjects/{entity}/{ext}"))
            }
        };

        let outcomes: Vec<WriteOutcome> = self.send(builder.json(&payload)).await?;
        if outcomes.len() != records.len() {
            return Err(RemoteError::Decode(format!(
                "expected {} results, got {}",
                records.len(),
                outcomes.len()
            )));
        }
        Ok(outcomes)
    }
}

/// Outcome for a record whose collection request failed or was never sent.
fn request_failed(err: &RemoteError) -> WriteOutcome {
    WriteOutcome::rejected(vec![RecordError {
        status_code: "REQUEST_FAILED".to_string(),
        message: err.to_string(),
        fields: Vec::new(),
    }])
}

fn status_error(status: StatusCode, body: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Authentication(body),
        StatusCode::BAD_REQUEST => RemoteError::MalformedPayload(body),
        StatusCode::NOT_FOUND => RemoteError::UnknownEntity(body),
        other => RemoteError::Rejected {
            status: other.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl RemoteSchema for SalesforceClient {
    async fn describe(&self, entity: &str) -> Result<EntityDescribe, RemoteError> {
        debug!(entity, "Describing entity");
        self.send(self.request(Method::GET, &format!("sobjects/{entity}/describe")))
            .await
    }
}

#[async_trait]
impl RemoteClient for SalesforceClient {
    async fn query(&self, soql: &str) -> Result<QueryResult, RemoteError> {
        debug!(soql, "Running query");
        self.send(self.request(Method::GET, "query").query(&[("q", soql)]))
            .await
            .map_err(|e| match e {
                RemoteError::MalformedPayload(body) => RemoteError::Query(body),
                other => other,
            })
    }

    async fn bulk_write(
        &self,
        entity: &str,
        operation: WriteOperation,
        external_id_field: Option<&str>,
        records: &[Record],
    ) -> Result<Vec<WriteOutcome>, RemoteError> {
        let mut outcomes = Vec::with_capacity(records.len());
        for (n, chunk) in records.chunks(MAX_COLLECTION_SIZE).enumerate() {
            match self
                .write_chunk(entity, operation, external_id_field, chunk)
                .await
            {
                Ok(part) => outcomes.extend(part),
                // Nothing committed yet: the whole call failed.
                Err(e) if n == 0 => return Err(e),
                Err(e) => {
                    // Earlier requests are committed and keep their outcomes.
                    warn!(
                        entity,
                        request = n + 1,
                        committed = outcomes.len(),
                        remaining = records.len() - outcomes.len(),
                        error = %e,
                        "Collection request failed, later records were not sent"
                    );
                    let failed = request_failed(&e);
                    outcomes.resize(records.len(), failed);
                    break;
                }
            }
        }
        Ok(outcomes)
    }
}
