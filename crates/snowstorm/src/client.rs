//! Snowstorm REST client.
//!
//! Implements [`TerminologyStore`] over Snowstorm's reference set member, bulk job and merge
//! endpoints. Every non-success response becomes [`MappingError::RemoteCallFailed`] carrying
//! the URL, status and the server's error text.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, Url};
use rms_core::constants::MEMBER_QUERY_LIMIT;
use rms_core::store::{JobStatus, MemberQuery, MergeRequest, TerminologyStore};
use rms_core::wire::{MemberPage, RefsetMemberWire};
use rms_core::{CoreConfig, MappingError, MappingResult};
use rms_types::BranchPath;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Longest server error text kept in an error.
const MAX_REASON_LEN: usize = 500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberIds<'a> {
    member_ids: &'a [String],
}

#[derive(Clone, Debug)]
pub struct SnowstormClient {
    client: Client,
    base_url: String,
    /// Branch used for concept lookups.
    branch: BranchPath,
}

impl SnowstormClient {
    /// Creates a new `SnowstormClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Snowstorm root, e.g. `https://snowstorm.example.org/snowstorm/snomed-ct`.
    /// * `branch` - Branch used to resolve concept names.
    /// * `timeout` - Per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        branch: BranchPath,
        timeout: Duration,
    ) -> MappingResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MappingError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url,
            branch,
        })
    }

    pub fn from_config(cfg: &CoreConfig) -> MappingResult<Self> {
        Self::new(cfg.terminology_url(), cfg.branch().clone(), cfg.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn branch(&self) -> &BranchPath {
        &self.branch
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    fn members_url(&self, branch: &BranchPath) -> String {
        format!("{}/{}/members", self.base_url, branch)
    }

    /// Send `request` and fail on any non-success status.
    pub(crate) async fn send(&self, request: RequestBuilder, url: &str) -> MappingResult<Response> {
        let response = request.send().await.map_err(|e| transport(url, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body.trim().chars().take(MAX_REASON_LEN).collect()
        };
        tracing::warn!(url, status = status.as_u16(), %reason, "terminology server call failed");
        Err(MappingError::RemoteCallFailed {
            url: url.to_string(),
            status: status.as_u16(),
            reason,
        })
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(
        response: Response,
        url: &str,
    ) -> MappingResult<T> {
        let body = response.text().await.map_err(|e| transport(url, e))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Resolve the job URL from a `Location` header, relative to the server root if needed.
    fn job_location(&self, response: &Response, url: &str) -> MappingResult<String> {
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MappingError::MissingJobHandle {
                url: url.to_string(),
            })?;

        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        let base = Url::parse(&self.base_url).map_err(|e| MappingError::Transport {
            url: self.base_url.clone(),
            message: e.to_string(),
        })?;
        base.join(location)
            .map(String::from)
            .map_err(|_| MappingError::MissingJobHandle {
                url: url.to_string(),
            })
    }
}

fn transport(url: &str, err: reqwest::Error) -> MappingError {
    MappingError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl TerminologyStore for SnowstormClient {
    async fn query_members(&self, query: &MemberQuery) -> MappingResult<Vec<RefsetMemberWire>> {
        let url = self.members_url(&query.branch);
        let mut params: Vec<(&str, String)> = vec![
            ("referenceSet", query.refset_id.clone()),
            ("referencedComponentId", query.referenced_component_id.clone()),
            ("limit", MEMBER_QUERY_LIMIT.to_string()),
        ];
        if let Some(active) = query.active {
            params.push(("active", active.to_string()));
        }
        if let Some(module) = &query.module_id {
            params.push(("module", module.clone()));
        }

        let mut members: Vec<RefsetMemberWire> = Vec::new();
        loop {
            let request = self
                .client
                .get(&url)
                .query(&params)
                .query(&[("offset", members.len())]);
            let response = self.send(request, &url).await?;
            let page: MemberPage = Self::read_json(response, &url).await?;
            let fetched = page.items.len();
            members.extend(page.items);

            let total = page.total.unwrap_or(0) as usize;
            if fetched == 0 || members.len() >= total {
                break;
            }
        }
        tracing::debug!(
            code = %query.referenced_component_id,
            count = members.len(),
            "read map members"
        );
        Ok(members)
    }

    async fn fetch_members(
        &self,
        branch: &BranchPath,
        member_ids: &[String],
    ) -> MappingResult<Vec<RefsetMemberWire>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/search", self.members_url(branch));
        let request = self.client.post(&url).json(&MemberIds { member_ids });
        let response = self.send(request, &url).await?;
        let page: MemberPage = Self::read_json(response, &url).await?;
        Ok(page.items)
    }

    async fn create_member(
        &self,
        branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire> {
        let url = self.members_url(branch);
        let response = self.send(self.client.post(&url).json(member), &url).await?;
        Self::read_json(response, &url).await
    }

    async fn update_member(
        &self,
        branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire> {
        let id = member
            .member_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MappingError::InvalidInput("cannot update a member without an id".into()))?;
        let url = format!("{}/{id}", self.members_url(branch));
        let response = self.send(self.client.put(&url).json(member), &url).await?;
        Self::read_json(response, &url).await
    }

    async fn submit_bulk(
        &self,
        branch: &BranchPath,
        members: &[RefsetMemberWire],
    ) -> MappingResult<String> {
        let url = format!("{}/bulk", self.members_url(branch));
        let response = self.send(self.client.post(&url).json(members), &url).await?;
        let job = self.job_location(&response, &url)?;
        tracing::debug!(%job, count = members.len(), "submitted bulk member job");
        Ok(job)
    }

    async fn delete_members(&self, branch: &BranchPath, member_ids: &[String]) -> MappingResult<()> {
        let url = self.members_url(branch);
        let request = self
            .client
            .delete(&url)
            .query(&[("force", "false")])
            .json(&MemberIds { member_ids });
        self.send(request, &url).await?;
        Ok(())
    }

    async fn job_status(&self, job_url: &str) -> MappingResult<JobStatus> {
        let response = self.send(self.client.get(job_url), job_url).await?;
        Self::read_json(response, job_url).await
    }

    async fn start_merge(&self, request: &MergeRequest) -> MappingResult<String> {
        let url = format!("{}/merges", self.base_url);
        let response = self.send(self.client.post(&url).json(request), &url).await?;
        self.job_location(&response, &url)
    }
}
