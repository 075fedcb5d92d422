//! Target code names from the Snowstorm browser endpoint.

use crate::SnowstormClient;
use async_trait::async_trait;
use rms_core::constants::SNOMEDCT_TERMINOLOGY;
use rms_core::store::ConceptResolver;
use rms_core::{MappingError, MappingResult};
use serde::Deserialize;

#[derive(Deserialize)]
struct BrowserConcept {
    pt: Option<Term>,
    fsn: Option<Term>,
}

#[derive(Deserialize)]
struct Term {
    term: String,
}

#[async_trait]
impl ConceptResolver for SnowstormClient {
    fn resolves(&self, terminology: &str) -> bool {
        terminology.eq_ignore_ascii_case(SNOMEDCT_TERMINOLOGY)
    }

    /// Look up the preferred term of `code` on the client's branch, falling back to the fully
    /// specified name.
    ///
    /// Only SNOMED CT codes can be resolved; other terminologies and unknown codes yield `None`.
    /// `version` is not used: names come from the configured branch.
    async fn resolve_concept_name(
        &self,
        terminology: &str,
        _version: &str,
        code: &str,
    ) -> MappingResult<Option<String>> {
        if !self.resolves(terminology) {
            tracing::debug!(terminology, code, "no name lookup for terminology");
            return Ok(None);
        }

        let url = format!("{}/browser/{}/concepts/{code}", self.base_url(), self.branch());
        let response = match self.send(self.http().get(&url), &url).await {
            Ok(response) => response,
            Err(MappingError::RemoteCallFailed { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let concept: BrowserConcept = Self::read_json(response, &url).await?;
        Ok(concept.pt.or(concept.fsn).map(|t| t.term))
    }
}
