//! Plugin registry: approved index and repository search

use reqwest::StatusCode;
use sdk::errors::PluginError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ApprovedIds, TrustTier, OFFICIAL_OWNER};

/// Where discovery looks and how it identifies itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Approved-plugin index (array or object of objects)
    pub index_url: String,
    /// Repository search endpoint
    pub search_url: String,
    /// Topic tag plugin repositories carry
    pub topic: String,
    pub per_page: u32,
    pub official_owner: String,
    /// Origin of the CORS relay; empty means a relative `/proxy/` path
    pub relay_base: String,
    pub user_agent: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            index_url: "https://raw.githubusercontent.com/EDBPlugin/EDBP-API/main/1.json"
                .to_string(),
            search_url: "https://api.github.com/search/repositories".to_string(),
            topic: "edbp-plugin".to_string(),
            per_page: 100,
            official_owner: OFFICIAL_OWNER.to_string(),
            relay_base: String::new(),
            user_agent: "EDBP-Plugin-Manager/1.0".to_string(),
        }
    }
}

/// An installable plugin found by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub official: bool,
    pub approved: bool,
    pub source: String,
    pub repo_url: String,
    /// Archive URL routed through the relay
    pub download_url: String,
}

impl Candidate {
    pub fn trust_tier(&self) -> TrustTier {
        TrustTier::from_flags(self.official, self.approved)
    }

    /// Only official and approved plugins are offered for one-click install
    pub fn can_install(&self) -> bool {
        self.official || self.approved
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    name: String,
    full_name: String,
    owner: RepoOwner,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

/// HTTP client for the approved index and repository search
pub struct RegistryClient {
    http: reqwest::Client,
    settings: RegistrySettings,
}

impl RegistryClient {
    pub fn new(settings: RegistrySettings) -> Result<Self, PluginError> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| PluginError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Refresh the Approved-ID Set from the index
    ///
    /// Best effort: any network, status, or parse failure leaves the set
    /// empty and returns no entries.
    pub async fn fetch_approved_list(&self, approved: &mut ApprovedIds) -> Vec<Value> {
        match self.request_approved_entries().await {
            Ok(entries) => {
                let ids: Vec<String> = entries.iter().filter_map(entry_identifier).collect();
                approved.replace(ids);
                info!("Approved plugin index loaded: {} entries", approved.len());
                entries
            }
            Err(e) => {
                warn!("Failed to fetch approved plugin list: {}", e);
                approved.clear();
                Vec::new()
            }
        }
    }

    async fn request_approved_entries(&self) -> Result<Vec<Value>, PluginError> {
        let response = self
            .http
            .get(&self.settings.index_url)
            .send()
            .await
            .map_err(|e| PluginError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PluginError::Network(format!(
                "approved index returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| PluginError::Network(format!("approved index is not JSON: {}", e)))?;

        Ok(match data {
            Value::Array(entries) => entries,
            Value::Object(map) => map.into_iter().map(|(_, entry)| entry).collect(),
            _ => Vec::new(),
        })
    }

    /// Search for plugin repositories and classify each one
    ///
    /// Refreshes the Approved-ID Set first. A 403 from the search endpoint is
    /// reported as [`PluginError::RateLimited`]; any other failure is a
    /// [`PluginError::Network`] for the caller to show.
    pub async fn fetch_candidates(
        &self,
        approved: &mut ApprovedIds,
    ) -> Result<Vec<Candidate>, PluginError> {
        self.fetch_approved_list(approved).await;

        let query = format!("topic:{}", self.settings.topic);
        let per_page = self.settings.per_page.to_string();

        let response = self
            .http
            .get(&self.settings.search_url)
            .query(&[
                ("q", query.as_str()),
                ("sort", "updated"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PluginError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!("Repository search rate limited");
            return Err(PluginError::RateLimited);
        }
        if !status.is_success() {
            return Err(PluginError::Network(format!(
                "repository search returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| PluginError::Network(format!("invalid search response: {}", e)))?;

        let candidates: Vec<Candidate> = body
            .items
            .into_iter()
            .map(|repo| self.candidate_from_repo(repo, approved))
            .collect();

        debug!("Repository search returned {} candidates", candidates.len());
        Ok(candidates)
    }

    fn candidate_from_repo(&self, repo: RepoItem, approved: &ApprovedIds) -> Candidate {
        let tier = approved.classify(
            Some(&repo.owner.login),
            &[repo.name.as_str(), repo.full_name.as_str()],
        );

        let branch = repo.default_branch.as_deref().unwrap_or("main");
        let archive_url = format!("{}/archive/refs/heads/{}.zip", repo.html_url, branch);

        Candidate {
            id: repo.name.clone(),
            name: repo.name,
            version: "latest".to_string(),
            author: repo.owner.login,
            description: repo
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "No description".to_string()),
            official: tier.is_official(),
            approved: tier.is_approved(),
            source: "github".to_string(),
            repo_url: repo.html_url,
            download_url: proxy_url(&self.settings.relay_base, &archive_url),
        }
    }
}

fn entry_identifier(entry: &Value) -> Option<String> {
    ["id", "name"]
        .iter()
        .filter_map(|key| entry.get(key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// `<relay_base>/proxy/<encodeURIComponent(target)>`
pub fn proxy_url(relay_base: &str, target: &str) -> String {
    format!(
        "{}/proxy/{}",
        relay_base.trim_end_matches('/'),
        encode_component(target)
    )
}

/// Percent-encode every reserved character, spaces as `%20`
pub fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Owner of the GitHub repository an archive URL points at
///
/// Relay-wrapped URLs are unwrapped first. Returns `None` for anything that
/// is not a `github.com` URL.
pub fn repository_owner(archive_url: &str) -> Option<String> {
    let direct = crate::installer::direct_target(archive_url);
    let parsed = url::Url::parse(&direct).ok()?;

    if parsed.host_str() != Some("github.com") {
        return None;
    }

    parsed
        .path_segments()?
        .next()
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

/// Case-insensitive search over name, author, and description
pub fn filter_candidates(candidates: &[Candidate], query: &str) -> Vec<Candidate> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return candidates.to_vec();
    }

    candidates
        .iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&needle)
                || c.author.to_lowercase().contains(&needle)
                || c.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
