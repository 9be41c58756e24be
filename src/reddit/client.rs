//! Reddit REST client
//!
//! Implements both collaborator traits against the OAuth API. Flair labels
//! are looked up after assignment purely for the moderator notice, so a
//! failed label lookup never fails the assignment itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    BadgeAssigner, CollaboratorError, ContentRef, IdentityResolver, ResolvedAuthor,
    strip_emoji_shortcodes,
};

#[derive(Debug, Clone)]
pub struct RedditApiConfig {
    /// OAuth API base, e.g. https://oauth.reddit.com
    pub api_base: String,
    /// Bearer token for the moderator/bot account
    pub access_token: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub require_https: bool,
}

impl Default for RedditApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://oauth.reddit.com".to_string(),
            access_token: String::new(),
            user_agent: "flair_ladder/0.1 (moderator flair leveling)".to_string(),
            timeout_secs: 10,
            require_https: true,
        }
    }
}

#[derive(Clone)]
pub struct RedditClient {
    client: Client,
    api_base: Url,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: ThingData,
}

#[derive(Debug, Deserialize)]
struct ThingData {
    author: Option<String>,
    author_fullname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlairTemplate {
    id: String,
    #[serde(default)]
    text: Option<String>,
}

impl RedditClient {
    pub fn new(config: RedditApiConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).context("Invalid Reddit API base URL")?;
        if config.require_https && api_base.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but Reddit API base is not HTTPS: {}",
                config.api_base
            ));
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone());
        if config.require_https {
            builder = builder.https_only(true);
        }
        let client = builder.build().context("Failed to create Reddit HTTP client")?;

        info!("Reddit client targeting {}", api_base);

        Ok(Self {
            client,
            api_base,
            access_token: config.access_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CollaboratorError> {
        self.api_base
            .join(path)
            .map_err(|e| CollaboratorError::Unavailable(format!("bad endpoint {}: {}", path, e)))
    }

    async fn fetch_flair_label(&self, badge_id: &str, community: &str) -> Option<String> {
        let url = self
            .endpoint(&format!("r/{}/api/user_flair_v2", community))
            .ok()?;

        let response = match self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "Flair template lookup failed");
                return None;
            }
            Err(e) => {
                warn!("Flair template lookup failed: {}", e);
                return None;
            }
        };

        let templates: Vec<FlairTemplate> = match response.json().await {
            Ok(templates) => templates,
            Err(e) => {
                warn!("Could not decode flair templates: {}", e);
                return None;
            }
        };

        templates
            .into_iter()
            .find(|template| template.id == badge_id)
            .and_then(|template| template.text)
            .map(|text| strip_emoji_shortcodes(&text))
            .filter(|label| !label.is_empty())
    }
}

fn transport_error(e: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("request failed: {}", e))
}

#[async_trait]
impl IdentityResolver for RedditClient {
    async fn resolve_author(&self, target: &ContentRef) -> Result<ResolvedAuthor, CollaboratorError> {
        let mut url = self.endpoint("api/info")?;
        url.query_pairs_mut().append_pair("id", &target.fullname());

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(CollaboratorError::NotFound(format!("{} does not exist", target)));
            }
            status => {
                return Err(CollaboratorError::Unavailable(format!(
                    "api/info returned {}",
                    status
                )));
            }
        }

        let listing: Listing = response.json().await.map_err(transport_error)?;
        let thing = listing
            .data
            .children
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::NotFound(format!("{} does not exist", target)))?;

        let (Some(username), Some(author_id)) = (thing.data.author, thing.data.author_fullname)
        else {
            return Err(CollaboratorError::NotFound(format!("{} has no author", target)));
        };
        if username == "[deleted]" {
            return Err(CollaboratorError::NotFound(format!(
                "author of {} was deleted",
                target
            )));
        }

        debug!(content = %target, username = %username, "Resolved author");
        Ok(ResolvedAuthor { author_id, username })
    }
}

#[async_trait]
impl BadgeAssigner for RedditClient {
    async fn assign_badge(
        &self,
        badge_id: &str,
        username: &str,
        community: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        let url = self.endpoint(&format!("r/{}/api/selectflair", community))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .form(&[
                ("api_type", "json"),
                ("name", username),
                ("flair_template_id", badge_id),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                return Err(CollaboratorError::NotFound(format!(
                    "flair template {} not recognized in r/{}",
                    badge_id, community
                )));
            }
            status => {
                return Err(CollaboratorError::Unavailable(format!(
                    "selectflair returned {}",
                    status
                )));
            }
        }

        info!(username = %username, flair_id = %badge_id, community = %community, "Applied user flair");
        Ok(self.fetch_flair_label(badge_id, community).await)
    }
}
