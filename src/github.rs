//! Thin facade over the GitHub REST API.
//!
//! Membership lookups return a three-way answer: a definitive yes
//! ([`MembershipStatus::Member`]), a definitive no (the API answered 404,
//! [`MembershipStatus::NotMember`]), or a failed query ([`GitHubError`]).
//! Callers deciding whether to grant anything must treat the error case as
//! "state unknown" and stop.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::config::PromoloConfig;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("couldn't reach the GitHub API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub API returned {status} for {path}")]
    Status { status: u16, path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Member,
    NotMember,
}

/// Role granted alongside a team membership
#[derive(Debug, Clone, Copy)]
pub enum TeamRole {
    Member,
}

impl TeamRole {
    fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Member => "member",
        }
    }
}

/// Public profile of a GitHub user, as served back by the preview endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub public_repos: u64,
    pub followers: u64,
    pub created_at: String,
}

/// Public profile of the organization, used for the stats endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct OrgProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub public_repos: u64,
    pub followers: u64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: String,
    org: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &PromoloConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("promolo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base: config
                .github_api_url
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            org: config.github_org.clone(),
            token: config.github_token.clone(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Is `username` a member of the given team of the organization?
    pub async fn team_membership(
        &self,
        team: &str,
        username: &str,
    ) -> Result<MembershipStatus, GitHubError> {
        self.membership_lookup(format!(
            "/orgs/{}/teams/{}/memberships/{}",
            self.org, team, username
        ))
        .await
    }

    /// Is `username` a member of the organization at all?
    pub async fn org_membership(&self, username: &str) -> Result<MembershipStatus, GitHubError> {
        self.membership_lookup(format!("/orgs/{}/memberships/{}", self.org, username))
            .await
    }

    /// Adds `username` to a team of the organization. Adding someone who is
    /// already on the team is a no-op on GitHub's side, and adding a
    /// non-member sends them an organization invitation.
    pub async fn add_team_membership(
        &self,
        team: &str,
        username: &str,
        role: TeamRole,
    ) -> Result<(), GitHubError> {
        let path = format!("/orgs/{}/teams/{}/memberships/{}", self.org, team, username);
        trace!("PUT {}", path);

        let response = self
            .http
            .put(format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "role": role.as_str() }))
            .send()
            .await?;

        expect_success(response, path).map(|_| ())
    }

    /// Opens an issue in a repository of the organization
    pub async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<(), GitHubError> {
        let path = format!("/repos/{}/{}/issues", self.org, repo);
        trace!("POST {}", path);

        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "title": title,
                "body": body,
                "labels": labels,
            }))
            .send()
            .await?;

        expect_success(response, path).map(|_| ())
    }

    /// Fetches the public profile of a user, `None` if no such account exists
    pub async fn user(&self, username: &str) -> Result<Option<UserProfile>, GitHubError> {
        let path = format!("/users/{}", username);
        let response = self.get(&path).await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        let response = expect_success(response, path)?;
        Ok(Some(response.json().await?))
    }

    /// Fetches the public profile of the configured organization
    pub async fn organization(&self) -> Result<OrgProfile, GitHubError> {
        let path = format!("/orgs/{}", self.org);
        let response = self.get(&path).await?;
        let response = expect_success(response, path)?;
        Ok(response.json().await?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, reqwest::Error> {
        trace!("GET {}", path);
        self.http
            .get(format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .send()
            .await
    }

    async fn membership_lookup(&self, path: String) -> Result<MembershipStatus, GitHubError> {
        let response = self.get(&path).await?;

        // 404 is an answer here, not a failure: the user simply doesn't hold
        // that membership.
        if response.status().as_u16() == 404 {
            return Ok(MembershipStatus::NotMember);
        }

        expect_success(response, path).map(|_| MembershipStatus::Member)
    }
}

fn expect_success(
    response: reqwest::Response,
    path: String,
) -> Result<reqwest::Response, GitHubError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(GitHubError::Status {
            status: response.status().as_u16(),
            path,
        })
    }
}
