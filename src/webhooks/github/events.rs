use serde::Deserialize;

mod issues;
mod ping;
mod pull_request;
mod push;
mod repository;

pub use issues::*;
pub use ping::*;
pub use pull_request::*;
pub use push::*;
pub use repository::*;

use crate::webhooks::github::GitHubEventType;

#[derive(Debug)]
pub enum GitHubEvent {
    Issues(IssuesEvent),
    Ping(PingEvent),
    PullRequest(PullRequestEvent),
    Push(PushEvent),
    Repository(RepositoryEvent),
}

impl GitHubEvent {
    /// Decodes a raw JSON payload into the typed event matching its
    /// `X-GitHub-Event` type. Event types the bot has no use for come back
    /// as `Ok(None)`.
    pub fn from_payload(
        event_type: GitHubEventType,
        payload: serde_json::Value,
    ) -> serde_json::Result<Option<Self>> {
        let event = match event_type {
            GitHubEventType::Issues => Self::Issues(serde_json::from_value(payload)?),
            GitHubEventType::Ping => Self::Ping(serde_json::from_value(payload)?),
            GitHubEventType::PullRequest => Self::PullRequest(serde_json::from_value(payload)?),
            GitHubEventType::Push => Self::Push(serde_json::from_value(payload)?),
            GitHubEventType::Repository => Self::Repository(serde_json::from_value(payload)?),
            GitHubEventType::Other => return Ok(None),
        };

        Ok(Some(event))
    }
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: GitHubUser,
}
