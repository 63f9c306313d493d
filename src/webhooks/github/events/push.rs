use serde::Deserialize;

use crate::webhooks::github::events::{GitHubUser, Repository};

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub repository: Repository,
    pub pusher: Pusher,
    pub sender: Option<GitHubUser>,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

/// The pusher is a git-level author, not a GitHub account: its name can be
/// missing or not match any login
#[derive(Debug, Deserialize)]
pub struct Pusher {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    pub id: String,
    pub message: String,
}
