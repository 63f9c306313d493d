use serde::Deserialize;

use crate::webhooks::github::events::{GitHubUser, Repository};

#[derive(Debug, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub repository: Repository,
    pub issue: Issue,
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub user: GitHubUser,
}
