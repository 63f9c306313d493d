use tracing::trace;

use crate::webhooks::github::events::{
    GitHubEvent, IssuesEvent, PullRequestEvent, PushEvent, RepositoryEvent,
};

/// A user who qualifies for a promotion, and the activity that earned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionIntent {
    pub username: String,
    pub reason: String,
}

impl PromotionIntent {
    fn new(username: &str, reason: String) -> Self {
        Self {
            username: username.to_string(),
            reason,
        }
    }
}

/// Decides whether an event is an activity signal worth a promotion.
///
/// Stateless: everything comes from the event itself and the configured
/// organization name. Events that don't qualify are not errors, they are
/// simply not signals.
pub fn classify(event: &GitHubEvent, org: &str) -> Option<PromotionIntent> {
    match event {
        GitHubEvent::Repository(event) => classify_repository(event, org),
        GitHubEvent::Push(event) => classify_push(event, org),
        GitHubEvent::PullRequest(event) => classify_pull_request(event, org),
        GitHubEvent::Issues(event) => classify_issues(event, org),
        GitHubEvent::Ping(_) => None,
    }
}

fn classify_repository(event: &RepositoryEvent, org: &str) -> Option<PromotionIntent> {
    if event.action != "created" || event.repository.owner.login != org {
        trace!(
            "repository {} {}, not a promotion signal",
            event.repository.name,
            event.action
        );
        return None;
    }

    Some(PromotionIntent::new(
        &event.sender.login,
        "created repository".to_string(),
    ))
}

fn classify_push(event: &PushEvent, org: &str) -> Option<PromotionIntent> {
    if event.commits.is_empty() || event.repository.owner.login != org {
        trace!("push to {} without qualifying commits", event.repository.name);
        return None;
    }

    if let Some(commit) = event.commits.first() {
        trace!(
            "head commit {}: {}",
            commit.id,
            commit.message.lines().next().unwrap_or_default()
        );
    }

    let username = push_author(event)?;
    Some(PromotionIntent::new(
        username,
        format!("push with {} commits", event.commits.len()),
    ))
}

/// The name attached to a push is a git-level identity and can be absent, in
/// which case the webhook sender is the best available answer
fn push_author(event: &PushEvent) -> Option<&str> {
    event
        .pusher
        .name
        .as_deref()
        .or_else(|| event.sender.as_ref().map(|user| user.login.as_str()))
}

fn classify_pull_request(event: &PullRequestEvent, org: &str) -> Option<PromotionIntent> {
    if event.action != "opened" || event.repository.owner.login != org {
        trace!(
            "pull request #{} {}, not a promotion signal",
            event.pull_request.number,
            event.action
        );
        return None;
    }

    Some(PromotionIntent::new(
        &event.pull_request.user.login,
        "opened pull request".to_string(),
    ))
}

fn classify_issues(event: &IssuesEvent, org: &str) -> Option<PromotionIntent> {
    if event.action != "opened" || event.repository.owner.login != org {
        trace!(
            "issue #{} {}, not a promotion signal",
            event.issue.number,
            event.action
        );
        return None;
    }

    Some(PromotionIntent::new(
        &event.issue.user.login,
        "opened issue".to_string(),
    ))
}
