use tracing::{info, trace};

use crate::bot::{classifier, promotion};
use crate::config::PromoloConfig;
use crate::github::GitHubClient;
use crate::webhooks::GitHubEvent;

pub(crate) async fn handle_github_event(
    github: &GitHubClient,
    config: &PromoloConfig,
    event: GitHubEvent,
) {
    if let GitHubEvent::Ping(ping) = &event {
        info!("GitHub says: {}", ping.zen);
        return;
    }

    match classifier::classify(&event, &config.github_org) {
        Some(intent) => {
            info!(
                "evaluating promotion for {}: {}",
                intent.username, intent.reason
            );
            promotion::promote_to_collaborator(github, config, &intent.username, &intent.reason)
                .await;
        }
        None => trace!("event isn't a promotion signal"),
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use crate::github::tests::test_config;
    use crate::webhooks::github::GitHubEventType;

    use super::*;

    fn event(event_type: GitHubEventType, payload: serde_json::Value) -> GitHubEvent {
        GitHubEvent::from_payload(event_type, payload)
            .expect("payload should decode")
            .expect("event type should be handled")
    }

    #[tokio::test]
    async fn repository_created_by_member_ends_in_promotion_and_congratulations() {
        let mut server = mockito::Server::new_async().await;
        let config = test_config(&server.url());
        let github = GitHubClient::new(&config).unwrap();

        server
            .mock("GET", "/orgs/acme/teams/collaborators/memberships/alice")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(200)
            .with_body(r#"{"state": "active"}"#)
            .create_async()
            .await;
        let grant = server
            .mock("PUT", "/orgs/acme/teams/collaborators/memberships/alice")
            .match_body(Matcher::JsonString(r#"{"role": "member"}"#.to_string()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let congratulations = server
            .mock("POST", "/repos/acme/welcome/issues")
            .match_body(Matcher::Regex("Congratulations @alice".to_string()))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let event = event(
            GitHubEventType::Repository,
            json!({
                "action": "created",
                "repository": {"name": "meshtastic-maps", "owner": {"login": "acme"}},
                "sender": {"login": "alice"},
            }),
        );
        handle_github_event(&github, &config, event).await;

        grant.assert_async().await;
        congratulations.assert_async().await;
    }

    #[tokio::test]
    async fn push_with_anonymous_pusher_promotes_the_sender() {
        let mut server = mockito::Server::new_async().await;
        let config = test_config(&server.url());
        let github = GitHubClient::new(&config).unwrap();

        server
            .mock("GET", "/orgs/acme/teams/collaborators/memberships/bob")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/orgs/acme/memberships/bob")
            .with_status(200)
            .with_body(r#"{"state": "active"}"#)
            .create_async()
            .await;
        let grant = server
            .mock("PUT", "/orgs/acme/teams/collaborators/memberships/bob")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let congratulations = server
            .mock("POST", "/repos/acme/welcome/issues")
            .match_body(Matcher::Regex("push with 2 commits".to_string()))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let event = event(
            GitHubEventType::Push,
            json!({
                "repository": {"name": "firmware", "owner": {"login": "acme"}},
                "pusher": {"name": null},
                "sender": {"login": "bob"},
                "commits": [
                    {"id": "4f2e9c1", "message": "add LoRa region preset"},
                    {"id": "9b8d7a3", "message": "bump channel limit"},
                ],
            }),
        );
        handle_github_event(&github, &config, event).await;

        grant.assert_async().await;
        congratulations.assert_async().await;
    }

    #[tokio::test]
    async fn empty_push_triggers_no_github_calls() {
        let mut server = mockito::Server::new_async().await;
        let config = test_config(&server.url());
        let github = GitHubClient::new(&config).unwrap();

        let tier_check = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let grant = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let event = event(
            GitHubEventType::Push,
            json!({
                "repository": {"name": "firmware", "owner": {"login": "acme"}},
                "pusher": {"name": "alice"},
                "sender": {"login": "alice"},
                "commits": [],
            }),
        );
        handle_github_event(&github, &config, event).await;

        tier_check.assert_async().await;
        grant.assert_async().await;
    }
}
