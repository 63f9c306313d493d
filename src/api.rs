use std::net::IpAddr;
use std::time::Instant;

use regex::Regex;
use rocket::{http::Status, serde::json::Json, State};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

mod recaptcha;
pub use recaptcha::RecaptchaVerifier;

use crate::{
    bot::promotion::{promote_to_collaborator, PromotionOutcome},
    config::PromoloConfig,
    github::{GitHubClient, MembershipStatus, OrgProfile, TeamRole, UserProfile},
};

/// Process start instant, for the uptime reported by status endpoints
pub struct StartTime(pub Instant);

/// One audit line per sensitive operation, with enough context to
/// reconstruct who asked for what from where
fn audit(action: &str, username: &str, ip: Option<IpAddr>, success: bool, detail: &str) {
    let ip = ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
    if success {
        info!("{}: {} | IP: {} | {}", action, username, ip, detail);
    } else {
        warn!("{}: {} | IP: {} | {}", action, username, ip, detail);
    }
}

/// GitHub login rules: 39 characters at most, alphanumeric, hyphens only
/// between alphanumerics
fn valid_username(username: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9](?:-?[a-zA-Z0-9])*$").expect("this should never fail");
    username.len() <= 39 && re.is_match(username)
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    fn new(error: &str) -> Json<Self> {
        Json(Self {
            error: error.to_string(),
        })
    }
}

// ---- invitation requests -------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InviteRequest {
    username: Option<String>,
    recaptcha_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InviteResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<InvitedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_assigned: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InvitedUser {
    username: String,
    name: Option<String>,
    avatar: Option<String>,
}

fn refusal(message: &str) -> Json<InviteResponse> {
    Json(InviteResponse {
        success: false,
        message: message.to_string(),
        user: None,
        team_assigned: None,
    })
}

#[rocket::post("/api/invite", format = "json", data = "<request>")]
pub(crate) async fn invite(
    request: Json<InviteRequest>,
    client_ip: Option<IpAddr>,
    github: &State<GitHubClient>,
    recaptcha: &State<RecaptchaVerifier>,
    config: &State<PromoloConfig>,
) -> (Status, Json<InviteResponse>) {
    let request = request.into_inner();

    let username = match request.username.as_deref() {
        Some(username) if !username.is_empty() => username,
        _ => {
            audit("INVITE_ATTEMPT", "unknown", client_ip, false, "no username");
            return (Status::BadRequest, refusal("Username required"));
        }
    };

    if config.recaptcha_secret.is_some() {
        let token = match request.recaptcha_token.as_deref() {
            Some(token) => token,
            None => {
                audit("INVITE_ATTEMPT", username, client_ip, false, "no reCAPTCHA");
                return (Status::BadRequest, refusal("reCAPTCHA required"));
            }
        };

        if !recaptcha.verify(token, client_ip).await {
            audit(
                "INVITE_ATTEMPT",
                username,
                client_ip,
                false,
                "reCAPTCHA failed",
            );
            return (
                Status::BadRequest,
                refusal("reCAPTCHA verification failed. Please try again."),
            );
        }
    }

    if !valid_username(username) {
        audit(
            "INVITE_ATTEMPT",
            username,
            client_ip,
            false,
            "invalid username format",
        );
        return (Status::BadRequest, refusal("Invalid username format"));
    }

    let user = match github.user(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            audit(
                "INVITE_ATTEMPT",
                username,
                client_ip,
                false,
                "not found on GitHub",
            );
            return (Status::NotFound, refusal("User not found on GitHub"));
        }
        Err(e) => {
            error!("couldn't look up {}: {}", username, e);
            audit("INVITE_ERROR", username, client_ip, false, "user lookup");
            return (Status::InternalServerError, refusal("Internal server error"));
        }
    };

    match github.org_membership(username).await {
        Ok(MembershipStatus::NotMember) => {}
        Ok(MembershipStatus::Member) => {
            audit(
                "INVITE_ATTEMPT",
                username,
                client_ip,
                false,
                "already a member",
            );
            return (
                Status::Conflict,
                refusal("User is already a member of the organization"),
            );
        }
        Err(e) => {
            error!("couldn't check membership of {}: {}", username, e);
            audit("INVITE_ERROR", username, client_ip, false, "membership check");
            return (Status::InternalServerError, refusal("Internal server error"));
        }
    }

    // Adding a non-member to the community team doubles as the invitation
    // itself; when only this step fails the invite is still reported, minus
    // the team assignment.
    let team_assigned = match github
        .add_team_membership(&config.community_team, username, TeamRole::Member)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "couldn't add {} to team {}: {}",
                username, config.community_team, e
            );
            false
        }
    };

    audit(
        "INVITE_SUCCESS",
        username,
        client_ip,
        true,
        if team_assigned {
            "team assigned"
        } else {
            "team assignment failed"
        },
    );

    (
        Status::Ok,
        Json(InviteResponse {
            success: true,
            message: format!("Invitation sent to {}", username),
            user: Some(InvitedUser {
                username: user.login,
                name: user.name,
                avatar: user.avatar_url,
            }),
            team_assigned: Some(team_assigned),
        }),
    )
}

// ---- user preview --------------------------------------------------------

#[rocket::get("/api/user/<username>")]
pub(crate) async fn user_preview(
    username: String,
    github: &State<GitHubClient>,
) -> Result<Json<UserProfile>, (Status, Json<ErrorResponse>)> {
    if !valid_username(&username) {
        return Err((
            Status::BadRequest,
            ErrorResponse::new("Invalid username format"),
        ));
    }

    match github.user(&username).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err((Status::NotFound, ErrorResponse::new("User not found"))),
        Err(e) => {
            error!("couldn't look up {}: {}", username, e);
            Err((Status::InternalServerError, ErrorResponse::new("Server error")))
        }
    }
}

// ---- frontend configuration and status -----------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublicConfig {
    recaptcha_site_key: Option<String>,
    github_org: String,
}

#[rocket::get("/api/config")]
pub(crate) fn public_config(config: &State<PromoloConfig>) -> Json<PublicConfig> {
    Json(PublicConfig {
        recaptcha_site_key: config.recaptcha_site_key.clone(),
        github_org: config.github_org.clone(),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct BotStatus {
    status: &'static str,
    organization: String,
    teams: TeamsStatus,
    security: SecurityStatus,
    uptime: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TeamsStatus {
    community: String,
    collaborators: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecurityStatus {
    recaptcha: &'static str,
    webhook_secret: &'static str,
    admin_key: &'static str,
}

fn configured(setting: &Option<String>) -> &'static str {
    if setting.is_some() {
        "configured"
    } else {
        "not configured"
    }
}

#[rocket::get("/api/bot/status")]
pub(crate) fn bot_status(
    config: &State<PromoloConfig>,
    started: &State<StartTime>,
) -> Json<BotStatus> {
    Json(BotStatus {
        status: "active",
        organization: config.github_org.clone(),
        teams: TeamsStatus {
            community: config.community_team.clone(),
            collaborators: config.collaborators_team.clone(),
        },
        security: SecurityStatus {
            recaptcha: configured(&config.recaptcha_secret),
            webhook_secret: configured(&config.github_webhook_secret),
            admin_key: configured(&config.admin_key),
        },
        uptime: started.0.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    organization: OrgProfile,
    bot: BotStats,
}

#[derive(Debug, Serialize)]
pub(crate) struct BotStats {
    uptime: u64,
    status: &'static str,
}

#[rocket::get("/api/stats")]
pub(crate) async fn org_stats(
    github: &State<GitHubClient>,
    started: &State<StartTime>,
) -> Result<Json<StatsResponse>, (Status, Json<ErrorResponse>)> {
    match github.organization().await {
        Ok(organization) => Ok(Json(StatsResponse {
            organization,
            bot: BotStats {
                uptime: started.0.elapsed().as_secs(),
                status: "active",
            },
        })),
        Err(e) => {
            error!("couldn't fetch organization stats: {}", e);
            Err((
                Status::InternalServerError,
                ErrorResponse::new("Couldn't fetch organization stats"),
            ))
        }
    }
}

// ---- manual promotions ---------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminPromoteRequest {
    admin_key: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminPromoteResponse {
    success: bool,
    message: String,
}

#[rocket::post("/api/admin/promote/<username>", format = "json", data = "<request>")]
pub(crate) async fn admin_promote(
    username: String,
    request: Json<AdminPromoteRequest>,
    client_ip: Option<IpAddr>,
    github: &State<GitHubClient>,
    config: &State<PromoloConfig>,
) -> (Status, Json<AdminPromoteResponse>) {
    let request = request.into_inner();

    let authorized = matches!(
        (&config.admin_key, &request.admin_key),
        (Some(expected), Some(given)) if expected == given
    );
    if !authorized {
        audit(
            "ADMIN_PROMOTE",
            &username,
            client_ip,
            false,
            "invalid admin key",
        );
        return (
            Status::Unauthorized,
            Json(AdminPromoteResponse {
                success: false,
                message: "Unauthorized".to_string(),
            }),
        );
    }

    let reason = request
        .reason
        .unwrap_or_else(|| "manual promotion by admin".to_string());
    let outcome = promote_to_collaborator(github, config, &username, &reason).await;
    audit(
        "ADMIN_PROMOTE",
        &username,
        client_ip,
        true,
        &format!("{:?}", outcome),
    );

    let (success, message) = match outcome {
        PromotionOutcome::Promoted => (true, format!("{} promoted to collaborator", username)),
        PromotionOutcome::AlreadyCollaborator => {
            (true, format!("{} is already a collaborator", username))
        }
        PromotionOutcome::NotOrgMember => (
            false,
            format!("{} is not a member of the organization", username),
        ),
        PromotionOutcome::Aborted => (
            false,
            "Promotion attempt failed, check the logs".to_string(),
        ),
    };

    (Status::Ok, Json(AdminPromoteResponse { success, message }))
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::blocking::Client, routes};
    use url::Url;

    use super::*;

    #[test]
    fn username_validation_follows_github_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("alice-the-2nd"));
        assert!(valid_username("0x2fd"));
        assert!(valid_username(&"a".repeat(39)));

        assert!(!valid_username(""));
        assert!(!valid_username("-alice"));
        assert!(!valid_username("alice-"));
        assert!(!valid_username("alice--bob"));
        assert!(!valid_username("alice_bob"));
        assert!(!valid_username("alice bob"));
        assert!(!valid_username(&"a".repeat(40)));
    }

    fn test_config(api_url: &str, admin_key: Option<&str>) -> PromoloConfig {
        PromoloConfig {
            github_org: "acme".to_string(),
            community_team: "community".to_string(),
            collaborators_team: "collaborators".to_string(),
            welcome_repo: "welcome".to_string(),
            github_token: "ghp_test".to_string(),
            github_webhook_secret: None,
            recaptcha_secret: None,
            recaptcha_site_key: Some("site-key".to_string()),
            admin_key: admin_key.map(String::from),
            github_api_url: Url::parse(api_url).unwrap(),
        }
    }

    fn api_client(config: PromoloConfig) -> Client {
        let github = GitHubClient::new(&config).unwrap();
        let rocket = rocket::build()
            .mount(
                "/",
                routes![invite, user_preview, public_config, bot_status, admin_promote],
            )
            .manage(github)
            .manage(RecaptchaVerifier::new(config.recaptcha_secret.clone()))
            .manage(config)
            .manage(StartTime(Instant::now()));
        Client::tracked(rocket).expect("valid rocket instance")
    }

    #[test]
    fn admin_promotion_needs_the_right_key() {
        let client = api_client(test_config("http://127.0.0.1:9", Some("sesame")));

        let response = client
            .post("/api/admin/promote/alice")
            .header(ContentType::JSON)
            .body(r#"{"adminKey": "wrong", "reason": "testing"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);

        // no admin key configured at all also refuses, even an empty guess
        let client = api_client(test_config("http://127.0.0.1:9", None));
        let response = client
            .post("/api/admin/promote/alice")
            .header(ContentType::JSON)
            .body(r#"{"reason": "testing"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn admin_promotion_runs_the_promotion_flow() {
        let mut server = mockito::Server::new();
        let already = server
            .mock("GET", "/orgs/acme/teams/collaborators/memberships/alice")
            .with_status(200)
            .with_body(r#"{"state": "active"}"#)
            .create();

        let client = api_client(test_config(&server.url(), Some("sesame")));
        let response = client
            .post("/api/admin/promote/alice")
            .header(ContentType::JSON)
            .body(r#"{"adminKey": "sesame"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["success"], true);
        already.assert();
    }

    #[test]
    fn invite_rejects_malformed_usernames_before_any_lookup() {
        let client = api_client(test_config("http://127.0.0.1:9", None));

        let response = client
            .post("/api/invite")
            .header(ContentType::JSON)
            .body(r#"{"username": "-not-a-login"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::BadRequest);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["success"], false);
    }

    #[test]
    fn invite_adds_newcomers_to_the_community_team() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/users/alice")
            .with_body(
                r#"{"login": "alice", "name": "Alice", "avatar_url": null, "bio": null,
                    "location": null, "public_repos": 3, "followers": 1,
                    "created_at": "2020-01-01T00:00:00Z"}"#,
            )
            .create();
        server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(404)
            .create();
        let added = server
            .mock("PUT", "/orgs/acme/teams/community/memberships/alice")
            .with_status(200)
            .create();

        let client = api_client(test_config(&server.url(), None));
        let response = client
            .post("/api/invite")
            .header(ContentType::JSON)
            .body(r#"{"username": "alice"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["teamAssigned"], true);
        assert_eq!(body["user"]["username"], "alice");
        added.assert();
    }

    #[test]
    fn invite_refuses_existing_members() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/users/alice")
            .with_body(
                r#"{"login": "alice", "name": null, "avatar_url": null, "bio": null,
                    "location": null, "public_repos": 3, "followers": 1,
                    "created_at": "2020-01-01T00:00:00Z"}"#,
            )
            .create();
        server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(200)
            .with_body(r#"{"state": "active"}"#)
            .create();

        let client = api_client(test_config(&server.url(), None));
        let response = client
            .post("/api/invite")
            .header(ContentType::JSON)
            .body(r#"{"username": "alice"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::Conflict);
    }

    #[test]
    fn config_endpoint_only_exposes_public_values() {
        let client = api_client(test_config("http://127.0.0.1:9", Some("sesame")));

        let response = client.get("/api/config").dispatch();
        assert_eq!(response.status(), Status::Ok);

        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["recaptchaSiteKey"], "site-key");
        assert_eq!(body["githubOrg"], "acme");
        assert_eq!(body.as_object().unwrap().len(), 2);
    }

    #[test]
    fn status_endpoint_reports_configuration_presence() {
        let client = api_client(test_config("http://127.0.0.1:9", Some("sesame")));

        let response = client.get("/api/bot/status").dispatch();
        assert_eq!(response.status(), Status::Ok);

        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["status"], "active");
        assert_eq!(body["teams"]["collaborators"], "collaborators");
        assert_eq!(body["security"]["adminKey"], "configured");
        assert_eq!(body["security"]["webhookSecret"], "not configured");
    }
}
