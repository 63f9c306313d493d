use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use tracing::{error, info, trace, warn};

pub mod events;
mod signing;

pub use events::GitHubEvent;
use signing::SignedGitHubPayload;

use crate::webhooks::{Event, EventSender};

const X_GITHUB_EVENT: &str = "X-GitHub-Event";
const X_GITHUB_DELIVERY: &str = "X-GitHub-Delivery";

/// Webhook secret shared with GitHub, `None` when running unsigned
pub struct GitHubSecret(pub Option<String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubEventType {
    Issues,
    Ping,
    PullRequest,
    Push,
    Repository,
    /// Every event type the bot has no use for. Deliveries of these are
    /// acknowledged and dropped.
    Other,
}

impl GitHubEventType {
    fn from_header(value: &str) -> Self {
        match value {
            "issues" => Self::Issues,
            "ping" => Self::Ping,
            "pull_request" => Self::PullRequest,
            "push" => Self::Push,
            "repository" => Self::Repository,
            _ => Self::Other,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for GitHubEventType {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one(X_GITHUB_EVENT) {
            Some(event_type) => Outcome::Success(Self::from_header(event_type)),
            None => {
                trace!("couldn't locate {} header", X_GITHUB_EVENT);
                Outcome::Success(Self::Other)
            }
        }
    }
}

/// Opaque delivery id set by GitHub, only ever logged
pub struct GitHubDelivery(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for GitHubDelivery {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(GitHubDelivery(
            request
                .headers()
                .get_one(X_GITHUB_DELIVERY)
                .map(str::to_string),
        ))
    }
}

#[rocket::post("/webhook/github", data = "<payload>")]
pub fn github_webhook(
    event_type: GitHubEventType,
    delivery: GitHubDelivery,
    payload: SignedGitHubPayload,
    sender: &State<EventSender>,
) -> (Status, &'static str) {
    let delivery = delivery.0.as_deref().unwrap_or("<none>").to_string();
    info!("received {:?} event (delivery {})", event_type, delivery);

    // The sender should know about structurally broken deliveries, so a body
    // that isn't even JSON is the one processing failure reported back.
    let payload: serde_json::Value = match serde_json::from_str(&payload.0) {
        Ok(payload) => payload,
        Err(e) => {
            error!("body of delivery {} isn't valid JSON: {}", delivery, e);
            return (Status::InternalServerError, "Error");
        }
    };

    match GitHubEvent::from_payload(event_type, payload) {
        Ok(Some(event)) => sender
            .0
            .send(Event::GitHub(event))
            .expect("mspc channel was closed / dropped"),
        Ok(None) => trace!("{:?} events aren't handled, ignoring", event_type),
        // A recognized event with an unexpected shape isn't the sender's
        // fault and doesn't warrant a retry, so it's only logged here.
        Err(e) => warn!(
            "couldn't decode {:?} payload (delivery {}): {}",
            event_type, delivery, e
        ),
    }

    (Status::Ok, "OK")
}
