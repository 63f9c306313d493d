use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
/// Verification must answer within this window; exceeding it counts as a
/// failed check
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
/// reCAPTCHA v3 scores range from 0.0 (bot) to 1.0 (human)
const MIN_SCORE: f64 = 0.5;
/// Action tag the frontend requests its tokens with
const EXPECTED_ACTION: &str = "github_invite";

/// Server-side reCAPTCHA v3 check guarding the invite endpoint.
///
/// Without a configured secret every token is accepted, which is only meant
/// for trusted or development deployments.
pub struct RecaptchaVerifier {
    http: reqwest::Client,
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    score: Option<f64>,
    action: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl RecaptchaVerifier {
    pub fn new(secret: Option<String>) -> Self {
        if secret.is_none() {
            warn!("no reCAPTCHA secret configured, invite requests are unchecked");
        }

        Self {
            http: reqwest::Client::new(),
            secret,
        }
    }

    /// Checks an invite token. Anything that goes wrong along the way
    /// (transport error, timeout, refused token, low score, wrong action)
    /// counts as a failed verification.
    pub async fn verify(&self, token: &str, client_ip: Option<IpAddr>) -> bool {
        self.verify_at(VERIFY_URL, token, client_ip).await
    }

    async fn verify_at(&self, url: &str, token: &str, client_ip: Option<IpAddr>) -> bool {
        let secret = match &self.secret {
            Some(secret) => secret,
            None => return true,
        };

        let mut params = vec![("secret", secret.clone()), ("response", token.to_string())];
        if let Some(ip) = client_ip {
            params.push(("remoteip", ip.to_string()));
        }

        let response = self
            .http
            .post(url)
            .query(&params)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await;

        let response: SiteVerifyResponse = match response {
            Ok(response) => match response.json().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("couldn't decode reCAPTCHA response: {}", e);
                    return false;
                }
            },
            Err(e) => {
                warn!("reCAPTCHA verification failed: {}", e);
                return false;
            }
        };

        if !response.success {
            warn!("reCAPTCHA refused the token: {:?}", response.error_codes);
            return false;
        }

        let score = response.score.unwrap_or(0.0);
        if score < MIN_SCORE {
            warn!("reCAPTCHA score too low: {} < {}", score, MIN_SCORE);
            return false;
        }

        if response.action.as_deref() != Some(EXPECTED_ACTION) {
            warn!("unexpected reCAPTCHA action: {:?}", response.action);
            return false;
        }

        debug!("reCAPTCHA passed with score {}", score);
        true
    }
}
