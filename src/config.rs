use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct PromoloConfig {
    /// Name of the GitHub organization whose activity is watched
    pub github_org: String,
    /// Team newcomers are added to when they request an invitation
    #[serde(default = "default_community_team")]
    pub community_team: String,
    /// Team active members are promoted to
    #[serde(default = "default_collaborators_team")]
    pub collaborators_team: String,
    /// Repository (under the organization) where congratulations issues are
    /// opened after a promotion
    #[serde(default = "default_welcome_repo")]
    pub welcome_repo: String,
    /// Personal access token used for all GitHub API calls. Needs org and
    /// team administration scopes.
    pub github_token: String,
    /// Shared secret used to verify webhook signatures. When unset, payloads
    /// are accepted unsigned.
    pub github_webhook_secret: Option<String>,
    /// reCAPTCHA v3 server-side secret. When unset, invite requests skip the
    /// captcha check entirely.
    pub recaptcha_secret: Option<String>,
    /// reCAPTCHA v3 site key, exposed to the frontend through `/api/config`
    pub recaptcha_site_key: Option<String>,
    /// Pre-shared key authorizing manual promotions. When unset, the admin
    /// endpoint always refuses.
    pub admin_key: Option<String>,
    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api_url")]
    pub github_api_url: Url,
}

fn default_community_team() -> String {
    "community".to_string()
}

fn default_collaborators_team() -> String {
    "collaborators".to_string()
}

fn default_welcome_repo() -> String {
    "welcome".to_string()
}

fn default_github_api_url() -> Url {
    Url::parse("https://api.github.com").expect("this should never fail")
}
