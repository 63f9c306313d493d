use tracing::{error, info, warn};

use crate::config::PromoloConfig;
use crate::github::{GitHubClient, GitHubError, MembershipStatus, TeamRole};

const CONGRATULATIONS_LABELS: &[&str] = &["welcome", "promotion", "collaborator"];

/// How a promotion attempt ended. There is no error variant on purpose:
/// downstream failures are logged here and absorbed, and the next qualifying
/// event retries the whole flow from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted,
    AlreadyCollaborator,
    NotOrgMember,
    /// A membership query or the grant itself failed; nothing was changed
    Aborted,
}

/// Runs one promotion attempt for `username`.
///
/// Membership state is read fresh from GitHub on every attempt, never
/// cached. Two qualifying events racing each other can therefore both reach
/// the grant, which GitHub treats as a no-op the second time. On any
/// ambiguous query result the attempt stops without escalating.
pub async fn promote_to_collaborator(
    github: &GitHubClient,
    config: &PromoloConfig,
    username: &str,
    reason: &str,
) -> PromotionOutcome {
    let team = &config.collaborators_team;

    match github.team_membership(team, username).await {
        Ok(MembershipStatus::Member) => {
            info!("{} is already on team {}", username, team);
            return PromotionOutcome::AlreadyCollaborator;
        }
        Ok(MembershipStatus::NotMember) => {}
        Err(e) => {
            error!("couldn't check team {} for {}: {}", team, username, e);
            return PromotionOutcome::Aborted;
        }
    }

    match github.org_membership(username).await {
        Ok(MembershipStatus::Member) => {}
        Ok(MembershipStatus::NotMember) => {
            warn!(
                "can't promote {}: not a member of {}",
                username,
                github.org()
            );
            return PromotionOutcome::NotOrgMember;
        }
        Err(e) => {
            error!("couldn't check {} membership of {}: {}", github.org(), username, e);
            return PromotionOutcome::Aborted;
        }
    }

    if let Err(e) = github
        .add_team_membership(team, username, TeamRole::Member)
        .await
    {
        error!("couldn't add {} to team {}: {}", username, team, e);
        return PromotionOutcome::Aborted;
    }

    info!("promoted {} to team {} ({})", username, team, reason);

    // The promotion stands even when the congratulations issue can't be
    // opened.
    if let Err(e) = send_congratulations(github, config, username, reason).await {
        warn!("couldn't congratulate {}: {}", username, e);
    }

    PromotionOutcome::Promoted
}

async fn send_congratulations(
    github: &GitHubClient,
    config: &PromoloConfig,
    username: &str,
    reason: &str,
) -> Result<(), GitHubError> {
    let title = format!("🎉 Congratulations @{}, promoted to Collaborator", username);
    let body = format!(
        "Hi @{username}!

🎉 **Congratulations!** You have been automatically promoted to the \
**{team}** team of {org}.

**Promotion reason:** {reason}

As a collaborator you now have:

✅ Write access to the repositories you take part in
✅ The ability to review pull requests
✅ The ability to create and manage issues

Thanks for being an active part of the community! 🚀

---
_This message was generated automatically by the team promotion system._",
        username = username,
        team = config.collaborators_team,
        org = github.org(),
        reason = reason,
    );

    github
        .create_issue(&config.welcome_repo, &title, &body, CONGRATULATIONS_LABELS)
        .await
}
