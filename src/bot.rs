use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::{config::PromoloConfig, github::GitHubClient, webhooks::Event};

mod classifier;
mod github;
pub(crate) mod promotion;

pub struct Promolo {
    github: GitHubClient,
    config: PromoloConfig,
}

impl Promolo {
    pub fn new(config: PromoloConfig, github: GitHubClient) -> Self {
        Self { github, config }
    }

    /// Processes webhook events until every sender is gone. Events are
    /// handled one at a time, in delivery order; every failure is absorbed
    /// inside the handler so one broken promotion never stops the loop.
    pub async fn run(&self, mut events: UnboundedReceiver<Event>) {
        debug!("running...");

        loop {
            let event = match events.recv().await {
                Some(event) => event,
                None => {
                    info!("all channel senders were dropped, exiting receive loop");
                    break;
                }
            };
            debug!("received event: {:?}", event);

            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: Event) {
        match event {
            Event::GitHub(event) => {
                github::handle_github_event(&self.github, &self.config, event).await
            }
        }
    }
}
