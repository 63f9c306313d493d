use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use rocket::routes;
use tokio::sync::mpsc::unbounded_channel;

mod api;
use api::{
    admin_promote, bot_status, invite, org_stats, public_config, user_preview, RecaptchaVerifier,
    StartTime,
};

mod bot;
use bot::Promolo;

mod config;
use config::PromoloConfig;

mod github;
use github::GitHubClient;

mod webhooks;
use webhooks::{github::GitHubSecret, github_webhook, EventSender};

#[derive(Parser)]
#[clap(version = "0.1")]
struct Opts {
    /// Configuration file for promolo
    #[clap(short, long, parse(from_os_str))]
    config: PathBuf,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opts = Opts::parse();
    let config_file = File::open(&opts.config)
        .with_context(|| format!("couldn't open {}:", opts.config.display()))?;
    let config: PromoloConfig = serde_yaml::from_reader(BufReader::new(config_file))
        .context("couldn't parse config file")?;

    let github = GitHubClient::new(&config).context("failed to create GitHub client")?;
    let recaptcha = RecaptchaVerifier::new(config.recaptcha_secret.clone());
    let github_secret = config.github_webhook_secret.clone();

    let (sender, receiver) = unbounded_channel();
    let promolo = Promolo::new(config.clone(), github.clone());
    tokio::spawn(async move { promolo.run(receiver).await });

    let rocket = rocket::build()
        .mount(
            "/",
            routes![
                github_webhook,
                invite,
                user_preview,
                public_config,
                bot_status,
                org_stats,
                admin_promote,
            ],
        )
        .manage(EventSender(sender))
        .manage(GitHubSecret(github_secret))
        .manage(github)
        .manage(recaptcha)
        .manage(config)
        .manage(StartTime(Instant::now()));
    rocket
        .launch()
        .await
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!(err))
}
