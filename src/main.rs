use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use news_digest::auth::GoogleAuthorizer;
use news_digest::bot::NewsBot;
use news_digest::channels::{ChannelManager, CliChannel, DiscordChannel};
use news_digest::config::AppConfig;
use news_digest::digest::{self, Digest};
use news_digest::llm::create_summarizer;
use news_digest::mail::GmailClient;

#[derive(Parser)]
#[command(name = "news-digest", version, about = "Summarize the newest newsletter in your inbox")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for the trigger phrase and post summaries (default)
    Run {
        /// Do not read triggers from stdin
        #[arg(long)]
        no_cli: bool,
    },
    /// Run the Google consent flow and store the token file
    Authorize,
    /// Print the normalized text of the newest message
    Preview,
    /// Summarize the newest message once and print the result
    Summarize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let http = reqwest::Client::builder()
        .timeout(config.digest.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let authorizer = Arc::new(GoogleAuthorizer::new(config.google.clone(), http.clone()));
    let mail = Arc::new(GmailClient::new(config.gmail.clone(), http.clone()));

    match cli.command.unwrap_or(Command::Run { no_cli: false }) {
        Command::Authorize => {
            authorizer
                .authorize(BufReader::new(tokio::io::stdin()))
                .await
                .context("Authorization failed")?;
            eprintln!("Authorized ({}).", config.google.describe());
        }
        Command::Preview => {
            match digest::latest_text(authorizer.as_ref(), mail.as_ref(), &config.digest).await? {
                Some(text) => println!("{text}"),
                None => eprintln!("No message body found"),
            }
        }
        Command::Summarize => {
            let digest = build_digest(&config, authorizer, mail)?;
            match digest.run().await? {
                Some(summary) => println!("{summary}"),
                None => eprintln!("No message body found"),
            }
        }
        Command::Run { no_cli } => {
            // Bootstrap the credential before listening so the consent prompt
            // does not interleave with chat input. The CLI channel keeps reading
            // from the same buffered stdin.
            let mut stdin = BufReader::new(tokio::io::stdin());
            authorizer
                .authorize(&mut stdin)
                .await
                .context("Authorization failed")?;

            let digest = Arc::new(build_digest(&config, authorizer, mail)?);

            eprintln!("📰 News Digest v{}", env!("CARGO_PKG_VERSION"));
            eprintln!(
                "   Model: {} ({})",
                config.llm.model,
                config.llm.backend.name()
            );
            eprintln!(
                "   Mail: Gmail {} via {}",
                config.gmail.label,
                config.google.describe()
            );
            eprintln!("   Trigger: {}", config.digest.trigger);

            let mut channels = ChannelManager::new();
            if !no_cli {
                channels.add(Box::new(CliChannel::with_input(stdin)));
            }
            if let Some(discord) = config.discord.clone() {
                eprintln!(
                    "   Discord: posting to {} (watching {})",
                    discord.destination_channel_id,
                    discord.command_channel_ids.join(", ")
                );
                channels.add(Box::new(DiscordChannel::new(discord, http.clone())));
            }
            if channels.channel_names().is_empty() {
                anyhow::bail!("No channels enabled: set DISCORD_BOT_TOKEN or drop --no-cli");
            }

            for (name, result) in channels.health_check_all().await {
                if let Err(e) = result {
                    tracing::warn!("Channel {} failed its health check: {}", name, e);
                }
            }

            eprintln!("   Channels: {}\n", channels.channel_names().join(", "));

            NewsBot::new(digest, channels, config.digest.trigger.clone())
                .run()
                .await?;
        }
    }

    Ok(())
}

fn build_digest(
    config: &AppConfig,
    authorizer: Arc<GoogleAuthorizer>,
    mail: Arc<GmailClient>,
) -> anyhow::Result<Digest> {
    let summarizer = create_summarizer(&config.llm).with_context(|| {
        format!(
            "Set {} for the {} backend",
            config.llm.api_key_var(),
            config.llm.backend.name()
        )
    })?;

    Ok(Digest::new(
        authorizer,
        mail,
        summarizer,
        config.digest.clone(),
    ))
}
