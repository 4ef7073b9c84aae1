use anyhow::{Context, Result};
use chronos::api::{start_server, AppState};
use chronos::cli::{run_chat, ChatOptions, Cli, Command};
use chronos::integration::{Assistant, Settings};
use chronos::telemetry::{init_tracing, LogBuffer};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("Failed to load {:?}", path))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let logs = LogBuffer::default();
    init_tracing(&logs);

    let settings = Settings::from_env()?;
    let assistant = Arc::new(
        Assistant::from_settings(&settings)
            .await
            .context("Failed to initialize the assistant")?,
    );

    match cli.command.unwrap_or_default() {
        Command::Serve { port, host } => {
            let ip: IpAddr = host
                .parse()
                .with_context(|| format!("Invalid listen address: {}", host))?;
            let addr = SocketAddr::new(ip, port.unwrap_or(settings.port));

            info!("Starting Chronos API");
            start_server(AppState::new(assistant, logs), addr).await?;
        }
        Command::Chat {
            user_id,
            session_id,
            speak,
        } => {
            let options = ChatOptions {
                user_id,
                session_id,
                speak,
            };
            let stdin = BufReader::new(tokio::io::stdin());
            run_chat(&assistant, &logs, &options, stdin, tokio::io::stdout()).await?;

            if !assistant.wait_for_playback(Duration::from_secs(60)).await {
                warn!("Exiting before speech playback finished");
            }
        }
        Command::Speak { text } => {
            match assistant.speak(&text).await {
                Some(outcome) => info!("Speech: {}", outcome),
                None => anyhow::bail!("Speech synthesis failed"),
            }
            if !assistant.wait_for_playback(Duration::from_secs(120)).await {
                warn!("Exiting before speech playback finished");
            }
        }
    }

    Ok(())
}
