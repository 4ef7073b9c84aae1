//! CLI command definitions and the interactive chat loop

use crate::integration::assistant::{Assistant, ChatTurn, DEFAULT_SESSION_ID, DEFAULT_USER_ID};
use crate::telemetry::LogBuffer;
use crate::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Chronos - message-routing assistant over Vertex AI
#[derive(Debug, Parser)]
#[command(name = "chronos", about = "Message-routing LLM assistant", version)]
pub struct Cli {
    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long, global = true)]
    pub env_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Listen port (overrides CHRONOS_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Chat interactively on stdin/stdout
    Chat {
        #[arg(long, default_value = DEFAULT_USER_ID)]
        user_id: String,

        #[arg(long, default_value = DEFAULT_SESSION_ID)]
        session_id: String,

        /// Speak every reply
        #[arg(long)]
        speak: bool,
    },

    /// Speak a line of text and exit
    Speak {
        text: String,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve {
            port: None,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Options for one interactive chat session
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub user_id: String,
    pub session_id: String,
    pub speak: bool,
}

const HELP: &str = "Commands: 'show log' prints recent log lines, 'quit' exits.";

/// Line-based chat loop. Reads prompts from `input` until EOF or `quit`.
pub async fn run_chat<R, W>(
    assistant: &Assistant,
    logs: &LogBuffer,
    options: &ChatOptions,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(format!("{}\n> ", HELP).as_bytes()).await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "quit" | "exit" => break,
            "help" => output.write_all(format!("{}\n", HELP).as_bytes()).await?,
            "show log" => {
                for entry in logs.recent(20) {
                    let text = format!(
                        "{} {:>5} {}: {}\n",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.level,
                        entry.target,
                        entry.message
                    );
                    output.write_all(text.as_bytes()).await?;
                }
            }
            prompt => {
                debug!(chars = prompt.len(), "Sending prompt");
                let turn = ChatTurn::new(prompt)
                    .with_user(options.user_id.as_str())
                    .with_session(options.session_id.as_str())
                    .with_speech(options.speak);

                let reply = match assistant.ask(turn).await {
                    Some(reply) => format!("AI: {}\n", reply),
                    None => "AI: Sorry, I could not generate a response.\n".to_string(),
                };
                output.write_all(reply.as_bytes()).await?;
            }
        }
        output.write_all(b"> ").await?;
        output.flush().await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
