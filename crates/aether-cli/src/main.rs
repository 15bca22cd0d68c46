//! Terminal chat client: streams one reply from the Aether backend.

use std::io::Write as _;
use std::process::ExitCode;

use aether_stream::observability::ObservabilityConfig;
use aether_stream::prelude::*;
use aether_stream::{HttpTransport, init_observability_with};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aether-chat", about = "Stream a reply from the Aether chat backend")]
struct Cli {
    /// Backend origin; overrides `AETHER_API_URL`.
    #[arg(long)]
    url: Option<String>,

    /// Log filter directive, for example `debug`; overrides `AETHER_LOG_LEVEL`.
    #[arg(long)]
    log_level: Option<String>,

    /// Per-chunk read timeout in seconds, `0` to wait forever.
    #[arg(long)]
    read_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a prompt and print the reply as it streams in.
    Chat {
        /// Optional system prompt sent before the user message.
        #[arg(long)]
        system: Option<String>,

        /// Prompt to send.
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Print the backend health status.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut observability = ObservabilityConfig::from_env();
    if let Some(level) = &cli.log_level {
        observability = observability.filter(level.clone());
    }
    init_observability_with(observability);

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.url {
        config = config.base_url(url.clone());
    }
    if let Some(secs) = cli.read_timeout {
        config = config.read_timeout((secs > 0).then(|| std::time::Duration::from_secs(secs)));
    }

    match cli.command {
        Command::Chat { system, prompt } => chat(config, system, prompt.join(" ")).await,
        Command::Health => health(config).await,
    }
}

async fn health(config: ClientConfig) -> anyhow::Result<ExitCode> {
    let status = HttpTransport::new(config)?.health().await?;
    println!(
        "status={} openai_configured={} timestamp={}",
        status.status, status.openai_configured, status.timestamp
    );
    Ok(if status.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn chat(config: ClientConfig, system: Option<String>, prompt: String) -> anyhow::Result<ExitCode> {
    let mut request = ChatRequest::new();
    if let Some(system) = system {
        request = request.system(system);
    }
    let request = request.user(prompt);

    let client = ChatClient::from_config(config)?;
    let mut stream = client.stream(request)?;

    let abort = stream.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, aborting stream");
            abort.abort();
        }
    });

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next_event().await {
        match event {
            ChatEvent::Started { message_id } => {
                tracing::debug!(message_id = %message_id, "assistant message started");
            }
            ChatEvent::Delta { text, .. } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            ChatEvent::Completed { .. } => {
                writeln!(stdout)?;
                return Ok(ExitCode::SUCCESS);
            }
            ChatEvent::Failed { message, .. } => {
                // Deltas are already on screen; print only the error indicator.
                let rendered = message.rendered();
                let indicator = rendered.strip_prefix(message.content()).unwrap_or(&rendered);
                writeln!(stdout, "{indicator}")?;
                return Ok(ExitCode::FAILURE);
            }
            ChatEvent::Cancelled { .. } => {
                writeln!(stdout)?;
                eprintln!("cancelled");
                return Ok(ExitCode::from(130));
            }
        }
    }
    anyhow::bail!("stream closed without a terminal event")
}
