use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, warn};

use agenda_agent::connection::check_discord_credentials;
use agenda_agent::tools::capture::CaptureAgendaTool;
use agenda_agent::tools::Tool;
use agenda_agent::{run_agenda, DedalusRunner, RunOutcome};
use agenda_core::{AgendaConfig, AgendaError};
use agenda_discord::DiscordPoster;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so figment sees its values
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agenda=info,agenda_agent=info,agenda_discord=info".into()),
        )
        .init();

    let cli = args::Cli::parse();

    // config: --config > AGENDA_CONFIG env > ~/.agenda/agenda.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("AGENDA_CONFIG").ok());
    let config = AgendaConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        AgendaConfig::default()
    });

    check_discord_credentials(&config.discord);

    println!("Discord Agenda Agent\n{}", "=".repeat(50));
    let params = cli.resolve_params()?;

    let api_key = config
        .dedalus
        .api_key()
        .ok_or_else(|| AgendaError::Config("DEDALUS_API_KEY is not set".to_string()))?;
    let tools: Vec<Box<dyn Tool>> = vec![Box::new(CaptureAgendaTool)];
    let runner = DedalusRunner::new(
        api_key.to_string(),
        config.dedalus.base_url.clone(),
        Duration::from_secs(config.dedalus.timeout_secs),
    )?
    .with_tools(tools);
    let poster = DiscordPoster::new(config.discord.api_base.clone())?;

    println!("\nCollecting events...\n");

    let mut stdout = std::io::stdout();
    let outcome =
        run_agenda(&runner, &poster, &config, &params, |text| echo(&mut stdout, text)).await;
    println!();

    match outcome {
        Ok(RunOutcome::Posted {
            channel_id,
            message_ids,
            ..
        }) => {
            println!("\u{2705} Posted to Discord channel {channel_id}: {message_ids:?}");
            Ok(())
        }
        Ok(RunOutcome::PostSkipped { reason, agenda }) => {
            println!("{agenda}\n");
            println!("\u{26a0}\u{fe0f} {reason}, skipping post.");
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), "agenda run failed: {e}");
            Err(e.into())
        }
    }
}

/// Live echo of agent text. A closed stdout must not abort the run.
fn echo<W: Write>(out: &mut W, text: &str) {
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        debug!(error = %e, "stdout echo failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe {
        attempts: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn echo_writes_text() {
        let mut out = Vec::new();
        echo(&mut out, "Looking ");
        echo(&mut out, "around...");
        assert_eq!(String::from_utf8(out).unwrap(), "Looking around...");
    }

    #[test]
    fn echo_survives_write_errors() {
        let mut out = BrokenPipe { attempts: 0 };
        echo(&mut out, "a");
        echo(&mut out, "b");
        assert_eq!(out.attempts, 2);
    }
}
