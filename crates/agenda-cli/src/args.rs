use std::io::IsTerminal;

use clap::Parser;
use dialoguer::Input;

use agenda_agent::AgendaParams;

pub const DEFAULT_TIME_FRAME: &str = "next week";
pub const DEFAULT_LOCATION: &str = "general";

/// Collect tech events with a research agent and post the agenda to Discord.
#[derive(Debug, Parser)]
#[command(name = "agenda", version)]
pub struct Cli {
    /// Time frame to search, e.g. "next week"
    pub time_frame: Option<String>,

    /// Location to search, e.g. "San Francisco"
    pub location: Option<String>,

    /// Config file (default: $AGENDA_CONFIG, then ~/.agenda/agenda.toml)
    #[arg(long)]
    pub config: Option<String>,
}

impl Cli {
    /// Both positionals given: use them as-is. Otherwise prompt for both,
    /// offering whatever was given (or the defaults) as the answer.
    pub fn resolve_params(&self) -> anyhow::Result<AgendaParams> {
        if let (Some(time_frame), Some(location)) = (&self.time_frame, &self.location) {
            println!("Time: {time_frame} | Location: {location}");
            return Ok(AgendaParams {
                time_frame: time_frame.clone(),
                location: location.clone(),
            });
        }

        let time_frame = or_default(self.time_frame.as_deref(), DEFAULT_TIME_FRAME);
        let location = or_default(self.location.as_deref(), DEFAULT_LOCATION);

        if !std::io::stdin().is_terminal() {
            tracing::info!(%time_frame, %location, "stdin is not a terminal, using defaults");
            return Ok(AgendaParams {
                time_frame,
                location,
            });
        }

        let time_frame: String = Input::new()
            .with_prompt("Time frame (e.g., 'next week')")
            .default(time_frame)
            .interact_text()?;
        let location: String = Input::new()
            .with_prompt("Location (e.g., 'San Francisco')")
            .default(location)
            .interact_text()?;

        Ok(AgendaParams {
            time_frame: or_default(Some(&time_frame), DEFAULT_TIME_FRAME),
            location: or_default(Some(&location), DEFAULT_LOCATION),
        })
    }
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}
