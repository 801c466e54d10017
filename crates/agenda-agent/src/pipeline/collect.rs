use chrono::{DateTime, TimeZone};
use tracing::{info, warn};

use agenda_core::{AgendaError, Result};

use crate::stream::StreamEvent;
use crate::tools::capture::{extract_agenda, CAPTURE_TOOL};

/// Folds a run's stream into the agenda text.
///
/// Text deltas accumulate; a `capture_agenda` call, when one arrives, wins
/// over anything accumulated. A later capture replaces an earlier one.
#[derive(Debug, Default)]
pub struct AgendaCollector {
    accumulated: String,
    captured: Option<String>,
    last_error: Option<String>,
    model: Option<String>,
}

impl AgendaCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { text } => self.accumulated.push_str(text),
            StreamEvent::ToolUse { name, input, .. } if name == CAPTURE_TOOL => {
                match extract_agenda(input) {
                    Some(agenda) => {
                        info!(len = agenda.chars().count(), "captured agenda");
                        self.captured = Some(agenda);
                    }
                    None => warn!("capture_agenda called without usable agenda_text"),
                }
            }
            StreamEvent::ToolUse { .. } => {}
            StreamEvent::Done { model, .. } => {
                if !model.is_empty() {
                    self.model = Some(model.clone());
                }
            }
            StreamEvent::Error { message } => {
                warn!(error = %message, "agent stream error");
                self.last_error = Some(message.clone());
            }
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Final agenda text, or why there is none.
    pub fn finish(self) -> Result<String> {
        if let Some(captured) = self.captured {
            return Ok(captured);
        }
        if !self.accumulated.trim().is_empty() {
            return Ok(self.accumulated);
        }
        match self.last_error {
            Some(message) => Err(AgendaError::Agent(message)),
            None => Err(AgendaError::AgentProducedNoAgenda),
        }
    }
}

/// Header, agenda body, separator and generation timestamp.
pub fn format_agenda<Tz>(agenda: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "\u{1f4c5} **EVENT AGENDA**\n\n{}\n\n---\n*Generated {}*",
        agenda,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}
