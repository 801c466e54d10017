//! Research brief handed to the agent.
//!
//! One fixed template; the run parameters are substituted into `{…}` slots.

const AGENT_PROMPT: &str = r#"You are a tech event research agent. Collect TECH EVENTS ONLY and compile into an agenda.

**Parameters:** Time frame: {time_frame} | Location: {location}

**Tech events include:** meetups, conferences, hackathons, workshops, AI/ML events, startup events, developer gatherings.
**Exclude:** music, art, sports, general social events.

**Tasks:**

1. **Discord** (discord-mcp):
   - {server_lookup} → list_channels(server_id) → read_messages(channel_id, limit=100)
   - Read from #events, #announcements, #social, #general channels
   - Filter for tech events in time frame. If no tech events found, note "No posted Discord tech community events"

2. **Web/Luma** (brave-search-mcp):
   - Search for tech Luma calendars and "{location} tech events/hackathons/conferences {time_frame}"
{x_task}
**Output format for EACH event:**
**Event Title**
Time & Location: [time and location]
Description: [1 line]
Registration: [link if available]
Source: [source]

**Rules:** Sort chronologically, remove duplicates.

**Final step:** Call `capture_agenda(agenda_text)` with the compiled agenda. Do NOT call send_message or post to Discord directly."#;

const X_TASK: &str = r#"
3. **X/Twitter** (x):
   - Search recent posts for "{location} tech event", "{location} hackathon" and "{location} meetup" in {time_frame}
   - Keep only posts announcing a concrete event with a date
"#;

/// Parameters for one agenda run.
#[derive(Debug, Clone)]
pub struct AgendaPrompt<'a> {
    pub time_frame: &'a str,
    pub location: &'a str,
    /// Discord server the agent should read from.
    pub server_name: &'a str,
    /// Skips the server search when known.
    pub guild_id: Option<&'a str>,
    /// Include the X/Twitter step (only useful when X credentials are bound).
    pub include_x: bool,
}

impl AgendaPrompt<'_> {
    pub fn render(&self) -> String {
        let server_lookup = match self.guild_id {
            Some(id) => format!("Use server_id {id} (\"{}\")", self.server_name),
            None => format!(
                "Call list_servers() → find \"{}\" server",
                self.server_name
            ),
        };
        let x_task = if self.include_x { X_TASK } else { "" };

        // x_task carries its own slots, so it goes in before the values
        let template = AGENT_PROMPT.replace("{x_task}", x_task);
        fill(
            &template,
            &[
                ("server_lookup", &server_lookup),
                ("time_frame", self.time_frame),
                ("location", self.location),
            ],
        )
    }
}

/// Substitute `{name}` slots in one pass. Inserted values are not scanned
/// again; unknown slots are kept as written.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgendaPrompt<'static> {
        AgendaPrompt {
            time_frame: "next week",
            location: "San Francisco",
            server_name: "Break In - Dec 2025",
            guild_id: None,
            include_x: false,
        }
    }

    #[test]
    fn parameters_substituted() {
        let p = base().render();
        assert!(p.contains("Time frame: next week | Location: San Francisco"));
        assert!(p.contains("\"San Francisco tech events/hackathons/conferences next week\""));
        assert!(p.contains("Call list_servers() → find \"Break In - Dec 2025\" server"));
        assert!(!p.contains("{time_frame}"));
        assert!(!p.contains("{location}"));
        assert!(!p.contains("X/Twitter"));
    }

    #[test]
    fn guild_id_skips_server_search() {
        let p = AgendaPrompt {
            guild_id: Some("123"),
            ..base()
        }
        .render();
        assert!(p.contains("Use server_id 123"));
        assert!(!p.contains("list_servers()"));
    }

    #[test]
    fn x_step_included_and_filled() {
        let p = AgendaPrompt {
            include_x: true,
            ..base()
        }
        .render();
        assert!(p.contains("**X/Twitter** (x)"));
        assert!(p.contains("\"San Francisco hackathon\""));
        assert!(!p.contains("{x_task}"));
    }

    #[test]
    fn braces_in_values_are_not_substituted() {
        let p = AgendaPrompt {
            time_frame: "the {location} week",
            location: "Berlin {time_frame}",
            include_x: true,
            ..base()
        }
        .render();
        assert!(p.contains("Time frame: the {location} week | Location: Berlin {time_frame}"));
        assert!(p.contains("\"Berlin {time_frame} hackathon\""));
    }

    #[test]
    fn unknown_slots_are_kept() {
        assert_eq!(fill("{a} {b} {", &[("a", "1")]), "1 {b} {");
    }

    #[test]
    fn ends_with_capture_instruction() {
        let p = base().render();
        assert!(p.ends_with("Do NOT call send_message or post to Discord directly."));
    }
}
