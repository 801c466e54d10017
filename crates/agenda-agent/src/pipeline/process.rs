//! One agenda run, start to finish.
//!
//! build prompt → stream the agent run (bounded by the configured timeout)
//! → collect agenda text → format → post, or skip posting when the
//! destination isn't configured.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use agenda_core::{AgendaConfig, AgendaError, Result};

use crate::connection::all_credentials;
use crate::prompt::AgendaPrompt;
use crate::provider::{AgentRequest, AgentRunner};
use crate::stream::StreamEvent;
use crate::tools::capture::CaptureAgendaTool;
use crate::tools::{to_definitions, Tool};

use super::collect::{format_agenda, AgendaCollector};
use super::context::ChannelPoster;

/// Run parameters as given on the command line.
#[derive(Debug, Clone)]
pub struct AgendaParams {
    pub time_frame: String,
    pub location: String,
}

/// How a run that produced an agenda ended.
#[derive(Debug)]
pub enum RunOutcome {
    Posted {
        channel_id: String,
        message_ids: Vec<String>,
        agenda: String,
    },
    /// Agenda generated, but no credential or destination to post it with.
    PostSkipped { reason: AgendaError, agenda: String },
}

impl RunOutcome {
    pub fn agenda(&self) -> &str {
        match self {
            RunOutcome::Posted { agenda, .. } | RunOutcome::PostSkipped { agenda, .. } => agenda,
        }
    }
}

/// Build the agent request for this run.
pub fn build_request(config: &AgendaConfig, params: &AgendaParams) -> AgentRequest {
    let prompt = AgendaPrompt {
        time_frame: &params.time_frame,
        location: &params.location,
        server_name: &config.discord.server_name,
        guild_id: config.discord.guild_id(),
        include_x: config.x.bearer_token().is_some(),
    };
    let tools: Vec<Box<dyn Tool>> = vec![Box::new(CaptureAgendaTool)];

    AgentRequest {
        input: prompt.render(),
        models: config.dedalus.models.clone(),
        mcp_servers: config.dedalus.mcp_servers.clone(),
        credentials: all_credentials(config),
        tools: to_definitions(&tools),
        stream: true,
    }
}

/// Run the full pipeline once.
///
/// `on_text` sees every text fragment as it streams in (the binary echoes
/// them to stdout).
pub async fn run_agenda<F>(
    runner: &dyn AgentRunner,
    poster: &dyn ChannelPoster,
    config: &AgendaConfig,
    params: &AgendaParams,
    mut on_text: F,
) -> Result<RunOutcome>
where
    F: FnMut(&str),
{
    let req = build_request(config, params);
    info!(
        runner = runner.name(),
        time_frame = %params.time_frame,
        location = %params.location,
        models = ?req.models,
        credentials = req.credentials.len(),
        "starting agenda run"
    );

    let secs = config.dedalus.timeout_secs;
    let mut collector = AgendaCollector::new();
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);

    let streaming = async {
        let consume = async {
            while let Some(event) = rx.recv().await {
                if let StreamEvent::TextDelta { text } = &event {
                    on_text(text);
                }
                collector.observe(&event);
            }
        };
        let (res, ()) = tokio::join!(runner.run_stream(&req, tx), consume);
        res
    };

    match tokio::time::timeout(Duration::from_secs(secs), streaming).await {
        Err(_) => return Err(AgendaError::Timeout { secs }),
        Ok(Err(e)) => return Err(AgendaError::Agent(e.to_string())),
        Ok(Ok(())) => {}
    }

    if let Some(model) = collector.model() {
        info!(model, "agent run complete");
    }
    let agenda = format_agenda(&collector.finish()?, &chrono::Local::now());

    let Some(token) = config.discord.token() else {
        warn!("no DISCORD_TOKEN, skipping post");
        return Ok(RunOutcome::PostSkipped {
            reason: AgendaError::ConfigurationMissing {
                key: "DISCORD_TOKEN".to_string(),
            },
            agenda,
        });
    };
    let Some(channel_id) = config.discord.post_channel_id() else {
        warn!("no DISCORD_POST_CHANNEL_ID, skipping post");
        return Ok(RunOutcome::PostSkipped {
            reason: AgendaError::ConfigurationMissing {
                key: "DISCORD_POST_CHANNEL_ID".to_string(),
            },
            agenda,
        });
    };

    let message_ids = poster.post(channel_id, &agenda, token).await?;
    info!(
        channel = poster.name(),
        channel_id,
        messages = message_ids.len(),
        "agenda posted"
    );

    Ok(RunOutcome::Posted {
        channel_id: channel_id.to_string(),
        message_ids,
        agenda,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::provider::RunnerError;

    struct ScriptedRunner {
        events: Vec<StreamEvent>,
        seen: Mutex<Option<AgentRequest>>,
    }

    impl ScriptedRunner {
        fn new(events: Vec<StreamEvent>) -> Self {
            Self {
                events,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run_stream(
            &self,
            req: &AgentRequest,
            tx: mpsc::Sender<StreamEvent>,
        ) -> std::result::Result<(), RunnerError> {
            *self.seen.lock().unwrap() = Some(req.clone());
            for event in self.events.clone() {
                let _ = tx.send(event).await;
            }
            Ok(())
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl AgentRunner for FailingRunner {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run_stream(
            &self,
            _req: &AgentRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> std::result::Result<(), RunnerError> {
            Err(RunnerError::Api {
                status: 503,
                message: "no capacity".to_string(),
            })
        }
    }

    struct StalledRunner;

    #[async_trait]
    impl AgentRunner for StalledRunner {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn run_stream(
            &self,
            _req: &AgentRequest,
            _tx: mpsc::Sender<StreamEvent>,
        ) -> std::result::Result<(), RunnerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        calls: Mutex<Vec<(String, String, String)>>,
        reject_with: Option<u16>,
    }

    #[async_trait]
    impl ChannelPoster for RecordingPoster {
        fn name(&self) -> &str {
            "recording"
        }

        async fn post(&self, channel_id: &str, content: &str, token: &str) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push((
                channel_id.to_string(),
                content.to_string(),
                token.to_string(),
            ));
            match self.reject_with {
                Some(status) => Err(AgendaError::PostEndpoint {
                    status,
                    body: "denied".to_string(),
                }),
                None => Ok(vec!["m1".to_string()]),
            }
        }
    }

    fn params() -> AgendaParams {
        AgendaParams {
            time_frame: "next week".to_string(),
            location: "Berlin".to_string(),
        }
    }

    fn configured() -> AgendaConfig {
        let mut cfg = AgendaConfig::default();
        cfg.discord.token = Some("bot-token".to_string());
        cfg.discord.post_channel_id = Some("555".to_string());
        cfg
    }

    fn text(t: &str) -> StreamEvent {
        StreamEvent::TextDelta {
            text: t.to_string(),
        }
    }

    fn capture(agenda: &str) -> StreamEvent {
        StreamEvent::ToolUse {
            id: "call_1".to_string(),
            name: "capture_agenda".to_string(),
            input: json!({ "agenda_text": agenda }),
        }
    }

    #[tokio::test]
    async fn empty_stream_fails_without_posting() {
        let runner = ScriptedRunner::new(Vec::new());
        let poster = RecordingPoster::default();

        let err = run_agenda(&runner, &poster, &configured(), &params(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AgendaError::AgentProducedNoAgenda));
        assert!(poster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn capture_overrides_text_in_posted_agenda() {
        let runner = ScriptedRunner::new(vec![
            text("Searching Discord..."),
            capture("**Berlin Rust Meetup**\nTime & Location: Tue, c-base"),
            text("Agenda captured."),
        ]);
        let poster = RecordingPoster::default();
        let mut echoed = String::new();

        let outcome = run_agenda(&runner, &poster, &configured(), &params(), |t| {
            echoed.push_str(t)
        })
        .await
        .unwrap();

        assert_eq!(echoed, "Searching Discord...Agenda captured.");
        let calls = poster.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (channel, content, token) = &calls[0];
        assert_eq!(channel, "555");
        assert_eq!(token, "bot-token");
        assert!(content.starts_with("\u{1f4c5} **EVENT AGENDA**\n\n**Berlin Rust Meetup**"));
        assert!(!content.contains("Searching Discord"));
        assert!(content.contains("\n\n---\n*Generated "));

        match outcome {
            RunOutcome::Posted { message_ids, .. } => assert_eq!(message_ids, vec!["m1"]),
            other => panic!("expected Posted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn accumulated_text_posted_without_capture() {
        let runner = ScriptedRunner::new(vec![text("**A**\n"), text("**B**")]);
        let poster = RecordingPoster::default();

        let outcome = run_agenda(&runner, &poster, &configured(), &params(), |_| {})
            .await
            .unwrap();
        assert!(outcome.agenda().contains("**A**\n**B**"));
    }

    #[tokio::test]
    async fn missing_token_skips_post() {
        let runner = ScriptedRunner::new(vec![capture("agenda")]);
        let poster = RecordingPoster::default();
        let mut cfg = configured();
        cfg.discord.token = None;

        let outcome = run_agenda(&runner, &poster, &cfg, &params(), |_| {})
            .await
            .unwrap();
        match outcome {
            RunOutcome::PostSkipped { reason, agenda } => {
                assert!(matches!(reason, AgendaError::ConfigurationMissing { ref key } if key == "DISCORD_TOKEN"));
                assert!(agenda.contains("agenda"));
            }
            other => panic!("expected PostSkipped, got {other:?}"),
        }
        assert!(poster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_channel_skips_post() {
        let runner = ScriptedRunner::new(vec![capture("agenda")]);
        let poster = RecordingPoster::default();
        let mut cfg = configured();
        cfg.discord.post_channel_id = Some("  ".to_string());

        let outcome = run_agenda(&runner, &poster, &cfg, &params(), |_| {})
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::PostSkipped { .. }));
        assert!(poster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_rejection_fails_run() {
        let runner = ScriptedRunner::new(vec![capture("agenda")]);
        let poster = RecordingPoster {
            reject_with: Some(403),
            ..RecordingPoster::default()
        };

        let err = run_agenda(&runner, &poster, &configured(), &params(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AgendaError::PostEndpoint { status: 403, .. }));
    }

    #[tokio::test]
    async fn runner_failure_fails_run() {
        let poster = RecordingPoster::default();
        let err = run_agenda(&FailingRunner, &poster, &configured(), &params(), |_| {})
            .await
            .unwrap_err();
        match err {
            AgendaError::Agent(msg) => assert!(msg.contains("503")),
            other => panic!("expected Agent error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_run_times_out() {
        let poster = RecordingPoster::default();
        let mut cfg = configured();
        cfg.dedalus.timeout_secs = 0;

        let err = run_agenda(&StalledRunner, &poster, &cfg, &params(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AgendaError::Timeout { secs: 0 }));
    }

    #[tokio::test]
    async fn request_carries_run_configuration() {
        let runner = ScriptedRunner::new(vec![capture("agenda")]);
        let poster = RecordingPoster::default();
        let mut cfg = configured();
        cfg.x.bearer_token = Some("x".to_string());

        run_agenda(&runner, &poster, &cfg, &params(), |_| {})
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap().clone().unwrap();
        assert!(seen.stream);
        assert_eq!(seen.models, cfg.dedalus.models);
        assert_eq!(seen.mcp_servers, cfg.dedalus.mcp_servers);
        assert_eq!(seen.credentials.len(), 2);
        assert_eq!(seen.tools.len(), 1);
        assert_eq!(seen.tools[0].name, "capture_agenda");
        assert!(seen.input.contains("Time frame: next week | Location: Berlin"));
        assert!(seen.input.contains("X/Twitter"));
    }
}
