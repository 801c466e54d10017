pub mod connection;
pub mod dedalus;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod stream;
pub mod tools;

pub use dedalus::DedalusRunner;
pub use pipeline::{run_agenda, AgendaParams, ChannelPoster, RunOutcome};
pub use provider::{AgentRequest, AgentRunner, RunnerError};
