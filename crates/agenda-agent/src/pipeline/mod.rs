//! Agenda pipeline — prompt → agent stream → agenda text → channel post.
//!
//! Channel crates implement [`ChannelPoster`]; the binary wires a concrete
//! runner and poster into [`run_agenda`].

pub mod collect;
pub mod context;
pub mod process;

pub use collect::{format_agenda, AgendaCollector};
pub use context::ChannelPoster;
pub use process::{run_agenda, AgendaParams, RunOutcome};
