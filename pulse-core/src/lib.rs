//! Shared data model for the pulse toolkit
//!
//! This crate defines the scenario grammar the load engine executes, the
//! live event model carried on the bus, and the recorded-session artifact
//! the proxy writes on stop. All parsing here is deterministic and free of
//! I/O side effects beyond reading the input file.

pub mod error;
pub mod event;
pub mod scenario;
pub mod session;
pub mod steps;

pub use error::CoreError;
pub use event::{Event, EventSink};
pub use scenario::{
    emit_scenario_file, load_first_scenario, load_scenario_file, parse_scenario_file, Profile,
    Protocol, RequestSpec, Scenario, ScenarioFile,
};
pub use session::{RecordedRequest, SessionDocument, SessionRequest};
