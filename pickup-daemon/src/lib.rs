//! Daemon runtime: fixed-interval ticker + socket server, and the wiring that
//! turns config and environment secrets into a [`pickup_sync::Reconciler`].

pub mod engine;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use engine::{build_engine, build_engine_with, Engine, TARGET_TOKEN_ENV};
pub use error::DaemonError;
pub use protocol::{
    request_authorize, request_inspect, request_run, request_status, request_stop, send_request,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking};
