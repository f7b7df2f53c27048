//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,generation=debug,attempt=debug,reqwest=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets in use: `trainforge` (startup, store), `generation` (remote calls and
//! fallbacks), `attempt` (scoring and stats).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,trainforge=debug,generation=debug,attempt=debug";

pub fn init_tracing() {
  let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true)
    // stdout carries the JSON result of the CLI driver.
    .with_writer(std::io::stderr);

  match std::env::var("LOG_FORMAT").as_deref() {
    Ok("json") => {
      builder.json().init();
    }
    _ => {
      builder.init();
    }
  }
}
