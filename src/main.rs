//! trainforge · command-line driver
//!
//! Prints a generation plan as JSON:
//!
//!   trainforge <topic> [sections] [items] [course|scenario]
//!
//! Important env variables:
//!   COMPLETION_API_KEY      : enables remote generation if present
//!   COMPLETION_BASE_URL     : default "https://router.huggingface.co/v1"
//!   COMPLETION_MODEL        : default "meta-llama/Llama-3.1-8B-Instruct"
//!   COMPLETION_TIMEOUT_SECS : default 90
//!   TRAINFORGE_CONFIG_PATH  : path to TOML config (prompts, vocabulary, threshold)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

use std::sync::Arc;

use tracing::{error, info};

use trainforge::{telemetry, ChatCompletionClient, ContentKind, Generator, GeneratorConfig, StructuralParams};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = GeneratorConfig::from_env();
  let client = match ChatCompletionClient::new(&cfg.remote) {
    Ok(c) => c,
    Err(e) => {
      error!(target: "trainforge", error = %e, "Failed to build completion client");
      return Err(e.into());
    }
  };
  if client.has_credential() {
    info!(target: "trainforge", base_url = %cfg.remote.base_url, model = %cfg.remote.model, "Remote generation enabled.");
  } else {
    info!(target: "trainforge", "Remote generation disabled (no COMPLETION_API_KEY). Using local synthesis.");
  }

  let mut args = std::env::args().skip(1);
  let topic = args.next().unwrap_or_default();
  let defaults = StructuralParams::default();
  let sections = args.next().and_then(|s| s.parse().ok()).unwrap_or(defaults.sections);
  let items = args.next().and_then(|s| s.parse().ok()).unwrap_or(defaults.items_per_section);
  let kind = match args.next().as_deref() {
    Some("scenario") => ContentKind::Scenario,
    _ => ContentKind::Course,
  };

  let generator = Generator::new(cfg, Arc::new(client));
  let plan = generator.plan(kind, &topic, StructuralParams::new(sections, items)).await;
  println!("{}", serde_json::to_string_pretty(&plan)?);
  Ok(())
}
