//! Event and configuration files
//!
//! Events are read from JSON Lines: one `EventInput` object per line. Blank
//! lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use cadence_core::{EngineConfig, EventInput};

/// Parse a JSON Lines event file
pub fn load_events(path: &Path) -> anyhow::Result<Vec<EventInput>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: EventInput = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{}: malformed event", path.display(), index + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Configuration from an optional JSON file, then `CADENCE_*` overrides
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let base = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            serde_json::from_str::<EngineConfig>(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    Ok(base.with_env_overrides(|name| std::env::var(name).ok())?)
}
