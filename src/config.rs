use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::layout::LayoutConfig;
use crate::physics::{ForceConfig, StabilizerConfig};

/// Tuning knobs. A partial JSON file overrides only the fields it names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub forces: ForceConfig,
    pub stabilizer: StabilizerConfig,
    pub layout: LayoutConfig,
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}
