//! Cabinet configuration parameters
//!
//! All tunable parameters for the coordinator.  Values are loaded from a
//! JSON file at startup; any field missing from the file falls back to
//! its default.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::cabinet::{DrawerId, MAX_SLOTS_PER_DRAWER, SlotIndex, WineType};

/// Core cabinet configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CabinetConfig {
    // --- Bus ---
    /// Topic prefix, e.g. `winefridge` → `winefridge/system/command`
    pub topic_prefix: String,

    // --- Layout ---
    /// Drawers fitted with weight sensors, in allocation priority order
    pub functional_drawers: Vec<DrawerId>,
    /// Preferred drawer per wine type
    pub wine_type_drawers: BTreeMap<WineType, DrawerId>,
    /// Slots per drawer (1-based indices `1..=slots_per_drawer`)
    pub slots_per_drawer: SlotIndex,

    // --- Fill thresholds ---
    /// Weight (g) below which a bottle reads 0 %
    pub empty_weight_g: f32,
    /// Weight (g) at or above which a bottle reads 100 %
    pub full_weight_g: f32,

    // --- Timing ---
    /// Load/unload window before an armed operation times out (ms)
    pub operation_timeout_ms: u64,
    /// Whole-session window for a swap (ms)
    pub swap_timeout_ms: u64,

    // --- Barcode scanner ---
    pub barcode_min_len: usize,
    pub barcode_max_len: usize,
    /// Repeat scans of the same code inside this window are dropped (ms)
    pub scan_cooldown_ms: u64,
}

impl Default for CabinetConfig {
    fn default() -> Self {
        let mut wine_type_drawers = BTreeMap::new();
        wine_type_drawers.insert(WineType::Rose, DrawerId::from("drawer_3"));
        wine_type_drawers.insert(WineType::White, DrawerId::from("drawer_5"));
        wine_type_drawers.insert(WineType::Red, DrawerId::from("drawer_7"));

        Self {
            topic_prefix: "winefridge".into(),

            functional_drawers: vec!["drawer_3".into(), "drawer_5".into(), "drawer_7".into()],
            wine_type_drawers,
            slots_per_drawer: 9,

            empty_weight_g: 300.0,
            full_weight_g: 700.0,

            operation_timeout_ms: 60_000,
            swap_timeout_ms: 60_000,

            barcode_min_len: 8,
            barcode_max_len: 20,
            scan_cooldown_ms: 2_000,
        }
    }
}

impl CabinetConfig {
    /// Whether `drawer` carries weight sensors.
    pub fn is_functional(&self, drawer: &DrawerId) -> bool {
        self.functional_drawers.contains(drawer)
    }

    /// Whether `slot` is a valid 1-based index for this cabinet.
    pub fn is_valid_slot(&self, slot: SlotIndex) -> bool {
        slot >= 1 && slot <= self.slots_per_drawer
    }

    /// Preferred drawer for a wine type, if one is mapped.
    pub fn preferred_drawer(&self, wine_type: WineType) -> Option<&DrawerId> {
        self.wine_type_drawers.get(&wine_type)
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_prefix.is_empty() || self.topic_prefix.contains(['+', '#']) {
            return Err(ConfigError::ValidationFailed(
                "topic_prefix must be non-empty and free of wildcards",
            ));
        }
        if self.functional_drawers.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "functional_drawers must name at least one drawer",
            ));
        }
        if self.slots_per_drawer == 0 || self.slots_per_drawer as usize > MAX_SLOTS_PER_DRAWER {
            return Err(ConfigError::ValidationFailed("slots_per_drawer must be 1–16"));
        }
        if !(self.empty_weight_g >= 0.0 && self.full_weight_g > self.empty_weight_g) {
            return Err(ConfigError::ValidationFailed(
                "full_weight_g must exceed empty_weight_g >= 0",
            ));
        }
        if self.operation_timeout_ms == 0 || self.swap_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("timeouts must be non-zero"));
        }
        if self.barcode_min_len == 0 || self.barcode_min_len > self.barcode_max_len {
            return Err(ConfigError::ValidationFailed(
                "barcode length bounds must satisfy 0 < min <= max",
            ));
        }
        if self
            .wine_type_drawers
            .values()
            .any(|d| !self.functional_drawers.contains(d))
        {
            return Err(ConfigError::ValidationFailed(
                "wine_type_drawers must map onto functional drawers",
            ));
        }
        Ok(())
    }
}

/// Read and validate a JSON configuration file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<CabinetConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: CabinetConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    Ok(config)
}
