//! Wine catalog lookup.
//!
//! A static, read-only table mapping barcodes to wine metadata.  The
//! coordinator only needs two things from it: a display name for scans
//! and the normalised [`WineType`] that steers allocation.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::cabinet::WineType;

/// One catalog entry.  `wine_type` is free text as entered by whoever
/// maintains the catalog ("Tinto", "Rosé", "Crianza", ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WineInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub wine_type: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub vintage: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    wines: HashMap<String, WineInfo>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Read a `{ "wines": { barcode: { name, type, ... } } }` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let catalog = Self::from_json_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        log::info!("Catalog: {} wine(s) from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn insert(&mut self, barcode: impl Into<String>, info: WineInfo) {
        self.wines.insert(barcode.into(), info);
    }

    pub fn lookup(&self, barcode: &str) -> Option<&WineInfo> {
        self.wines.get(barcode)
    }

    /// Normalised type, `Unknown` for uncatalogued barcodes.
    pub fn wine_type(&self, barcode: &str) -> WineType {
        self.lookup(barcode)
            .map_or(WineType::Unknown, |w| WineType::from_label(&w.wine_type))
    }

    pub fn len(&self) -> usize {
        self.wines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wines.is_empty()
    }
}
