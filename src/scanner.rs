//! Barcode scan filter.
//!
//! The serial reader hands over whatever it decoded.  This filter trims
//! it, rejects strings that cannot be a retail barcode, and drops
//! repeats of the same code inside the cooldown window (readers fire
//! several times while a bottle is held in front of them).

use chrono::{DateTime, Utc};
use log::debug;

use crate::config::CabinetConfig;

pub struct ScanFilter {
    min_len: usize,
    max_len: usize,
    cooldown_ms: i64,
    last: Option<(String, DateTime<Utc>)>,
}

impl ScanFilter {
    pub fn new(config: &CabinetConfig) -> Self {
        Self {
            min_len: config.barcode_min_len,
            max_len: config.barcode_max_len,
            cooldown_ms: i64::try_from(config.scan_cooldown_ms).unwrap_or(i64::MAX),
            last: None,
        }
    }

    /// 8–20 ASCII alphanumerics (bounds from config).
    pub fn is_valid(&self, code: &str) -> bool {
        (self.min_len..=self.max_len).contains(&code.len())
            && code.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Returns the cleaned barcode when the scan should be acted on.
    pub fn accept(&mut self, raw: &str, now: DateTime<Utc>) -> Option<String> {
        let code = raw.trim();
        if !self.is_valid(code) {
            debug!("Scanner: rejected {:?}", raw);
            return None;
        }
        if let Some((prev, at)) = &self.last {
            if prev == code && (now - *at).num_milliseconds() <= self.cooldown_ms {
                debug!("Scanner: duplicate {} inside cooldown", code);
                return None;
            }
        }
        self.last = Some((code.to_owned(), now));
        Some(code.to_owned())
    }

    /// Forget the last scan so the same code is accepted immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
