//! Settlement Journal — JSONL Audit Log
//!
//! Append-only record of committed settlements. Each line is a
//! self-contained JSON document, easy to stream, grep, and recover
//! from partial writes. The engine itself never writes here; the
//! caller journals after a successful apply.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::market::{AnswerId, MarketId};
use crate::usecases::trading::Settlement;

/// One committed settlement, flattened for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub market_id: MarketId,
    pub answer_id: Option<AnswerId>,
    /// "BUY" or "SELL".
    pub side: String,
    /// "YES" or "NO".
    pub outcome: String,
    pub shares: Decimal,
    pub net_value: Decimal,
    pub fees_total: Decimal,
    pub prob_before: Decimal,
    pub prob_after: Decimal,
    pub limit_fills: usize,
    pub timestamp: DateTime<Utc>,
}

impl SettlementRecord {
    /// Flatten a committed settlement for journaling.
    pub fn from_settlement(
        market_id: impl Into<MarketId>,
        side: &str,
        outcome: &str,
        settlement: &Settlement,
    ) -> Self {
        let (answer_id, result, fees_total) = match settlement {
            Settlement::Binary(r) => (None, r, r.fees.total()),
            Settlement::Multi(r) => {
                (Some(r.answer_id.clone()), &r.primary, r.total_fees.total())
            }
        };
        Self {
            id: Uuid::new_v4(),
            market_id: market_id.into(),
            answer_id,
            side: side.to_string(),
            outcome: outcome.to_string(),
            shares: result.shares,
            net_value: result.net_value,
            fees_total,
            prob_before: result.initial_prob,
            prob_after: result.result_prob,
            limit_fills: result.fills.len(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only JSONL journal.
pub struct SettlementJournal {
    path: PathBuf,
}

impl SettlementJournal {
    /// Open (creating parent directories as needed) a journal at
    /// `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create journal dir {}", parent.display())
                })?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn append(&self, record: &SettlementRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .context("Failed to serialize settlement record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| {
                format!("Failed to open journal {}", self.path.display())
            })?;
        writeln!(file, "{line}").with_context(|| {
            format!("Failed to append to journal {}", self.path.display())
        })?;
        Ok(())
    }

    /// Load every record. Corrupt lines (e.g. a torn final write) are
    /// skipped rather than failing the whole load.
    pub fn load_all(&self) -> Result<Vec<SettlementRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read journal {}", self.path.display())
        })?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
