//! CPMM Settlement Engine — Demo Entry Point
//!
//! A small settlement console for exercising the engine against a
//! market snapshot exported as JSON. Quotes are read-only; commits
//! mutate the in-memory store and append to the settlement journal.
//!
//! Wiring sequence:
//! 1. Load config.toml (optional) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Seed InMemoryStore from the snapshot file
//! 4. Build TradeService over the three ports
//! 5. Run the requested quote/commit and print the settlement

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use cpmm_settlement_engine::adapters::persistence::journal::{
    SettlementJournal, SettlementRecord,
};
use cpmm_settlement_engine::adapters::persistence::memory::InMemoryStore;
use cpmm_settlement_engine::config::{loader, EngineConfig};
use cpmm_settlement_engine::domain::market::{LimitBet, Outcome, UserId};
use cpmm_settlement_engine::ports::repository::{
    MarketRepository, MarketSnapshot,
};
use cpmm_settlement_engine::usecases::TradeService;

const USAGE: &str = "\
Usage: cpmm-settlement-engine <command> <snapshot.json> <size> <yes|no> [answer_id]

Commands:
  quote-sell   Preview selling <size> shares
  commit-sell  Sell <size> shares and persist the settlement
  quote-buy    Preview spending <size> cash
  commit-buy   Spend <size> cash and persist the settlement

The snapshot file holds a market snapshot plus optional resting bets
and maker balances. Multi-outcome markets require [answer_id].";

/// Exported market state the demo replays into the store.
#[derive(Debug, Deserialize)]
struct DemoSnapshot {
    market: MarketSnapshot,
    #[serde(default)]
    bets: Vec<LimitBet>,
    #[serde(default)]
    balances: HashMap<UserId, Decimal>,
}

fn main() -> Result<()> {
    // ── 1. Load configuration (optional config.toml) ────────
    let config = if Path::new("config.toml").exists() {
        loader::load_config("config.toml")
            .context("Failed to load configuration")?
    } else {
        EngineConfig::default()
    };

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.log_level)
                }),
        )
        .json()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }
    let command = args[1].as_str();
    let snapshot_path = args[2].as_str();
    let size: Decimal = args[3]
        .parse()
        .with_context(|| format!("Invalid size '{}'", args[3]))?;
    let outcome = match args[4].to_ascii_lowercase().as_str() {
        "yes" => Outcome::Yes,
        "no" => Outcome::No,
        other => bail!("Invalid outcome '{other}', expected yes or no"),
    };
    let answer_id = args.get(5).map(String::as_str);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command,
        snapshot = snapshot_path,
        "Starting settlement console"
    );

    // ── 3. Seed the in-memory store from the snapshot ───────
    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("Failed to read snapshot {snapshot_path}"))?;
    let demo: DemoSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {snapshot_path}"))?;
    let market_id = demo.market.market_id.clone();

    let store = InMemoryStore::new();
    store.insert_snapshot(demo.market, demo.bets);
    for (user, balance) in demo.balances {
        store.set_balance(user, balance);
    }

    // ── 4. Wire the trade service over the store ────────────
    let service = TradeService::new(&store, &store, &store, &config);

    // ── 5. Run the requested operation ──────────────────────
    let (settlement, committed, side) = match command {
        "quote-sell" => {
            (service.quote_sell(&market_id, answer_id, size, outcome)?, false, "SELL")
        }
        "commit-sell" => {
            (service.commit_sell(&market_id, answer_id, size, outcome)?, true, "SELL")
        }
        "quote-buy" => {
            (service.quote_buy(&market_id, answer_id, size, outcome)?, false, "BUY")
        }
        "commit-buy" => {
            (service.commit_buy(&market_id, answer_id, size, outcome)?, true, "BUY")
        }
        other => bail!("Unknown command '{other}'\n{USAGE}"),
    };

    println!("{}", serde_json::to_string_pretty(&settlement)?);

    if committed {
        let journal = SettlementJournal::new("data/settlements.jsonl")?;
        journal.append(&SettlementRecord::from_settlement(
            &market_id,
            side,
            &outcome.to_string(),
            &settlement,
        ))?;
        let after = store.load_market(&market_id)?;
        println!("{}", serde_json::to_string_pretty(&after)?);
        info!(
            market_id,
            version = after.version,
            journal = %journal.path().display(),
            "Settlement committed"
        );
    }

    Ok(())
}
