//! Wallet Ledger
//!
//! Durable, in-memory-mirrored list of every wallet the daemon has derived.
//! The file is a JSON array of `WalletRecord`s in derivation order. It is an
//! audit trail and a rebalancing index: balances in it are advisory and are
//! always re-read on-chain before anything acts on them.
//!
//! Writes go to `<path>.tmp` first and are renamed into place, so a reader
//! never sees a half-written ledger.
//!
//! Created: 2026-10-19

use crate::chain::KeyDerivation;
use crate::error::{RotationError, RotationResult};
use crate::types::WalletRecord;
use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct WalletLedger {
    path: PathBuf,
    records: Vec<WalletRecord>,
}

impl WalletLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing file yields an empty ledger, and the empty array is written
    /// straight away so the file exists from the first run on.
    pub fn load<P: AsRef<Path>>(path: P) -> RotationResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!("No ledger at {}, starting empty", path.display());
            let ledger = Self {
                path,
                records: Vec::new(),
            };
            ledger.persist()?;
            return Ok(ledger);
        }

        let records = read_records(&path)?;
        debug!("Loaded {} wallet records from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    /// Open an existing ledger without creating it.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> RotationResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(RotationError::Ledger(format!("no ledger at {}", path.display())));
        }
        let records = read_records(&path)?;
        Ok(Self { path, records })
    }

    /// Copy the ledger at `live` to its `*.dry-run.json` sibling, replacing
    /// any earlier copy, and return the copy's path.
    ///
    /// A dry run then resumes from the live active wallet while every write
    /// lands in the copy. A missing live ledger gives an empty copy.
    pub fn dry_run_copy<P: AsRef<Path>>(live: P) -> RotationResult<PathBuf> {
        let live = live.as_ref();
        let records = if live.exists() {
            read_records(live)?
        } else {
            Vec::new()
        };
        let copy = Self {
            path: live.with_extension("dry-run.json"),
            records,
        };
        copy.persist()?;
        info!(
            "Dry-run ledger {} seeded with {} records",
            copy.path.display(),
            copy.records.len()
        );
        Ok(copy.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_address(&self, address: Address) -> Option<&WalletRecord> {
        self.records.iter().find(|r| r.address == address)
    }

    /// Replace the record with the same address, or append a new one.
    ///
    /// Stamps `updated_at`. Rejects a new address that reuses an existing
    /// derivation index.
    pub fn upsert(&mut self, mut record: WalletRecord) -> RotationResult<()> {
        record.updated_at = Some(Utc::now());

        if let Some(existing) = self.records.iter_mut().find(|r| r.address == record.address) {
            if existing.derivation_index != record.derivation_index {
                return Err(RotationError::Ledger(format!(
                    "{:?} is recorded at index {}, not {}",
                    record.address, existing.derivation_index, record.derivation_index
                )));
            }
            // Keep a hydrated key if the caller passed a bare record
            if record.secret.is_none() {
                record.secret = existing.secret.take();
            }
            *existing = record;
            return Ok(());
        }

        if let Some(clash) = self
            .records
            .iter()
            .find(|r| r.derivation_index == record.derivation_index)
        {
            return Err(RotationError::Ledger(format!(
                "index {} already belongs to {:?}",
                clash.derivation_index, clash.address
            )));
        }

        self.records.push(record);
        Ok(())
    }

    /// Rewrite the whole ledger atomically.
    pub fn persist(&self) -> RotationResult<()> {
        let json = serde_json::to_string_pretty(&self.records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &json)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!("Ledger persisted: {} records", self.records.len());
        Ok(())
    }

    /// Re-derive every record's key from the seed.
    ///
    /// Keys are never stored, so this runs once after `load`. A derived
    /// address that differs from the stored one means the seed does not
    /// belong to this ledger.
    pub fn hydrate(&mut self, keys: &dyn KeyDerivation, seed_phrase: &str) -> RotationResult<()> {
        for record in self.records.iter_mut().filter(|r| !r.has_secret()) {
            let derived = keys.derive(seed_phrase, record.derivation_index)?;
            if derived.address != record.address {
                return Err(RotationError::KeyDerivation(format!(
                    "index {} derives {:?} but the ledger has {:?}",
                    record.derivation_index, derived.address, record.address
                )));
            }
            record.secret = Some(derived.secret);
        }
        Ok(())
    }

    /// Record with the highest derivation index
    pub fn latest(&self) -> Option<&WalletRecord> {
        self.records.iter().max_by_key(|r| r.derivation_index)
    }

    /// Records that last showed a token position, in ledger order
    pub fn token_holders(&self) -> Vec<WalletRecord> {
        self.records
            .iter()
            .filter(|r| r.token_balance > Decimal::ZERO)
            .cloned()
            .collect()
    }

    /// Sum of recorded token balances (advisory, saturating)
    pub fn total_token_balance(&self) -> Decimal {
        self.records
            .iter()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.token_balance))
    }

    /// Sum of recorded coin balances (advisory, saturating)
    pub fn total_coin_balance(&self) -> Decimal {
        self.records
            .iter()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.coin_balance))
    }
}

fn read_records(path: &Path) -> RotationResult<Vec<WalletRecord>> {
    let json = std::fs::read_to_string(path)?;
    let records: Vec<WalletRecord> = if json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&json)?
    };
    check_unique(&records)?;
    Ok(records)
}

fn check_unique(records: &[WalletRecord]) -> RotationResult<()> {
    let mut addresses = HashSet::new();
    let mut indices = HashSet::new();
    for r in records {
        if !addresses.insert(r.address) {
            return Err(RotationError::Ledger(format!("duplicate address {:?}", r.address)));
        }
        if !indices.insert(r.derivation_index) {
            return Err(RotationError::Ledger(format!(
                "duplicate derivation index {}",
                r.derivation_index
            )));
        }
    }
    Ok(())
}
