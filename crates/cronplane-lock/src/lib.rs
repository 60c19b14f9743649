//! `cronplane-lock` — the distributed leader lease.
//!
//! A named lease with three operations and deliberately small semantics:
//!
//! - `acquire` is a conditional insert. It fails with `LockTaken` while an
//!   unexpired holder exists; an expired lease is deleted and re-inserted
//!   (the insert stays conditional on absence, so two racing acquirers
//!   cannot both win).
//! - `refresh` is an unconditional put by the holder. It does not verify
//!   ownership — only the current leader may call it — but it fails with
//!   `NotFound` when the record is absent: you cannot refresh what does
//!   not exist.
//! - `release` is an unconditional delete.
//!
//! Callers must pick a TTL of at least twice their refresh interval so a
//! single missed refresh does not drop the lease.

pub mod db;
pub mod memory;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

use cronplane_core::Result;

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Take the lease for `ttl`. `Err(LockTaken)` while another holder's
    /// lease is unexpired.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<()>;

    /// Extend the lease by `ttl` from now. `Err(NotFound)` when no lease
    /// record exists.
    async fn refresh(&self, name: &str, ttl: Duration) -> Result<()>;

    /// Drop the lease. Succeeds whether or not a record existed.
    async fn release(&self, name: &str) -> Result<()>;
}

pub use memory::MemoryLockManager;
pub use sqlite::SqliteLockManager;
