//! TaruApp economy core
//!
//! Coin and experience ledger for the forum plus the review pipeline that
//! turns uploaded app versions into published market listings.
//!
//! # Architecture
//!
//! - **Transactional store**: every operation is one [`Store`] transaction;
//!   dropping it uncommitted rolls everything back
//! - **Row locks**: balances and task states are re-read under lock before
//!   any precondition is checked
//! - **Pure rules**: level formula and taxonomy need no store at all
//!
//! # Invariants
//!
//! - Coin balances never go negative
//! - Coins a tip takes from the payer go to the author, or to the app total
//!   when the entity has no author
//! - `user_level == level_for_exp(exp)` after every committed write
//! - At most one daily reward per user and calendar date
//! - At most one `is_latest` version per app
//! - Approved and rejected tasks never change again

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod level;
pub mod review;
pub mod store;
pub mod taxonomy;
pub mod types;

// Re-exports
pub use config::EconomyConfig;
pub use error::{Error, ErrorKind, Result};
pub use ledger::{accrue_exp, DailyReward, ExpReceipt, Ledger, RewardReceipt, TransferReceipt};
pub use level::{level_for_exp, LevelProgress};
pub use review::{Publication, ReviewOutcome, ReviewQueue, SubmissionReceipt};
pub use store::{FaultPoint, MemoryState, MemoryStore, Store, Transaction};
pub use types::{
    Account, AppId, AppListing, AppSubmission, AppVersion, EntityKind, EntityRef, ReviewDecision,
    Reviewer, SubmissionTask, TaskId, TaskStatus, UserId, VersionId,
};
