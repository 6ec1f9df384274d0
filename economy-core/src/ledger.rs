//! Ledger engine
//!
//! Every balance-affecting operation runs as a single store transaction:
//! either all of its row changes land or none do. Tips move coins between
//! accounts and credit the tipped entity; daily rewards and exp awards raise a
//! user's coins and exp and keep `user_level` in step with `exp`.
//!
//! # Example
//!
//! ```no_run
//! use economy_core::{EconomyConfig, EntityRef, Ledger, MemoryState, MemoryStore, UserId};
//!
//! #[tokio::main]
//! async fn main() -> economy_core::Result<()> {
//!     let store = MemoryStore::new(
//!         MemoryState::default()
//!             .with_account(1, "alice", 10)
//!             .with_account(2, "bob", 0)
//!             .with_post(7, 2),
//!     );
//!     let ledger = Ledger::new(store, EconomyConfig::default())?;
//!
//!     let receipt = ledger.transfer(UserId(1), EntityRef::post(7), 3).await?;
//!     assert_eq!(receipt.payer_coins, 7);
//!     Ok(())
//! }
//! ```

use crate::{
    config::EconomyConfig,
    error::{Error, Result},
    level::level_for_exp,
    store::{Store, Transaction},
    types::{Account, CheckInClaim, EntityRef, UserId},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of a tip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub target: EntityRef,
    pub amount: i64,
    /// Entity accumulator after the tip
    pub entity_coins: i64,
    /// Payer balance after the tip
    pub payer_coins: i64,
    /// Author of the entity, if any
    pub payee: Option<UserId>,
    /// False for self-tips; authorless entities still debit the payer
    pub coins_moved: bool,
}

/// Coins and exp granted by one check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReward {
    pub coins: i64,
    pub exp: i64,
}

impl From<&EconomyConfig> for DailyReward {
    fn from(config: &EconomyConfig) -> Self {
        Self {
            coins: config.daily_reward_coins,
            exp: config.daily_reward_exp,
        }
    }
}

/// Outcome of a check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardReceipt {
    pub check_date: NaiveDate,
    pub reward_coins: i64,
    pub reward_exp: i64,
    pub coins: i64,
    pub exp: i64,
    pub level: i32,
}

/// Exp and level after an award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpReceipt {
    pub user: UserId,
    pub exp: i64,
    pub level: i32,
    pub previous_level: i32,
}

impl ExpReceipt {
    /// Whether the award crossed a level boundary
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

/// Add exp to a user inside an open transaction and persist the new level.
///
/// Lets callers combine an award with their own writes, e.g. inserting a post.
pub async fn accrue_exp<T>(tx: &mut T, user: UserId, amount: i64) -> Result<ExpReceipt>
where
    T: Transaction + ?Sized,
{
    if amount < 0 {
        return Err(Error::InvalidAmount {
            amount,
            min: 0,
            max: i64::MAX,
        });
    }

    let mut account = lock_account(tx, user).await?;
    let previous_level = account.user_level;
    apply_exp(&mut account, amount)?;
    tx.save_account(&account).await?;

    Ok(ExpReceipt {
        user,
        exp: account.exp,
        level: account.user_level,
        previous_level,
    })
}

async fn lock_account<T>(tx: &mut T, user: UserId) -> Result<Account>
where
    T: Transaction + ?Sized,
{
    tx.lock_account(user)
        .await?
        .ok_or(Error::AccountNotFound(user))
}

fn apply_exp(account: &mut Account, amount: i64) -> Result<()> {
    account.exp = checked_credit(account.exp, amount)?;
    account.user_level = level_for_exp(account.exp);
    Ok(())
}

fn checked_credit(balance: i64, amount: i64) -> Result<i64> {
    balance.checked_add(amount).ok_or(Error::InvalidAmount {
        amount,
        min: 0,
        max: i64::MAX - balance,
    })
}

/// Ledger over a transactional store
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
    config: EconomyConfig,
}

impl<S: Store> Ledger<S> {
    /// Create a ledger; fails on an invalid configuration
    pub fn new(store: S, config: EconomyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Reward granted by a check-in under the active configuration
    pub fn daily_reward(&self) -> DailyReward {
        DailyReward::from(&self.config)
    }

    /// Tip `amount` coins from `payer` to the author of `target`.
    ///
    /// The entity accumulator always grows by `amount`. The payer is debited
    /// unless they authored the entity; the author, if any, is credited. A
    /// self-tip still requires the payer to hold `amount`.
    pub async fn transfer(
        &self,
        payer: UserId,
        target: EntityRef,
        amount: i64,
    ) -> Result<TransferReceipt> {
        if amount < self.config.tip_min || amount > self.config.tip_max {
            return Err(Error::InvalidAmount {
                amount,
                min: self.config.tip_min,
                max: self.config.tip_max,
            });
        }

        let mut tx = self.store.begin().await?;

        let entity = tx
            .lock_entity(target)
            .await?
            .ok_or(Error::EntityNotFound(target))?;

        let self_tip = entity.author == Some(payer);

        // Lock account rows in ascending id order
        let (mut payer_account, payee_account) = match entity.author.filter(|a| *a != payer) {
            Some(payee) if payee < payer => {
                let payee_account = lock_account(&mut tx, payee).await?;
                (lock_account(&mut tx, payer).await?, Some(payee_account))
            }
            Some(payee) => {
                let payer_account = lock_account(&mut tx, payer).await?;
                (payer_account, Some(lock_account(&mut tx, payee).await?))
            }
            None => (lock_account(&mut tx, payer).await?, None),
        };

        if payer_account.coins < amount {
            warn!(
                payer = %payer,
                target = %target,
                amount,
                available = payer_account.coins,
                "Tip rejected: insufficient coins"
            );
            return Err(Error::InsufficientFunds {
                required: amount,
                available: payer_account.coins,
            });
        }

        if !self_tip {
            payer_account.coins -= amount;
            tx.save_account(&payer_account).await?;
        }
        if let Some(mut payee_account) = payee_account {
            payee_account.coins = checked_credit(payee_account.coins, amount)?;
            tx.save_account(&payee_account).await?;
        }
        let coins_moved = !self_tip;

        let entity_coins = tx.credit_entity(target, amount).await?;
        tx.commit().await?;

        info!(
            payer = %payer,
            target = %target,
            amount,
            coins_moved,
            "Tip recorded"
        );

        Ok(TransferReceipt {
            target,
            amount,
            entity_coins,
            payer_coins: payer_account.coins,
            payee: entity.author,
            coins_moved,
        })
    }

    /// Grant the once-per-day reward for `check_date`
    pub async fn credit_daily_reward(
        &self,
        user: UserId,
        reward: DailyReward,
        check_date: NaiveDate,
    ) -> Result<RewardReceipt> {
        if reward.coins < 0 || reward.exp < 0 {
            return Err(Error::InvalidAmount {
                amount: reward.coins.min(reward.exp),
                min: 0,
                max: i64::MAX,
            });
        }

        let mut tx = self.store.begin().await?;
        let mut account = lock_account(&mut tx, user).await?;

        let claim = CheckInClaim {
            user,
            check_date,
            check_time: Utc::now(),
            reward: reward.coins,
        };
        if !tx.insert_check_in(&claim).await? {
            debug!(user = %user, %check_date, "Duplicate check-in");
            return Err(Error::AlreadyClaimed {
                user,
                date: check_date,
            });
        }

        account.coins = checked_credit(account.coins, reward.coins)?;
        apply_exp(&mut account, reward.exp)?;
        tx.save_account(&account).await?;
        tx.commit().await?;

        info!(
            user = %user,
            %check_date,
            coins = reward.coins,
            exp = reward.exp,
            level = account.user_level,
            "Daily reward credited"
        );

        Ok(RewardReceipt {
            check_date,
            reward_coins: reward.coins,
            reward_exp: reward.exp,
            coins: account.coins,
            exp: account.exp,
            level: account.user_level,
        })
    }

    /// Add exp to a user in its own transaction
    pub async fn award_exp(&self, user: UserId, amount: i64) -> Result<ExpReceipt> {
        if amount < 0 {
            return Err(Error::InvalidAmount {
                amount,
                min: 0,
                max: i64::MAX,
            });
        }

        let mut tx = self.store.begin().await?;
        let receipt = accrue_exp(&mut tx, user, amount).await?;
        tx.commit().await?;

        if receipt.leveled_up() {
            info!(user = %user, level = receipt.level, "User leveled up");
        }

        Ok(receipt)
    }
}
