//! Transactional store abstraction
//!
//! The ledger and the review queue never hold a connection of their own: each
//! operation calls [`Store::begin`], performs its reads and writes through the
//! returned [`Transaction`], and calls [`Transaction::commit`]. A transaction
//! dropped without commit must discard every write made through it, so an
//! early `?` return is a rollback.
//!
//! Reads named `lock_*` must take a row lock (or equivalent isolation) that is
//! held until commit or rollback, so preconditions checked on their result
//! still hold when the write lands.
//!
//! [`MemoryStore`] is the in-process implementation used by tests; the HTTP
//! service ships a Postgres one.

use crate::{
    error::{Error, Result},
    taxonomy::{AdLevel, Channel, OperationType, PaymentType},
    types::{
        Account, AppId, AppListing, AppSubmission, AppVersion, CheckInClaim, EntityKind,
        EntityRef, NewAppVersion, SubmissionTask, TaskId, TaskStatus, TippableEntity, UserId,
        VersionId,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Source of transactions
#[async_trait]
pub trait Store: Send + Sync {
    /// Transaction handle
    type Tx: Transaction;

    /// Open a transaction
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One atomic unit of work
#[async_trait]
pub trait Transaction: Send {
    /// Read a user row and lock it until the transaction ends
    async fn lock_account(&mut self, user: UserId) -> Result<Option<Account>>;

    /// Persist `coins`, `exp` and `user_level` of a locked account
    async fn save_account(&mut self, account: &Account) -> Result<()>;

    /// Display name of a user, without locking
    async fn username(&mut self, user: UserId) -> Result<Option<String>>;

    /// Read a tippable entity and lock it until the transaction ends
    async fn lock_entity(&mut self, target: EntityRef) -> Result<Option<TippableEntity>>;

    /// Add to an entity's coin accumulator, returning the new total
    async fn credit_entity(&mut self, target: EntityRef, amount: i64) -> Result<i64>;

    /// Record a check-in; `false` when the `(user, check_date)` pair exists
    async fn insert_check_in(&mut self, claim: &CheckInClaim) -> Result<bool>;

    /// Create a pending upload task
    async fn insert_task(
        &mut self,
        submitter: UserId,
        submission: &AppSubmission,
        created_at: DateTime<Utc>,
    ) -> Result<TaskId>;

    /// Read an upload task and lock it until the transaction ends
    async fn lock_task(&mut self, task: TaskId) -> Result<Option<SubmissionTask>>;

    /// Persist status, reject reason, reviewer and review time of a task
    async fn save_review(&mut self, task: &SubmissionTask) -> Result<()>;

    /// Create the app for `listing.package_name` with zeroed counters, or
    /// overwrite the descriptive fields of the existing one, as one atomic
    /// step. Returns the app id and whether it was created.
    async fn upsert_app(&mut self, listing: &AppListing) -> Result<(AppId, bool)>;

    /// Clear `is_latest` on every version of an app, returning how many were latest
    async fn retire_latest_versions(&mut self, app: AppId) -> Result<u64>;

    /// Insert a version with `is_latest = true`
    async fn insert_version(&mut self, version: &NewAppVersion) -> Result<VersionId>;

    /// Make every write visible atomically
    async fn commit(self) -> Result<()>;
}

/// App row held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredApp {
    pub id: AppId,
    pub listing: AppListing,
    pub rating: f64,
    pub rating_count: i64,
    pub total_coins: i64,
    pub download_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Whole contents of a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: BTreeMap<UserId, Account>,
    content: HashMap<EntityRef, TippableEntity>,
    check_ins: Vec<CheckInClaim>,
    tasks: BTreeMap<TaskId, SubmissionTask>,
    apps: BTreeMap<AppId, StoredApp>,
    versions: BTreeMap<VersionId, AppVersion>,
    next_id: i64,
}

impl MemoryState {
    /// Add a regular user
    pub fn with_account(self, id: i64, username: &str, coins: i64) -> Self {
        self.with_role(id, username, coins, 0)
    }

    /// Add a user with a role level
    pub fn with_role(mut self, id: i64, username: &str, coins: i64, role_level: i32) -> Self {
        self.accounts.insert(
            UserId(id),
            Account {
                id: UserId(id),
                username: username.to_string(),
                coins,
                exp: 0,
                user_level: 1,
                role_level,
            },
        );
        self
    }

    /// Add a post written by `author`
    pub fn with_post(self, id: i64, author: i64) -> Self {
        self.with_content(EntityRef::post(id), author)
    }

    /// Add a comment written by `author`
    pub fn with_comment(self, id: i64, author: i64) -> Self {
        self.with_content(EntityRef::comment(id), author)
    }

    /// Add a published app with zeroed counters
    pub fn with_app(mut self, id: i64, package_name: &str) -> Self {
        let listing = AppListing {
            package_name: package_name.to_string(),
            name: package_name.to_string(),
            icon_url: String::new(),
            description: String::new(),
            main_category: "Tools".to_string(),
            sub_category: "Utilities".to_string(),
            channel: Channel::Official,
            share_desc: String::new(),
            developer_name: String::new(),
            ad_level: AdLevel::None,
            payment_type: PaymentType::Free,
            operation_type: OperationType::Indie,
        };
        self.apps.insert(
            AppId(id),
            StoredApp {
                id: AppId(id),
                listing,
                rating: 0.0,
                rating_count: 0,
                total_coins: 0,
                download_count: 0,
                updated_at: Utc::now(),
            },
        );
        self.next_id = self.next_id.max(id);
        self
    }

    fn with_content(mut self, target: EntityRef, author: i64) -> Self {
        self.content.insert(
            target,
            TippableEntity {
                target,
                author: Some(UserId(author)),
                coins: 0,
            },
        );
        self
    }

    /// Account by id
    pub fn account(&self, user: UserId) -> Option<&Account> {
        self.accounts.get(&user)
    }

    /// Coin accumulator of any tippable entity
    pub fn entity_coins(&self, target: EntityRef) -> Option<i64> {
        match target.kind {
            EntityKind::App => self.apps.get(&AppId(target.id)).map(|app| app.total_coins),
            _ => self.content.get(&target).map(|entity| entity.coins),
        }
    }

    /// Check-ins in insertion order
    pub fn check_ins(&self) -> &[CheckInClaim] {
        &self.check_ins
    }

    /// Upload task by id
    pub fn task(&self, task: TaskId) -> Option<&SubmissionTask> {
        self.tasks.get(&task)
    }

    /// App by package name
    pub fn app_by_package(&self, package_name: &str) -> Option<&StoredApp> {
        self.apps
            .values()
            .find(|app| app.listing.package_name == package_name)
    }

    /// Number of apps
    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    /// Versions of an app, oldest first
    pub fn versions_of(&self, app: AppId) -> Vec<&AppVersion> {
        self.versions
            .values()
            .filter(|version| version.version.app_id == app)
            .collect()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Statement at which [`MemoryStore`] simulates a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    SaveAccount,
    CreditEntity,
    InsertCheckIn,
    SaveReview,
    UpsertApp,
    RetireVersions,
    InsertVersion,
    Commit,
}

/// In-process store
///
/// Transactions are serialised by an async mutex and work on a private copy of
/// the state that replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fault: Arc<std::sync::Mutex<Option<FaultPoint>>>,
}

impl MemoryStore {
    /// Store seeded with `state`
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            fault: Arc::default(),
        }
    }

    /// Fail every later transaction when it reaches `point`
    pub fn fail_on(&self, point: FaultPoint) {
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }

    /// Stop injecting failures
    pub fn clear_fault(&self) {
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let committed = self.state.clone().lock_owned().await;
        let working = committed.clone();
        let fault = *self.fault.lock().unwrap_or_else(|e| e.into_inner());

        Ok(MemoryTx {
            committed,
            working,
            fault,
        })
    }
}

/// Transaction over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTx {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fault: Option<FaultPoint>,
}

impl MemoryTx {
    fn check(&self, point: FaultPoint) -> Result<()> {
        if self.fault == Some(point) {
            return Err(Error::Storage(format!("injected fault at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn lock_account(&mut self, user: UserId) -> Result<Option<Account>> {
        Ok(self.working.accounts.get(&user).cloned())
    }

    async fn save_account(&mut self, account: &Account) -> Result<()> {
        self.check(FaultPoint::SaveAccount)?;
        let stored = self
            .working
            .accounts
            .get_mut(&account.id)
            .ok_or(Error::AccountNotFound(account.id))?;
        stored.coins = account.coins;
        stored.exp = account.exp;
        stored.user_level = account.user_level;
        Ok(())
    }

    async fn username(&mut self, user: UserId) -> Result<Option<String>> {
        Ok(self.working.accounts.get(&user).map(|a| a.username.clone()))
    }

    async fn lock_entity(&mut self, target: EntityRef) -> Result<Option<TippableEntity>> {
        let entity = match target.kind {
            EntityKind::App => self.working.apps.get(&AppId(target.id)).map(|app| TippableEntity {
                target,
                author: None,
                coins: app.total_coins,
            }),
            _ => self.working.content.get(&target).cloned(),
        };
        Ok(entity)
    }

    async fn credit_entity(&mut self, target: EntityRef, amount: i64) -> Result<i64> {
        self.check(FaultPoint::CreditEntity)?;
        let coins = match target.kind {
            EntityKind::App => {
                let app = self
                    .working
                    .apps
                    .get_mut(&AppId(target.id))
                    .ok_or(Error::EntityNotFound(target))?;
                app.total_coins += amount;
                app.updated_at = Utc::now();
                app.total_coins
            }
            _ => {
                let entity = self
                    .working
                    .content
                    .get_mut(&target)
                    .ok_or(Error::EntityNotFound(target))?;
                entity.coins += amount;
                entity.coins
            }
        };
        Ok(coins)
    }

    async fn insert_check_in(&mut self, claim: &CheckInClaim) -> Result<bool> {
        self.check(FaultPoint::InsertCheckIn)?;
        let exists = self
            .working
            .check_ins
            .iter()
            .any(|c| c.user == claim.user && c.check_date == claim.check_date);
        if exists {
            return Ok(false);
        }
        self.working.check_ins.push(claim.clone());
        Ok(true)
    }

    async fn insert_task(
        &mut self,
        submitter: UserId,
        submission: &AppSubmission,
        created_at: DateTime<Utc>,
    ) -> Result<TaskId> {
        let id = TaskId(self.working.next_id());
        self.working.tasks.insert(
            id,
            SubmissionTask {
                id,
                submitter,
                submission: submission.clone(),
                status: TaskStatus::Pending,
                reject_reason: None,
                reviewer: None,
                review_time: None,
                created_at,
            },
        );
        Ok(id)
    }

    async fn lock_task(&mut self, task: TaskId) -> Result<Option<SubmissionTask>> {
        Ok(self.working.tasks.get(&task).cloned())
    }

    async fn save_review(&mut self, task: &SubmissionTask) -> Result<()> {
        self.check(FaultPoint::SaveReview)?;
        let stored = self
            .working
            .tasks
            .get_mut(&task.id)
            .ok_or(Error::TaskNotFound(task.id))?;
        stored.status = task.status;
        stored.reject_reason = task.reject_reason.clone();
        stored.reviewer = task.reviewer;
        stored.review_time = task.review_time;
        Ok(())
    }

    async fn upsert_app(&mut self, listing: &AppListing) -> Result<(AppId, bool)> {
        self.check(FaultPoint::UpsertApp)?;
        let existing = self
            .working
            .app_by_package(&listing.package_name)
            .map(|app| app.id);

        if let Some(id) = existing {
            if let Some(stored) = self.working.apps.get_mut(&id) {
                stored.listing = listing.clone();
                stored.updated_at = Utc::now();
            }
            return Ok((id, false));
        }

        let id = AppId(self.working.next_id());
        self.working.apps.insert(
            id,
            StoredApp {
                id,
                listing: listing.clone(),
                rating: 0.0,
                rating_count: 0,
                total_coins: 0,
                download_count: 0,
                updated_at: Utc::now(),
            },
        );
        Ok((id, true))
    }

    async fn retire_latest_versions(&mut self, app: AppId) -> Result<u64> {
        self.check(FaultPoint::RetireVersions)?;
        let mut touched = 0;
        for version in self.working.versions.values_mut() {
            if version.version.app_id == app && version.is_latest {
                version.is_latest = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn insert_version(&mut self, version: &NewAppVersion) -> Result<VersionId> {
        self.check(FaultPoint::InsertVersion)?;
        let duplicate = self.working.versions.values().any(|v| {
            v.version.package_name == version.package_name && v.version.version == version.version
        });
        if duplicate {
            return Err(Error::Storage(format!(
                "version {} of {} already exists",
                version.version, version.package_name
            )));
        }
        let id = VersionId(self.working.next_id());
        self.working.versions.insert(
            id,
            AppVersion {
                id,
                version: version.clone(),
                is_latest: true,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn commit(self) -> Result<()> {
        self.check(FaultPoint::Commit)?;
        let MemoryTx {
            mut committed,
            working,
            ..
        } = self;
        *committed = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        MemoryStore::new(
            MemoryState::default()
                .with_account(1, "alice", 10)
                .with_post(7, 1),
        )
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = seeded();
        let mut tx = store.begin().await.unwrap();
        tx.credit_entity(EntityRef::post(7), 4).await.unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.entity_coins(EntityRef::post(7)), Some(4));
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = seeded();
        {
            let mut tx = store.begin().await.unwrap();
            let mut account = tx.lock_account(UserId(1)).await.unwrap().unwrap();
            account.coins = 0;
            tx.save_account(&account).await.unwrap();
        }

        let state = store.snapshot().await;
        assert_eq!(state.account(UserId(1)).unwrap().coins, 10);
    }

    #[tokio::test]
    async fn test_duplicate_check_in_reports_false() {
        let store = seeded();
        let claim = CheckInClaim {
            user: UserId(1),
            check_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            check_time: Utc::now(),
            reward: 50,
        };

        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_check_in(&claim).await.unwrap());
        assert!(!tx.insert_check_in(&claim).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_app_keeps_counters() {
        let store = MemoryStore::new(MemoryState::default().with_app(3, "com.example.notes"));
        let mut listing = store
            .snapshot()
            .await
            .app_by_package("com.example.notes")
            .unwrap()
            .listing
            .clone();
        listing.name = "Notes Pro".into();

        let mut tx = store.begin().await.unwrap();
        tx.credit_entity(EntityRef::app(AppId(3)), 6).await.unwrap();
        assert_eq!(tx.upsert_app(&listing).await.unwrap(), (AppId(3), false));

        listing.package_name = "com.example.todo".into();
        let (created, fresh) = tx.upsert_app(&listing).await.unwrap();
        assert!(fresh);
        assert_ne!(created, AppId(3));
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        let notes = state.app_by_package("com.example.notes").unwrap();
        assert_eq!(notes.listing.name, "Notes Pro");
        assert_eq!(notes.total_coins, 6);
        assert_eq!(state.app_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let store = seeded();
        store.fail_on(FaultPoint::CreditEntity);

        let mut tx = store.begin().await.unwrap();
        let err = tx.credit_entity(EntityRef::post(7), 1).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        drop(tx);

        store.clear_fault();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.credit_entity(EntityRef::post(7), 1).await.unwrap(), 1);
    }
}
