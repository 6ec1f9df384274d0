use crate::database::PgStore;
use crate::errors::{GatewayError, Result};
use crate::metrics::{
    CHECK_INS_TOTAL, COINS_TIPPED, ECONOMY_ERRORS, EXP_AWARDED, REVIEWS_TOTAL,
    SUBMISSIONS_TOTAL, TIPS_TOTAL,
};
use crate::models::{AuthUser, CreatePostRequest, EconomyEvent, EconomyEventKind, PostCreated};
use crate::nats::EventPublisher;
use chrono::NaiveDate;
use economy_core::{
    accrue_exp, AppSubmission, EconomyConfig, EntityRef, Ledger, LevelProgress, ReviewDecision,
    ReviewOutcome, ReviewQueue, RewardReceipt, Store, SubmissionReceipt, TaskId, Transaction,
    TransferReceipt,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Count a failed economy operation and pass the result through
fn observe<T>(operation: &str, result: economy_core::Result<T>) -> Result<T> {
    if let Err(err) = &result {
        ECONOMY_ERRORS
            .with_label_values(&[operation, err.code()])
            .inc();
    }
    Ok(result?)
}

/// Ledger and review queue behind the HTTP API
pub struct EconomyService<S> {
    ledger: Ledger<S>,
    reviews: ReviewQueue<S>,
    events: Arc<dyn EventPublisher>,
}

pub type ForumService = EconomyService<PgStore>;

impl<S: Store + Clone> EconomyService<S> {
    pub fn new(store: S, config: EconomyConfig, events: Arc<dyn EventPublisher>) -> Result<Self> {
        Ok(EconomyService {
            ledger: Ledger::new(store.clone(), config.clone())?,
            reviews: ReviewQueue::new(store, config)?,
            events,
        })
    }
}

impl<S: Store> EconomyService<S> {
    pub fn config(&self) -> &EconomyConfig {
        self.ledger.config()
    }

    pub fn store(&self) -> &S {
        self.ledger.store()
    }

    /// Publish after commit; failures are logged and swallowed
    async fn emit(&self, event: EconomyEvent) {
        if let Err(e) = self.events.publish(&event).await {
            error!(
                event_id = %event.event_id,
                kind = event.kind.as_str(),
                "Failed to publish economy event: {}",
                e
            );
        }
    }

    /// Tip a post, comment or app
    pub async fn tip(&self, user: &AuthUser, target: EntityRef, amount: i64) -> Result<TransferReceipt> {
        let receipt = observe("tip", self.ledger.transfer(user.id, target, amount).await)?;

        TIPS_TOTAL.with_label_values(&[target.kind.as_str()]).inc();
        COINS_TIPPED.inc_by(amount as u64);

        self.emit(EconomyEvent::new(
            EconomyEventKind::CoinsTipped,
            user.id,
            json!({
                "target": receipt.target,
                "amount": receipt.amount,
                "payee": receipt.payee,
                "coins_moved": receipt.coins_moved,
            }),
        ))
        .await;

        Ok(receipt)
    }

    /// Claim the daily reward for `date`
    pub async fn check_in(&self, user: &AuthUser, date: NaiveDate) -> Result<RewardReceipt> {
        let reward = self.ledger.daily_reward();
        let receipt = observe(
            "check_in",
            self.ledger.credit_daily_reward(user.id, reward, date).await,
        )?;

        CHECK_INS_TOTAL.inc();
        EXP_AWARDED.inc_by(receipt.reward_exp as u64);

        self.emit(EconomyEvent::new(
            EconomyEventKind::DailyRewardClaimed,
            user.id,
            json!({
                "check_date": receipt.check_date,
                "coins": receipt.reward_coins,
                "exp": receipt.reward_exp,
                "level": receipt.level,
            }),
        ))
        .await;

        Ok(receipt)
    }

    pub async fn submit_upload(
        &self,
        user: &AuthUser,
        submission: AppSubmission,
    ) -> Result<SubmissionReceipt> {
        let package_name = submission.listing.package_name.clone();
        let version = submission.version.clone();
        let receipt = observe("submit", self.reviews.submit(user.id, submission).await)?;

        SUBMISSIONS_TOTAL.inc();

        self.emit(EconomyEvent::new(
            EconomyEventKind::AppSubmitted,
            user.id,
            json!({
                "task_id": receipt.task_id,
                "package_name": package_name,
                "version": version,
            }),
        ))
        .await;

        Ok(receipt)
    }

    pub async fn review_upload(
        &self,
        user: &AuthUser,
        task: TaskId,
        decision: ReviewDecision,
    ) -> Result<ReviewOutcome> {
        let label = decision.as_str();
        let outcome = observe(
            "review",
            self.reviews.review(user.as_reviewer(), task, decision).await,
        )?;

        REVIEWS_TOTAL.with_label_values(&[label]).inc();

        self.emit(EconomyEvent::new(
            EconomyEventKind::SubmissionReviewed,
            user.id,
            json!({
                "task_id": outcome.task_id,
                "status": outcome.status,
                "published": outcome.published,
            }),
        ))
        .await;

        Ok(outcome)
    }
}

impl EconomyService<PgStore> {
    /// Tip an app addressed by package name
    pub async fn tip_app(
        &self,
        user: &AuthUser,
        package_name: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        let app = self
            .store()
            .app_id_by_package(package_name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("app {}", package_name)))?;

        self.tip(user, EntityRef::app(app), amount).await
    }

    /// Publish a post and award the post exp in the same transaction
    pub async fn create_post(
        &self,
        user: &AuthUser,
        request: &CreatePostRequest,
    ) -> Result<PostCreated> {
        let reward = self.config().post_reward_exp;

        let mut tx = self.store().begin().await?;
        let post_id = observe("create_post", tx.insert_post(user, request).await)?;
        let receipt = observe("create_post", accrue_exp(&mut tx, user.id, reward).await)?;
        tx.commit().await?;

        EXP_AWARDED.inc_by(reward as u64);
        info!(post = post_id, user = %user.id, exp = receipt.exp, "Post published");

        self.emit(EconomyEvent::new(
            EconomyEventKind::ExpAwarded,
            user.id,
            json!({
                "reason": "post",
                "post_id": post_id,
                "amount": reward,
                "exp": receipt.exp,
                "level": receipt.level,
            }),
        ))
        .await;

        Ok(PostCreated {
            post_id,
            exp: receipt.exp,
            level: receipt.level,
        })
    }

    pub async fn level_progress(&self, user: &AuthUser) -> Result<LevelProgress> {
        let account = self
            .store()
            .account(user.id)
            .await?
            .ok_or(economy_core::Error::AccountNotFound(user.id))?;

        Ok(LevelProgress::of(account.exp))
    }
}
