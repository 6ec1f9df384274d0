//! Upload review state machine
//!
//! ```text
//! submit ──► pending ──accept──► approved   (app created/updated, new latest version)
//!                    └─reject──► rejected   (reason recorded)
//! ```
//!
//! Approved and rejected are terminal. The pending check is repeated under the
//! task row lock, so two reviewers racing on one task produce exactly one
//! verdict and the loser gets [`Error::AlreadyReviewed`].

use crate::{
    config::EconomyConfig,
    error::{Error, Result},
    store::{Store, Transaction},
    taxonomy::is_known_category,
    types::{
        AppId, AppSubmission, NewAppVersion, ReviewDecision, Reviewer, SubmissionTask, TaskId,
        TaskStatus, UserId, VersionId,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
}

/// What an approval published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub app_id: AppId,
    pub version_id: VersionId,
    /// False when an existing app was updated
    pub app_created: bool,
}

/// Outcome of a review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub reviewed_at: DateTime<Utc>,
    /// Present for approvals only
    pub published: Option<Publication>,
}

/// Field checks the taxonomy does not cover
fn validate_submission(submission: &AppSubmission) -> Result<()> {
    let listing = &submission.listing;

    if !is_known_category(&listing.main_category, &listing.sub_category) {
        return Err(Error::InvalidCategory {
            main: listing.main_category.clone(),
            sub: listing.sub_category.clone(),
        });
    }

    let required = [
        ("package_name", &listing.package_name),
        ("name", &listing.name),
        ("version", &submission.version),
        ("download_url", &submission.download_url),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::InvalidSubmission(format!("{} must not be empty", field)));
        }
    }

    if submission.version_code < 1 {
        return Err(Error::InvalidSubmission(
            "version_code must be positive".to_string(),
        ));
    }

    if submission.size < 0 {
        return Err(Error::InvalidSubmission("size cannot be negative".to_string()));
    }

    Ok(())
}

/// Review queue over a transactional store
#[derive(Debug, Clone)]
pub struct ReviewQueue<S> {
    store: S,
    config: EconomyConfig,
}

impl<S: Store> ReviewQueue<S> {
    /// Create a review queue; fails on an invalid configuration
    pub fn new(store: S, config: EconomyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queue an upload for review
    pub async fn submit(
        &self,
        submitter: UserId,
        submission: AppSubmission,
    ) -> Result<SubmissionReceipt> {
        validate_submission(&submission)?;

        let submitted_at = Utc::now();
        let mut tx = self.store.begin().await?;
        let task_id = tx.insert_task(submitter, &submission, submitted_at).await?;
        tx.commit().await?;

        info!(
            task = %task_id,
            submitter = %submitter,
            package = %submission.listing.package_name,
            version = %submission.version,
            "Upload queued for review"
        );

        Ok(SubmissionReceipt {
            task_id,
            status: TaskStatus::Pending,
            submitted_at,
        })
    }

    /// Approve or reject a pending upload
    pub async fn review(
        &self,
        reviewer: Reviewer,
        task_id: TaskId,
        decision: ReviewDecision,
    ) -> Result<ReviewOutcome> {
        if reviewer.role_level < self.config.reviewer_min_level {
            warn!(
                reviewer = %reviewer.id,
                level = reviewer.role_level,
                task = %task_id,
                "Review refused: insufficient role level"
            );
            return Err(Error::Forbidden {
                level: reviewer.role_level,
                required: self.config.reviewer_min_level,
            });
        }

        if let ReviewDecision::Reject { reason } = &decision {
            if reason.trim().is_empty() {
                return Err(Error::MissingReason);
            }
        }

        let mut tx = self.store.begin().await?;

        let mut task = tx
            .lock_task(task_id)
            .await?
            .ok_or(Error::TaskNotFound(task_id))?;
        if task.status.is_terminal() {
            return Err(Error::AlreadyReviewed {
                task: task_id,
                status: task.status,
            });
        }

        let reviewed_at = Utc::now();
        let published = match decision {
            ReviewDecision::Accept => {
                let publication = publish(&mut tx, &task).await?;
                task.status = TaskStatus::Approved;
                Some(publication)
            }
            ReviewDecision::Reject { reason } => {
                task.status = TaskStatus::Rejected;
                task.reject_reason = Some(reason.trim().to_string());
                None
            }
        };
        task.reviewer = Some(reviewer.id);
        task.review_time = Some(reviewed_at);

        tx.save_review(&task).await?;
        tx.commit().await?;

        info!(
            task = %task_id,
            reviewer = %reviewer.id,
            status = %task.status,
            package = %task.submission.listing.package_name,
            "Upload reviewed"
        );

        Ok(ReviewOutcome {
            task_id,
            status: task.status,
            reviewed_at,
            published,
        })
    }
}

/// Create or update the app and make the task's version the only latest one
async fn publish<T: Transaction>(tx: &mut T, task: &SubmissionTask) -> Result<Publication> {
    let submission = &task.submission;
    let listing = &submission.listing;

    let uploader_name = tx
        .username(task.submitter)
        .await?
        .ok_or(Error::AccountNotFound(task.submitter))?;

    let (app_id, app_created) = tx.upsert_app(listing).await?;

    tx.retire_latest_versions(app_id).await?;

    let version_id = tx
        .insert_version(&NewAppVersion {
            app_id,
            package_name: listing.package_name.clone(),
            version: submission.version.clone(),
            version_code: submission.version_code,
            size: submission.size,
            download_url: submission.download_url.clone(),
            update_content: submission.update_content.clone(),
            screenshots: submission.screenshots.clone(),
            uploader_id: task.submitter,
            uploader_name,
        })
        .await?;

    Ok(Publication {
        app_id,
        version_id,
        app_created,
    })
}
