//! Core types for the coin/experience economy and the upload review pipeline
//!
//! Row identifiers are the store's integer keys wrapped in newtypes so a
//! task id can never be passed where a user id is expected.

use crate::taxonomy::{AdLevel, Channel, OperationType, PaymentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// User account id
    UserId
);
row_id!(
    /// Upload task id
    TaskId
);
row_id!(
    /// Published app id
    AppId
);
row_id!(
    /// App version id
    VersionId
);

/// Kind of content that can receive coins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Forum post
    Post,
    /// Comment on a post
    Comment,
    /// Published app
    App,
}

impl EntityKind {
    /// Lowercase name, used in metrics labels and event subjects
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
            EntityKind::App => "app",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a tippable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// What the id points at
    pub kind: EntityKind,
    /// Row id within that kind
    pub id: i64,
}

impl EntityRef {
    /// Post reference
    pub fn post(id: i64) -> Self {
        Self { kind: EntityKind::Post, id }
    }

    /// Comment reference
    pub fn comment(id: i64) -> Self {
        Self { kind: EntityKind::Comment, id }
    }

    /// App reference
    pub fn app(id: AppId) -> Self {
        Self { kind: EntityKind::App, id: id.0 }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Balance-bearing view of a user row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// User id
    pub id: UserId,
    /// Display name
    pub username: String,
    /// Spendable coins, never negative
    pub coins: i64,
    /// Experience points, never decreasing
    pub exp: i64,
    /// Always `level_for_exp(exp)`
    pub user_level: i32,
    /// Privilege level (moderators and reviewers sit above regular users)
    pub role_level: i32,
}

/// Tippable entity as seen under lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TippableEntity {
    /// Which entity
    pub target: EntityRef,
    /// Author who receives tips; apps have none
    pub author: Option<UserId>,
    /// Total coins received so far
    pub coins: i64,
}

/// Daily check-in claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInClaim {
    /// Claiming user
    pub user: UserId,
    /// Calendar date; unique together with `user`
    pub check_date: chrono::NaiveDate,
    /// Wall-clock time of the claim
    pub check_time: DateTime<Utc>,
    /// Coins granted
    pub reward: i64,
}

/// Upload task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Awaiting review
    Pending,
    /// Published as an app version
    Approved,
    /// Declined with a reason
    Rejected,
}

impl TaskStatus {
    /// Column value
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }

    /// Parse a column value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "approved" => Some(TaskStatus::Approved),
            "rejected" => Some(TaskStatus::Rejected),
            _ => None,
        }
    }

    /// Approved and rejected tasks never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive app fields copied from a task onto the app row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppListing {
    pub package_name: String,
    pub name: String,
    pub icon_url: String,
    pub description: String,
    pub main_category: String,
    pub sub_category: String,
    pub channel: Channel,
    pub share_desc: String,
    pub developer_name: String,
    pub ad_level: AdLevel,
    pub payment_type: PaymentType,
    pub operation_type: OperationType,
}

/// Metadata of one app-version upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSubmission {
    /// Fields that end up on the app row
    #[serde(flatten)]
    pub listing: AppListing,
    pub version: String,
    pub version_code: i64,
    /// Package size in bytes
    pub size: i64,
    pub download_url: String,
    pub update_content: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

/// Persisted upload task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionTask {
    pub id: TaskId,
    pub submitter: UserId,
    #[serde(flatten)]
    pub submission: AppSubmission,
    pub status: TaskStatus,
    /// Present iff `status == Rejected`
    pub reject_reason: Option<String>,
    pub reviewer: Option<UserId>,
    pub review_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Version row written by an approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppVersion {
    pub app_id: AppId,
    pub package_name: String,
    pub version: String,
    pub version_code: i64,
    pub size: i64,
    pub download_url: String,
    pub update_content: String,
    pub screenshots: Vec<String>,
    pub uploader_id: UserId,
    pub uploader_name: String,
}

/// Stored app version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub id: VersionId,
    #[serde(flatten)]
    pub version: NewAppVersion,
    pub is_latest: bool,
    pub created_at: DateTime<Utc>,
}

/// Caller performing a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: UserId,
    pub role_level: i32,
}

/// Review verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Publish the uploaded version
    Accept,
    /// Decline with a reason shown to the submitter
    Reject {
        /// Must not be blank
        reason: String,
    },
}

impl ReviewDecision {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Accept => "accept",
            ReviewDecision::Reject { .. } => "reject",
        }
    }
}
