use chrono::{DateTime, Utc};
use economy_core::{
    taxonomy::{AdLevel, Channel, OperationType, PaymentType},
    AppListing, AppSubmission, Reviewer, ReviewDecision, UserId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::GatewayError;

/// Caller resolved from a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
    /// `users.level`: privilege level, not the exp-derived level
    pub role_level: i32,
}

impl AuthUser {
    pub fn as_reviewer(&self) -> Reviewer {
        Reviewer {
            id: self.id,
            role_level: self.role_level,
        }
    }
}

/// Success envelope shared by every API route
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Self {
            code: 200,
            message: message.to_string(),
            data,
        }
    }
}

/// Tip on a post or comment
#[derive(Debug, Deserialize, Serialize)]
pub struct TipRequest {
    pub amount: i64,
}

/// Tip on an app
#[derive(Debug, Deserialize, Serialize)]
pub struct AppTipRequest {
    pub coins: i64,
}

fn validate_post_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "text" | "markdown" => Ok(()),
        _ => Err(ValidationError::new("post_type")),
    }
}

/// New forum post
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreatePostRequest {
    /// Defaults to the main board
    pub board_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(rename = "type")]
    #[validate(custom = "validate_post_type")]
    pub post_type: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl CreatePostRequest {
    pub fn board_id(&self) -> i64 {
        self.board_id.filter(|id| *id > 0).unwrap_or(1)
    }

    pub fn post_type(&self) -> &str {
        self.post_type.as_deref().unwrap_or("text")
    }
}

/// Post creation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCreated {
    pub post_id: i64,
    pub exp: i64,
    pub level: i32,
}

/// App version upload
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub package_name: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub icon_url: String,
    #[validate(length(min = 1, max = 50))]
    pub version: String,
    #[validate(range(min = 1))]
    pub version_code: i64,
    #[validate(range(min = 0))]
    pub size: i64,
    pub channel: Channel,
    pub main_category: String,
    pub sub_category: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub share_desc: String,
    #[serde(default)]
    pub update_content: String,
    #[validate(length(min = 1, max = 100))]
    pub developer_name: String,
    pub ad_level: AdLevel,
    pub payment_type: PaymentType,
    pub operation_type: OperationType,
    #[validate(url)]
    pub download_url: String,
}

impl From<UploadRequest> for AppSubmission {
    fn from(request: UploadRequest) -> Self {
        AppSubmission {
            listing: AppListing {
                package_name: request.package_name,
                name: request.name,
                icon_url: request.icon_url,
                description: request.description,
                main_category: request.main_category,
                sub_category: request.sub_category,
                channel: request.channel,
                share_desc: request.share_desc,
                developer_name: request.developer_name,
                ad_level: request.ad_level,
                payment_type: request.payment_type,
                operation_type: request.operation_type,
            },
            version: request.version,
            version_code: request.version_code,
            size: request.size,
            download_url: request.download_url,
            update_content: request.update_content,
            screenshots: request.screenshots,
        }
    }
}

/// Review verdict, `accept` is 1 to approve and 0 to reject
#[derive(Debug, Deserialize, Serialize)]
pub struct ReviewRequest {
    pub task_id: i64,
    pub accept: i32,
    #[serde(default)]
    pub reject_reason: String,
}

impl ReviewRequest {
    pub fn decision(&self) -> Result<ReviewDecision, GatewayError> {
        match self.accept {
            1 => Ok(ReviewDecision::Accept),
            0 => Ok(ReviewDecision::Reject {
                reason: self.reject_reason.clone(),
            }),
            other => Err(GatewayError::Validation(format!(
                "accept must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

/// Category table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub main: String,
    pub subs: Vec<String>,
}

/// Economy event published after commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyEvent {
    pub event_id: Uuid,
    pub kind: EconomyEventKind,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl EconomyEvent {
    pub fn new(kind: EconomyEventKind, user_id: UserId, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            kind,
            user_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomyEventKind {
    CoinsTipped,
    DailyRewardClaimed,
    ExpAwarded,
    AppSubmitted,
    SubmissionReviewed,
}

impl EconomyEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EconomyEventKind::CoinsTipped => "coins_tipped",
            EconomyEventKind::DailyRewardClaimed => "daily_reward_claimed",
            EconomyEventKind::ExpAwarded => "exp_awarded",
            EconomyEventKind::AppSubmitted => "app_submitted",
            EconomyEventKind::SubmissionReviewed => "submission_reviewed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_json() -> serde_json::Value {
        serde_json::json!({
            "package_name": "com.example.todo",
            "name": "Todo",
            "icon_url": "https://cdn.example.com/todo.png",
            "version": "2.0",
            "version_code": 20,
            "size": 2048,
            "channel": "official",
            "main_category": "Productivity",
            "sub_category": "Notes",
            "developer_name": "Example",
            "ad_level": "none",
            "payment_type": "free",
            "operation_type": "indie",
            "download_url": "https://cdn.example.com/todo.apk"
        })
    }

    #[test]
    fn test_upload_request_validates() {
        let request: UploadRequest = serde_json::from_value(upload_json()).unwrap();
        assert!(request.validate().is_ok());

        let submission = AppSubmission::from(request);
        assert_eq!(submission.listing.package_name, "com.example.todo");
        assert!(submission.screenshots.is_empty());
    }

    #[test]
    fn test_upload_request_rejects_bad_url() {
        let mut json = upload_json();
        json["download_url"] = "not a url".into();
        let request: UploadRequest = serde_json::from_value(json).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_upload_request_rejects_unknown_option() {
        let mut json = upload_json();
        json["payment_type"] = "subscription".into();
        assert!(serde_json::from_value::<UploadRequest>(json).is_err());
    }

    #[test]
    fn test_review_request_decision() {
        let accept = ReviewRequest {
            task_id: 1,
            accept: 1,
            reject_reason: String::new(),
        };
        assert_eq!(accept.decision().unwrap(), ReviewDecision::Accept);

        let reject = ReviewRequest {
            task_id: 1,
            accept: 0,
            reject_reason: "blurry icon".into(),
        };
        assert_eq!(
            reject.decision().unwrap(),
            ReviewDecision::Reject {
                reason: "blurry icon".into()
            }
        );

        let bogus = ReviewRequest {
            task_id: 1,
            accept: 2,
            reject_reason: String::new(),
        };
        assert!(bogus.decision().is_err());
    }

    #[test]
    fn test_post_defaults_and_type_check() {
        let post: CreatePostRequest =
            serde_json::from_str(r#"{"title":"Hi","content":"First post"}"#).unwrap();
        assert_eq!(post.board_id(), 1);
        assert_eq!(post.post_type(), "text");
        assert!(post.validate().is_ok());

        let post: CreatePostRequest =
            serde_json::from_str(r#"{"title":"Hi","content":"x","type":"html"}"#).unwrap();
        assert!(post.validate().is_err());
    }
}
