//! End-to-end review pipeline scenarios against the in-memory store

use economy_core::{
    taxonomy::{AdLevel, Channel, OperationType, PaymentType},
    AppListing, AppSubmission, EconomyConfig, Error, FaultPoint, MemoryState, MemoryStore,
    ReviewDecision, ReviewQueue, Reviewer, TaskId, TaskStatus, UserId,
};

const REVIEWER: Reviewer = Reviewer {
    id: UserId(100),
    role_level: 80,
};

fn queue() -> ReviewQueue<MemoryStore> {
    let store = MemoryStore::new(
        MemoryState::default()
            .with_account(1, "alice", 0)
            .with_account(2, "bob", 0)
            .with_role(100, "reviewer", 0, 80),
    );
    ReviewQueue::new(store, EconomyConfig::default()).unwrap()
}

fn upload(version: &str, version_code: i64) -> AppSubmission {
    AppSubmission {
        listing: AppListing {
            package_name: "org.example.reader".into(),
            name: format!("Reader {}", version),
            icon_url: "https://cdn.example.com/reader.png".into(),
            description: "RSS reader".into(),
            main_category: "News".into(),
            sub_category: "Information".into(),
            channel: Channel::International,
            share_desc: "Read feeds".into(),
            developer_name: "Example Org".into(),
            ad_level: AdLevel::None,
            payment_type: PaymentType::Free,
            operation_type: OperationType::OpenSource,
        },
        version: version.into(),
        version_code,
        size: 4_200_000,
        download_url: format!("https://cdn.example.com/reader-{}.apk", version),
        update_content: format!("Release {}", version),
        screenshots: vec!["https://cdn.example.com/reader-1.png".into()],
    }
}

async fn submit(queue: &ReviewQueue<MemoryStore>, user: i64, version: &str, code: i64) -> TaskId {
    queue
        .submit(UserId(user), upload(version, code))
        .await
        .unwrap()
        .task_id
}

#[tokio::test]
async fn test_second_approval_replaces_latest() {
    let queue = queue();
    let first = submit(&queue, 1, "1.0", 10).await;
    let second = submit(&queue, 2, "1.1", 11).await;

    let outcome = queue
        .review(REVIEWER, first, ReviewDecision::Accept)
        .await
        .unwrap();
    let app_id = outcome.published.unwrap().app_id;

    let outcome = queue
        .review(REVIEWER, second, ReviewDecision::Accept)
        .await
        .unwrap();
    let published = outcome.published.unwrap();
    assert_eq!(published.app_id, app_id);
    assert!(!published.app_created);

    let state = queue.store().snapshot().await;
    assert_eq!(state.app_count(), 1);
    assert_eq!(
        state.app_by_package("org.example.reader").unwrap().listing.name,
        "Reader 1.1"
    );

    let versions = state.versions_of(app_id);
    assert_eq!(versions.len(), 2);
    let latest: Vec<_> = versions.iter().filter(|v| v.is_latest).collect();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version.version, "1.1");
    assert_eq!(latest[0].version.uploader_name, "bob");
}

#[tokio::test]
async fn test_rejected_upload_publishes_nothing() {
    let queue = queue();
    let task = submit(&queue, 1, "1.0", 10).await;

    queue
        .review(
            REVIEWER,
            task,
            ReviewDecision::Reject {
                reason: "Download link returns 404".into(),
            },
        )
        .await
        .unwrap();

    let err = queue
        .review(REVIEWER, task, ReviewDecision::Accept)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AlreadyReviewed {
            status: TaskStatus::Rejected,
            ..
        }
    ));

    let state = queue.store().snapshot().await;
    assert_eq!(state.app_count(), 0);
}

#[tokio::test]
async fn test_failed_version_insert_rolls_back_approval() {
    let queue = queue();
    let task = submit(&queue, 1, "1.0", 10).await;

    queue.store().fail_on(FaultPoint::InsertVersion);
    let err = queue
        .review(REVIEWER, task, ReviewDecision::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    let state = queue.store().snapshot().await;
    assert_eq!(state.task(task).unwrap().status, TaskStatus::Pending);
    assert!(state.task(task).unwrap().reviewer.is_none());
    assert_eq!(state.app_count(), 0);

    queue.store().clear_fault();
    let outcome = queue
        .review(REVIEWER, task, ReviewDecision::Accept)
        .await
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Approved);
}

#[tokio::test]
async fn test_failed_update_keeps_previous_latest() {
    let queue = queue();
    let first = submit(&queue, 1, "1.0", 10).await;
    let second = submit(&queue, 1, "1.1", 11).await;
    let app_id = queue
        .review(REVIEWER, first, ReviewDecision::Accept)
        .await
        .unwrap()
        .published
        .unwrap()
        .app_id;

    queue.store().fail_on(FaultPoint::SaveReview);
    queue
        .review(REVIEWER, second, ReviewDecision::Accept)
        .await
        .unwrap_err();

    let state = queue.store().snapshot().await;
    let versions = state.versions_of(app_id);
    assert_eq!(versions.len(), 1);
    assert!(versions[0].is_latest);
    assert_eq!(
        state.app_by_package("org.example.reader").unwrap().listing.name,
        "Reader 1.0"
    );
}

#[tokio::test]
async fn test_racing_reviewers_single_verdict() {
    let queue = queue();
    let task = submit(&queue, 1, "1.0", 10).await;

    let (accept, reject) = tokio::join!(
        queue.review(REVIEWER, task, ReviewDecision::Accept),
        queue.review(
            REVIEWER,
            task,
            ReviewDecision::Reject {
                reason: "duplicate".into()
            }
        ),
    );

    assert!(accept.is_ok() ^ reject.is_ok());
    let loser = accept.err().or(reject.err()).unwrap();
    assert!(matches!(loser, Error::AlreadyReviewed { .. }));
}
