//! Property-based tests for economy invariants
//!
//! These tests use proptest to verify:
//! - Level consistency: every exp value falls inside its level's range
//! - Balance non-negativity and coin conservation over random tip sequences
//! - App tips debit the payer by exactly what the app receives
//! - Single latest version per app over random review sequences

use economy_core::{
    level::{exp_floor, exp_for_next_level},
    taxonomy::{AdLevel, Channel, OperationType, PaymentType},
    AppId, AppListing, AppSubmission, EconomyConfig, EntityRef, Ledger, LevelProgress, MemoryState,
    MemoryStore, ReviewDecision, ReviewQueue, Reviewer, TaskStatus, UserId,
};
use proptest::prelude::*;

const USERS: i64 = 4;

/// Strategy for a tip: payer, post id, amount (sometimes out of range)
fn tip_strategy() -> impl Strategy<Value = (i64, i64, i64)> {
    (1..=USERS, 1..=USERS, -2i64..14)
}

/// Post `n` is written by user `n`
fn tipping_ledger(balances: &[i64]) -> Ledger<MemoryStore> {
    let mut state = MemoryState::default();
    for (i, coins) in balances.iter().enumerate() {
        let id = i as i64 + 1;
        state = state
            .with_account(id, &format!("user{}", id), *coins)
            .with_post(id, id);
    }
    Ledger::new(MemoryStore::new(state), EconomyConfig::default()).unwrap()
}

fn upload(package: &str, version_code: i64) -> AppSubmission {
    AppSubmission {
        listing: AppListing {
            package_name: package.to_string(),
            name: package.to_string(),
            icon_url: String::new(),
            description: String::new(),
            main_category: "Tools".into(),
            sub_category: "Utilities".into(),
            channel: Channel::Official,
            share_desc: String::new(),
            developer_name: "dev".into(),
            ad_level: AdLevel::Few,
            payment_type: PaymentType::Free,
            operation_type: OperationType::OpenSource,
        },
        version: format!("1.{}", version_code),
        version_code,
        size: 10,
        download_url: format!("https://cdn.example.com/{}-{}.apk", package, version_code),
        update_content: String::new(),
        screenshots: vec![],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: exp lies in [floor(level), next(level)) and progress stays below 100%
    #[test]
    fn prop_level_consistent(exp in 0i64..5_000_000) {
        let progress = LevelProgress::of(exp);
        prop_assert!(progress.level >= 1);
        prop_assert!(exp_floor(progress.level) <= exp);
        prop_assert!(exp < exp_for_next_level(progress.level));
        prop_assert!((0..100).contains(&progress.progress_percent));
    }

    /// Property: more exp never means a lower level
    #[test]
    fn prop_level_monotonic(a in 0i64..1_000_000, b in 0i64..1_000_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(economy_core::level_for_exp(low) <= economy_core::level_for_exp(high));
    }

    /// Property: balances stay non-negative and total coins held by users never change
    #[test]
    fn prop_tips_conserve_coins(
        balances in prop::collection::vec(0i64..30, USERS as usize),
        tips in prop::collection::vec(tip_strategy(), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ledger = tipping_ledger(&balances);
            let total: i64 = balances.iter().sum();
            let mut tipped = 0;

            for (payer, post, amount) in tips {
                if ledger.transfer(UserId(payer), EntityRef::post(post), amount).await.is_ok() {
                    tipped += amount;
                }
            }

            let state = ledger.store().snapshot().await;
            let mut held = 0;
            let mut received = 0;
            for id in 1..=USERS {
                let coins = state.account(UserId(id)).unwrap().coins;
                prop_assert!(coins >= 0);
                held += coins;
                received += state.entity_coins(EntityRef::post(id)).unwrap();
            }
            prop_assert_eq!(held, total);
            prop_assert_eq!(received, tipped);
            Ok(())
        })?;
    }

    /// Property: app tips move coins out of user balances into the app total
    #[test]
    fn prop_app_tips_debit_payers(
        balances in prop::collection::vec(0i64..30, USERS as usize),
        tips in prop::collection::vec((1..=USERS, -2i64..14), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut state = MemoryState::default().with_app(100, "com.example.market");
            for (i, coins) in balances.iter().enumerate() {
                let id = i as i64 + 1;
                state = state.with_account(id, &format!("user{}", id), *coins);
            }
            let ledger = Ledger::new(MemoryStore::new(state), EconomyConfig::default()).unwrap();
            let app = EntityRef::app(AppId(100));
            let total: i64 = balances.iter().sum();

            for (payer, amount) in tips {
                let before = ledger.store().snapshot().await.account(UserId(payer)).unwrap().coins;
                match ledger.transfer(UserId(payer), app, amount).await {
                    Ok(receipt) => {
                        prop_assert_eq!(receipt.payer_coins, before - amount);
                    }
                    Err(_) => {
                        let after = ledger.store().snapshot().await.account(UserId(payer)).unwrap().coins;
                        prop_assert_eq!(after, before);
                    }
                }
            }

            let state = ledger.store().snapshot().await;
            let mut held = 0;
            for id in 1..=USERS {
                let coins = state.account(UserId(id)).unwrap().coins;
                prop_assert!(coins >= 0);
                held += coins;
            }
            prop_assert_eq!(held + state.entity_coins(app).unwrap(), total);
            Ok(())
        })?;
    }

    /// Property: after any sequence of reviews each app has exactly one latest
    /// version, and it is the most recently approved one
    #[test]
    fn prop_single_latest_version(decisions in prop::collection::vec((0usize..2, any::<bool>()), 1..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new(
                MemoryState::default()
                    .with_account(1, "dev", 0)
                    .with_role(2, "mod", 0, 100),
            );
            let queue = ReviewQueue::new(store, EconomyConfig::default()).unwrap();
            let reviewer = Reviewer { id: UserId(2), role_level: 100 };
            let packages = ["com.example.alpha", "com.example.beta"];
            let mut last_approved: [Option<String>; 2] = [None, None];

            for (i, (package, accept)) in decisions.into_iter().enumerate() {
                let submission = upload(packages[package], i as i64 + 1);
                let version = submission.version.clone();
                let task = queue.submit(UserId(1), submission).await.unwrap().task_id;

                let decision = if accept {
                    ReviewDecision::Accept
                } else {
                    ReviewDecision::Reject { reason: "incomplete".into() }
                };
                let outcome = queue.review(reviewer, task, decision).await.unwrap();
                prop_assert_eq!(outcome.published.is_some(), accept);
                if accept {
                    prop_assert_eq!(outcome.status, TaskStatus::Approved);
                    last_approved[package] = Some(version);
                }
            }

            let state = queue.store().snapshot().await;
            for (package, expected) in packages.iter().zip(last_approved.iter()) {
                match (state.app_by_package(package), expected) {
                    (Some(app), Some(expected)) => {
                        let latest: Vec<_> = state
                            .versions_of(app.id)
                            .into_iter()
                            .filter(|v| v.is_latest)
                            .collect();
                        prop_assert_eq!(latest.len(), 1);
                        prop_assert_eq!(&latest[0].version.version, expected);
                    }
                    (None, None) => {}
                    (app, expected) => {
                        prop_assert!(false, "app {:?} vs approved {:?}", app.map(|a| a.id), expected);
                    }
                }
            }
            Ok(())
        })?;
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_tip_scenario() {
        // A=5 tips a post by B; C is the post
        let ledger = tipping_ledger(&[5, 0]);
        let receipt = ledger
            .transfer(UserId(1), EntityRef::post(2), 3)
            .await
            .unwrap();
        assert_eq!(receipt.payer_coins, 2);
        assert_eq!(receipt.entity_coins, 3);

        let err = ledger
            .transfer(UserId(1), EntityRef::post(2), 3)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");

        let state = ledger.store().snapshot().await;
        assert_eq!(state.account(UserId(1)).unwrap().coins, 2);
        assert_eq!(state.account(UserId(2)).unwrap().coins, 3);
        assert_eq!(state.entity_coins(EntityRef::post(2)), Some(3));
    }

    #[tokio::test]
    async fn test_level_table() {
        let cases = [(0, 1), (99, 1), (100, 2), (399, 2), (400, 3), (899, 3), (900, 4)];
        for (exp, level) in cases {
            assert_eq!(economy_core::level_for_exp(exp), level);
        }
    }
}
