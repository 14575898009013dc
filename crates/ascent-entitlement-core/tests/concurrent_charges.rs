//! Racing charges against the last unit of headroom

mod common;

use std::sync::Arc;

use ascent_types::{ChargeOutcome, Feature, FeatureGrant, FreeUsage, Plan, Role};

use common::{active_subscription, test_user, utc, TestHarness};

/// Two requests race for the single free interview credit; the conditional
/// increment lets exactly one through.
#[tokio::test(flavor = "multi_thread")]
async fn free_counter_last_unit_goes_to_one_winner() {
    let h = TestHarness::new();
    let user_id = h.insert_free_user(utc(2024, 1, 1));
    let resolver = Arc::clone(&h.resolver);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let resolver = Arc::clone(&resolver);
        handles.push(tokio::spawn(async move {
            let decision = resolver.check(user_id, Feature::Interviews).await.unwrap();
            if !decision.has_access {
                return ChargeOutcome::LimitReached;
            }
            resolver.increment(user_id, Feature::Interviews).await.unwrap()
        }));
    }

    let mut charged = 0;
    for handle in handles {
        if handle.await.unwrap() == ChargeOutcome::Charged {
            charged += 1;
        }
    }
    assert_eq!(charged, 1);
    assert_eq!(
        h.users.get(user_id).unwrap().usage.interview_sessions_count,
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn subscription_counter_never_overshoots_its_limit() {
    let h = TestHarness::new();
    let user = test_user(Role::Pro, FreeUsage::zeroed(utc(2024, 3, 1)));
    let user_id = user.id;
    h.users.insert_user(user);

    let now = utc(2024, 3, 4);
    let mut sub = active_subscription(&h.catalog, user_id, Plan::Pro, now);
    if let Some(FeatureGrant::Counted { used, .. }) = sub.features.get_mut(Feature::JobMatches) {
        *used = 9;
    }
    let sub_id = sub.id;
    h.subscriptions.insert_subscription(sub);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&h.resolver);
        handles.push(tokio::spawn(async move {
            resolver.increment(user_id, Feature::JobMatches).await.unwrap()
        }));
    }

    let mut charged = 0;
    for handle in handles {
        if handle.await.unwrap() == ChargeOutcome::Charged {
            charged += 1;
        }
    }
    assert_eq!(charged, 1);

    match h
        .subscriptions
        .get(sub_id)
        .unwrap()
        .features
        .get(Feature::JobMatches)
    {
        Some(FeatureGrant::Counted { used, limit, .. }) => {
            assert_eq!(*used, 10);
            assert_eq!(*limit, 10);
        }
        other => panic!("unexpected grant: {other:?}"),
    }
}
