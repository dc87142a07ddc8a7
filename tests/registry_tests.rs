//! Concurrency tests for the elicitation registry.

use std::time::Duration;

use serde_json::json;

use elicit_relay::elicitation::{ElicitationOutcome, ElicitationRegistry};
use elicit_relay::types::{ElicitationId, SessionId};

#[tokio::test]
async fn concurrent_waiters_each_get_their_own_answer() {
    let registry = ElicitationRegistry::new();
    let session = SessionId::new();

    let mut waiters = Vec::new();
    let mut ids = Vec::new();
    for n in 0..32 {
        let id = ElicitationId::generate(&session);
        let handle = registry.register(id.clone(), format!("question {n}"), None).unwrap();
        ids.push(id);
        waiters.push(tokio::spawn(handle.wait(Duration::from_secs(5))));
    }
    assert_eq!(registry.len(), 32);

    let answerers: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(n, id)| {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.resolve(id.as_str(), json!(n)) })
        })
        .collect();
    for answerer in answerers {
        assert!(answerer.await.unwrap());
    }

    for (n, waiter) in waiters.into_iter().enumerate() {
        assert_eq!(waiter.await.unwrap(), ElicitationOutcome::Answered(json!(n)));
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn only_one_resolution_wins() {
    let registry = ElicitationRegistry::new();
    let id = ElicitationId::generate(&SessionId::new());
    let handle = registry.register(id.clone(), "Title?", None).unwrap();

    let racers: Vec<_> = (0..8)
        .map(|n| {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move {
                if n % 2 == 0 {
                    registry.resolve(id.as_str(), json!(n))
                } else {
                    registry.cancel(id.as_str())
                }
            })
        })
        .collect();

    let mut wins = 0;
    for racer in racers {
        if racer.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    let outcome = handle.wait(Duration::from_secs(1)).await;
    assert_ne!(outcome, ElicitationOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn timeout_removes_entry_and_late_answer_is_rejected() {
    let registry = ElicitationRegistry::new();
    let id = ElicitationId::generate(&SessionId::new());
    let handle = registry.register(id.clone(), "Title?", None).unwrap();

    let outcome = handle.wait(Duration::from_secs(300)).await;

    assert_eq!(outcome, ElicitationOutcome::TimedOut);
    assert!(outcome.is_cancellation());
    assert!(!registry.contains(id.as_str()));
    assert!(!registry.resolve(id.as_str(), json!("late")));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let registry = ElicitationRegistry::new();
    let id = ElicitationId::from("chat_1_fixed");
    let _first = registry.register(id.clone(), "one", None).unwrap();
    assert!(registry.register(id, "two", None).is_err());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn cancel_all_wakes_every_waiter() {
    let registry = ElicitationRegistry::new();
    let session = SessionId::new();
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let handle = registry
                .register(ElicitationId::generate(&session), "Who?", Some(json!({"enum": ["a"]})))
                .unwrap();
            tokio::spawn(handle.wait(Duration::from_secs(60)))
        })
        .collect();

    assert_eq!(registry.pending().len(), 4);
    assert_eq!(registry.cancel_all(), 4);
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), ElicitationOutcome::Cancelled);
    }
    assert!(registry.is_empty());
}

#[test]
fn dropped_handle_deregisters() {
    let registry = ElicitationRegistry::new();
    let id = ElicitationId::generate(&SessionId::new());
    let handle = registry.register(id.clone(), "Title?", None).unwrap();
    drop(handle);
    assert!(!registry.contains(id.as_str()));
}
