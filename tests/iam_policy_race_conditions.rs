//! Pattern cache race condition tests
//!
//! One engine is shared between threads while its pattern cache is filled,
//! evicted and cleared underneath concurrent evaluations.

use iam_policy_engine::{Decision, EngineConfig, PolicyEngine, RequestContext};
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn shared_engine(cache_capacity: usize) -> Arc<PolicyEngine> {
    let config = EngineConfig::default().with_cache_capacity(cache_capacity);
    let engine = PolicyEngine::with_config(
        json!({"Version": "2012-10-17", "Statement": [
            {"Effect": "Allow", "Action": ["s3:Get*", "s3:List*"], "Resource": "arn:aws:s3:::bucket/*"},
            {"Effect": "Deny", "Action": "s3:*", "Resource": "arn:aws:s3:::bucket/private/*"},
            {
                "Effect": "Allow",
                "Action": "s3:PutObject",
                "Resource": "arn:aws:s3:::bucket/${aws:username}/*"
            }
        ]}),
        &config,
    )
    .unwrap();
    Arc::new(engine)
}

fn expected(action: &str, path: &str, user: &str) -> Decision {
    if path.starts_with("private/") {
        Decision::Deny
    } else if action.starts_with("s3:Get") || action.starts_with("s3:List") {
        Decision::Allow
    } else if action == "s3:PutObject" && path.starts_with(&format!("{}/", user)) {
        Decision::Allow
    } else {
        Decision::ImplicitDeny
    }
}

#[test]
fn test_concurrent_evaluations_agree() {
    let engine = shared_engine(1000);
    let actions = ["s3:GetObject", "s3:ListBucket", "s3:PutObject", "s3:DeleteObject"];
    let paths = ["public/a.txt", "private/b.txt", "alice/c.txt", "bob/d.txt"];

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let user = if worker % 2 == 0 { "alice" } else { "bob" };
                for round in 0..200 {
                    let action = actions[(worker + round) % actions.len()];
                    let path = paths[round % paths.len()];
                    let ctx = RequestContext::for_request(action, &format!("arn:aws:s3:::bucket/{}", path))
                        .with("aws:username", user);

                    assert_eq!(engine.evaluate(&ctx).unwrap(), expected(action, path, user));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_tiny_cache_under_contention() {
    // capacity 1 forces an eviction on nearly every lookup
    let engine = shared_engine(1);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..250 {
                    let ctx = RequestContext::for_request(
                        "s3:GetObject",
                        &format!("arn:aws:s3:::bucket/w{}/{}.bin", worker, i),
                    )
                    .with("aws:username", "carol");
                    assert_eq!(engine.evaluate(&ctx).unwrap(), Decision::Allow);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(engine.cache_size() <= 1);
}

#[test]
fn test_clear_cache_during_evaluation() {
    let engine = shared_engine(64);

    let evaluator = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..500 {
                let ctx = RequestContext::for_request("s3:GetObject", "arn:aws:s3:::bucket/private/key")
                    .with("aws:username", "alice");
                assert_eq!(engine.evaluate(&ctx).unwrap(), Decision::Deny);
            }
        })
    };

    let clearer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..500 {
                engine.clear_cache();
            }
        })
    };

    evaluator.join().unwrap();
    clearer.join().unwrap();
}
