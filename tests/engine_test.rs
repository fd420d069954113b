//! End-to-end behavior of the run coordinator and every node kind

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use dagflow::event::{EventKind, EventLog};
use dagflow::model::{
    loop_predicate_fn, ports, predicate_fn, reducer_fn, transform_fn, Branch, Dag, DagBuilder,
    Node, FALSE_PORT, TRUE_PORT,
};
use dagflow::resilience::RetryConfig;
use dagflow::store::{Completion, LoopStop, NodeStatus};
use dagflow::{DagflowError, NodeError, RunConfig, Runner};

// ═══════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════

fn identity(id: &str) -> Node {
    Node::execution(
        id,
        ports(["in"]),
        ports(["out"]),
        transform_fn(|v| async move { Ok(v) }),
    )
}

fn doubler(id: &str) -> Node {
    Node::execution(
        id,
        ports(["in"]),
        ports(["out"]),
        transform_fn(|v| async move { Ok(json!(v.as_i64().unwrap_or(0) * 2)) }),
    )
}

fn counting_increment(id: &str, calls: Arc<AtomicU32>) -> Node {
    Node::execution(
        id,
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |v| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!(v.as_i64().unwrap_or(0) + 1)) }
        }),
    )
}

fn sleeper(id: &str, delay: Duration, value: Value) -> Node {
    Node::execution(
        id,
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |_| {
            let value = value.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }),
    )
}

fn failing(id: &str, calls: Arc<AtomicU32>) -> Node {
    Node::execution(
        id,
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("always fails")) }
        }),
    )
}

/// Single-node DAG used as a loop body or fan-out branch
fn single(id: &str, node: Node) -> Dag {
    let node_id = node.id.to_string();
    let mut b = DagBuilder::new(id);
    b.add_node(node).unwrap();
    b.set_entry(&node_id).add_exit(&node_id);
    b.build()
}

fn fast_retries(max_retries: u32) -> RunConfig {
    RunConfig::default().with_retry(
        RetryConfig::default()
            .with_max_retries(max_retries)
            .immediate(),
    )
}

fn started(log: &EventLog, node_id: &str) -> usize {
    log.count(|k| matches!(k, EventKind::NodeStarted { node_id: id, .. } if &**id == node_id))
}

// ═══════════════════════════════════════════════════════════════
// Execution
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn execution_publishes_one_result_to_every_output() {
    let mut b = DagBuilder::new("broadcast");
    b.add_node(Node::execution(
        "gen",
        ports(["in"]),
        ports(["left", "right"]),
        transform_fn(|_| async { Ok(json!(uuid::Uuid::new_v4().to_string())) }),
    ))
    .unwrap();
    b.add_node(identity("l")).unwrap();
    b.add_node(identity("r")).unwrap();
    b.connect("gen", "left", "l", "in");
    b.connect("gen", "right", "r", "in");
    b.add_exit("l").add_exit("r");

    let output = Runner::new(b.build()).run(Value::Null).await.unwrap();
    assert_eq!(output.len(), 2);
    assert_eq!(output.get("l"), output.get("r"));
    assert!(output.get("l").unwrap().is_string());
}

#[tokio::test]
async fn several_inputs_arrive_as_ordered_record() {
    let mut b = DagBuilder::new("record");
    b.add_node(sleeper("slow", Duration::from_millis(20), json!("s"))).unwrap();
    b.add_node(sleeper("fast", Duration::ZERO, json!("f"))).unwrap();
    b.add_node(Node::execution(
        "join",
        ports(["second", "first"]),
        ports(["out"]),
        transform_fn(|v| async move {
            let keys: Vec<String> = v
                .as_object()
                .map(|o| o.keys().cloned().collect())
                .unwrap_or_default();
            Ok(json!({"keys": keys, "value": v}))
        }),
    ))
    .unwrap();
    b.connect("slow", "out", "join", "second");
    b.connect("fast", "out", "join", "first");
    b.add_exit("join");

    let output = Runner::new(b.build()).run(Value::Null).await.unwrap().into_value();
    assert_eq!(output["keys"], json!(["second", "first"]));
    assert_eq!(output["value"], json!({"second": "s", "first": "f"}));
}

#[tokio::test]
async fn ready_siblings_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let mut b = DagBuilder::new("siblings");
    for id in ["a", "b"] {
        let barrier = Arc::clone(&barrier);
        b.add_node(Node::execution(
            id,
            ports(["in"]),
            ports(["out"]),
            transform_fn(move |v| {
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    Ok(v)
                }
            }),
        ))
        .unwrap();
    }

    let runner = Runner::new(b.build());
    let run = runner.run(json!(1));
    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("siblings were serialized")
        .unwrap();
    assert_eq!(output.into_value(), json!({"a": 1, "b": 1}));
}

// ═══════════════════════════════════════════════════════════════
// Conditional
// ═══════════════════════════════════════════════════════════════

fn branching() -> Dag {
    let mut b = DagBuilder::new("branch");
    b.add_node(Node::conditional(
        "check",
        ports(["in"]),
        predicate_fn(|v| async move { Ok(v.as_i64().unwrap_or(0) > 10) }),
    ))
    .unwrap();
    b.add_node(identity("big")).unwrap();
    b.add_node(identity("small")).unwrap();
    b.add_node(identity("after_small")).unwrap();
    b.connect("check", TRUE_PORT, "big", "in");
    b.connect("check", FALSE_PORT, "small", "in");
    b.connect("small", "out", "after_small", "in");
    b.set_entry("check").add_exit("big").add_exit("after_small");
    b.build()
}

#[tokio::test]
async fn conditional_publishes_to_exactly_one_port() {
    let cases = [
        (json!(42), true, "big", "small"),
        (json!(3), false, "small", "big"),
    ];
    for (input, taken, ran, skipped) in cases {
        let log = EventLog::new();
        let runner = Runner::new(branching()).with_emitter(log.clone());
        let report = runner.run_detailed(input.clone()).await;
        assert!(report.is_success(), "{:?}", report.outcome.as_ref().err());

        assert_eq!(started(&log, ran), 1);
        assert_eq!(started(&log, skipped), 0);
        assert_eq!(report.results.status(skipped), NodeStatus::Skipped);
        assert_eq!(
            report.results.get("check").unwrap().completion,
            Some(Completion::Branch { taken })
        );
        assert_eq!(report.results.get_output(ran).as_deref(), Some(&input));
    }
}

#[tokio::test]
async fn skip_cascades_through_silenced_chain() {
    let report = Runner::new(branching()).run_detailed(json!(99)).await;
    let output = report.outcome.unwrap();
    assert_eq!(report.results.status("after_small"), NodeStatus::Skipped);
    // Skipped exits are not missing, they just contribute no value
    assert_eq!(output.len(), 1);
    assert_eq!(output.get("big"), Some(&json!(99)));
}

#[tokio::test]
async fn node_with_one_live_input_still_runs() {
    let mut b = DagBuilder::new("merge");
    b.add_node(Node::conditional(
        "check",
        ports(["in"]),
        predicate_fn(|_| async { Ok(true) }),
    ))
    .unwrap();
    b.add_node(Node::execution(
        "join",
        ports(["yes", "no"]),
        ports(["out"]),
        transform_fn(|v| async move { Ok(v) }),
    ))
    .unwrap();
    b.connect("check", TRUE_PORT, "join", "yes");
    b.connect("check", FALSE_PORT, "join", "no");
    b.set_entry("check").add_exit("join");

    let output = Runner::new(b.build()).run(json!("v")).await.unwrap();
    assert_eq!(output.into_value(), json!({"yes": "v", "no": null}));
}

// ═══════════════════════════════════════════════════════════════
// Loop
// ═══════════════════════════════════════════════════════════════

fn looping(calls: Arc<AtomicU32>, predicate: bool, max: Option<u32>) -> Dag {
    let mut b = DagBuilder::new("looping");
    b.add_node(Node::looping(
        "repeat",
        ports(["in"]),
        ports(["out"]),
        single("body", counting_increment("inc", calls)),
        loop_predicate_fn(move |_, _| async move { Ok(predicate) }),
        max,
    ))
    .unwrap();
    b.set_entry("repeat").add_exit("repeat");
    b.build()
}

#[tokio::test]
async fn loop_false_from_start_passes_input_through() {
    let calls = Arc::new(AtomicU32::new(0));
    let report = Runner::new(looping(Arc::clone(&calls), false, Some(5)))
        .run_detailed(json!(7))
        .await;

    assert_eq!(report.outcome.unwrap().into_value(), json!(7));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        report.results.get("repeat").unwrap().completion,
        Some(Completion::Loop {
            iterations: 0,
            stop: LoopStop::PredicateFalse
        })
    );
}

#[tokio::test]
async fn loop_stops_at_max_iterations() {
    let calls = Arc::new(AtomicU32::new(0));
    let log = EventLog::new();
    let report = Runner::new(looping(Arc::clone(&calls), true, Some(3)))
        .with_emitter(log.clone())
        .run_detailed(json!(0))
        .await;

    assert_eq!(report.outcome.unwrap().into_value(), json!(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        report.results.get("repeat").unwrap().completion,
        Some(Completion::Loop {
            iterations: 3,
            stop: LoopStop::IterationLimitReached
        })
    );
    assert_eq!(log.count(|k| matches!(k, EventKind::LoopLimitReached { iterations: 3, .. })), 1);
}

#[tokio::test]
async fn loop_predicate_sees_carried_value_and_iteration() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let mut b = DagBuilder::new("until_five");
    b.add_node(Node::looping(
        "count",
        ports(["in"]),
        ports(["out"]),
        single("body", counting_increment("inc", Arc::new(AtomicU32::new(0)))),
        loop_predicate_fn(move |v, n| {
            record.lock().push((v.clone(), n));
            async move { Ok(v.as_i64().unwrap_or(0) < 5) }
        }),
        None,
    ))
    .unwrap();
    b.set_entry("count").add_exit("count");

    let output = Runner::new(b.build()).run(json!(3)).await.unwrap();
    assert_eq!(output.into_value(), json!(5));
    assert_eq!(*seen.lock(), vec![(json!(3), 0), (json!(4), 1), (json!(5), 2)]);
}

#[tokio::test]
async fn loop_body_failure_fails_the_loop() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut b = DagBuilder::new("broken_loop");
    b.add_node(Node::looping(
        "repeat",
        ports(["in"]),
        ports(["out"]),
        single("body", failing("inner", Arc::clone(&calls))),
        loop_predicate_fn(|_, _| async { Ok(true) }),
        Some(10),
    ))
    .unwrap();
    b.set_entry("repeat").add_exit("repeat");

    let err = Runner::new(b.build())
        .with_config(fast_retries(1))
        .run(json!(0))
        .await
        .unwrap_err();

    match err {
        DagflowError::NodeFailed {
            node_id,
            attempts,
            cause: NodeError::SubDag { node_id: inner, scope, .. },
        } => {
            assert_eq!(node_id, "repeat");
            assert_eq!(attempts, 1, "nested failures are not retried again");
            assert_eq!(inner, "inner");
            assert_eq!(scope, "repeat[0]");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Inner node retried by its own run only, second iteration never started
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn nested_events_carry_scoped_node_ids() {
    let log = EventLog::new();
    Runner::new(looping(Arc::new(AtomicU32::new(0)), true, Some(2)))
        .with_emitter(log.clone())
        .run(json!(0))
        .await
        .unwrap();

    assert_eq!(started(&log, "repeat[0]/inc"), 1);
    assert_eq!(started(&log, "repeat[1]/inc"), 1);
    assert_eq!(log.count(|k| matches!(k, EventKind::LoopIteration { .. })), 2);
}

// ═══════════════════════════════════════════════════════════════
// FanOut
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn fan_out_passthrough_and_doubled_branch() {
    let mut b = DagBuilder::new("fan");
    b.add_node(Node::fan_out(
        "split",
        ports(["in"]),
        vec![
            Branch::passthrough("b1"),
            Branch::with_body("b2", single("double", doubler("twice"))),
        ],
    ))
    .unwrap();
    b.add_node(identity("from_b1")).unwrap();
    b.add_node(identity("from_b2")).unwrap();
    b.connect("split", "b1", "from_b1", "in");
    b.connect("split", "b2", "from_b2", "in");
    b.set_entry("split").add_exit("from_b1").add_exit("from_b2");

    let report = Runner::new(b.build()).run_detailed(json!(5)).await;
    let output = report.outcome.unwrap();
    assert_eq!(output.get("from_b1"), Some(&json!(5)));
    assert_eq!(output.get("from_b2"), Some(&json!(10)));
    assert_eq!(
        report.results.get_output("split").as_deref(),
        Some(&json!({"b1": 5, "b2": 10}))
    );
}

#[tokio::test]
async fn fan_out_branches_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let branch = |port: &str| {
        let barrier = Arc::clone(&barrier);
        Branch::with_body(
            port,
            single(
                port,
                Node::execution(
                    "wait",
                    ports(["in"]),
                    ports(["out"]),
                    transform_fn(move |v| {
                        let barrier = Arc::clone(&barrier);
                        async move {
                            barrier.wait().await;
                            Ok(v)
                        }
                    }),
                ),
            ),
        )
    };
    let mut b = DagBuilder::new("parallel_fan");
    b.add_node(Node::fan_out("split", ports(["in"]), vec![branch("x"), branch("y")]))
        .unwrap();
    b.set_entry("split").add_exit("split");

    let runner = Runner::new(b.build());
    let run = runner.run(json!("go"));
    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("branches were serialized")
        .unwrap();
    assert_eq!(output.into_value(), json!({"x": "go", "y": "go"}));
}

#[tokio::test]
async fn fan_out_branch_failure_fails_node() {
    let mut b = DagBuilder::new("bad_fan");
    b.add_node(Node::fan_out(
        "split",
        ports(["in"]),
        vec![
            Branch::with_body(
                "slow",
                single("slow", sleeper("nap", Duration::from_secs(30), json!(1))),
            ),
            Branch::with_body("bad", single("bad", failing("boom", Arc::new(AtomicU32::new(0))))),
        ],
    ))
    .unwrap();
    b.set_entry("split").add_exit("split");

    let runner = Runner::new(b.build());
    let run = runner.run(json!(1));
    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("slow branch was not cancelled")
        .unwrap_err();
    assert_eq!(err.failed_node(), Some("split"));
}

// ═══════════════════════════════════════════════════════════════
// Aggregator
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn aggregator_reduces_in_port_order_not_arrival_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    let mut b = DagBuilder::new("agg");
    b.add_node(sleeper("late_b", Duration::from_millis(50), json!("b"))).unwrap();
    b.add_node(sleeper("early_a", Duration::ZERO, json!("a"))).unwrap();
    b.add_node(Node::aggregator(
        "collect",
        ports(["p1", "p2"]),
        ports(["out"]),
        reducer_fn(move |values| {
            record.lock().push(values.clone());
            async move { Ok(Value::Array(values)) }
        }),
    ))
    .unwrap();
    b.connect("late_b", "out", "collect", "p1");
    b.connect("early_a", "out", "collect", "p2");
    b.add_exit("collect");

    let log = EventLog::new();
    let output = Runner::new(b.build())
        .with_emitter(log.clone())
        .run(Value::Null)
        .await
        .unwrap();

    assert_eq!(output.into_value(), json!(["b", "a"]));
    assert_eq!(*seen.lock(), vec![vec![json!("b"), json!("a")]]);
    let collecting = log.count(|k| {
        matches!(
            k,
            EventKind::AggregatorCollecting { received: 1, expected: 2, .. }
        )
    });
    assert!(collecting >= 1);
}

// ═══════════════════════════════════════════════════════════════
// Failures, retries, cancellation, timeouts
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn failing_node_is_invoked_max_retries_plus_one_times() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut b = DagBuilder::new("flaky");
    b.add_node(failing("flaky", Arc::clone(&calls))).unwrap();

    let log = EventLog::new();
    let err = Runner::new(b.build())
        .with_config(fast_retries(3))
        .with_emitter(log.clone())
        .run(Value::Null)
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(err.failed_node(), Some("flaky"));
    assert!(matches!(err, DagflowError::NodeFailed { attempts: 4, .. }));
    assert_eq!(log.count(|k| matches!(k, EventKind::NodeRetrying { .. })), 3);
    assert_eq!(err.code(), "DAGFLOW-020");
}

#[tokio::test]
async fn transient_failure_recovers_with_same_inputs() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let calls = Arc::new(AtomicU32::new(0));
    let mut b = DagBuilder::new("transient");
    b.add_node(Node::execution(
        "once_bad",
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |v| {
            record.lock().push(v.clone());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(v)
                }
            }
        }),
    ))
    .unwrap();

    let report = Runner::new(b.build())
        .with_config(fast_retries(2))
        .run_detailed(json!({"k": 1}))
        .await;
    assert_eq!(report.outcome.unwrap().into_value(), json!({"k": 1}));
    assert_eq!(report.results.get("once_bad").unwrap().attempts, 2);
    assert_eq!(*seen.lock(), vec![json!({"k": 1}), json!({"k": 1})]);
}

#[tokio::test]
async fn sibling_failure_cancels_in_flight_and_stops_dispatch() {
    let mut b = DagBuilder::new("abort");
    b.add_node(sleeper("slow", Duration::from_secs(30), json!(1))).unwrap();
    b.add_node(identity("after_slow")).unwrap();
    b.add_node(failing("bad", Arc::new(AtomicU32::new(0)))).unwrap();
    b.connect("slow", "out", "after_slow", "in");

    let log = EventLog::new();
    let runner = Runner::new(b.build()).with_emitter(log.clone());
    let report = tokio::time::timeout(Duration::from_secs(5), runner.run_detailed(Value::Null))
        .await
        .expect("in-flight node was not cancelled");

    let err = report.outcome.unwrap_err();
    assert_eq!(err.failed_node(), Some("bad"));
    assert_eq!(report.results.status("slow"), NodeStatus::Cancelled);
    assert_eq!(report.results.status("after_slow"), NodeStatus::Pending);
    assert_eq!(started(&log, "after_slow"), 0);
}

#[tokio::test]
async fn run_timeout_cancels_the_run() {
    let mut b = DagBuilder::new("too_slow");
    b.add_node(sleeper("nap", Duration::from_secs(30), json!(1))).unwrap();

    let err = Runner::new(b.build())
        .with_config(RunConfig::default().with_timeout_ms(50))
        .run(Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, DagflowError::RunTimeout { timeout_ms: 50 }));
}

#[tokio::test]
async fn node_timeout_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut b = DagBuilder::new("hangs_once");
    b.add_node(Node::execution(
        "hang",
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |v| {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(v)
            }
        }),
    ))
    .unwrap();

    let config = fast_retries(1).with_node_timeout_ms(30);
    let output = Runner::new(b.build())
        .with_config(config)
        .run(json!("done"))
        .await
        .unwrap();
    assert_eq!(output.into_value(), json!("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn external_cancellation_stops_the_run() {
    let mut b = DagBuilder::new("cancel_me");
    b.add_node(sleeper("nap", Duration::from_secs(30), json!(1))).unwrap();
    let runner = Runner::new(b.build());
    let token = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), runner.run(Value::Null))
        .await
        .expect("cancellation was ignored")
        .unwrap_err();
    assert!(matches!(err, DagflowError::Cancelled { .. }));
    assert_eq!(err.code(), "DAGFLOW-030");
}

#[tokio::test]
async fn panicking_behavior_fails_the_run() {
    let mut b = DagBuilder::new("panics");
    b.add_node(Node::execution(
        "oops",
        ports(["in"]),
        ports(["out"]),
        transform_fn(|v| async move {
            if v.is_null() {
                panic!("kaboom");
            }
            Ok(v)
        }),
    ))
    .unwrap();

    let err = Runner::new(b.build()).run(Value::Null).await.unwrap_err();
    match err {
        DagflowError::NodePanicked { node_id, details } => {
            assert_eq!(node_id, "oops");
            assert!(details.contains("kaboom"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn panic_on_retry_reports_every_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut b = DagBuilder::new("fails_then_panics");
    b.add_node(Node::execution(
        "shaky",
        ports(["in"]),
        ports(["out"]),
        transform_fn(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n > 0 {
                    panic!("second attempt blew up");
                }
                Err(anyhow::anyhow!("first attempt failed"))
            }
        }),
    ))
    .unwrap();

    let log = EventLog::new();
    let report = Runner::new(b.build())
        .with_config(fast_retries(3))
        .with_emitter(log.clone())
        .run_detailed(Value::Null)
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(matches!(
        report.outcome,
        Err(DagflowError::NodePanicked { ref node_id, .. }) if node_id == "shaky"
    ));
    assert_eq!(report.results.get("shaky").unwrap().attempts, 2);
    let failed_after_two = log.count(|k| {
        matches!(k, EventKind::NodeFailed { node_id, attempts: 2, .. } if &**node_id == "shaky")
    });
    assert_eq!(failed_after_two, 1);
}

// ═══════════════════════════════════════════════════════════════
// Seeding, exits, isolation
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn unreachable_exit_is_reported() {
    let mut b = DagBuilder::new("island");
    b.add_node(identity("start")).unwrap();
    b.add_node(identity("elsewhere")).unwrap();
    b.set_entry("start").add_exit("elsewhere");

    let err = Runner::new(b.build()).run(json!(1)).await.unwrap_err();
    match err {
        DagflowError::ExitNotReached { missing } => assert_eq!(missing, vec!["elsewhere"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn entry_with_incoming_connection_is_rejected_before_running() {
    let mut b = DagBuilder::new("fed_entry");
    b.add_node(identity("upstream")).unwrap();
    b.add_node(identity("start")).unwrap();
    b.connect("upstream", "out", "start", "in");
    b.set_entry("start").add_exit("start");

    let log = EventLog::new();
    let runner = Runner::new(b.build()).with_emitter(log.clone());
    let err = runner.run(json!(1)).await.unwrap_err();
    assert_eq!(err.code(), "DAGFLOW-010");
    assert!(err.to_string().contains("DAGFLOW-018"), "{err}");
    assert_eq!(started(&log, "start"), 0);
    assert_eq!(started(&log, "upstream"), 0);
}

#[tokio::test]
async fn without_entry_every_root_gets_the_input() {
    let mut b = DagBuilder::new("roots");
    b.add_node(identity("r1")).unwrap();
    b.add_node(doubler("r2")).unwrap();

    let output = Runner::new(b.build()).run(json!(4)).await.unwrap();
    assert_eq!(output.into_value(), json!({"r1": 4, "r2": 8}));
}

#[tokio::test]
async fn concurrent_runs_share_no_state() {
    let mut b = DagBuilder::new("shared");
    b.add_node(Node::execution(
        "slow_double",
        ports(["in"]),
        ports(["out"]),
        transform_fn(|v| async move {
            let n = v.as_i64().unwrap_or(0);
            // The smaller input finishes last, interleaving the two runs
            tokio::time::sleep(Duration::from_millis(if n < 10 { 40 } else { 5 })).await;
            Ok(json!(n * 2))
        }),
    ))
    .unwrap();
    b.add_node(doubler("twice")).unwrap();
    b.connect("slow_double", "out", "twice", "in");
    b.set_entry("slow_double").add_exit("twice");

    let runner = Runner::new(b.build());
    let (first, second) = tokio::join!(runner.run(json!(1)), runner.run(json!(21)));
    assert_eq!(first.unwrap().into_value(), json!(4));
    assert_eq!(second.unwrap().into_value(), json!(84));
}
