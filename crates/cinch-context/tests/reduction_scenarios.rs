//! End-to-end reduction scenarios.
//!
//! Reducers are built the way an application builds them: through the
//! factory or the public constructors, with a closure-backed executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cinch_context::context::eviction::EVICTED_PREFIX;
use cinch_context::context::sanitize::is_paired;
use cinch_context::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Executor that counts calls and records the options it was given.
fn recording_executor(
    reply: &'static str,
) -> (Arc<FnExecutor>, Arc<AtomicUsize>, Arc<Mutex<Vec<ExecutionOptions>>>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let executor = {
        let calls = calls.clone();
        let seen = seen.clone();
        FnExecutor::new(move |_prompt, options| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(options);
            async move { Ok(reply.to_string()) }
        })
    };
    (Arc::new(executor), calls, seen)
}

fn alternating(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("message {i}"))
            } else {
                Message::assistant(format!("message {i}"))
            }
        })
        .collect()
}

fn texts(messages: &[Message]) -> Vec<String> {
    messages.iter().filter_map(Message::text).collect()
}

// ── Deterministic strategies ─────────────────────────────────────────

#[tokio::test]
async fn message_counting_keeps_last_ten() {
    init_tracing();
    let (executor, calls, _) = recording_executor("unused");
    let config = CompressionConfig::default().with_message_threshold(10);
    let reducer = ReducerFactory::new(Arc::new(config), executor).build(ReducerKind::MessageCounting);

    let messages = alternating(20);
    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reduced.as_slice(), &messages[10..]);
    assert!(reduced.iter().all(|m| !m.is_system()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn keyword_aware_keeps_the_order_message() {
    init_tracing();
    let (executor, _, _) = recording_executor("unused");
    let config = CompressionConfig::default()
        .with_message_threshold(6)
        .with_keyword("order");
    let reducer =
        ReducerFactory::new(Arc::new(config), executor).build_named("keyword-aware").unwrap();

    let mut messages = vec![Message::system("You are a shop assistant.")];
    for i in 0..14 {
        if i == 2 {
            messages.push(Message::user("Where is my ORDER #4411?"));
        } else {
            messages.push(Message::user(format!("chat {i}")));
        }
    }

    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reduced.len(), 6);
    assert_eq!(
        texts(&reduced),
        vec![
            "You are a shop assistant.",
            "Where is my ORDER #4411?",
            "chat 10",
            "chat 11",
            "chat 12",
            "chat 13",
        ]
    );
}

#[tokio::test]
async fn counting_output_never_leaves_dangling_tool_results() {
    let (executor, _, _) = recording_executor("unused");
    let config = CompressionConfig::default().with_message_threshold(3);
    let reducer = ReducerFactory::new(Arc::new(config), executor).build(ReducerKind::MessageCounting);

    let messages = vec![
        Message::user("list the crates"),
        Message::tool_call("call_1", "list_dir", r#"{"path":"crates"}"#),
        Message::tool_result("call_1", "cinch-context"),
        Message::assistant("There is one crate."),
        Message::user("thanks"),
    ];
    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reduced.len(), 3);
    assert!(is_paired(&reduced));
    assert!(reduced[0].text().unwrap().contains("call_1"));
}

// ── Model-backed strategies ──────────────────────────────────────────

#[tokio::test]
async fn summary_requests_skip_compression() {
    init_tracing();
    let (executor, calls, seen) = recording_executor("  the user asked about crates  ");
    let config = CompressionConfig::default()
        .with_message_threshold(9)
        .with_summary_model("small-model");
    let reducer = ReducerFactory::new(Arc::new(config), executor).build(ReducerKind::Summarizing);

    let mut messages = vec![Message::system("sys")];
    messages.extend(alternating(12));
    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let options = seen.lock().unwrap()[0].clone();
    assert!(options.skip_compression);
    assert_eq!(options.model.as_deref(), Some("small-model"));

    // system + summary + the three most recent.
    assert_eq!(reduced.len(), 5);
    assert_eq!(reduced[0].text().unwrap(), "sys");
    assert_eq!(
        reduced[1].text().unwrap(),
        "[Conversation Summary]: the user asked about crates"
    );
    assert_eq!(reduced[4].text().unwrap(), "message 11");
}

#[tokio::test]
async fn failed_summary_degrades_to_placeholder() {
    let executor = Arc::new(FnExecutor::new(|_, _| async {
        Err::<String, _>("rate limited".to_string())
    }));
    let config = CompressionConfig::default().with_message_threshold(6);
    let reducer = ReducerFactory::new(Arc::new(config), executor).build(ReducerKind::Summarizing);

    let reduced = reducer
        .reduce(&alternating(10), &CancellationToken::new())
        .await
        .unwrap();

    let summary = reduced[0].text().unwrap();
    assert!(summary.contains("[Summary unavailable: rate limited]"));
}

#[tokio::test]
async fn cancellation_interrupts_a_hanging_summary() {
    let executor = Arc::new(FnExecutor::new(|_, _| {
        std::future::pending::<Result<String, String>>()
    }));
    let config = CompressionConfig::default().with_message_threshold(6);
    let reducer = ReducerFactory::new(Arc::new(config), executor).build(ReducerKind::Summarizing);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        reducer.reduce(&alternating(10), &cancel),
    )
    .await
    .expect("reduction should observe cancellation");
    assert_eq!(result, Err(ReduceError::Cancelled));
}

// ── Three-zone ───────────────────────────────────────────────────────

const CONTEXT: usize = 10_000;

fn three_zone(executor: Arc<FnExecutor>, tokens: usize) -> ThreeZoneReducer {
    let config = CompressionConfig::default().with_token_threshold(CONTEXT);
    ThreeZoneReducer::new(Arc::new(config), executor)
        .with_estimator(Arc::new(move |_: &[Message]| tokens))
}

#[tokio::test]
async fn three_zone_pre_compression_keeps_every_message() {
    init_tracing();
    let (executor, calls, _) = recording_executor("unused");
    let reducer = three_zone(executor, 7_000);

    let mut messages = vec![
        Message::user("Refactor the parser"),
        Message::tool_call("call_1", "read_file", r#"{"path":"src/parser.rs"}"#),
        Message::tool_result("call_1", "fn parse() {}\n".repeat(300)),
    ];
    messages.extend(alternating(8));

    let (stage, _) = reducer.assess(&messages);
    assert_eq!(stage, CompressionStage::PreCompression);

    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reduced.len(), messages.len());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(reduced[2].result_ids().collect::<Vec<_>>(), vec!["call_1"]);
    match &reduced[2].content[0] {
        ContentBlock::FunctionResult { result, .. } => assert!(result.starts_with(EVICTED_PREFIX)),
        other => panic!("unexpected block {other:?}"),
    }
}

#[tokio::test]
async fn three_zone_full_compression_keeps_task_and_tool_pair() {
    init_tracing();
    let (executor, calls, _) = recording_executor("Parser refactor is half done.");
    let reducer = three_zone(executor, 8_500);

    let mut messages = vec![Message::user("Refactor the parser")];
    for i in 1..30 {
        let msg = match i {
            10 => Message::tool_call("call_early", "grep", r#"{"pattern":"parse"}"#),
            11 => Message::tool_result("call_early", "src/parser.rs:12"),
            25 => Message::tool_call("call_late", "run_tests", "{}"),
            26 => Message::tool_result("call_late", "3 passed"),
            i if i % 2 == 0 => Message::user(format!("step {i}")),
            i => Message::assistant(format!("step {i}")),
        };
        messages.push(msg);
    }
    assert_eq!(messages.len(), 30);

    let reduced = reducer
        .reduce(&messages, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Zone A, the summary, then the last six messages.
    assert_eq!(reduced.len(), 8);
    assert_eq!(reduced[0], messages[0]);
    let summary = reduced[1].text().unwrap();
    assert!(summary.starts_with("[Compressed 23 earlier messages]"));
    assert!(summary.contains("Parser refactor is half done."));
    assert_eq!(&reduced[2..], &messages[24..]);
    assert!(is_paired(&reduced));
}

// ── Composition ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_reductions_share_one_monitored_reducer() {
    init_tracing();
    let (executor, _, _) = recording_executor("summary");
    let config = CompressionConfig::default().with_message_threshold(8);
    let factory = ReducerFactory::new(Arc::new(config), executor);
    let reducer = Arc::new(MonitoredReducer::new(factory.build(ReducerKind::Layered)));

    let histories: Vec<Vec<Message>> = (0..8).map(|n| alternating(16 + n)).collect();
    let cancel = CancellationToken::new();
    let results = futures::future::join_all(
        histories
            .iter()
            .map(|history| reducer.reduce(history, &cancel)),
    )
    .await;

    for (history, result) in histories.iter().zip(results) {
        let reduced = result.unwrap();
        assert!(reduced.len() < history.len());
        assert_eq!(reduced.last(), history.last());
    }

    let stats = reducer.stats();
    assert_eq!(stats.runs, 8);
    assert!(stats.messages_removed > 0);
}

#[tokio::test]
async fn every_strategy_is_identity_on_short_histories() {
    let (executor, calls, _) = recording_executor("unused");
    let config = CompressionConfig::default()
        .with_message_threshold(20)
        .with_token_threshold(CONTEXT);
    let factory = ReducerFactory::new(Arc::new(config), executor);
    // The last call is still waiting for its result.
    let mut messages = alternating(4);
    messages.push(Message::tool_call("call_1", "list_dir", r#"{"path":"crates"}"#));

    for kind in ReducerKind::ALL {
        let reduced = factory
            .build(kind)
            .reduce(&messages, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reduced, messages, "{kind} changed a short history");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn config_file_selects_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compression.json");
    std::fs::write(
        &path,
        r#"{ "strategy": "three-zone", "token_count_threshold": 64000 }"#,
    )
    .unwrap();

    let config = CompressionConfig::load(&path).unwrap();
    let (executor, _, _) = recording_executor("unused");
    let factory = ReducerFactory::new(Arc::new(config), executor);
    assert_eq!(factory.build_default().name(), "three-zone");
    assert_eq!(factory.config().token_count_threshold, 64_000);
}
