//! `trace` tasks against in-memory storage and a scripted trace generator.

use std::sync::Arc;

use clovis_tasks::fakes::{MemoryStorage, ScriptedTraceGenerator};
use clovis_tasks::handlers::TRACE_COLLECTION_FAILURE;
use clovis_tasks::{
    ClovisTask, Dispatcher, TaskAction, TraceDatabase, TraceTaskHandler, DIRTY_STATE_ERROR,
};
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    storage: Arc<MemoryStorage>,
    generator: Arc<ScriptedTraceGenerator>,
    dispatcher: Dispatcher,
    _work_dir: TempDir,
}

fn fixture(instance: Option<&str>) -> Fixture {
    let work_dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("bucket"));
    let generator = Arc::new(ScriptedTraceGenerator::new());
    let handler = TraceTaskHandler::new(
        "base",
        work_dir.path(),
        storage.clone(),
        generator.clone(),
        instance,
    );
    Fixture {
        storage,
        generator,
        dispatcher: Dispatcher::new().with_handler(TaskAction::Trace, handler),
        _work_dir: work_dir,
    }
}

fn trace_task(params: serde_json::Value) -> ClovisTask {
    ClovisTask::new("trace", params)
}

#[tokio::test]
async fn traces_are_uploaded_by_outcome() {
    let mut f = fixture(None);
    f.generator.fail_on("a.com");

    f.dispatcher
        .dispatch(&trace_task(json!({"urls": ["a.com", "http://b.com/x?y"], "repeat_count": 2})))
        .await;

    let urls: Vec<String> = f.generator.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, ["http://b.com/x?y", "http://b.com/x?y", "a.com", "a.com"]);

    assert_eq!(
        f.storage.object_names(),
        [
            "base/failures/a.com/0.log",
            "base/failures/a.com/1.log",
            "base/trace_database.json",
            "base/traces/http:__b.com_x_y/0",
            "base/traces/http:__b.com_x_y/0.log",
            "base/traces/http:__b.com_x_y/1",
            "base/traces/http:__b.com_x_y/1.log",
        ]
    );
    assert_eq!(
        f.storage.get("base/failures/a.com/0.log").unwrap(),
        "tracing http://a.com\n"
    );

    let failures = f.dispatcher.failures();
    assert_eq!(failures.failures_for(TRACE_COLLECTION_FAILURE), ["a.com", "a.com"]);
    assert!(failures.failures_for(DIRTY_STATE_ERROR).is_empty());

    let database =
        TraceDatabase::from_json_str(&f.storage.get("base/trace_database.json").unwrap()).unwrap();
    assert_eq!(database.len(), 2);
    let metadata = database
        .get("gs://bucket/base/traces/http:__b.com_x_y/0")
        .unwrap();
    assert_eq!(metadata["succeeded"], true);
    assert_eq!(metadata["url"], "http://b.com/x?y");
    assert_eq!(metadata["fake"], true);
}

#[tokio::test]
async fn all_failures_leave_the_database_alone() {
    let mut f = fixture(None);
    f.generator.fail_on("a.com");

    f.dispatcher.dispatch(&trace_task(json!({"urls": ["a.com"]}))).await;

    assert!(!f.storage.uploads().contains(&"base/trace_database.json".to_string()));
    assert_eq!(f.storage.uploads(), ["base/failures/a.com/0.log"]);
}

#[tokio::test]
async fn leftover_database_is_reported_once() {
    let mut f = fixture(Some("worker-1"));
    f.storage.insert(
        "base/trace_database_worker-1.json",
        r#"{"gs://bucket/base/traces/old/0": {"succeeded": true, "url": "old"}}"#,
    );

    f.dispatcher.dispatch(&trace_task(json!({"urls": ["c.com"]}))).await;
    f.dispatcher.dispatch(&trace_task(json!({"urls": ["d.com"]}))).await;

    assert_eq!(
        f.dispatcher.failures().failures_for(DIRTY_STATE_ERROR),
        ["trace_database"]
    );
    let database = TraceDatabase::from_json_str(
        &f.storage.get("base/trace_database_worker-1.json").unwrap(),
    )
    .unwrap();
    let locations: Vec<&str> = database.locations().collect();
    assert_eq!(
        locations,
        [
            "gs://bucket/base/traces/c.com/0",
            "gs://bucket/base/traces/d.com/0",
            "gs://bucket/base/traces/old/0",
        ]
    );
}

#[tokio::test]
async fn emulation_settings_reach_the_generator() {
    let mut f = fixture(None);

    f.dispatcher
        .dispatch(&trace_task(json!({
            "urls": ["a.com"],
            "emulate_device": "Nexus 5",
            "emulate_network": "Regular3G"
        })))
        .await;

    let requests = f.generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].emulate_device.as_deref(), Some("Nexus 5"));
    assert_eq!(requests[0].emulate_network.as_deref(), Some("Regular3G"));
    assert_eq!(requests[0].navigation_url(), "http://a.com");
}
