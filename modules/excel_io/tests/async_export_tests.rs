mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{body_bytes, users, Harness, TestApp, User};
use excel_io::prelude::*;
use excel_io::{ExcelIoModule, ExportJob, ExportProcessor, ResponseSink, TableCodec, XlsxCodec};
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

/// Encodes like the default processor and remembers what it wrote.
#[derive(Default)]
struct Recording {
    runs: Mutex<Vec<(bool, usize)>>,
}

#[async_trait]
impl ExportProcessor for Recording {
    fn id(&self) -> &str {
        "recording"
    }

    async fn process(
        &self,
        job: &ExportJob,
        records: Vec<Value>,
        sink: &mut ResponseSink,
    ) -> anyhow::Result<()> {
        let codec = XlsxCodec::default();
        let bytes = codec.encode(&records, &job.schema, &job.sheet_name)?;
        sink.attachment(codec.content_type(), &job.file_name, codec.extension(), bytes)?;
        self.runs.lock().push((sink.is_detached(), records.len()));
        Ok(())
    }
}

async fn wait_for(counter: &AtomicUsize, n: usize) {
    for _ in 0..400 {
        if counter.load(Ordering::SeqCst) >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("counter never reached {n}");
}

struct Gate {
    permits: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
}

fn app(gate: &Gate) -> TestApp {
    let permits = gate.permits.clone();
    let started = gate.started.clone();
    TestApp::new(move |routes| {
        let permits = permits.clone();
        let started = started.clone();
        OperationBuilder::get("/users/async")
            .export_handler(
                ExportSpec::of::<User>()
                    .asynchronous(true)
                    .processor("recording"),
                move |_args| {
                    let permits = permits.clone();
                    let started = started.clone();
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        let _permit = permits
                            .acquire()
                            .await
                            .map_err(|e| routekit::internal_error(e.to_string()))?;
                        Ok::<_, Problem>(users(100))
                    }
                },
            )
            .json_response(200, "Users")
            .register(routes)?;
        Ok(())
    })
}

async fn harness(gate: &Gate, recording: Arc<Recording>, cfg: Value) -> Harness {
    Harness::start(
        ExcelIoModule::new().with_processor(recording),
        app(gate),
        cfg,
    )
    .await
}

#[tokio::test]
async fn async_export_answers_accepted_and_runs_once() {
    let gate = Gate {
        permits: Arc::new(Semaphore::new(100)),
        started: Arc::new(AtomicUsize::new(0)),
    };
    let recording = Arc::new(Recording::default());
    let h = harness(&gate, recording.clone(), json!({})).await;

    let resp = h.get("/users/async/export").await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(resp.headers().get(http::header::CONTENT_DISPOSITION).is_none());
    assert!(body_bytes(resp).await.is_empty());

    h.host.run_stop_phase().await;

    assert_eq!(gate.started.load(Ordering::SeqCst), 1);
    assert_eq!(*recording.runs.lock(), vec![(true, 100)]);
    let stats = h.excel.runtime().unwrap().dispatcher().stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn saturated_pool_falls_back_to_the_caller() {
    let gate = Gate {
        permits: Arc::new(Semaphore::new(0)),
        started: Arc::new(AtomicUsize::new(0)),
    };
    let recording = Arc::new(Recording::default());
    let h = Arc::new(
        harness(
            &gate,
            recording.clone(),
            json!({
                "async_core_pool_size": 1,
                "async_max_pool_size": 1,
                "async_queue_capacity": 1
            }),
        )
        .await,
    );

    // the only worker picks up the first export and blocks
    assert_eq!(h.get("/users/async/export").await.status(), StatusCode::ACCEPTED);
    wait_for(&gate.started, 1).await;
    // the second one waits in the queue
    assert_eq!(h.get("/users/async/export").await.status(), StatusCode::ACCEPTED);

    // the third one runs on the request task itself
    let caller = {
        let h = h.clone();
        tokio::spawn(async move { h.get("/users/async/export").await.status() })
    };
    wait_for(&gate.started, 2).await;
    assert!(!caller.is_finished());

    gate.permits.add_permits(3);
    assert_eq!(caller.await.unwrap(), StatusCode::ACCEPTED);

    h.host.run_stop_phase().await;

    assert_eq!(gate.started.load(Ordering::SeqCst), 3);
    let stats = h.excel.runtime().unwrap().dispatcher().stats();
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.caller_runs, 1);
    assert_eq!(stats.completed, 3);
    assert!(recording.runs.lock().iter().all(|(detached, n)| *detached && *n == 100));
}

#[tokio::test]
async fn original_route_stays_synchronous() {
    let gate = Gate {
        permits: Arc::new(Semaphore::new(10)),
        started: Arc::new(AtomicUsize::new(0)),
    };
    let h = harness(&gate, Arc::new(Recording::default()), json!({})).await;

    let resp = h.get("/users/async").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Vec<Value> = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.len(), 100);
}
