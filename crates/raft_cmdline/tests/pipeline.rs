use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use raft_capture::{AdaptationError, FormatId};
use raft_cmdline::{AppConfig, Cli, FileState, PipelineError, PipelineRunner, RunOutcome};
use raft_plugin::{python_sdk_dir, CallFailure, PluginHostConfig, PluginRegistry, TransportError};
use tempfile::TempDir;

const PRELUDE: &str = r#"
import os
import raft_plugin

def record(event):
    with open(os.environ["RAFT_TEST_EVENTS"], "a") as out:
        out.write(event + "\n")
"#;

struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn events_file(&self) -> PathBuf {
        self.path().join("events.txt")
    }

    fn events(&self) -> Vec<String> {
        fs::read_to_string(self.events_file())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn host_config(&self) -> PluginHostConfig {
        let mut config = PluginHostConfig::default();
        config.env.insert(
            "PYTHONPATH".into(),
            python_sdk_dir().display().to_string(),
        );
        config.env.insert(
            "RAFT_TEST_EVENTS".into(),
            self.events_file().display().to_string(),
        );
        config
    }

    fn plugin(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, format!("{PRELUDE}\n{body}")).expect("write plugin");
        path
    }

    /// Paros session with `count` GET requests to `http://site.test/<n>`.
    fn session(&self, name: &str, count: usize) -> PathBuf {
        let mut text = String::new();
        for n in 1..=count {
            text.push_str(&format!(
                "==== {n} ==========\nGET http://site.test/{n} HTTP/1.1\nHost: site.test\n\nHTTP/1.1 200 OK\nContent-Type: text/plain\n\nbody {n}\n\n"
            ));
        }
        let path = self.path().join(name);
        fs::write(&path, text).expect("write session");
        path
    }
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../raft_capture/tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn files_without_plugins_are_only_adapted() {
    let mut runner = PipelineRunner::new(Vec::new(), Vec::new());
    let report = runner
        .run_file(FormatId::RaftCaptureXml, &fixture("a.xml"))
        .await
        .expect("run a.xml");

    assert_eq!(report.state, FileState::Completed);
    assert_eq!(report.records_adapted, 3);
    assert_eq!(report.records_skipped, 0);
    assert_eq!(report.plugin_invocations(), 0);
}

#[tokio::test]
async fn falsy_filter_results_skip_only_that_capture() {
    let scratch = Scratch::new();
    let filter = scratch.plugin(
        "drop_second.py",
        r#"
def capture_filter(capture):
    if capture["url"].endswith("/2"):
        return None
    return capture

raft_plugin.serve(capture_filter)
"#,
    );
    let processor = scratch.plugin(
        "collect.py",
        r#"
def process_capture(capture):
    record("processed " + capture["url"])

raft_plugin.serve(process_capture)
"#,
    );
    let session = scratch.session("session.txt", 3);

    let mut registry = PluginRegistry::new(scratch.host_config());
    let filters = vec![registry.load(&filter).await.unwrap()];
    let processors = vec![registry.load(&processor).await.unwrap()];
    let mut runner = PipelineRunner::new(filters, processors);
    let report = runner
        .run_file(FormatId::ParosMessage, &session)
        .await
        .unwrap();
    registry.shutdown_all().await;

    assert_eq!(
        scratch.events(),
        ["processed http://site.test/1", "processed http://site.test/3"]
    );
    assert_eq!(report.records_adapted, 3);
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.filter_calls, 3);
    assert_eq!(report.processor_calls, 2);
}

#[tokio::test]
async fn initialize_runs_once_per_file_for_dual_role_plugins() {
    let scratch = Scratch::new();
    let both = scratch.plugin(
        "both.py",
        r#"
class Both:
    def initialize(self, file_path):
        record("initialize " + os.path.basename(file_path))

    def capture_filter(self, capture):
        return True

    def process_capture(self, capture):
        record("process " + capture["url"])

raft_plugin.serve(Both)
"#,
    );
    let first = scratch.session("first.txt", 2);
    let second = scratch.session("second.txt", 1);

    let mut registry = PluginRegistry::new(scratch.host_config());
    let handle = registry.load(&both).await.unwrap();
    let mut runner = PipelineRunner::new(vec![handle.clone()], vec![handle]);
    runner
        .run(&[(FormatId::ParosMessage, vec![first, second])])
        .await
        .unwrap();
    registry.shutdown_all().await;

    assert_eq!(
        scratch.events(),
        [
            "initialize first.txt",
            "process http://site.test/1",
            "process http://site.test/2",
            "initialize second.txt",
            "process http://site.test/1",
        ]
    );
    let summary = runner.into_summary();
    assert_eq!(summary.files.len(), 2);
    assert!(summary.files.iter().all(|file| file.initialize_calls == 1));
}

#[tokio::test]
async fn processors_run_in_order_on_the_filtered_capture() {
    let scratch = Scratch::new();
    let filter = scratch.plugin(
        "annotate.py",
        r#"
def capture_filter(capture):
    capture["notes"] = "annotated"
    return capture

raft_plugin.serve(capture_filter)
"#,
    );
    let first = scratch.plugin(
        "first.py",
        r#"
def process_capture(capture):
    record("first %s %s" % (capture["url"], capture["notes"]))
    capture["notes"] = "changed by first"
    return capture

raft_plugin.serve(process_capture)
"#,
    );
    let second = scratch.plugin(
        "second.py",
        r#"
def process_capture(capture):
    record("second %s %s" % (capture["url"], capture["notes"]))

raft_plugin.serve(process_capture)
"#,
    );
    let session = scratch.session("session.txt", 2);

    let mut registry = PluginRegistry::new(scratch.host_config());
    let filters = vec![registry.load(&filter).await.unwrap()];
    let processors = vec![
        registry.load(&first).await.unwrap(),
        registry.load(&second).await.unwrap(),
    ];
    let mut runner = PipelineRunner::new(filters, processors);
    runner
        .run_file(FormatId::ParosMessage, &session)
        .await
        .unwrap();
    registry.shutdown_all().await;

    assert_eq!(
        scratch.events(),
        [
            "first http://site.test/1 annotated",
            "second http://site.test/1 annotated",
            "first http://site.test/2 annotated",
            "second http://site.test/2 annotated",
        ]
    );
}

#[tokio::test]
async fn a_failing_filter_stops_the_remaining_records() {
    let scratch = Scratch::new();
    let filter = scratch.plugin(
        "strict.py",
        r#"
def capture_filter(capture):
    if capture["url"].endswith("/2"):
        raise RuntimeError("refusing " + capture["url"])
    return True

raft_plugin.serve(capture_filter)
"#,
    );
    let processor = scratch.plugin(
        "collect.py",
        r#"
def process_capture(capture):
    record("processed " + capture["url"])

raft_plugin.serve(process_capture)
"#,
    );
    let session = scratch.session("five.txt", 5);

    let mut registry = PluginRegistry::new(scratch.host_config());
    let filters = vec![registry.load(&filter).await.unwrap()];
    let processors = vec![registry.load(&processor).await.unwrap()];
    let mut runner = PipelineRunner::new(filters, processors);
    let err = runner
        .run(&[(FormatId::ParosMessage, vec![session.clone(), session])])
        .await
        .unwrap_err();
    registry.shutdown_all().await;

    let PipelineError::PluginCall(call) = &err else {
        panic!("expected a plugin call failure, got {err:?}");
    };
    assert_eq!(call.capability, "capture_filter");
    match &call.source {
        CallFailure::Transport(TransportError::Rpc { message, .. }) => {
            assert!(message.contains("refusing http://site.test/2"), "{message}");
        }
        other => panic!("unexpected failure: {other:?}"),
    }

    assert_eq!(scratch.events(), ["processed http://site.test/1"]);
    let files = &runner.summary().files;
    assert_eq!(files.len(), 1, "the second file must not start");
    assert_eq!(files[0].state, FileState::Aborted);
    assert_eq!(files[0].records_adapted, 2);
}

#[tokio::test]
async fn an_unadaptable_record_stops_the_run() {
    let scratch = Scratch::new();
    let processor = scratch.plugin(
        "collect.py",
        r#"
def process_capture(capture):
    record("processed " + capture["url"])

raft_plugin.serve(process_capture)
"#,
    );
    let broken = scratch.path().join("broken.txt");
    fs::write(
        &broken,
        "==== 1 ==========\nGET http://site.test/1 HTTP/1.1\nHost: site.test\n\n\
         ==== 2 ==========\nGET /orphan HTTP/1.1\nAccept: */*\n\n\
         ==== 3 ==========\nGET http://site.test/3 HTTP/1.1\nHost: site.test\n\n",
    )
    .expect("write session");
    let next = scratch.session("next.txt", 1);

    let mut registry = PluginRegistry::new(scratch.host_config());
    let processors = vec![registry.load(&processor).await.unwrap()];
    let mut runner = PipelineRunner::new(Vec::new(), processors);
    let err = runner
        .run(&[(FormatId::ParosMessage, vec![broken, next])])
        .await
        .unwrap_err();
    registry.shutdown_all().await;

    assert!(
        matches!(
            &err,
            PipelineError::Adaptation(AdaptationError::UnresolvableUrl { target, .. })
                if target == "/orphan"
        ),
        "{err:?}"
    );
    assert_eq!(scratch.events(), ["processed http://site.test/1"]);
    let files = &runner.summary().files;
    assert_eq!(files.len(), 1, "the next file must not start");
    assert_eq!(files[0].state, FileState::Aborted);
    assert_eq!(files[0].records_adapted, 1);
    assert_eq!(files[0].processor_calls, 1);
}

#[tokio::test]
async fn one_plugin_listed_twice_is_started_once() {
    let scratch = Scratch::new();
    let plugin = scratch.plugin(
        "tagger.py",
        r#"
record("started")

def capture_filter(capture):
    return True

def process_capture(capture):
    record("processed " + capture["url"])

raft_plugin.serve(capture_filter, process_capture)
"#,
    );
    let plugin = plugin.display().to_string();
    let session = scratch.session("session.txt", 1).display().to_string();
    let cli = Cli::try_parse_from([
        "raft-cmdline",
        "--parse",
        "--capture-filter",
        &plugin,
        "--process-capture",
        &plugin,
        "--paros-message",
        &session,
    ])
    .unwrap();
    let config = AppConfig {
        plugins: scratch.host_config(),
        ..AppConfig::default()
    };

    let outcome = raft_cmdline::run(&cli, &config).await.unwrap();
    let RunOutcome::Parsed(summary) = outcome else {
        panic!("expected a parse run, got {outcome:?}");
    };
    assert_eq!(summary.records_adapted(), 1);
    assert_eq!(
        scratch.events(),
        ["started", "processed http://site.test/1"]
    );
}

#[tokio::test]
async fn plugins_load_even_without_parse() {
    let scratch = Scratch::new();
    let missing = scratch.path().join("missing.py").display().to_string();
    let cli =
        Cli::try_parse_from(["raft-cmdline", "--import", "--capture-filter", &missing]).unwrap();

    let err = raft_cmdline::run(&cli, &AppConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing.py"), "{err}");
}
