//! Per-file streaming loop: reset plugin initialization, initialize plugins,
//! then adapt, filter and process every record of the file in order.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use raft_capture::{
    adapt, AdaptationError, FormatId, FormatRegistry, IngestLimits, ParserStreamError,
};
use raft_plugin::{FilterOutcome, KnownCapability, PluginCallError, PluginHandle};
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

/// A failure that aborts the current file and the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no parser is registered for {0}")]
    UnregisteredFormat(FormatId),
    #[error(transparent)]
    Stream(#[from] ParserStreamError),
    #[error(transparent)]
    Adaptation(#[from] AdaptationError),
    #[error(transparent)]
    PluginCall(#[from] PluginCallError),
}

/// Where a file got to in the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    NotStarted,
    PluginsReset,
    Initializing,
    Streaming,
    Completed,
    Aborted,
}

/// Counters for one processed (or aborted) file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub format: FormatId,
    pub state: FileState,
    pub records_adapted: usize,
    pub records_skipped: usize,
    pub initialize_calls: usize,
    pub filter_calls: usize,
    pub processor_calls: usize,
}

impl FileReport {
    fn new(path: &Path, format: FormatId) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            state: FileState::NotStarted,
            records_adapted: 0,
            records_skipped: 0,
            initialize_calls: 0,
            filter_calls: 0,
            processor_calls: 0,
        }
    }

    pub fn plugin_invocations(&self) -> usize {
        self.initialize_calls + self.filter_calls + self.processor_calls
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn records_adapted(&self) -> usize {
        self.files.iter().map(|file| file.records_adapted).sum()
    }

    pub fn records_skipped(&self) -> usize {
        self.files.iter().map(|file| file.records_skipped).sum()
    }

    pub fn plugin_invocations(&self) -> usize {
        self.files.iter().map(FileReport::plugin_invocations).sum()
    }
}

/// Plugins already initialized for the file being processed, keyed by
/// plugin path. Cleared before every file.
#[derive(Debug, Default)]
pub struct InitializationState {
    initialized: HashSet<PathBuf>,
}

impl InitializationState {
    pub fn reset(&mut self) {
        self.initialized.clear();
    }

    /// Marks `plugin` initialized; `false` if it already was.
    pub fn mark(&mut self, plugin: &Path) -> bool {
        self.initialized.insert(plugin.to_path_buf())
    }

    pub fn is_initialized(&self, plugin: &Path) -> bool {
        self.initialized.contains(plugin)
    }
}

/// Drives files through the format parsers and the loaded plugins.
///
/// Filters and processors keep the order they were given in for every file.
/// Processors are not chained: each sees the capture as it left the filters.
#[derive(Debug)]
pub struct PipelineRunner {
    formats: FormatRegistry,
    limits: IngestLimits,
    filters: Vec<Arc<PluginHandle>>,
    processors: Vec<Arc<PluginHandle>>,
    initialization: InitializationState,
    summary: RunSummary,
}

impl PipelineRunner {
    pub fn new(filters: Vec<Arc<PluginHandle>>, processors: Vec<Arc<PluginHandle>>) -> Self {
        Self {
            formats: FormatRegistry::builtin(),
            limits: IngestLimits::default(),
            filters,
            processors,
            initialization: InitializationState::default(),
            summary: RunSummary::default(),
        }
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_limits(mut self, limits: IngestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reports for every file started so far, including an aborted one.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Processes each `(format, files)` job in order; the first failure stops
    /// the run.
    pub async fn run(&mut self, jobs: &[(FormatId, Vec<PathBuf>)]) -> Result<(), PipelineError> {
        for (format, files) in jobs {
            for file in files {
                self.run_file(*format, file).await?;
            }
        }
        Ok(())
    }

    pub async fn run_file(
        &mut self,
        format: FormatId,
        path: &Path,
    ) -> Result<FileReport, PipelineError> {
        let span = info_span!("file", path = %path.display(), %format);
        let mut report = FileReport::new(path, format);

        let outcome = async {
            info!("processing file");
            let outcome = self.drive(format, path, &mut report).await;
            match &outcome {
                Ok(()) => {
                    report.state = FileState::Completed;
                    info!(
                        records = report.records_adapted,
                        skipped = report.records_skipped,
                        "file complete"
                    );
                }
                Err(err) => {
                    report.state = FileState::Aborted;
                    error!(
                        records = report.records_adapted,
                        "aborting run: {err}"
                    );
                }
            }
            outcome
        }
        .instrument(span)
        .await;

        self.summary.files.push(report.clone());
        outcome.map(|()| report)
    }

    async fn drive(
        &mut self,
        format: FormatId,
        path: &Path,
        report: &mut FileReport,
    ) -> Result<(), PipelineError> {
        self.initialization.reset();
        report.state = FileState::PluginsReset;

        report.state = FileState::Initializing;
        for plugin in self.filters.iter().chain(&self.processors) {
            if !self.initialization.mark(plugin.path()) {
                continue;
            }
            if plugin.initialize(path).await? {
                report.initialize_calls += 1;
            }
        }

        let filters: Vec<&PluginHandle> = self
            .filters
            .iter()
            .map(Arc::as_ref)
            .filter(|plugin| plugin.supports(KnownCapability::CaptureFilter))
            .collect();
        let processors: Vec<&PluginHandle> = self
            .processors
            .iter()
            .map(Arc::as_ref)
            .filter(|plugin| plugin.supports(KnownCapability::ProcessCapture))
            .collect();

        let parser = self
            .formats
            .resolve_format(format)
            .ok_or(PipelineError::UnregisteredFormat(format))?;
        report.state = FileState::Streaming;

        for record in parser(path, &self.limits)? {
            let record = record?;
            let mut capture = adapt(&record)?;
            report.records_adapted += 1;

            let mut skipped = false;
            for filter in &filters {
                report.filter_calls += 1;
                match filter.capture_filter(&capture).await? {
                    Some(FilterOutcome::Skip) => {
                        skipped = true;
                        break;
                    }
                    Some(FilterOutcome::Replace(next)) => capture = *next,
                    Some(FilterOutcome::Keep) | None => {}
                }
            }
            if skipped {
                report.records_skipped += 1;
                debug!(capture = %capture.id, "capture filtered out");
                continue;
            }

            for processor in &processors {
                report.processor_calls += 1;
                processor.process_capture(&capture).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_marks_are_cleared_per_file() {
        let mut state = InitializationState::default();
        let plugin = Path::new("/plugins/tagger.py");

        assert!(state.mark(plugin));
        assert!(!state.mark(plugin));
        assert!(state.is_initialized(plugin));

        state.reset();
        assert!(!state.is_initialized(plugin));
        assert!(state.mark(plugin));
    }

    #[test]
    fn summary_totals_every_file() {
        let mut first = FileReport::new(Path::new("a.xml"), FormatId::RaftCaptureXml);
        first.records_adapted = 3;
        first.filter_calls = 3;
        first.initialize_calls = 1;
        let mut second = FileReport::new(Path::new("b.log"), FormatId::BurpLog);
        second.records_adapted = 2;
        second.records_skipped = 1;
        second.processor_calls = 1;

        let summary = RunSummary {
            files: vec![first, second],
        };
        assert_eq!(summary.records_adapted(), 5);
        assert_eq!(summary.records_skipped(), 1);
        assert_eq!(summary.plugin_invocations(), 5);
    }

    #[tokio::test]
    async fn plugin_free_runs_adapt_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        std::fs::write(
            &path,
            "==== 1 ==========\nGET http://a.test/ HTTP/1.1\nHost: a.test\n\n\
             ==== 2 ==========\nGET http://b.test/ HTTP/1.1\nHost: b.test\n\n",
        )
        .unwrap();

        let mut runner = PipelineRunner::new(Vec::new(), Vec::new());
        let report = runner
            .run_file(FormatId::ParosMessage, &path)
            .await
            .unwrap();
        assert_eq!(report.state, FileState::Completed);
        assert_eq!(report.records_adapted, 2);
        assert_eq!(report.plugin_invocations(), 0);
    }

    #[tokio::test]
    async fn stream_failures_abort_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.burp");
        std::fs::write(&path, b"\x00\x01").unwrap();

        let mut runner = PipelineRunner::new(Vec::new(), Vec::new());
        let err = runner
            .run_file(FormatId::BurpState, &path)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stream(ParserStreamError::Unsupported { .. })
        ));
        let report = &runner.summary().files[0];
        assert_eq!(report.state, FileState::Aborted);
        assert_eq!(report.records_adapted, 0);
    }

    #[tokio::test]
    async fn formats_missing_from_the_registry_are_errors() {
        let mut runner =
            PipelineRunner::new(Vec::new(), Vec::new()).with_formats(FormatRegistry::from_entries(
                Vec::new(),
            ));
        let err = runner
            .run_file(FormatId::BurpLog, Path::new("proxy.log"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnregisteredFormat(FormatId::BurpLog)
        ));
    }
}
