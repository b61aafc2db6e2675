use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::domain::{ProjectId, SelectedFile, Selection};
use crate::error::IcaError;
use crate::icav2::Workspace;
use crate::matching::{ExtensionSet, RunFilter, match_files};
use crate::output::{confirm, render_selection};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub patterns: Vec<String>,
    pub extensions: ExtensionSet,
    pub runs: RunFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub project_id: ProjectId,
    pub extensions: ExtensionSet,
    pub run_filtered: bool,
    pub listed: usize,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub project_id: ProjectId,
    pub items: Vec<DownloadedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedItem {
    pub file_id: String,
    pub name: String,
    pub run_id: Option<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    NoMatches(SearchResult),
    Cancelled(SearchResult),
    Downloaded(DownloadReport),
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Starting {
        index: usize,
        total: usize,
        name: String,
        run_id: Option<String>,
    },
    Finished {
        name: String,
        elapsed: Duration,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<W: Workspace> {
    workspace: W,
}

impl<W: Workspace> App<W> {
    pub fn new(workspace: W) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn search(
        &self,
        project: &ProjectId,
        request: &SearchRequest,
    ) -> Result<SearchResult, IcaError> {
        let records = self.workspace.list(&request.patterns, project)?;
        let selection = match_files(&records, &request.extensions, &request.runs);
        info!(
            project = %project,
            listed = records.len(),
            matched = selection.len(),
            "listing filtered"
        );
        Ok(SearchResult {
            project_id: project.clone(),
            extensions: request.extensions.clone(),
            run_filtered: request.runs.is_restricted(),
            listed: records.len(),
            selection,
        })
    }

    pub fn run<R: BufRead, P: Write>(
        &self,
        project: &ProjectId,
        request: &SearchRequest,
        input: &mut R,
        prompt: &mut P,
        sink: &dyn ProgressSink,
    ) -> Result<Outcome, IcaError> {
        let result = self.search(project, request)?;
        if result.selection.is_empty() {
            return Ok(Outcome::NoMatches(result));
        }

        render_selection(prompt, &result).map_err(|err| IcaError::Console(err.to_string()))?;
        if !confirm(input, prompt)? {
            info!(project = %project, "download cancelled");
            writeln!(prompt, "Cancelled.").map_err(|err| IcaError::Console(err.to_string()))?;
            return Ok(Outcome::Cancelled(result));
        }

        let report = self.download(project, &result.selection, result.run_filtered, sink)?;
        Ok(Outcome::Downloaded(report))
    }

    pub fn download(
        &self,
        project: &ProjectId,
        selection: &[SelectedFile],
        show_runs: bool,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, IcaError> {
        let total = selection.len();
        let mut items = Vec::with_capacity(total);
        for (index, file) in selection.iter().enumerate() {
            let run_id = show_runs.then(|| file.run_id.clone());
            sink.event(ProgressEvent::Starting {
                index: index + 1,
                total,
                name: file.name.clone(),
                run_id: run_id.clone(),
            });

            let started = Instant::now();
            self.workspace.download(&file.file_id, project)?;
            let elapsed = started.elapsed();
            info!(file_id = %file.file_id, file = %file.name, ?elapsed, "downloaded");

            sink.event(ProgressEvent::Finished {
                name: file.name.clone(),
                elapsed,
            });
            items.push(DownloadedItem {
                file_id: file.file_id.clone(),
                name: file.name.clone(),
                run_id,
                elapsed_ms: elapsed.as_millis(),
            });
        }

        Ok(DownloadReport {
            project_id: project.clone(),
            items,
        })
    }
}
