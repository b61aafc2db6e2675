use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{FileRecord, SelectedFile, Selection};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionSet(BTreeSet<String>);

impl ExtensionSet {
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            raw.into_iter()
                .map(|value| normalize_extension(value.as_ref()))
                .collect(),
        )
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.0.contains(extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub fn normalize_extension(raw: &str) -> String {
    format!(".{}", raw.trim_start_matches('.').to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunFilter {
    #[default]
    Unrestricted,
    Prefixes(Vec<String>),
}

impl RunFilter {
    pub fn from_runs<I, S>(runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = runs
            .into_iter()
            .map(|value| value.as_ref().trim().to_string())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();
        if prefixes.is_empty() {
            RunFilter::Unrestricted
        } else {
            RunFilter::Prefixes(prefixes)
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, RunFilter::Prefixes(_))
    }

    pub fn allows(&self, run_id: &str) -> bool {
        match self {
            RunFilter::Unrestricted => true,
            RunFilter::Prefixes(prefixes) => {
                !run_id.is_empty() && prefixes.iter().any(|prefix| run_id.starts_with(prefix))
            }
        }
    }
}

pub fn run_identifier(path: &str) -> &str {
    path.split_once('/').map(|(head, _)| head).unwrap_or("")
}

fn suffixes(name: &str) -> Option<(String, String)> {
    let parts = name.split('.').collect::<Vec<_>>();
    if parts.len() < 2 {
        return None;
    }
    let last = parts[parts.len() - 1];
    let single = format!(".{}", last.to_lowercase());
    let double = format!(".{}.{}", parts[parts.len() - 2], last).to_lowercase();
    Some((single, double))
}

pub fn match_files(
    records: &[FileRecord],
    extensions: &ExtensionSet,
    runs: &RunFilter,
) -> Selection {
    let mut selection = Vec::new();
    for record in records {
        if record.name.is_empty() || record.path.is_empty() {
            debug!(id = %record.id, "skipping record without name or path");
            continue;
        }
        let Some((single, double)) = suffixes(&record.name) else {
            continue;
        };
        if !extensions.contains(&single) && !extensions.contains(&double) {
            continue;
        }

        let run_id = run_identifier(&record.path);
        if runs.is_restricted() {
            if run_id.is_empty() {
                warn!(
                    file = %record.name,
                    path = %record.path,
                    "no run identifier in path; excluded from run filtering"
                );
                continue;
            }
            if !runs.allows(run_id) {
                continue;
            }
        }

        selection.push(SelectedFile {
            file_id: record.id.clone(),
            name: record.name.clone(),
            run_id: run_id.to_string(),
        });
    }
    selection
}
