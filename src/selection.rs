// src/selection.rs

//! Recency-ordered log selection under size and count caps

use std::path::PathBuf;
use std::time::SystemTime;

/// A candidate log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// How a selected file is to be copied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    /// Copy the whole file
    Whole(LogFile),
    /// Copy only the last `bytes` bytes
    Tail(LogFile, u64),
}

impl Selected {
    pub fn file(&self) -> &LogFile {
        match self {
            Self::Whole(f) | Self::Tail(f, _) => f,
        }
    }
}

/// Sort newest first; equal timestamps keep their input order
pub fn newest_first(mut files: Vec<LogFile>) -> Vec<LogFile> {
    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files
}

/// The `limit` newest files in recency order, or all of them for `None`
pub fn take_newest(files: Vec<LogFile>, limit: Option<usize>) -> Vec<LogFile> {
    let files = newest_first(files);
    match limit {
        Some(n) => files.into_iter().take(n).collect(),
        None => files,
    }
}

/// The first `limit` entries of an already recency-ordered listing
pub fn take_listed<T>(listing: impl IntoIterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    let iter = listing.into_iter();
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

/// Newest files whose cumulative size stays within `cap` bytes.
///
/// A file that lands exactly on the cap is included. Selection stops at the
/// first file that would overflow it, even if an older, smaller file would
/// still fit. With `tail` set and the newest file alone over the cap, the
/// last `cap` bytes of that file are selected instead of nothing.
pub fn within_size(files: Vec<LogFile>, cap: Option<u64>, tail: bool) -> Vec<Selected> {
    let files = newest_first(files);
    let Some(cap) = cap else {
        return files.into_iter().map(Selected::Whole).collect();
    };

    let mut total: u64 = 0;
    let mut selected = Vec::new();
    for file in files {
        match total.checked_add(file.size) {
            Some(next) if next <= cap => {
                total = next;
                selected.push(Selected::Whole(file));
            }
            _ => {
                if tail && selected.is_empty() && cap > 0 {
                    selected.push(Selected::Tail(file, cap));
                }
                break;
            }
        }
    }
    selected
}
