use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Turns one command-line file argument into the files it names.
///
/// Arguments containing `*` are glob patterns, expanded in sorted order with
/// unreadable entries skipped. Other arguments must name an existing path.
/// Anything that resolves to nothing is logged and contributes no files.
pub fn expand_file_arg(arg: &str) -> Vec<PathBuf> {
    if arg.contains('*') {
        return expand_pattern(arg);
    }
    let path = Path::new(arg);
    if path.exists() {
        vec![path.to_path_buf()]
    } else {
        warn!(argument = arg, "file argument does not exist; skipping");
        Vec::new()
    }
}

/// Expands every argument, keeping argument order.
pub fn expand_file_args<'a>(args: impl IntoIterator<Item = &'a String>) -> Vec<PathBuf> {
    args.into_iter()
        .flat_map(|arg| expand_file_arg(arg))
        .collect()
}

fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(pattern, "invalid glob pattern: {err}");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => files.push(path),
            Err(err) => debug!(pattern, "skipping unreadable glob entry: {err}"),
        }
    }
    files.sort();
    if files.is_empty() {
        warn!(pattern, "glob pattern matched nothing");
    }
    files
}
