//! Turning expanded artifact patterns into concrete filesystem paths.

use std::path::{MAIN_SEPARATOR_STR, PathBuf};

/// Build a path from a pattern written with either separator.
#[must_use]
pub fn pattern_to_path(pattern: &str) -> PathBuf {
    let mut path = PathBuf::new();
    if pattern.starts_with(['\\', '/']) {
        path.push(MAIN_SEPARATOR_STR);
    }

    for (index, part) in segments(pattern).enumerate() {
        if index == 0 && part.ends_with(':') {
            path.push(format!("{part}{MAIN_SEPARATOR_STR}"));
        } else {
            path.push(part);
        }
    }

    path
}

fn segments(pattern: &str) -> impl Iterator<Item = &str> {
    pattern.split(['\\', '/']).filter(|part| !part.is_empty())
}

/// Resolve a pattern to the first existing match.
///
/// Without a wildcard this is the path itself, if it exists. With one, the
/// wildcard segment is matched case-insensitively against the entries of its
/// parent directory and candidates are tried in lexical order.
#[must_use]
pub fn resolve_first(pattern: &str) -> Option<PathBuf> {
    resolve_all(pattern).into_iter().next()
}

/// Every existing path the pattern matches, in lexical order.
#[must_use]
pub fn resolve_all(pattern: &str) -> Vec<PathBuf> {
    let parts: Vec<&str> = segments(pattern).collect();
    let Some(wild) = parts.iter().position(|part| part.contains('*')) else {
        let path = pattern_to_path(pattern);
        return if path.exists() { vec![path] } else { Vec::new() };
    };

    let leading = if pattern.starts_with(['\\', '/']) {
        MAIN_SEPARATOR_STR
    } else {
        ""
    };
    let parent = pattern_to_path(&format!("{leading}{}", parts[..wild].join("\\")));
    let (prefix, suffix) = parts[wild].split_once('*').unwrap_or((parts[wild], ""));
    let prefix = prefix.to_lowercase();
    let suffix = suffix.to_lowercase();
    let rest = &parts[wild + 1..];

    let Ok(entries) = std::fs::read_dir(&parent) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.len() >= prefix.len() + suffix.len()
                && lower.starts_with(&prefix)
                && lower.ends_with(&suffix)
        })
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let mut candidate = parent.join(name);
            candidate.extend(rest);
            candidate
        })
        .filter(|candidate| candidate.exists())
        .collect()
}
