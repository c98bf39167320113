//! Loading of URL lists.
//!
//! Accepts a JSON file (`["..."]` or `{ "urls": [...] }`) or a plain text
//! file with one URL per line, where blank lines and `#` comments are skipped.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ArchiveError;

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlFile {
    List(Vec<String>),
    Wrapped { urls: Vec<String> },
}

/// Reads URLs from `path`, choosing the format from the file extension.
pub fn load_urls(path: &Path) -> Result<Vec<String>, ArchiveError> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&contents)
    } else {
        Ok(parse_lines(&contents))
    }
}

pub fn parse_json(contents: &str) -> Result<Vec<String>, ArchiveError> {
    let urls = match serde_json::from_str::<UrlFile>(contents)? {
        UrlFile::List(urls) => urls,
        UrlFile::Wrapped { urls } => urls,
    };
    Ok(urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect())
}

pub fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Drops repeated URLs, keeping the first occurrence of each in order.
pub fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
