use std::fs;
use std::io::{self, Write};
use std::sync::OnceLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tempfile::NamedTempFile;

use crate::error::SearchError;

const MAX_NAME_ATTEMPTS: usize = 10_000;
const FALLBACK_NAME: &str = "download";

/// Replaces path separators, reserved and control characters with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    static RESERVED: OnceLock<Option<Regex>> = OnceLock::new();
    let cleaned = match RESERVED
        .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).ok())
        .as_ref()
    {
        Some(pattern) => pattern.replace_all(name.trim(), "_").into_owned(),
        None => name.trim().to_string(),
    };
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
fn candidate_name(name: &str, attempt: usize) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    let path = Utf8Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{name} ({attempt})"),
    }
}

/// Writes `content` into `dir` under `name` without overwriting anything
/// already there. Returns the path actually written.
pub fn save_unique(dir: &Utf8Path, name: &str, content: &[u8]) -> Result<Utf8PathBuf, SearchError> {
    fs::create_dir_all(dir.as_std_path())
        .map_err(|err| SearchError::Filesystem(format!("create {dir}: {err}")))?;

    let mut temp = NamedTempFile::new_in(dir.as_std_path())
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;

    let name = sanitize_file_name(name);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let target = dir.join(candidate_name(&name, attempt));
        match temp.persist_noclobber(target.as_std_path()) {
            Ok(_) => return Ok(target),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => temp = err.file,
            Err(err) => {
                return Err(SearchError::Filesystem(format!("write {target}: {}", err.error)));
            }
        }
    }
    Err(SearchError::Filesystem(format!(
        "no free file name for {name} in {dir}"
    )))
}
