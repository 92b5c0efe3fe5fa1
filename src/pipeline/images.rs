//! Local image references: collection for upload and link rewriting.
//!
//! Only `![alt](target)` references whose target is a local path take part.
//! Anything with a URL scheme (`http:`, `https:`, `data:`, …) or a
//! protocol-relative `//host` prefix is left alone. Local targets are
//! resolved against the document's directory and canonicalised (following
//! symlinks) so that `./a.png`, `a.png` and a symlink to it all compare
//! equal against the uploader's results.

use crate::output::UploadResult;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid regex"));

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid regex"));

/// Uploads local files and reports where each one ended up.
///
/// The object-storage client behind it is out of this crate's scope; this
/// trait is the only seam to it.
pub trait ImageUploader: Send + Sync {
    fn upload<'a>(&'a self, files: &'a [PathBuf]) -> BoxFuture<'a, Result<Vec<UploadResult>, String>>;
}

/// True for targets that point somewhere other than the local filesystem.
pub fn is_network_reference(target: &str) -> bool {
    let t = target.trim();
    // A Windows drive letter (`C:\`) looks like a one-letter scheme.
    let drive = t.len() >= 2 && t.as_bytes()[1] == b':' && t.as_bytes()[0].is_ascii_alphabetic();
    t.starts_with("//") || (SCHEME_RE.is_match(t) && !drive)
}

/// Split `path "title"` into the path part.
fn link_path(target: &str) -> &str {
    let t = target.trim();
    let t = t.strip_prefix('<').and_then(|s| s.strip_suffix('>')).unwrap_or(t);
    t.split_once(" \"").map_or(t, |(p, _)| p).trim()
}

/// Resolve a local link target to a canonical existing file.
fn resolve_local(target: &str, doc_dir: &Path) -> Option<PathBuf> {
    let path = link_path(target);
    if path.is_empty() || is_network_reference(path) {
        return None;
    }
    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        doc_dir.join(candidate)
    };
    let canonical = std::fs::canonicalize(&joined).ok()?;
    canonical.is_file().then_some(canonical)
}

fn doc_dir(doc_path: &Path) -> &Path {
    doc_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Existing local images referenced by `content`, canonical and de-duplicated
/// in order of first reference.
pub fn collect_local_images(content: &str, doc_path: &Path) -> Vec<PathBuf> {
    let dir = doc_dir(doc_path);
    let mut seen = HashSet::new();
    IMAGE_RE
        .captures_iter(content)
        .filter_map(|c| resolve_local(&c[2], dir))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Replace local references that were uploaded with their URLs.
///
/// Unmatched and network references are left exactly as written.
pub fn rewrite_image_links(content: &str, doc_path: &Path, results: &[UploadResult]) -> String {
    let dir = doc_dir(doc_path);
    let urls: HashMap<PathBuf, &str> = results
        .iter()
        .map(|r| {
            let key = std::fs::canonicalize(&r.local_path).unwrap_or_else(|_| r.local_path.clone());
            (key, r.url.as_str())
        })
        .collect();

    IMAGE_RE
        .replace_all(content, |c: &regex::Captures<'_>| {
            match resolve_local(&c[2], dir).and_then(|p| urls.get(&p)) {
                Some(url) => format!("![{}]({})", &c[1], url),
                None => c[0].to_string(),
            }
        })
        .into_owned()
}
