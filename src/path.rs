//! Mapping archive pathnames onto the output directory.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::error::ExtractError;

/// Join `pathname` onto `output_dir` without ever leaving it.
///
/// Leading separators are dropped, so `/docs` lands at `output_dir/docs`.
/// Empty and `.` segments are ignored and `..` removes the previous segment.
/// A `..` with nothing left to remove, or a segment that is not a plain
/// file name (a drive prefix, an embedded NUL), rejects the whole entry.
pub fn resolve_destination(output_dir: &Path, pathname: &str) -> Result<PathBuf, ExtractError> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in pathname.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ExtractError::unsafe_path(pathname));
                }
            }
            _ => {
                if !is_plain_name(segment) {
                    return Err(ExtractError::unsafe_path(pathname));
                }
                segments.push(segment);
            }
        }
    }

    let mut destination = output_dir.to_path_buf();
    destination.extend(segments);
    Ok(destination)
}

/// Check that a link stored as `name` and pointing at `target` resolves
/// inside `output_dir`.
///
/// Returns the target as a pathname relative to the output directory, still
/// unnormalized, for use with [`crosses_link`].
pub fn resolve_link_target(
    output_dir: &Path,
    name: &str,
    target: &str,
) -> Result<String, ExtractError> {
    let rejected = || ExtractError::unsafe_path(format!("{name} -> {target}"));
    if target.is_empty() || target.starts_with('/') {
        return Err(rejected());
    }

    let parent = name
        .trim_end_matches('/')
        .rsplit_once('/')
        .map_or("", |(parent, _)| parent);
    let joined = format!("{parent}/{target}");
    resolve_destination(output_dir, &joined).map_err(|_| rejected())?;
    Ok(joined)
}

/// Whether walking `pathname` from the output directory goes through one of
/// `links` before reaching its last segment.
///
/// `links` holds link locations relative to the output directory, normalized
/// the way [`resolve_destination`] does.
pub fn crosses_link(pathname: &str, links: &HashSet<PathBuf>) -> bool {
    let segments: Vec<&str> = pathname
        .split('/')
        .filter(|segment| !matches!(*segment, "" | "."))
        .collect();

    let mut prefix = PathBuf::new();
    for (i, segment) in segments.iter().enumerate() {
        if *segment == ".." {
            prefix.pop();
            continue;
        }
        prefix.push(segment);
        if i + 1 < segments.len() && links.contains(&prefix) {
            return true;
        }
    }
    false
}

fn is_plain_name(segment: &str) -> bool {
    if segment.contains('\0') {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
