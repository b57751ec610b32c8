use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Zero-padded filename prefix for one video within a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ordinal {
    pub(crate) index: usize,
    pub(crate) width: usize,
}

impl Ordinal {
    pub(crate) fn prefix(&self) -> String {
        format!("{:0width$}", self.index, width = self.width)
    }
}

/// Digit count of the week's video count.
pub(crate) fn ordinal_width(count: usize) -> usize {
    count.max(1).to_string().len()
}

/// Ordinals `1..=count` in extraction order.
pub(crate) fn ordinals(count: usize) -> Vec<Ordinal> {
    let width = ordinal_width(count);
    (1..=count).map(|index| Ordinal { index, width }).collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReconcileOptions {
    pub(crate) rename: bool,
    pub(crate) subtitles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reconciliation {
    /// No single candidate under another prefix.
    Unchanged,
    Renamed { from: PathBuf, to: PathBuf },
    /// Drift detected but renaming is disabled.
    Kept { found: PathBuf, expected: PathBuf },
}

pub(crate) fn with_srt_extension(path: &Path) -> PathBuf {
    path.with_extension("srt")
}

fn matches_any_prefix(name: &str, width: usize, filename: &str) -> bool {
    let Some(digits) = name.get(..width) else {
        return false;
    };
    digits.bytes().all(|byte| byte.is_ascii_digit())
        && name[width..].strip_prefix('-') == Some(filename)
}

/// Files named `<any width digits>-<filename>` in `dir`; a missing directory has none.
pub(crate) fn prefix_candidates(dir: &Path, width: usize, filename: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list {}", dir.display()));
        }
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if matches_any_prefix(name, width, filename) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Moves a previously downloaded file whose ordinal drifted back to `<prefix>-<filename>`.
/// Zero or several candidates are left alone.
pub(crate) fn reconcile_ordinal(
    dir: &Path,
    ordinal: Ordinal,
    filename: &str,
    options: ReconcileOptions,
) -> Result<Reconciliation> {
    let expected = dir.join(format!("{}-{filename}", ordinal.prefix()));
    let candidates = prefix_candidates(dir, ordinal.width, filename)?;
    let [found] = candidates.as_slice() else {
        return Ok(Reconciliation::Unchanged);
    };
    if *found == expected {
        return Ok(Reconciliation::Unchanged);
    }

    info!("Found with different index: {}", found.display());
    if !options.rename {
        info!("No action, renaming is disabled");
        return Ok(Reconciliation::Kept {
            found: found.clone(),
            expected,
        });
    }

    info!("Rename to: {}", expected.display());
    fs::rename(found, &expected).with_context(|| {
        format!(
            "failed to rename {} to {}",
            found.display(),
            expected.display()
        )
    })?;

    if options.subtitles {
        let old_subs = with_srt_extension(found);
        if old_subs.is_file() {
            let new_subs = with_srt_extension(&expected);
            info!("Rename subs to: {}", new_subs.display());
            fs::rename(&old_subs, &new_subs).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    old_subs.display(),
                    new_subs.display()
                )
            })?;
        }
    }

    Ok(Reconciliation::Renamed {
        from: found.clone(),
        to: expected,
    })
}

/// Base name of the first `<prefix>-…` video in `dir`, skipping subtitles and partial files.
pub(crate) fn downloaded_base_name(dir: &Path, ordinal: Ordinal) -> Option<String> {
    let marker = format!("{}-", ordinal.prefix());
    let mut names = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(&marker))
        .filter(|name| {
            let ext = Path::new(name).extension().and_then(|ext| ext.to_str());
            !matches!(ext, Some("srt") | Some("part") | Some("ytdl") | Some("vtt"))
        })
        .collect::<Vec<_>>();
    names.sort();
    let first = names.into_iter().next()?;
    Path::new(&first)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
