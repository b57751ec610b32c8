use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::downloader::Downloader;
use super::extract::VideoRef;
use super::process::OutputSource;
use super::reconcile::{
    Ordinal, ReconcileOptions, Reconciliation, downloaded_base_name, ordinals,
    reconcile_ordinal, with_srt_extension,
};
use super::subtitles::fetch_subtitles;
use crate::config::DownloadOptions;
use crate::http::PageFetcher;

pub(crate) struct DownloadContext<'a> {
    pub(crate) downloader: &'a Downloader,
    pub(crate) fetcher: &'a dyn PageFetcher,
    pub(crate) options: &'a DownloadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubtitleOutcome {
    NotRequested,
    AlreadyPresent(PathBuf),
    Written(PathBuf),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VideoReport {
    pub(crate) ordinal: Ordinal,
    pub(crate) reconciliation: Reconciliation,
    pub(crate) downloader_succeeded: bool,
    pub(crate) subtitles: SubtitleOutcome,
}

/// Downloads a week's videos in ordinal order; one failing video never stops the rest.
pub(crate) fn download_week(
    ctx: &DownloadContext<'_>,
    target_dir: &Path,
    videos: &[VideoRef],
    out: &mut dyn Write,
) -> Vec<VideoReport> {
    ordinals(videos.len())
        .into_iter()
        .zip(videos)
        .map(|(ordinal, video)| download_video(ctx, target_dir, ordinal, video, out))
        .collect()
}

pub(crate) fn download_video(
    ctx: &DownloadContext<'_>,
    target_dir: &Path,
    ordinal: Ordinal,
    video: &VideoRef,
    out: &mut dyn Write,
) -> VideoReport {
    let url = video.watch_url();
    let expected_name = match ctx
        .downloader
        .query_filename(&url, ctx.options.format.as_deref())
    {
        Ok(name) => Some(name),
        Err(err) => {
            warn!("could not resolve filename for {url}: {err:#}");
            None
        }
    };

    let reconciliation = match expected_name.as_deref() {
        Some(name) => {
            info!(
                "Filename template: {}",
                target_dir
                    .join(format!("{}-{name}", "[0-9]".repeat(ordinal.width)))
                    .display()
            );
            let options = ReconcileOptions {
                rename: ctx.options.rename,
                subtitles: ctx.options.subtitles,
            };
            reconcile_ordinal(target_dir, ordinal, name, options).unwrap_or_else(|err| {
                warn!("skipping rename check: {err:#}");
                Reconciliation::Unchanged
            })
        }
        None => Reconciliation::Unchanged,
    };

    let downloader_succeeded = run_download(ctx, target_dir, ordinal, &url, out);

    let subtitles = if ctx.options.subtitles {
        write_subtitles(ctx, target_dir, ordinal, expected_name.as_deref(), video)
    } else {
        SubtitleOutcome::NotRequested
    };

    VideoReport {
        ordinal,
        reconciliation,
        downloader_succeeded,
        subtitles,
    }
}

fn run_download(
    ctx: &DownloadContext<'_>,
    target_dir: &Path,
    ordinal: Ordinal,
    url: &str,
    out: &mut dyn Write,
) -> bool {
    let mut child = match ctx
        .downloader
        .spawn_download(target_dir, ordinal, ctx.options, url)
    {
        Ok(child) => child,
        Err(err) => {
            warn!("{err:#}");
            return false;
        }
    };

    let mut last_error_line = None::<String>;
    for chunk in child.by_ref() {
        let _ = out.write_all(chunk.text.as_bytes());
        let _ = out.flush();
        if chunk.source == OutputSource::Stderr {
            if let Some(line) = chunk.text.lines().rev().find(|line| !line.trim().is_empty()) {
                last_error_line = Some(line.trim().to_string());
            }
        }
    }

    match child.wait() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            match last_error_line {
                Some(line) => debug!("downloader exited with status {status}: {line}"),
                None => debug!("downloader exited with status {status}"),
            }
            false
        }
        Err(err) => {
            warn!("{err:#}");
            false
        }
    }
}

fn subtitle_path(
    target_dir: &Path,
    ordinal: Ordinal,
    expected_name: Option<&str>,
) -> Option<PathBuf> {
    match expected_name {
        Some(name) => Some(with_srt_extension(
            &target_dir.join(format!("{}-{name}", ordinal.prefix())),
        )),
        None => downloaded_base_name(target_dir, ordinal)
            .map(|base| target_dir.join(format!("{base}.srt"))),
    }
}

fn write_subtitles(
    ctx: &DownloadContext<'_>,
    target_dir: &Path,
    ordinal: Ordinal,
    expected_name: Option<&str>,
    video: &VideoRef,
) -> SubtitleOutcome {
    let Some(path) = subtitle_path(target_dir, ordinal, expected_name) else {
        warn!(
            "cannot place subtitles for video {}: no downloaded file found",
            ordinal.prefix()
        );
        return SubtitleOutcome::Unavailable;
    };
    if path.exists() {
        return SubtitleOutcome::AlreadyPresent(path);
    }
    let Some(url) = video.subtitle_url.as_deref() else {
        debug!("no edX subtitles for video {}", video.id);
        return SubtitleOutcome::Unavailable;
    };
    let Some(srt) = fetch_subtitles(ctx.fetcher, url).filter(|srt| !srt.is_empty()) else {
        return SubtitleOutcome::Unavailable;
    };

    info!("Writing edX subtitles: {}", path.display());
    let written = fs::create_dir_all(target_dir).and_then(|_| fs::write(&path, srt));
    match written {
        Ok(()) => SubtitleOutcome::Written(path),
        Err(err) => {
            warn!("failed writing {}: {err}", path.display());
            SubtitleOutcome::Unavailable
        }
    }
}

pub(crate) fn summarize_week(week_title: &str, reports: &[VideoReport]) {
    for report in reports {
        let prefix = report.ordinal.prefix();
        if !report.downloader_succeeded {
            warn!("Video {prefix} did not download cleanly");
        }
        match &report.reconciliation {
            Reconciliation::Renamed { from, to } => {
                debug!("video {prefix}: {} -> {}", from.display(), to.display());
            }
            Reconciliation::Kept { found, expected } => {
                warn!(
                    "Video {prefix} is still stored as {} instead of {}",
                    found.display(),
                    expected.display()
                );
            }
            Reconciliation::Unchanged => {}
        }
        match &report.subtitles {
            SubtitleOutcome::AlreadyPresent(path) => {
                debug!("video {prefix}: subtitles already at {}", path.display());
            }
            SubtitleOutcome::Written(path) => {
                debug!("video {prefix}: subtitles written to {}", path.display());
            }
            SubtitleOutcome::NotRequested | SubtitleOutcome::Unavailable => {}
        }
    }
    let finished = reports
        .iter()
        .filter(|report| report.downloader_succeeded)
        .count();
    info!(
        "{finished} of {} downloads in '{week_title}' finished cleanly",
        reports.len()
    );
}
