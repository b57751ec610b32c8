use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use super::process::StreamingChild;
use super::reconcile::Ordinal;
use crate::config::DownloadOptions;

const TITLE_TEMPLATE: &str = "%(title)s.%(ext)s";
const FALLBACK_CONTAINER: &str = "mp4";

/// The external youtube-dl compatible program.
#[derive(Debug, Clone)]
pub(crate) struct Downloader {
    bin: PathBuf,
}

/// `<format>/mp4` so an unavailable format still yields a download.
pub(crate) fn format_selector(format: &str) -> String {
    format!("{format}/{FALLBACK_CONTAINER}")
}

pub(crate) fn output_template(target_dir: &Path, ordinal: Ordinal) -> PathBuf {
    target_dir.join(format!("{}-{TITLE_TEMPLATE}", ordinal.prefix()))
}

pub(crate) fn download_args(
    target_dir: &Path,
    ordinal: Ordinal,
    options: &DownloadOptions,
    url: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-o".into(),
        output_template(target_dir, ordinal).into_os_string(),
    ];
    if let Some(format) = options.format.as_deref() {
        args.push("-f".into());
        args.push(format_selector(format).into());
    }
    if options.subtitles {
        args.push("--write-sub".into());
    }
    if let Some(limit) = options.rate_limit.as_deref() {
        args.push(format!("--rate-limit={limit}").into());
    }
    args.push(url.into());
    args
}

pub(crate) fn filename_query_args(format: Option<&str>, url: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--get-filename".into(),
        "--no-check-certificate".into(),
        "-o".into(),
        TITLE_TEMPLATE.into(),
    ];
    if let Some(format) = format {
        args.push("-f".into());
        args.push(format_selector(format).into());
    }
    args.push(url.into());
    args
}

/// Renders an argument list the way it would be typed in a shell, for logs.
pub(crate) fn display_command(bin: &Path, args: &[OsString]) -> String {
    let mut parts = vec![bin.display().to_string()];
    parts.extend(args.iter().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

impl Downloader {
    pub(crate) fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Asks the downloader for the name it would give `url`, without the ordinal prefix.
    pub(crate) fn query_filename(&self, url: &str, format: Option<&str>) -> Result<String> {
        let args = filename_query_args(format, url);
        debug!("querying filename: {}", display_command(&self.bin, &args));
        let output = ProcessCommand::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to launch {}", self.bin.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with status {}: {}",
                self.bin.display(),
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(name) => Ok(name.to_string()),
            None => bail!("{} printed no filename for {url}", self.bin.display()),
        }
    }

    pub(crate) fn spawn_download(
        &self,
        target_dir: &Path,
        ordinal: Ordinal,
        options: &DownloadOptions,
        url: &str,
    ) -> Result<StreamingChild> {
        let args = download_args(target_dir, ordinal, options, url);
        info!("youtube-dl: {}", display_command(&self.bin, &args));
        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.args(&args);
        StreamingChild::spawn(cmd)
    }

    /// Prints the available formats of `url` straight to the terminal.
    pub(crate) fn list_formats(&self, url: &str) -> Result<()> {
        let status = ProcessCommand::new(&self.bin)
            .arg("-F")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("failed to launch {}", self.bin.display()))?;
        if !status.success() {
            bail!("{} -F exited with status {status}", self.bin.display());
        }
        Ok(())
    }
}
