use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::ValueEnum;
use thiserror::Error;

use crate::cli::{Cli, Selection};

pub const USER_AGENT: &str = "edX-downloader/0.01";
pub const DEFAULT_DOWNLOADER: &str = "youtube-dl";
pub const DOWNLOADER_ENV: &str = "EDX_DL_DOWNLOADER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("you must supply username AND password to log-in")]
    MissingCredentials,
    #[error("'{0}' is not a number list; expected forms like '3', '1,8,16', '5-9' or 'all'")]
    InvalidNumberList(String),
    #[error("'{0}' is not a valid range; expected forms like '1-5' with start <= end")]
    InvalidRange(String),
    #[error("numbers are 1-based, '0' is not a valid choice")]
    ZeroIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Edx,
    Stanford,
}

/// Everything that differs between Open edX deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub name: &'static str,
    pub base_url: &'static str,
    pub courseware_tag: &'static str,
    pub courseware_label: &'static str,
}

impl Platform {
    pub fn profile(self) -> SiteProfile {
        match self {
            Platform::Edx => SiteProfile {
                name: "edx",
                base_url: "https://courses.edx.org",
                courseware_tag: "nav",
                courseware_label: "Course Navigation",
            },
            Platform::Stanford => SiteProfile {
                name: "stanford",
                base_url: "https://class.stanford.edu",
                courseware_tag: "section",
                courseware_label: "Course Navigation",
            },
        }
    }
}

impl SiteProfile {
    pub fn login_url(&self) -> String {
        format!("{}/login_ajax", self.base_url)
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.base_url)
    }

    pub fn courseware_selector(&self) -> String {
        format!(
            "{}[aria-label=\"{}\"]",
            self.courseware_tag, self.courseware_label
        )
    }

    /// Joins a site-relative href onto the base URL; absolute URLs pass through.
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url, href)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: Option<String>,
    pub subtitles: bool,
    pub rate_limit: Option<String>,
    pub rename: bool,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub site: SiteProfile,
    pub username: String,
    pub password: String,
    pub course_url: Option<String>,
    pub courses: Option<Selection>,
    pub weeks: Option<Selection>,
    pub list_enrolled: bool,
    pub list_weeks: bool,
    pub interactive: bool,
    pub downloader_bin: PathBuf,
    pub download: DownloadOptions,
}

impl RunConfig {
    /// Validates the parsed command line; runs before any network activity.
    /// `interactive` runs also ask for the video format and subtitles.
    pub fn from_cli(cli: Cli, interactive: bool) -> Result<Self, ConfigError> {
        let (username, password) = match (cli.username, cli.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => (user, pass),
            _ => return Err(ConfigError::MissingCredentials),
        };

        Ok(Self {
            site: cli.platform.profile(),
            username,
            password,
            course_url: cli.course_id,
            courses: cli.course_number,
            weeks: cli.week,
            list_enrolled: cli.list_enrolled,
            list_weeks: cli.list_weeks,
            interactive,
            downloader_bin: resolve_downloader_bin(),
            download: DownloadOptions {
                format: cli.format.filter(|value| !value.trim().is_empty()),
                subtitles: cli.with_subtitles,
                rate_limit: cli.rate_limit,
                rename: !cli.do_not_rename,
                output_dir: cli.output_dir,
            },
        })
    }
}

pub fn resolve_downloader_bin() -> PathBuf {
    resolve_downloader_bin_from_env(env::var_os(DOWNLOADER_ENV))
}

pub fn resolve_downloader_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_DOWNLOADER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn profiles_carry_platform_specific_selectors() {
        let edx = Platform::Edx.profile();
        assert_eq!(edx.courseware_selector(), "nav[aria-label=\"Course Navigation\"]");
        assert_eq!(edx.login_url(), "https://courses.edx.org/login_ajax");

        let stanford = Platform::Stanford.profile();
        assert_eq!(stanford.dashboard_url(), "https://class.stanford.edu/dashboard");
        assert!(stanford.courseware_selector().starts_with("section["));
    }

    #[test]
    fn absolute_url_keeps_full_urls() {
        let site = Platform::Edx.profile();
        assert_eq!(
            site.absolute_url("/courses/x/courseware/"),
            "https://courses.edx.org/courses/x/courseware/"
        );
        assert_eq!(
            site.absolute_url("https://other.example/a"),
            "https://other.example/a"
        );
    }

    #[test]
    fn downloader_bin_falls_back_when_env_missing_or_empty() {
        assert_eq!(
            resolve_downloader_bin_from_env(None),
            PathBuf::from(DEFAULT_DOWNLOADER)
        );
        assert_eq!(
            resolve_downloader_bin_from_env(Some(OsString::new())),
            PathBuf::from(DEFAULT_DOWNLOADER)
        );
        assert_eq!(
            resolve_downloader_bin_from_env(Some(OsString::from("/opt/yt-dlp"))),
            PathBuf::from("/opt/yt-dlp")
        );
    }

    #[test]
    fn missing_password_is_a_config_error() {
        let cli = Cli::parse_from(["edx-dl", "-u", "me@example.com"]);
        let err = RunConfig::from_cli(cli, false).expect_err("password is required");
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn do_not_rename_flag_disables_reconciliation() {
        let cli = Cli::parse_from([
            "edx-dl", "-u", "me", "-p", "secret", "-d", "-s", "-f", "22", "-x", "stanford",
        ]);
        let config = RunConfig::from_cli(cli, false).expect("valid config");
        assert!(!config.download.rename);
        assert!(config.download.subtitles);
        assert_eq!(config.download.format.as_deref(), Some("22"));
        assert_eq!(config.site.name, "stanford");
        assert_eq!(config.download.output_dir, PathBuf::from("Downloaded"));
    }
}
