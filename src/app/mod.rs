mod catalog;
mod download;
mod downloader;
mod extract;
mod process;
mod prompt;
mod reconcile;
mod subtitles;


use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{Cli, Selection};
use crate::config::{DownloadOptions, RunConfig};
use crate::http::{PageFetcher, Session};
use crate::paths::week_directory;

use self::catalog::{Course, EnrollmentState, collect_week_videos, parse_dashboard, parse_weeks};
use self::download::{DownloadContext, download_week, summarize_week};
use self::downloader::Downloader;
use self::extract::VideoRef;

pub(crate) use self::process::install_interrupt_handler;

pub fn run(cli: Cli) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    let config = resolve_config(cli, &mut input, &mut stdout)?;
    let session = Session::login(&config.site, &config.username, &config.password)?;
    let downloader = Downloader::new(&config.downloader_bin);
    run_courses(&config, &session, &downloader, &mut input, &mut stdout)
}

/// A run without username and password asks for the platform and credentials,
/// and later for the video format and subtitles.
fn resolve_config(
    mut cli: Cli,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<RunConfig> {
    let interactive = cli.username.is_none() && cli.password.is_none();
    if interactive {
        let login = prompt::ask_login(input, out)?;
        cli.platform = login.platform;
        cli.username = Some(login.username);
        cli.password = Some(login.password);
    }
    Ok(RunConfig::from_cli(cli, interactive)?)
}

fn run_courses(
    config: &RunConfig,
    fetcher: &dyn PageFetcher,
    downloader: &Downloader,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let dashboard_markup = fetcher
        .fetch_text(&config.site.dashboard_url())
        .context("failed to load the dashboard")?;
    let dashboard = parse_dashboard(&dashboard_markup, &config.site)?;
    let courses = dashboard.courses;

    if let Some(username) = &dashboard.username {
        info!("Welcome {username}");
    }
    info!("You can access {} courses", courses.len());
    for (idx, course) in courses.iter().enumerate() {
        info!("{} - {} -> {}", idx + 1, course.name, course.state.label());
    }
    if config.list_enrolled {
        return Ok(());
    }

    let selected = select_courses(config, &courses, input, out)?;
    let mut options = config.download.clone();
    let mut format_pending = config.interactive;

    for number in selected {
        let Some(course) = number.checked_sub(1).and_then(|idx| courses.get(idx)) else {
            warn!("Course {number} is not in the list of enrolled courses, skipping");
            continue;
        };
        info!("Using course {number}: {}", course.name);
        if course.state != EnrollmentState::Started {
            info!("Course {number}: {} is not started yet", course.name);
            continue;
        }

        let courseware = match fetcher.fetch_text(&course.courseware_url()) {
            Ok(markup) => markup,
            Err(err) => {
                warn!("could not load courseware for {}: {err:#}", course.name);
                continue;
            }
        };
        let weeks = parse_weeks(&courseware, &config.site)?;

        info!("{} has {} weeks so far", course.name, weeks.len());
        for week in &weeks {
            info!("{} - Download {} videos", week.ordinal, week.title);
        }
        if config.weeks.is_none() {
            info!("{} - Download them all", weeks.len() + 1);
        } else {
            info!("\"all\" - Download them all");
        }
        if config.list_weeks {
            return Ok(());
        }

        let week_numbers = match &config.weeks {
            Some(Selection::All) => {
                info!("Downloading all items");
                Selection::All.resolve(weeks.len())
            }
            Some(selection) => {
                let numbers = selection.resolve(weeks.len());
                info!("Downloading items : {numbers:?}");
                numbers
            }
            None => prompt::choose_weeks(input, out, weeks.len())?,
        };

        info!("Base output directory: {}", options.output_dir.display());
        for week_number in week_numbers {
            let Some(week) = week_number.checked_sub(1).and_then(|idx| weeks.get(idx)) else {
                warn!("Week {week_number} does not exist in {}, skipping", course.name);
                continue;
            };
            info!("Processing item # {week_number}");

            let videos = collect_week_videos(fetcher, &config.site, week);
            if videos.is_empty() {
                warn!("No downloadable video found.");
                continue;
            }

            if format_pending {
                choose_format(downloader, &videos[0], input, out, &mut options)?;
                format_pending = false;
            }

            let target_dir =
                week_directory(&options.output_dir, &course.name, &week.title, week_number);
            let ctx = DownloadContext {
                downloader,
                fetcher,
                options: &options,
            };
            let reports = download_week(&ctx, &target_dir, &videos, out);
            summarize_week(&week.title, &reports);
        }
    }

    Ok(())
}

fn select_courses(
    config: &RunConfig,
    courses: &[Course],
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<Vec<usize>> {
    if let Some(url) = config.course_url.as_deref() {
        return match courses.iter().position(|course| course.matches_url(url)) {
            Some(idx) => Ok(vec![idx + 1]),
            None => bail!("course {url} is not among your enrolled courses"),
        };
    }

    match &config.courses {
        Some(Selection::All) => {
            info!("Downloading all started courses");
            Ok(Selection::All.resolve(courses.len()))
        }
        Some(selection) => {
            let numbers = selection.resolve(courses.len());
            info!("Selected courses : {numbers:?}");
            Ok(numbers)
        }
        None => Ok(vec![prompt::choose_course(input, out, courses)?]),
    }
}

/// Asked once per run, after the first week's videos are known.
fn choose_format(
    downloader: &Downloader,
    sample: &VideoRef,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    options: &mut DownloadOptions,
) -> Result<()> {
    if let Err(err) = downloader.list_formats(&sample.watch_url()) {
        warn!("could not list formats: {err:#}");
    }
    info!("Choose a valid format or a set of valid format codes e.g. 22/17/...");
    let format = prompt::ask(input, out, "Choose Format code: ")?;
    options.format = (!format.is_empty()).then_some(format);
    options.subtitles = prompt::ask_yes_no(input, out, "Download subtitles (y/n)? ")?;
    Ok(())
}
