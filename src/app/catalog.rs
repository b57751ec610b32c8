use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::extract::{VideoRef, extract_video_refs};
use crate::config::SiteProfile;
use crate::http::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnrollmentState {
    Started,
    NotYetStarted,
}

impl EnrollmentState {
    pub(crate) fn label(self) -> &'static str {
        match self {
            EnrollmentState::Started => "Started",
            EnrollmentState::NotYetStarted => "Not yet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Course {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) state: EnrollmentState,
}

impl Course {
    /// Swaps the trailing `info` path segment for `courseware`.
    pub(crate) fn courseware_url(&self) -> String {
        let trimmed = self.url.trim_end_matches('/');
        match trimmed.strip_suffix("/info") {
            Some(root) => {
                let slash = if trimmed.len() < self.url.len() { "/" } else { "" };
                format!("{root}/courseware{slash}")
            }
            None => self.url.clone(),
        }
    }

    /// Compares against a user-supplied course URL, ignoring trailing slashes.
    pub(crate) fn matches_url(&self, url: &str) -> bool {
        self.url.trim_end_matches('/') == url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Week {
    pub(crate) ordinal: usize,
    pub(crate) title: String,
    pub(crate) links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dashboard {
    pub(crate) username: Option<String>,
    pub(crate) courses: Vec<Course>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| anyhow!("invalid CSS selector `{css}`"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn parse_dashboard(markup: &str, site: &SiteProfile) -> Result<Dashboard> {
    let document = Html::parse_document(markup);
    let ul = selector("ul")?;
    let span = selector("span")?;
    let article = selector("article.course")?;
    let h3 = selector("h3")?;
    let anchor = selector("a[href]")?;

    let username = document
        .select(&ul)
        .nth(1)
        .and_then(|list| list.select(&span).nth(1))
        .map(element_text)
        .filter(|name| !name.is_empty());

    let courses = document
        .select(&article)
        .filter_map(|course| {
            let name = course.select(&h3).next().map(element_text)?;
            let href = course.select(&anchor).next()?.value().attr("href")?;
            let url = site.absolute_url(href);
            let state = if url.ends_with("info") || url.ends_with("info/") {
                EnrollmentState::Started
            } else {
                EnrollmentState::NotYetStarted
            };
            Some(Course { name, url, state })
        })
        .collect();

    Ok(Dashboard { username, courses })
}

/// Weeks in the course navigation, in page order; blocks without a title link are skipped.
pub(crate) fn parse_weeks(markup: &str, site: &SiteProfile) -> Result<Vec<Week>> {
    let document = Html::parse_document(markup);
    let container = selector(&site.courseware_selector())?;
    let div = selector("div")?;
    let title_sel = selector("h3 a")?;
    let link_sel = selector("ul a[href]")?;

    let Some(nav) = document.select(&container).next() else {
        warn!("course navigation not found on courseware page");
        return Ok(Vec::new());
    };

    let weeks = nav
        .select(&div)
        .filter_map(|block| {
            let title = block.select(&title_sel).next().map(element_text)?;
            let links = block
                .select(&link_sel)
                .filter_map(|anchor| anchor.value().attr("href"))
                .map(|href| site.absolute_url(href))
                .collect::<Vec<_>>();
            Some((title, links))
        })
        .enumerate()
        .map(|(idx, (title, links))| Week {
            ordinal: idx + 1,
            title,
            links,
        })
        .collect();
    Ok(weeks)
}

/// Fetches every unit link of a week and concatenates the videos found, in order.
pub(crate) fn collect_week_videos(
    fetcher: &dyn PageFetcher,
    site: &SiteProfile,
    week: &Week,
) -> Vec<VideoRef> {
    let mut videos = Vec::new();
    for link in &week.links {
        info!("Processing '{link}'...");
        let page = match fetcher.fetch_text(link) {
            Ok(page) => page,
            Err(err) => {
                warn!("skipping unit: {err:#}");
                continue;
            }
        };
        videos.extend(extract_video_refs(&page, site.base_url));
    }
    videos
}
