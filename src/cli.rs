use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, Platform};

#[derive(Debug, Parser)]
#[command(
    name = "edx-dl",
    version,
    about = "Get videos from the Open edX platform",
    after_help = "For further use information, see the file README.md"
)]
pub struct Cli {
    /// Target course URL (e.g. https://courses.edx.org/courses/BerkeleyX/CS191x/2013_Spring/info/)
    pub course_id: Option<String>,

    /// Your edX username (email)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Your edX password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Format of videos to download
    #[arg(short, long)]
    pub format: Option<String>,

    /// Download subtitles with the videos
    #[arg(short = 's', long)]
    pub with_subtitles: bool,

    /// Store the files to the specified directory
    #[arg(short, long, default_value = "Downloaded")]
    pub output_dir: PathBuf,

    /// Open edX platform
    #[arg(short = 'x', long, value_enum, default_value_t = Platform::Edx)]
    pub platform: Platform,

    /// Limit the download speed to the specified maximum (e.g. 50k or 44.6m)
    #[arg(short, long)]
    pub rate_limit: Option<String>,

    /// Week numbers from --list, e.g. "1,3,5-7" or "all"
    #[arg(short, long, value_parser = parse_selection)]
    pub week: Option<Selection>,

    /// List weeks in course
    #[arg(short = 'l', long = "list")]
    pub list_weeks: bool,

    /// List enrolled courses
    #[arg(short = 'e', long)]
    pub list_enrolled: bool,

    /// Course numbers from --list-enrolled, e.g. "2" or "all"
    #[arg(short, long, value_parser = parse_selection)]
    pub course_number: Option<Selection>,

    /// Do not try to search and rename files with changed index
    #[arg(short, long)]
    pub do_not_rename: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Numbers(Vec<usize>),
}

impl Selection {
    /// Expands the selection against a listing of `total` items, in request order.
    pub fn resolve(&self, total: usize) -> Vec<usize> {
        match self {
            Selection::All => (1..=total).collect(),
            Selection::Numbers(numbers) => numbers.clone(),
        }
    }
}

pub fn parse_selection(raw: &str) -> Result<Selection, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(Selection::All);
    }

    let mut numbers = Vec::new();
    for item in trimmed
        .split(|ch: char| ch == ',' || ch == ' ')
        .filter(|item| !item.is_empty())
    {
        if let Some((start, end)) = item.split_once('-') {
            let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) else {
                return Err(ConfigError::InvalidRange(item.to_string()));
            };
            if start > end {
                return Err(ConfigError::InvalidRange(item.to_string()));
            }
            if start == 0 {
                return Err(ConfigError::ZeroIndex);
            }
            numbers.extend(start..=end);
        } else {
            let number = item
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidNumberList(raw.to_string()))?;
            if number == 0 {
                return Err(ConfigError::ZeroIndex);
            }
            numbers.push(number);
        }
    }

    if numbers.is_empty() {
        return Err(ConfigError::InvalidNumberList(raw.to_string()));
    }
    Ok(Selection::Numbers(numbers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_numbers_lists_and_ranges() {
        assert_eq!(parse_selection("1").unwrap(), Selection::Numbers(vec![1]));
        assert_eq!(
            parse_selection("5-9").unwrap(),
            Selection::Numbers(vec![5, 6, 7, 8, 9])
        );
        assert_eq!(
            parse_selection("1,8,16").unwrap(),
            Selection::Numbers(vec![1, 8, 16])
        );
        assert_eq!(
            parse_selection("1,3,5-7,8-10").unwrap(),
            Selection::Numbers(vec![1, 3, 5, 6, 7, 8, 9, 10])
        );
        assert_eq!(
            parse_selection("2 4").unwrap(),
            Selection::Numbers(vec![2, 4])
        );
        assert_eq!(parse_selection("all").unwrap(), Selection::All);
    }

    #[test]
    fn rejects_reversed_ranges_and_garbage() {
        assert!(matches!(
            parse_selection("7-3"),
            Err(ConfigError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_selection("string,list"),
            Err(ConfigError::InvalidNumberList(_))
        ));
        assert!(matches!(
            parse_selection("1-x"),
            Err(ConfigError::InvalidRange(_))
        ));
        assert!(matches!(parse_selection("0"), Err(ConfigError::ZeroIndex)));
        assert!(parse_selection("").is_err());
    }

    #[test]
    fn resolve_expands_all_against_listing_size() {
        assert_eq!(Selection::All.resolve(3), vec![1, 2, 3]);
        assert_eq!(Selection::Numbers(vec![4, 2]).resolve(3), vec![4, 2]);
    }

    #[test]
    fn invalid_week_list_fails_argument_parsing() {
        let result = Cli::try_parse_from(["edx-dl", "-w", "9-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_platform_fails_argument_parsing() {
        let result = Cli::try_parse_from(["edx-dl", "-x", "coursera"]);
        assert!(result.is_err());
    }
}
