use std::path::{Path, PathBuf};

const EXTRA_FILENAME_CHARS: &str = "-_.() ";

/// Keeps only characters that are safe in a file name on every platform.
pub fn sanitize_filename(name: &str, default_name: &str) -> String {
    let cleaned = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || EXTRA_FILENAME_CHARS.contains(*ch))
        .collect::<String>();
    if cleaned.is_empty() {
        default_name.to_string()
    } else {
        cleaned
    }
}

/// `<output_dir>/<course>/<week>` for a 1-based week number.
pub fn week_directory(
    output_dir: &Path,
    course_name: &str,
    week_title: &str,
    week_number: usize,
) -> PathBuf {
    output_dir
        .join(sanitize_filename(course_name, "course_folder"))
        .join(sanitize_filename(
            week_title.trim(),
            &format!("week {week_number}"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_disallowed_characters() {
        assert_eq!(sanitize_filename("&?foo*bar", ""), "foobar");
        assert_eq!(sanitize_filename("Week 1: Intro (Part A)", ""), "Week 1 Intro (Part A)");
        assert_eq!(sanitize_filename("a/b\\c", ""), "abc");
    }

    #[test]
    fn falls_back_to_default_when_nothing_remains() {
        assert_eq!(sanitize_filename("#$?*@", ""), "");
        assert_eq!(sanitize_filename("#$?*@", "course_dir"), "course_dir");
        assert_eq!(sanitize_filename("日本語", "week 2"), "week 2");
    }

    #[test]
    fn week_directory_nests_course_and_week() {
        let dir = week_directory(Path::new("Downloaded"), "CS191x: Quantum", "  ???  ", 3);
        assert_eq!(dir, Path::new("Downloaded").join("CS191x Quantum").join("week 3"));
    }
}
