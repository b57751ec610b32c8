use std::sync::OnceLock;

use regex::Regex;

pub(crate) const VIDEO_ID_LENGTH: usize = 11;

const STREAM_MARKER: &str = r#"data-streams=(?:&#34;|").*1.0[0]*:"#;
const TRANSCRIPT_URL: &str =
    r#"data-transcript-translation-url=(?:&#34;|")([^"&]*)(?:&#34;|")"#;
const IFRAME_EMBED: &str = r#"//(?:w{1,3}\.)?youtube\.com/embed/([^ \?&"']*)[\?&"' ]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VideoRef {
    pub(crate) id: String,
    pub(crate) subtitle_url: Option<String>,
}

impl VideoRef {
    pub(crate) fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

fn stream_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(STREAM_MARKER).expect("stream marker pattern is valid"))
}

fn transcript_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TRANSCRIPT_URL).expect("transcript pattern is valid"))
}

fn iframe_embed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IFRAME_EMBED).expect("iframe pattern is valid"))
}

fn leading_id(segment: &str) -> String {
    segment.chars().take(VIDEO_ID_LENGTH).collect()
}

/// Text following each primary-stream marker, in page order.
pub(crate) fn stream_segments(page: &str) -> Vec<&str> {
    stream_marker().split(page).skip(1).collect()
}

pub(crate) fn transcript_path(segment: &str) -> Option<&str> {
    transcript_url()
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Ids of `youtube.com/embed/` iframes, in page order.
pub(crate) fn iframe_video_ids(page: &str) -> Vec<String> {
    iframe_embed()
        .captures_iter(page)
        .filter_map(|caps| caps.get(1))
        .map(|m| leading_id(m.as_str()))
        .collect()
}

pub(crate) fn subtitle_url(base_url: &str, transcript_path: &str, video_id: &str) -> String {
    format!("{base_url}{transcript_path}?videoId={video_id}&language=en")
}

/// Embedded stream videos first, then iframe videos; this order fixes the ordinals.
pub(crate) fn extract_video_refs(page: &str, base_url: &str) -> Vec<VideoRef> {
    let mut refs = stream_segments(page)
        .into_iter()
        .map(|segment| {
            let id = leading_id(segment);
            let subtitle_url = transcript_path(segment).map(|path| subtitle_url(base_url, path, &id));
            VideoRef { id, subtitle_url }
        })
        .collect::<Vec<_>>();

    refs.extend(iframe_video_ids(page).into_iter().map(|id| VideoRef {
        id,
        subtitle_url: None,
    }));
    refs
}
