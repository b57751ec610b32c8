use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::http::PageFetcher;

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cue {
    pub(crate) index: usize,
    pub(crate) start_ms: u64,
    pub(crate) end_ms: u64,
    pub(crate) text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SubtitleTrack {
    pub(crate) cues: Vec<Cue>,
}

/// `HH:MM:SS,mmm`; hours keep counting past 24.
pub(crate) fn format_timecode(total_ms: u64) -> String {
    let hours = total_ms / MS_PER_HOUR;
    let minutes = total_ms % MS_PER_HOUR / MS_PER_MINUTE;
    let seconds = total_ms % MS_PER_MINUTE / MS_PER_SECOND;
    let millis = total_ms % MS_PER_SECOND;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n\n",
            self.index,
            format_timecode(self.start_ms),
            format_timecode(self.end_ms),
            self.text
        )
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cue in &self.cues {
            write!(f, "{cue}")?;
        }
        Ok(())
    }
}

fn millis(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|ms| *ms >= 0.0).map(|ms| ms as u64))
}

impl SubtitleTrack {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let starts = value.get("start")?.as_array()?;
        let ends = value.get("end")?.as_array()?;
        let texts = value.get("text")?.as_array()?;

        let mut cues = Vec::new();
        for ((start, end), text) in starts.iter().zip(ends).zip(texts) {
            let text = text.as_str()?;
            if text.is_empty() {
                continue;
            }
            cues.push(Cue {
                index: cues.len() + 1,
                start_ms: millis(start)?,
                end_ms: millis(end)?,
                text: text.to_string(),
            });
        }
        Some(Self { cues })
    }

    pub(crate) fn from_json(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(&value)
    }
}

/// Converts platform timed-text JSON to SubRip text, or `None` when unparseable.
pub(crate) fn json_to_srt(raw: &str) -> Option<String> {
    SubtitleTrack::from_json(raw).map(|track| track.to_string())
}

/// Fetches and converts one video's subtitles; every failure means "no subtitles".
pub(crate) fn fetch_subtitles(fetcher: &dyn PageFetcher, url: &str) -> Option<String> {
    let raw = match fetcher.fetch_text(url) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("edX subtitles unavailable: {err:#}");
            return None;
        }
    };
    let srt = json_to_srt(&raw);
    if srt.is_none() {
        warn!(url, "edX subtitles are not in the expected timed-text format");
    }
    srt
}
