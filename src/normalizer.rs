//! Rewrites SRT, ASS/SSA and VTT source text into one intermediate markup:
//! a `WEBVTT` header, a blank line, then `HH:MM:SS.mmm --> HH:MM:SS.mmm`
//! blocks each followed by their text and a blank line.
//!
//! Malformed input is dropped block by block; normalising never fails.

use crate::format::SubtitleFormat;

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

pub const HEADER: &str = "WEBVTT";

pub fn normalize(raw: &str, format: SubtitleFormat) -> String {
    let raw = strip_bom(raw);
    match format {
        SubtitleFormat::Vtt => normalize_vtt(raw),
        SubtitleFormat::AssSsa => normalize_ass(raw),
        SubtitleFormat::Srt | SubtitleFormat::Unknown => normalize_srt(raw),
    }
}

fn header_block() -> String {
    format!("{}\n\n", HEADER)
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

fn unify_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn normalize_vtt(raw: &str) -> String {
    let has_header = raw
        .lines()
        .next()
        .map_or(false, |first| first.starts_with(HEADER));
    if has_header {
        raw.to_string()
    } else {
        header_block() + raw
    }
}

fn normalize_srt(raw: &str) -> String {
    let text = unify_line_endings(raw);
    let mut out = header_block();
    for block in blocks(&text) {
        // index, timing, and at least one line of text
        if block.len() < 3 {
            debug!(lines = block.len(), "dropping truncated SRT block");
            continue;
        }
        out.push_str(&normalize_srt_timing(block[1]));
        out.push('\n');
        out.push_str(&block[2..].join("\n"));
        out.push_str("\n\n");
    }
    out
}

/// Groups lines into runs separated by blank lines.
fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn arrow_regex() -> &'static Regex {
    static ARROW: OnceLock<Regex> = OnceLock::new();
    ARROW.get_or_init(|| Regex::new(r"\s*-->\s*").expect("arrow pattern is valid"))
}

fn normalize_srt_timing(line: &str) -> String {
    let line = line.trim().replace(',', ".");
    arrow_regex().replace_all(&line, " --> ").into_owned()
}

/// Column positions inside a `Dialogue:` line.
#[derive(Debug, Clone, PartialEq)]
struct AssColumns {
    start: usize,
    end: usize,
    field_count: usize,
}

impl Default for AssColumns {
    // Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text
    fn default() -> Self {
        Self {
            start: 1,
            end: 2,
            field_count: 10,
        }
    }
}

impl AssColumns {
    /// Reads a `Format:` line. Text has to be the last column since it may
    /// itself contain commas; anything else falls back to the default order.
    fn from_format(fields: &str) -> Self {
        let names: Vec<&str> = fields.split(',').map(str::trim).collect();
        let position = |wanted: &str| {
            names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(wanted))
        };
        match (position("Start"), position("End"), position("Text")) {
            (Some(start), Some(end), Some(text)) if text == names.len() - 1 => Self {
                start,
                end,
                field_count: names.len(),
            },
            _ => {
                debug!(format = fields, "unusable ASS Format line, using default columns");
                Self::default()
            }
        }
    }
}

fn normalize_ass(raw: &str) -> String {
    let text = unify_line_endings(raw);
    let mut out = header_block();
    let mut in_events = false;
    let mut columns = AssColumns::default();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') && line.ends_with(']') {
            in_events = line == "[Events]";
            continue;
        }
        if !in_events {
            continue;
        }
        if let Some(fields) = line.strip_prefix("Format:") {
            columns = AssColumns::from_format(fields);
            continue;
        }
        let Some(body) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        match dialogue_block(body, &columns) {
            Some(block) => out.push_str(&block),
            None => debug!(line, "dropping ASS dialogue line"),
        }
    }
    out
}

fn dialogue_block(body: &str, columns: &AssColumns) -> Option<String> {
    let fields: Vec<&str> = body.splitn(columns.field_count, ',').collect();
    if fields.len() < columns.field_count {
        return None;
    }
    let start = ass_timestamp(fields[columns.start].trim())?;
    let end = ass_timestamp(fields[columns.end].trim())?;
    let text = clean_ass_text(fields[columns.field_count - 1]);
    if text.is_empty() {
        return None;
    }
    Some(format!("{} --> {}\n{}\n\n", start, end, text))
}

fn ass_time_regex() -> &'static Regex {
    static TIME: OnceLock<Regex> = OnceLock::new();
    TIME.get_or_init(|| {
        Regex::new(r"^(\d+):(\d{2}):(\d{2})\.(\d{2})$").expect("ASS time pattern is valid")
    })
}

/// `H:MM:SS.CC` to `HH:MM:SS.mmm`.
fn ass_timestamp(ts: &str) -> Option<String> {
    let caps = ass_time_regex().captures(ts)?;
    let centis: u32 = caps[4].parse().ok()?;
    Some(format!(
        "{:0>2}:{}:{}.{:03}",
        &caps[1],
        &caps[2],
        &caps[3],
        centis * 10
    ))
}

fn override_regex() -> &'static Regex {
    static OVERRIDE: OnceLock<Regex> = OnceLock::new();
    OVERRIDE.get_or_init(|| Regex::new(r"\{[^}]*\}").expect("override pattern is valid"))
}

fn clean_ass_text(text: &str) -> String {
    let stripped = override_regex().replace_all(text, "");
    let unescaped = stripped
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ");
    // Blank lines would end the cue block in the markup.
    unescaped
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_rewrites_timing_and_drops_index() {
        let srt = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000-->00:00:04,000\nTwo\nlines\n";
        assert_eq!(
            normalize(srt, SubtitleFormat::Srt),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nHello\n\n00:00:03.000 --> 00:00:04.000\nTwo\nlines\n\n"
        );
    }

    #[test]
    fn srt_drops_short_blocks() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nOne\n\n2\n00:00:03,000 --> 00:00:04,000\n\n3\n00:00:05,000 --> 00:00:06,000\nThree\n";
        let markup = normalize(srt, SubtitleFormat::Srt);
        assert!(markup.contains("One"));
        assert!(!markup.contains("00:00:03.000"));
        assert!(markup.contains("Three"));
    }

    #[test]
    fn srt_accepts_crlf_and_bom() {
        let srt = "\u{FEFF}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n";
        assert_eq!(
            normalize(srt, SubtitleFormat::Srt),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n\n"
        );
    }

    #[test]
    fn unknown_is_treated_as_srt() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHi\n";
        assert_eq!(
            normalize(srt, SubtitleFormat::Unknown),
            normalize(srt, SubtitleFormat::Srt)
        );
    }

    #[test]
    fn vtt_passes_through() {
        let vtt = "WEBVTT - talk\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        assert_eq!(normalize(vtt, SubtitleFormat::Vtt), vtt);
    }

    #[test]
    fn vtt_gets_header_when_missing() {
        let vtt = "00:00:01.000 --> 00:00:02.000\nHi\n";
        assert_eq!(
            normalize(vtt, SubtitleFormat::Vtt),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n"
        );
    }

    #[test]
    fn ass_dialogue_is_converted() {
        let ass = "[Script Info]\nTitle: x\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,Hello {\\an8}world\n";
        assert_eq!(
            normalize(ass, SubtitleFormat::AssSsa),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nHello world\n\n"
        );
    }

    #[test]
    fn ass_text_keeps_commas_and_unescapes() {
        let ass = "[Events]\nDialogue: 0,1:02:03.45,1:02:04.00,Default,,0,0,0,,One, two\\Nthree\\hfour\n";
        assert_eq!(
            normalize(ass, SubtitleFormat::AssSsa),
            "WEBVTT\n\n01:02:03.450 --> 01:02:04.000\nOne, two\nthree four\n\n"
        );
    }

    #[test]
    fn ass_ignores_lines_outside_events() {
        let ass = "[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Kept\n[Fonts]\nDialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,Ignored\n";
        let markup = normalize(ass, SubtitleFormat::AssSsa);
        assert!(markup.contains("Kept"));
        assert!(!markup.contains("Ignored"));
    }

    #[test]
    fn ass_drops_short_and_empty_dialogue() {
        let ass = "[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,Default\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\pos(10,10)}\nComment: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,note\n";
        assert_eq!(normalize(ass, SubtitleFormat::AssSsa), "WEBVTT\n\n");
    }

    #[test]
    fn ass_respects_format_line() {
        let ass = "[Events]\nFormat: Start, End, Text\nDialogue: 0:00:05.10,0:00:06.00,Reordered, yes\n";
        assert_eq!(
            normalize(ass, SubtitleFormat::AssSsa),
            "WEBVTT\n\n00:00:05.100 --> 00:00:06.000\nReordered, yes\n\n"
        );
    }

    #[test]
    fn ass_timestamp_conversion() {
        assert_eq!(ass_timestamp("0:00:01.00").as_deref(), Some("00:00:01.000"));
        assert_eq!(ass_timestamp("12:34:56.78").as_deref(), Some("12:34:56.780"));
        assert_eq!(ass_timestamp("0:00:01.5"), None);
        assert_eq!(ass_timestamp("garbage"), None);
    }
}
