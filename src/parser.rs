use crate::cue::Cue;
use crate::normalizer::HEADER;

use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::space1;
use nom::combinator::{eof, map_res};
use nom::error::VerboseError;
use nom::{branch::alt, IResult};
use tracing::debug;

/// Reads intermediate markup into cues, in source order.
///
/// Lines that are neither a timing line nor part of a cue's text are ignored,
/// and a timing line with no text under it yields nothing.
pub fn extract(markup: &str) -> Vec<Cue> {
    let markup = markup.strip_prefix('\u{FEFF}').unwrap_or(markup);
    let mut cues = Vec::new();
    let mut lines = markup.lines().peekable();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(HEADER) {
            continue;
        }
        let (start, end) = match cue_timing(line) {
            Ok((_, timing)) => timing,
            Err(_) => continue,
        };

        let mut text_lines = Vec::new();
        while let Some(text) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(text.trim_end_matches('\r'));
        }
        if text_lines.is_empty() {
            continue;
        }

        match Cue::new(start, end, text_lines.join("\n")) {
            Some(cue) => cues.push(cue),
            None => debug!(line, "dropping cue with inverted timing"),
        }
    }
    cues
}

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// `HH:MM:SS.mmm --> HH:MM:SS.mmm`, optionally followed by whitespace and
/// cue settings which are ignored.
fn cue_timing(input: &str) -> ParseResult<'_, (f64, f64)> {
    let (input, start) = timestamp(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = tag("-->")(input)?;
    let (input, _) = space1(input)?;
    let (input, end) = timestamp(input)?;
    let (input, _) = alt((eof, space1))(input)?;
    Ok((input, (start, end)))
}

fn digits(input: &str, count: usize) -> ParseResult<'_, u64> {
    map_res(
        take_while_m_n(count, count, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u64>(),
    )(input)
}

fn timestamp(input: &str) -> ParseResult<'_, f64> {
    let (input, hours) = digits(input, 2)?;
    let (input, _) = tag(":")(input)?;
    let (input, minutes) = digits(input, 2)?;
    let (input, _) = tag(":")(input)?;
    let (input, seconds) = digits(input, 2)?;
    let (input, _) = tag(".")(input)?;
    let (input, millis) = digits(input, 3)?;

    Ok((
        input,
        (hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0,
    ))
}
