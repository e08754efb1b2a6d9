use crate::cue::Cue;
use crate::normalizer::HEADER;

use std::fmt::Write;

/// Writes cues as WebVTT. The output is also valid intermediate markup, so
/// it can be fed straight back into [`crate::parser::extract`].
pub fn serialize_to_vtt(cues: &[Cue]) -> String {
    let mut buf = format!("{}\n\n", HEADER);
    for cue in cues {
        write_cue(&mut buf, None, cue, '.');
    }
    buf
}

pub fn serialize_to_srt(cues: &[Cue]) -> String {
    let mut buf = String::new();
    for (index, cue) in cues.iter().enumerate() {
        write_cue(&mut buf, Some(index + 1), cue, ',');
    }
    buf
}

/// `HH:MM:SS.mmm`, as used in VTT timing lines. Times past 99:59:59.999
/// are written as that.
pub fn format_timestamp(seconds: f64) -> String {
    let mut buf = String::with_capacity(12);
    write_ts(&mut buf, seconds, '.');
    buf
}

fn write_cue(buf: &mut String, sequence_number: Option<usize>, cue: &Cue, separator: char) {
    if let Some(seqnum) = sequence_number {
        buf.push_str(&seqnum.to_string());
        buf.push('\n');
    }
    write_ts(buf, cue.start(), separator);
    buf.push_str(" --> ");
    write_ts(buf, cue.end(), separator);
    buf.push('\n');
    buf.push_str(cue.text());
    buf.push_str("\n\n");
}

/// Largest time a two-digit hour field can hold, 99:59:59.999.
const MAX_MILLIS: u64 = 100 * 3600 * 1000 - 1;

fn write_ts(buf: &mut String, seconds: f64, separator: char) {
    // Negative and NaN times saturate to zero, later ones to the ceiling.
    let total_millis = ((seconds * 1000.0).round() as u64).min(MAX_MILLIS);
    let total_secs = total_millis / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let millis = total_millis % 1000;
    // Writing into a String cannot fail.
    let _ = write!(
        buf,
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, separator, millis
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract;

    macro_rules! test_write_ts {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;

                let mut buf = String::new();
                write_ts(&mut buf, input, '.');

                assert_eq!(buf, expected);
            }
        )*
        }
    }

    test_write_ts! {
        test_write_ts_0: (0.0, "00:00:00.000"),
        test_write_ts_1: (0.001, "00:00:00.001"),
        test_write_ts_2: (0.999, "00:00:00.999"),
        test_write_ts_3: (1.0, "00:00:01.000"),
        test_write_ts_4: (1.001, "00:00:01.001"),
        test_write_ts_5: (59.999, "00:00:59.999"),
        test_write_ts_6: (60.0, "00:01:00.000"),
        test_write_ts_7: (3600.0, "01:00:00.000"),
        test_write_ts_8: (7326.159, "02:02:06.159"),
        test_write_ts_9: (34380.001, "09:33:00.001"),
        test_write_ts_10: (-3.0, "00:00:00.000"),
        test_write_ts_11: (359999.999, "99:59:59.999"),
        test_write_ts_12: (360000.0, "99:59:59.999"),
        test_write_ts_13: (f64::INFINITY, "99:59:59.999"),
    }

    fn sample() -> Vec<Cue> {
        vec![
            Cue::new(1.0, 4.0, "Hello World").unwrap(),
            Cue::new(5.5, 8.25, "Second\nMultiline").unwrap(),
            Cue::new(3661.12, 3662.0, "Late").unwrap(),
        ]
    }

    #[test]
    fn formats_display_timestamps() {
        assert_eq!(format_timestamp(3725.5), "01:02:05.500");
    }

    #[test]
    fn vtt_layout() {
        assert_eq!(
            serialize_to_vtt(&sample()[..1]),
            "WEBVTT\n\n00:00:01.000 --> 00:00:04.000\nHello World\n\n"
        );
        assert_eq!(serialize_to_vtt(&[]), "WEBVTT\n\n");
    }

    #[test]
    fn srt_layout() {
        assert_eq!(
            serialize_to_srt(&sample()[..2]),
            "1\n00:00:01,000 --> 00:00:04,000\nHello World\n\n2\n00:00:05,500 --> 00:00:08,250\nSecond\nMultiline\n\n"
        );
    }

    #[test]
    fn vtt_survives_extraction() {
        let once = serialize_to_vtt(&sample());
        assert_eq!(serialize_to_vtt(&extract(&once)), once);
    }

    #[test]
    fn text_with_blank_lines_survives_extraction() {
        let cues = vec![
            Cue::new(1.0, 2.0, "first\n\nsecond").unwrap(),
            Cue::new(3.0, 4.0, "ok").unwrap(),
        ];
        let back = extract(&serialize_to_vtt(&cues));
        assert_eq!(back, cues);
        assert_eq!(back[0].text(), "first\nsecond");
    }

    #[test]
    fn times_past_the_ceiling_still_extract() {
        let cues = vec![Cue::new(359_990.0, 400_000.0, "long").unwrap()];
        let back = extract(&serialize_to_vtt(&cues));
        assert_eq!(back.len(), 1);
        assert!((back[0].end() - 359_999.999).abs() < 1e-6);
    }
}
