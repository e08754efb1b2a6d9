use dualsub::{
    extract, format_timestamp, normalize, processor, serialize_to_srt, serialize_to_vtt, Cue,
    CueKey, DisplayRole, Renderer, Session, SessionOptions, SubtitleFormat,
};

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
            std::process::exit(1);
        }
    }
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    // Logs go to stderr; stdout carries subtitle output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(ClapParser)]
#[command(about = "Convert, retime and preview dual-track subtitles")]
struct Cli {
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Log debug detail to stderr. Repeat for trace output. RUST_LOG overrides this."
    )]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Convert an SRT, ASS/SSA or VTT file to WebVTT or SRT")]
    Convert {
        #[command(flatten)]
        files: IoArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Vtt, help = "Format to write.")]
        to: OutputFormat,
    },
    #[command(about = "Move subtitle timings by a fixed number of seconds")]
    Shift {
        #[command(flatten)]
        files: IoArgs,
        #[arg(
            short,
            long,
            allow_negative_numbers = true,
            help = "Seconds to add to each cue. Negative values move cues earlier."
        )]
        seconds: f64,
        #[arg(
            long,
            default_value_t = 0,
            help = "Only shift cues from this (zero-based) position onward."
        )]
        from_index: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Vtt, help = "Format to write.")]
        to: OutputFormat,
    },
    #[command(about = "Print which subtitles appear and disappear during playback")]
    Play {
        #[arg(short, long, value_name = "FILE", help = "The primary subtitle file.")]
        primary: String,
        #[arg(short, long, value_name = "FILE", help = "An optional secondary subtitle file.")]
        secondary: Option<String>,
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        primary_offset: f64,
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        secondary_offset: f64,
        #[arg(long, default_value_t = 0.0, help = "Playback time to start at, in seconds.")]
        from: f64,
        #[arg(long, help = "Playback time to stop at. Defaults to just after the last cue.")]
        to: Option<f64>,
        #[arg(long, default_value_t = 0.1, help = "Seconds between playback updates.")]
        step: f64,
        #[arg(long, help = "Mark secondary subtitles as de-emphasised.")]
        blur: bool,
    },
}

#[derive(clap::Args)]
struct IoArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The file to read from. If not supplied, the subtitles will be read from standard input.",
        default_value = "-"
    )]
    input: String,
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The file to write to. If not supplied, the subtitles will be written to standard output.",
        default_value = "-"
    )]
    output: String,
    #[arg(
        short,
        long,
        value_enum,
        help = "Input format. Taken from the file extension when not supplied."
    )]
    format: Option<InputFormat>,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Srt,
    Ass,
    Vtt,
}

impl From<InputFormat> for SubtitleFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Srt => SubtitleFormat::Srt,
            InputFormat::Ass => SubtitleFormat::AssSsa,
            InputFormat::Vtt => SubtitleFormat::Vtt,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Vtt,
    Srt,
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Convert { files, to } => {
            let cues = read_cues(&files)?;
            write_output(&files.output, &serialise(&cues, to))
        }
        Command::Shift {
            files,
            seconds,
            from_index,
            to,
        } => {
            if !seconds.is_finite() {
                return Err(anyhow!("The shift must be a finite number of seconds."));
            }
            let cues = read_cues(&files)?;
            let shifted = processor::shift_from(&cues, from_index, seconds);
            write_output(&files.output, &serialise(&shifted, to))
        }
        Command::Play {
            primary,
            secondary,
            primary_offset,
            secondary_offset,
            from,
            to,
            step,
            blur,
        } => {
            let tracks = PlayTracks {
                primary,
                secondary,
                primary_offset,
                secondary_offset,
            };
            play(&tracks, from, to, step, blur)
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).context(format!("Failed to open input file: '{}'", input))
    }
}

fn read_cues(files: &IoArgs) -> Result<Vec<Cue>> {
    let data = read_input(&files.input)?;
    let format = files
        .format
        .map(SubtitleFormat::from)
        .unwrap_or_else(|| SubtitleFormat::from_filename(&files.input));
    let cues = extract(&normalize(&data, format));
    check_cues(&files.input, &data, cues.len())?;
    Ok(cues)
}

fn check_cues(input: &str, data: &str, cue_count: usize) -> Result<()> {
    if cue_count > 0 {
        Ok(())
    } else if data.trim().is_empty() {
        Err(anyhow!("You appear to have supplied an empty file."))
    } else {
        Err(anyhow!("No subtitles could be read from '{}'.", input))
    }
}

fn serialise(cues: &[Cue], format: OutputFormat) -> String {
    match format {
        OutputFormat::Vtt => serialize_to_vtt(cues),
        OutputFormat::Srt => serialize_to_srt(cues),
    }
}

fn write_output(output: &str, text: &str) -> Result<()> {
    if output == "-" {
        let mut dst = io::stdout().lock();
        dst.write_all(text.as_bytes())?;
        dst.flush()?;
    } else {
        std::fs::write(output, text)
            .context(format!("Failed to write output file: '{}'", output))?;
    }
    Ok(())
}

struct PlayTracks {
    primary: String,
    secondary: Option<String>,
    primary_offset: f64,
    secondary_offset: f64,
}

fn play(tracks: &PlayTracks, from: f64, to: Option<f64>, step: f64, blur: bool) -> Result<()> {
    check_playback_range(from, to, step)?;

    let events = Rc::new(RefCell::new(Vec::new()));
    let renderer = ConsoleRenderer {
        events: Rc::clone(&events),
    };
    let options = SessionOptions {
        deemphasize_secondary: blur,
        ..SessionOptions::default()
    };
    let mut session = Session::with_options(renderer, options);

    let primary = load_track(&mut session, &tracks.primary)?;
    session
        .set_offset(&primary, tracks.primary_offset)
        .context("Invalid primary offset")?;
    session.select_primary(Some(primary.as_str()));

    if let Some(path) = &tracks.secondary {
        let secondary = load_track(&mut session, path)?;
        session
            .set_offset(&secondary, tracks.secondary_offset)
            .context("Invalid secondary offset")?;
        session.select_secondary(Some(secondary.as_str()));
    }

    let end = match to {
        Some(end) => end,
        None => last_visible_time(&session) + step,
    };

    let mut out = io::stdout().lock();
    for tick in 0..tick_count(from, end, step)? {
        let time = from + tick as f64 * step;
        session.tick(time);
        for event in events.borrow_mut().drain(..) {
            writeln!(out, "[{}] {}", format_timestamp(time), event)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn check_playback_range(from: f64, to: Option<f64>, step: f64) -> Result<()> {
    if !(step.is_finite() && step > 0.0) {
        return Err(anyhow!("The step must be a positive number of seconds."));
    }
    if !from.is_finite() {
        return Err(anyhow!("The start time must be a finite number of seconds."));
    }
    if to.is_some_and(|end| !end.is_finite()) {
        return Err(anyhow!("The stop time must be a finite number of seconds."));
    }
    Ok(())
}

/// Number of updates from `from` to `end` inclusive, `step` apart.
fn tick_count(from: f64, end: f64, step: f64) -> Result<u64> {
    if end < from {
        return Ok(0);
    }
    let steps = ((end - from) / step).floor();
    if !steps.is_finite() {
        return Err(anyhow!("Too many playback updates between {} and {}.", from, end));
    }
    Ok(steps as u64 + 1)
}

fn load_track(session: &mut Session<ConsoleRenderer>, path: &str) -> Result<String> {
    let data = read_input(path)?;
    let loaded = session.load_subtitle(&data, path);
    check_cues(path, &data, loaded.cue_count)?;
    Ok(loaded.id)
}

fn last_visible_time(session: &Session<ConsoleRenderer>) -> f64 {
    session
        .store()
        .tracks()
        .iter()
        .flat_map(|track| track.cues().iter().map(move |cue| cue.end() + track.offset()))
        .fold(0.0, f64::max)
}

struct ConsoleNode {
    text: String,
    role: Option<DisplayRole>,
    deemphasized: bool,
}

/// Describes every visible change as a line of text.
struct ConsoleRenderer {
    events: Rc<RefCell<Vec<String>>>,
}

impl ConsoleRenderer {
    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Renderer for ConsoleRenderer {
    type Node = ConsoleNode;

    fn create(&mut self, _key: &CueKey, cue: &Cue) -> ConsoleNode {
        ConsoleNode {
            text: cue.text().replace('\n', " / "),
            role: None,
            deemphasized: false,
        }
    }

    fn set_visible(&mut self, node: &mut ConsoleNode, visible: bool) {
        let role = match node.role {
            Some(DisplayRole::Primary) => "primary",
            Some(DisplayRole::Secondary) if node.deemphasized => "secondary (blurred)",
            Some(DisplayRole::Secondary) => "secondary",
            None => "unassigned",
        };
        let sign = if visible { '+' } else { '-' };
        self.push(format!("{} {:<19} {}", sign, role, node.text));
    }

    fn set_role(&mut self, node: &mut ConsoleNode, role: DisplayRole) {
        node.role = Some(role);
    }

    fn set_deemphasized(&mut self, node: &mut ConsoleNode, deemphasized: bool) {
        node.deemphasized = deemphasized;
    }
}
