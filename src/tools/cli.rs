use std::{fmt::Display, fmt::Formatter};

use clap::Parser;
use log::info;

use crate::compression::compress::{CompressConfig, DEFAULT_MAX_FRAMES, DEFAULT_MIN_LOOP_FRAMES};
use crate::error::{LzError, Result};
use crate::lz::format::{Format, TieBreak};

/// Compress, or compress and check the result decodes back to the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Zip,
    Test,
}
impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Where the data comes from and goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Io {
    File(String),
    Std,
}
impl Display for Io {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Io::File(name) => write!(f, "file {}", name),
            Io::Std => write!(f, "standard I/O"),
        }
    }
}

/// All user settable options that control the program.
#[derive(Debug, Clone)]
pub struct LzOpts {
    pub input: Io,
    pub output: Io,
    /// Validated format and compression settings
    pub config: CompressConfig,
    /// Rewrite inaudible AUDC bits before compressing
    pub simplify: bool,
    pub op_mode: Mode,
    /// Log per stream sizes
    pub show_streams: bool,
    /// Log length and offset histograms
    pub show_histograms: bool,
}

/// Command Line Interpretation - uses external CLAP crate.
#[derive(Parser, Debug)]
#[clap(
    version,
    about = "Optimal LZSS / LZ4S compressor for SAP type R files",
    long_about = "
    Compresses the POKEY register dumps of SAP type R files. Every register is compressed as
    its own stream with a bit-optimal parse, and the streams are interleaved frame by frame
    so a player can decode one frame at a time with a small buffer per register.

    If OUTPUT is omitted the stream goes to standard output, and if INPUT is also omitted the
    SAP file is read from standard input."
)]
pub struct Args {
    /// SAP type R file to compress
    #[clap()]
    input: Option<String>,

    /// Compressed output file
    #[clap()]
    output: Option<String>,

    /// Wire format: lzss or lz4s
    #[clap(short = 'F', long = "format", default_value = "lzss")]
    format: String,

    /// LZSS preset match size: 8 (4+4 bits), 12 (7+5) or 16 (8+8, min match 1)
    #[clap(short = 'p', long)]
    preset: Option<u8>,

    /// Match offset bits (LZSS default 4, LZ4S default 8)
    #[clap(short = 'o', long = "offset-bits")]
    offset_bits: Option<u8>,

    /// LZSS match length bits
    #[clap(short = 'l', long = "length-bits")]
    length_bits: Option<u8>,

    /// LZSS total match bits (offset + length), default 8
    #[clap(short = 'b', long = "total-bits")]
    total_bits: Option<u8>,

    /// Minimum match length (default 2)
    #[clap(short = 'm', long = "min-match")]
    min_match: Option<usize>,

    /// Maximum match length (LZ4S default 255)
    #[clap(long = "max-match")]
    max_match: Option<usize>,

    /// Maximum literal run length, LZ4S only (default 255)
    #[clap(long = "max-literal")]
    max_literal: Option<usize>,

    /// Token picked when a literal and a match cost the same: match or literal
    #[clap(long = "tie")]
    tie: Option<String>,

    /// Never end a stream with a match: true or false
    #[clap(long = "terminal-literal")]
    terminal_literal: Option<bool>,

    /// Remove a repeated tail and report the loop point
    #[clap(short = 't', long = "trim")]
    trim: bool,

    /// Shortest tail removed by --trim, in frames
    #[clap(long = "min-loop", default_value_t = DEFAULT_MIN_LOOP_FRAMES)]
    min_loop: usize,

    /// Largest input accepted, in frames
    #[clap(long = "max-frames", default_value_t = DEFAULT_MAX_FRAMES)]
    max_frames: usize,

    /// Keep AUDC registers exactly as dumped
    #[clap(long = "no-simplify")]
    no_simplify: bool,

    /// Decode the result and compare it with the input
    #[clap(long = "test")]
    test: bool,

    /// Don't show per stream compression
    #[clap(short = 'q', long)]
    quiet: bool,

    /// Show match length / offset statistics
    #[clap(short = 's', long = "stats")]
    stats: bool,

    /// Sets verbosity. -v0 is silent, -v4 is chatty
    #[clap(short = 'v', default_value_t = 3)]
    v: u8,
}

/// Build the format from the format options.
fn build_format(args: &Args) -> Result<Format> {
    let mut format = match args.format.as_str() {
        "lzss" => {
            if args.max_literal.is_some() {
                return Err(LzError::Config(
                    "LZSS codes one literal at a time, --max-literal needs lz4s".to_string(),
                ));
            }
            let mut format = match args.preset {
                Some(preset) => {
                    if args.offset_bits.is_some()
                        || args.length_bits.is_some()
                        || args.total_bits.is_some()
                    {
                        return Err(LzError::Config(
                            "a preset sets all match bits, don't combine it with -o, -l or -b"
                                .to_string(),
                        ));
                    }
                    let format = Format::lzss_preset(preset)?;
                    match args.min_match {
                        Some(min) => Format::lzss(
                            Some(format.offset_bits),
                            Some(format.length_bits),
                            None,
                            min,
                        )?,
                        None => format,
                    }
                }
                None => Format::lzss(
                    args.offset_bits,
                    args.length_bits,
                    args.total_bits,
                    args.min_match.unwrap_or(2),
                )?,
            };
            if let Some(max) = args.max_match {
                format.max_match_len = max;
            }
            format
        }
        "lz4s" => {
            if args.preset.is_some() || args.length_bits.is_some() || args.total_bits.is_some() {
                return Err(LzError::Config(
                    "LZ4S has no fixed match field, -p, -l and -b need lzss".to_string(),
                ));
            }
            Format::lz4s(
                args.offset_bits.unwrap_or(8),
                args.min_match.unwrap_or(2),
                args.max_match.unwrap_or(255),
                args.max_literal.unwrap_or(255),
            )?
        }
        other => {
            return Err(LzError::Config(format!(
                "unknown format '{}', use lzss or lz4s",
                other
            )))
        }
    };
    format = match args.tie.as_deref() {
        None => format,
        Some("match") => format.with_tie_break(TieBreak::PreferMatch),
        Some("literal") => format.with_tie_break(TieBreak::PreferLiteral),
        Some(other) => {
            return Err(LzError::Config(format!(
                "unknown tie break '{}', use match or literal",
                other
            )))
        }
    };
    if let Some(terminal) = args.terminal_literal {
        format = format.with_terminal_literal(terminal);
    }
    format.validate()?;
    Ok(format)
}

/// Put command line information from CLAP into our internal structure.
pub fn lzopts_from_args(args: Args) -> Result<LzOpts> {
    let format = build_format(&args)?;
    if args.min_loop == 0 {
        return Err(LzError::Config("--min-loop should be at least 1".to_string()));
    }
    Ok(LzOpts {
        input: args.input.map_or(Io::Std, Io::File),
        output: args.output.map_or(Io::Std, Io::File),
        config: CompressConfig {
            format,
            trim_loops: args.trim,
            min_loop_frames: args.min_loop,
            max_frames: args.max_frames,
        },
        simplify: !args.no_simplify,
        op_mode: if args.test { Mode::Test } else { Mode::Zip },
        show_streams: !args.quiet,
        show_histograms: args.stats,
    })
}

/// Parse the command line, set the log level and report the settings.
pub fn lzopts_init() -> Result<LzOpts> {
    let args = Args::parse();

    // Set the log level
    match args.v {
        0 => log::set_max_level(log::LevelFilter::Off),
        1 => log::set_max_level(log::LevelFilter::Error),
        2 => log::set_max_level(log::LevelFilter::Warn),
        3 => log::set_max_level(log::LevelFilter::Info),
        4 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    };

    let opts = lzopts_from_args(args)?;

    info!("---- lzsap Initialization Start ----");
    info!("Verbosity set to {}", log::max_level());
    info!("Operational mode set to {}", opts.op_mode);
    info!("Reading from {}, writing to {}", opts.input, opts.output);
    info!("{}", opts.config.format);
    if opts.config.trim_loops {
        info!(
            "Trimming repeated tails of {} frames or more",
            opts.config.min_loop_frames
        );
    }
    if !opts.simplify {
        info!("AUDC registers are kept as dumped");
    }
    info!("---- lzsap Initialization End ----");
    Ok(opts)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lz::format::Variant;

    fn opts(line: &[&str]) -> Result<LzOpts> {
        let args = Args::try_parse_from(std::iter::once("lzsap").chain(line.iter().copied()))
            .map_err(|e| LzError::Config(e.to_string()))?;
        lzopts_from_args(args)
    }

    #[test]
    fn defaults_test() {
        let o = opts(&[]).unwrap();
        assert_eq!(o.input, Io::Std);
        assert_eq!(o.output, Io::Std);
        assert_eq!(o.config.format, Format::default());
        assert_eq!(o.op_mode, Mode::Zip);
        assert!(o.simplify);
        assert!(o.show_streams);
        assert!(!o.show_histograms);
        assert!(!o.config.trim_loops);
    }

    #[test]
    fn lzss_options_test() {
        let o = opts(&["-o", "7", "-b", "12", "-m", "3", "song.sap", "song.lzs"]).unwrap();
        let f = &o.config.format;
        assert_eq!((f.offset_bits, f.length_bits, f.min_match_len), (7, 5, 3));
        assert_eq!(o.input, Io::File("song.sap".to_string()));
        assert_eq!(o.output, Io::File("song.lzs".to_string()));

        let o = opts(&["-p", "16", "-m", "2"]).unwrap();
        assert_eq!(o.config.format.max_match_len, 2 + 254);
        assert!(opts(&["-p", "16", "-o", "4"]).is_err());
        assert!(opts(&["--max-literal", "20"]).is_err());
        assert!(opts(&["-b", "20"]).is_err());
    }

    #[test]
    fn lz4s_options_test() {
        let o = opts(&["-F", "lz4s", "--max-literal", "1000", "--tie", "literal", "--terminal-literal", "false"])
            .unwrap();
        let f = &o.config.format;
        assert_eq!(f.variant, Variant::Lz4s);
        assert_eq!(f.offset_bits, 8);
        assert_eq!(f.max_literal_len, 1000);
        assert_eq!(f.tie_break, TieBreak::PreferLiteral);
        assert!(!f.terminal_literal);
        assert!(opts(&["-F", "lz4s", "-p", "8"]).is_err());
        assert!(opts(&["-F", "zip"]).is_err());
        assert!(opts(&["--tie", "both"]).is_err());
    }

    #[test]
    fn mode_and_trim_test() {
        let o = opts(&["--test", "-t", "--min-loop", "100", "-q", "-s", "--no-simplify"]).unwrap();
        assert_eq!(o.op_mode, Mode::Test);
        assert!(o.config.trim_loops);
        assert_eq!(o.config.min_loop_frames, 100);
        assert!(!o.show_streams);
        assert!(o.show_histograms);
        assert!(!o.simplify);
        assert!(opts(&["--min-loop", "0"]).is_err());
    }
}
