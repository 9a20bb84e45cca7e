//Enable more cargo lint tests
#![warn(rust_2018_idioms)]
#![warn(clippy::disallowed_types)]

use std::{
    fs::{self, File},
    io::{self, Read, Write},
};

use log::{error, info, LevelFilter};
use simplelog::{Config, TermLogger, TerminalMode};

use lzsap::compression::compress::compress;
use lzsap::compression::decompress::decompress;
use lzsap::error::{LzError, Result};
use lzsap::tools::cli::{lzopts_init, Io, LzOpts, Mode};
use lzsap::tools::report::log_report;
use lzsap::tools::sap::read_sap;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    // Log to stderr, stdout may carry the compressed stream. The level is set from -v later.
    if let Err(e) = TermLogger::init(
        LevelFilter::Trace,
        Config::default(),
        TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Can't start the logger: {}", e);
    }

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opts = lzopts_init()?;

    let raw = read_input(&opts.input)?;
    let channels = read_sap(&raw, opts.simplify);
    info!("Read {} frames of {} registers.", channels[0].len(), channels.len());

    let out = compress(&channels, &opts.config)?;
    write_output(&opts.output, &out.data)?;
    log_report(&out.report, opts.show_streams, opts.show_histograms);

    if opts.op_mode == Mode::Test {
        verify(&opts, &channels, &out.data, out.report.frames)?;
    }
    info!("Done.");
    Ok(())
}

fn read_input(input: &Io) -> Result<Vec<u8>> {
    match input {
        Io::File(name) => Ok(fs::read(name)?),
        Io::Std => {
            let mut data = vec![];
            io::stdin().lock().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

fn write_output(output: &Io, data: &[u8]) -> Result<()> {
    match output {
        Io::File(name) => File::create(name)?.write_all(data)?,
        Io::Std => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Decode the stream again and compare every channel with what was compressed.
fn verify(opts: &LzOpts, channels: &[Vec<u8>], data: &[u8], frames: usize) -> Result<()> {
    let decoded = decompress(data, channels.len(), frames, &opts.config.format)?;
    for (i, (orig, back)) in channels.iter().zip(&decoded).enumerate() {
        if let Some(pos) = (0..frames).find(|&p| orig[p] != back[p]) {
            return Err(LzError::Corrupt(format!(
                "test failed, channel #{} differs at frame {}",
                i, pos
            )));
        }
    }
    info!("Test passed, {} frames decode back to the input.", frames);
    Ok(())
}
