use log::info;
use rustc_hash::FxHashMap;

use crate::compression::compress::CompressionReport;

/// Sorted (value, count) pairs of a histogram.
fn sorted(histogram: &FxHashMap<usize, usize>) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = histogram.iter().map(|(&k, &v)| (k, v)).collect();
    pairs.sort_unstable();
    pairs
}

/// Summary line: format, output size and ratio.
pub fn summary(report: &CompressionReport) -> String {
    format!(
        "{},\tratio: {:5} / {} = {:5.2}%",
        report.format,
        report.total_bytes,
        report.channels * report.frames,
        report.ratio()
    )
}

/// Log the results of a compression run. Per stream lines and histograms are optional.
pub fn log_report(report: &CompressionReport, show_streams: bool, show_histograms: bool) {
    info!("{}", summary(report));
    if let Some(lp) = report.loop_point {
        info!(
            "Trimmed {} of {} frames, loop from frame {} to frame {}.",
            lp.removed, report.input_frames, lp.frames, lp.target
        );
    }
    let output_bits = (8 * report.total_bytes).max(1) as f64;
    let input_bits = (8 * report.frames).max(1) as f64;
    if show_streams {
        for (i, bits) in report.channel_bits.iter().enumerate() {
            if let Some(bits) = bits {
                info!(
                    " Stream #{}: {} bits,\t{:5.2}%,\t{:5.2}% of output",
                    i,
                    bits,
                    100.0 * *bits as f64 / input_bits,
                    100.0 * *bits as f64 / output_bits
                );
            }
        }
        for (i, value) in &report.constants {
            info!(" Stream #{}: constant ${:02x}", i, value);
        }
    }
    if show_histograms {
        let stats = &report.stats;
        info!(
            "{} literal tokens ({} frames), {} matches ({} frames), {} empty fields.",
            stats.literals, stats.literal_frames, stats.matches, stats.matched_frames, stats.markers
        );
        info!("value\t  OFF\t  LEN\t  LIT");
        let offsets = sorted(&stats.offsets);
        let lens = sorted(&stats.match_lens);
        let runs = sorted(&stats.literal_runs);
        let top = [&offsets, &lens, &runs]
            .iter()
            .filter_map(|h| h.last().map(|(k, _)| *k))
            .max()
            .unwrap_or(0);
        for value in 1..=top {
            let count = |h: &FxHashMap<usize, usize>| h.get(&value).copied().unwrap_or(0);
            let row = (count(&stats.offsets), count(&stats.match_lens), count(&stats.literal_runs));
            if row != (0, 0, 0) {
                info!("{:5}\t{:5}\t{:5}\t{:5}", value, row.0, row.1, row.2);
            }
        }
    }
}
