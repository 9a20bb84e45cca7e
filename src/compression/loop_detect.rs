use log::debug;

/// Where a trimmed song loops back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopPoint {
    /// Frames left after removing the repeated tail.
    pub frames: usize,
    /// Frame the player jumps to after the last kept frame.
    pub target: usize,
    /// Length of the removed tail.
    pub removed: usize,
    /// Distance between the tail and its earlier copy.
    pub distance: usize,
}

/// Z-function of a sequence given only an equality test between two of its indices.
fn z_array(len: usize, eq: impl Fn(usize, usize) -> bool) -> Vec<usize> {
    let mut z = vec![0; len];
    if len == 0 {
        return z;
    }
    z[0] = len;
    let (mut lo, mut hi) = (0, 0);
    for i in 1..len {
        if i < hi {
            z[i] = (hi - i).min(z[i - lo]);
        }
        while i + z[i] < len && eq(z[i], i + z[i]) {
            z[i] += 1;
        }
        if i + z[i] > hi {
            lo = i;
            hi = i + z[i];
        }
    }
    z
}

/// Longest tail of the frame sequence that also appears `distance` frames earlier, as
/// (length, distance). A frame is the tuple of every channel's value. Ties keep the
/// smallest distance. Returns None when no frame repeats at the end.
pub fn longest_repeated_tail(channels: &[Vec<u8>]) -> Option<(usize, usize)> {
    let frames = channels.first().map_or(0, |c| c.len());
    // Index k of the reversed sequence is frame frames - 1 - k.
    let same = |a: usize, b: usize| {
        channels
            .iter()
            .all(|c| c[frames - 1 - a] == c[frames - 1 - b])
    };
    let z = z_array(frames, same);
    let mut best: Option<(usize, usize)> = None;
    for (distance, &len) in z.iter().enumerate().skip(1) {
        if len > 0 && best.map_or(true, |(l, _)| len > l) {
            best = Some((len, distance));
        }
    }
    best
}

/// Find a loop worth trimming: the repeated tail must be at least `min_frames` long.
pub fn find_loop(channels: &[Vec<u8>], min_frames: usize) -> Option<LoopPoint> {
    let frames = channels.first().map_or(0, |c| c.len());
    let (removed, distance) = longest_repeated_tail(channels)?;
    debug!(
        "Longest repeated tail: {} frames, {} frames back.",
        removed, distance
    );
    if removed < min_frames.max(1) {
        return None;
    }
    Some(LoopPoint {
        frames: frames - removed,
        target: frames - removed - distance,
        removed,
        distance,
    })
}
