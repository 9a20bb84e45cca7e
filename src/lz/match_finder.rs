/// Longest back-reference found at one position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchCandidate {
    /// Matching frames, 0 when nothing matches.
    pub len: usize,
    /// Distance back to the source, in frames.
    pub offset: usize,
}

/// Brute force search over a bounded window.
///
/// Cost is O(window * match length) per position. That is fine for windows of a few hundred
/// frames and songs of ~10^5 frames; larger inputs would want a hash chain index instead.
#[derive(Clone, Copy, Debug)]
pub struct MatchFinder<'a> {
    data: &'a [u8],
    window: usize,
    max_len: usize,
}

impl<'a> MatchFinder<'a> {
    pub fn new(data: &'a [u8], window: usize, max_len: usize) -> Self {
        Self {
            data,
            window,
            max_len,
        }
    }

    /// Returns the longest match starting at `pos` whose copy ends at or before `end`.
    /// Distances are tried nearest first and only a strictly longer match replaces the best,
    /// so ties go to the smallest offset.
    pub fn find(&self, pos: usize, end: usize) -> MatchCandidate {
        let mut best = MatchCandidate::default();
        let end = end.min(self.data.len());
        if pos >= end {
            return best;
        }
        let cap = self.max_len.min(end - pos);
        let target = &self.data[pos..pos + cap];
        for offset in 1..=self.window.min(pos) {
            // The source may run into the target: overlapping copies are allowed.
            let source = &self.data[pos - offset..pos - offset + cap];
            let len = source
                .iter()
                .zip(target)
                .take_while(|(a, b)| a == b)
                .count();
            if len > best.len {
                best = MatchCandidate { len, offset };
                if len == cap {
                    break;
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlapping_run_test() {
        let data = [5_u8; 8];
        let mf = MatchFinder::new(&data, 16, 17);
        assert_eq!(mf.find(0, 8), MatchCandidate::default());
        assert_eq!(mf.find(1, 8), MatchCandidate { len: 7, offset: 1 });
        assert_eq!(mf.find(1, 7), MatchCandidate { len: 6, offset: 1 });
    }

    #[test]
    fn nearest_offset_wins_ties_test() {
        let data = [1_u8, 2, 1, 2, 1, 2, 9];
        let mf = MatchFinder::new(&data, 16, 16);
        // Both offset 2 and offset 4 give two frames at position 4.
        assert_eq!(mf.find(4, 7), MatchCandidate { len: 2, offset: 2 });
    }

    #[test]
    fn window_and_length_caps_test() {
        let data = [1_u8, 2, 3, 4, 1, 2, 3, 4];
        assert_eq!(MatchFinder::new(&data, 3, 16).find(4, 8).len, 0);
        assert_eq!(
            MatchFinder::new(&data, 4, 16).find(4, 8),
            MatchCandidate { len: 4, offset: 4 }
        );
        assert_eq!(MatchFinder::new(&data, 4, 3).find(4, 8).len, 3);
    }

    #[test]
    fn no_repeats_test() {
        let data = [1_u8, 2, 3, 4, 5];
        let mf = MatchFinder::new(&data, 256, 255);
        for pos in 0..data.len() {
            assert_eq!(mf.find(pos, data.len()).len, 0);
        }
    }
}
