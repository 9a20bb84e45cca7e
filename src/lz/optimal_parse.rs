use log::{debug, trace};

use super::cost_model::{CostModel, INFINITE_COST};
use super::format::{Format, TieBreak};
use super::match_finder::MatchFinder;
use crate::error::{LzError, Result};

/// One unit of output for a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// `len` frames stored verbatim.
    Literal { len: usize },
    /// `len` frames copied from `offset` frames back.
    Match { len: usize, offset: usize },
}

impl Token {
    /// Frames covered by the token.
    pub fn len(&self) -> usize {
        match *self {
            Token::Literal { len } | Token::Match { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Token::Match { .. })
    }
}

/// Which length field the decoder expects next. LZ4S alternates literal-run and match fields,
/// so the cheapest way to continue from a position depends on the token before it. LZSS has
/// no such dependency and both states hold the same entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldState {
    /// Next field is a literal run length. This is also the state at the start of a stream.
    AfterMatch,
    /// Next field is a match length.
    AfterLiteral,
}

impl FieldState {
    /// State after emitting `token`.
    pub fn after(token: &Token) -> Self {
        if token.is_match() {
            FieldState::AfterMatch
        } else {
            FieldState::AfterLiteral
        }
    }

    /// True when `token` can't follow directly and an empty field must be written first.
    pub fn needs_marker(&self, token: &Token) -> bool {
        *self == FieldState::after(token)
    }
}

/// Best way to encode the suffix starting at one position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostEntry {
    /// Minimum bits to encode everything from this position to the end.
    pub bits: u64,
    /// First token of that encoding.
    pub token: Token,
}

const SENTINEL: CostEntry = CostEntry {
    bits: 0,
    token: Token::Literal { len: 0 },
};

/// Result of the backward pass over one channel: a cost entry per position and field state,
/// plus the sentinel entry at the end of the channel.
#[derive(Clone, Debug)]
pub struct ParseTable {
    after_match: Vec<CostEntry>,
    after_literal: Vec<CostEntry>,
    /// Matches were kept away from the last frame.
    pub pinned: bool,
}

impl ParseTable {
    /// Frames in the parsed channel.
    pub fn len(&self) -> usize {
        self.after_match.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bits needed by the channel.
    pub fn bits(&self) -> u64 {
        self.after_match[0].bits
    }

    pub fn entry(&self, pos: usize, state: FieldState) -> &CostEntry {
        match state {
            FieldState::AfterMatch => &self.after_match[pos],
            FieldState::AfterLiteral => &self.after_literal[pos],
        }
    }

    /// The token chain an encoder will follow, as (start position, token).
    pub fn chain(&self) -> Vec<(usize, Token)> {
        let mut chain = vec![];
        let mut pos = 0;
        let mut state = FieldState::AfterMatch;
        while pos < self.len() {
            let token = self.entry(pos, state).token;
            chain.push((pos, token));
            state = FieldState::after(&token);
            pos += token.len().max(1);
        }
        chain
    }

    /// True when the chosen chain finishes with a back-reference.
    pub fn ends_in_match(&self) -> bool {
        self.chain()
            .last()
            .map_or(false, |(_, token)| token.is_match())
    }
}

/// Minimum over a growing set of values with (value, index) ordering, so ties resolve to
/// the smallest index.
struct MinTree {
    size: usize,
    nodes: Vec<(u64, usize)>,
}

impl MinTree {
    fn new(len: usize) -> Self {
        let size = len.next_power_of_two();
        Self {
            size,
            nodes: vec![(u64::MAX, usize::MAX); 2 * size],
        }
    }

    fn set(&mut self, index: usize, value: u64) {
        let mut node = index + self.size;
        self.nodes[node] = (value, index);
        while node > 1 {
            node /= 2;
            self.nodes[node] = self.nodes[2 * node].min(self.nodes[2 * node + 1]);
        }
    }

    /// Minimum over `first..=last`.
    fn min(&self, first: usize, last: usize) -> (u64, usize) {
        let (mut lo, mut hi) = (first + self.size, last + self.size + 1);
        let mut best = (u64::MAX, usize::MAX);
        while lo < hi {
            if lo & 1 == 1 {
                best = best.min(self.nodes[lo]);
                lo += 1;
            }
            if hi & 1 == 1 {
                hi -= 1;
                best = best.min(self.nodes[hi]);
            }
            lo /= 2;
            hi /= 2;
        }
        best
    }
}

/// Pick between the best literal run and the best match under the format's tie policy.
fn choose(tie_break: TieBreak, literal: CostEntry, matched: Option<CostEntry>) -> CostEntry {
    match matched {
        Some(m)
            if m.bits < literal.bits
                || (m.bits == literal.bits && tie_break == TieBreak::PreferMatch) =>
        {
            m
        }
        _ => literal,
    }
}

/// Backward pass. Walking from the last frame to the first, every position gets the cheapest
/// way to encode the rest of the channel in each field state:
///
/// - a literal run of n frames costs its header + 8n and continues after a literal,
/// - a match of length l costs its field and continues after a match,
/// - starting a token of the same kind as the previous one costs an extra empty field.
///
/// The literal headers only change cost every 255 frames, so the best run is found per cost
/// bracket with a range minimum over `cost[q] + 8q`. With `pin_last`, no match may cover the
/// last frame.
pub fn backfill(data: &[u8], format: &Format, pin_last: bool) -> Result<ParseTable> {
    let n = data.len();
    let model = CostModel::new(format);
    let finder = MatchFinder::new(data, format.window(), format.max_match_len);
    let match_end = if pin_last { n.saturating_sub(1) } else { n };
    let brackets = model.literal_brackets();

    let mut after_match = vec![SENTINEL; n + 1];
    let mut after_literal = vec![SENTINEL; n + 1];
    // Holds after_literal[q].bits + 8q for every q already computed.
    let mut runs = MinTree::new(n + 1);
    runs.set(n, 8 * n as u64);

    for pos in (0..n).rev() {
        // Cheapest literal run starting here
        let mut literal = CostEntry {
            bits: INFINITE_COST,
            token: Token::Literal { len: 1 },
        };
        for &(first, last, header) in &brackets {
            if first > n - pos {
                break;
            }
            let (value, end) = runs.min(pos + first, pos + last.min(n - pos));
            let bits = model.escape_bits() + header + value - 8 * pos as u64;
            if bits < literal.bits {
                literal = CostEntry {
                    bits,
                    token: Token::Literal { len: end - pos },
                };
            }
        }

        // Cheapest match starting here, longest first so equal costs keep the longer match
        let found = finder.find(pos, match_end);
        let mut matched: Option<CostEntry> = None;
        for len in (format.min_match_len..=found.len).rev() {
            let bits = model
                .match_token(len)
                .saturating_add(after_match[pos + len].bits);
            if matched.map_or(true, |m| bits < m.bits) {
                matched = Some(CostEntry {
                    bits,
                    token: Token::Match {
                        len,
                        offset: found.offset,
                    },
                });
            }
        }

        let with_marker = |entry: CostEntry| CostEntry {
            bits: entry.bits + model.marker_cost(&entry.token),
            ..entry
        };
        after_match[pos] = choose(format.tie_break, literal, matched.map(with_marker));
        after_literal[pos] = choose(format.tie_break, with_marker(literal), matched);
        runs.set(pos, after_literal[pos].bits + 8 * pos as u64);
    }

    let table = ParseTable {
        after_match,
        after_literal,
        pinned: pin_last,
    };
    if table.bits() >= INFINITE_COST {
        return Err(LzError::Internal(format!(
            "parse of {} frames has no representable encoding",
            n
        )));
    }
    trace!("Backward pass over {} frames: {} bits.", n, table.bits());
    Ok(table)
}

/// Optimal parse of one channel. Formats that want a literal at the very end get a second
/// pass when the unconstrained parse finishes with a match.
pub fn parse(data: &[u8], format: &Format) -> Result<ParseTable> {
    let table = backfill(data, format, false)?;
    if format.terminal_literal && table.ends_in_match() {
        debug!(
            "Parse ends with a match ({} bits), parsing again with a final literal.",
            table.bits()
        );
        return backfill(data, format, true);
    }
    Ok(table)
}
