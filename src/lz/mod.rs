//! The lz module holds the format-independent part of the compressor: the format definition,
//! the bit costs of every token, the match search and the optimal parser.
//!
//! Each channel is parsed on its own. The parser walks the channel backwards and, for every
//! position, records the cheapest token to start with given what the rest of the channel will
//! cost. Because the cost model charges exactly what the token encoder writes, following the
//! recorded tokens from the front gives the smallest stream the format can express.
//!
//! Two wire formats are supported:
//! - LZSS: one escape bit per token, single literal bytes, fixed width match fields of 8 to 16 bits.
//! - LZ4S: alternating literal-run and match length fields in nibbles, extended with bytes
//!   for long runs, followed by 0 to 2 offset bytes.
//!
pub mod cost_model;
pub mod format;
pub mod match_finder;
pub mod optimal_parse;
