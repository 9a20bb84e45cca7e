//! The tools module holds everything around the compressor core that the lzsap program needs.
//!
//! The tools are:
//! - cli: Command line interface for lzsap.
//! - report: Compression statistics, written through the log facade.
//! - sap: Reader for SAP type R files (header skip, frame split, AUDC simplification).
//!
pub mod cli;
pub mod report;
pub mod sap;
