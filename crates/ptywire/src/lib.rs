//! Out-of-band command framing for terminal streams.
//!
//! ptywire lets a REPL running inside a terminal carry a command side
//! channel in the stream it already owns: frames are APC-delimited strings
//! that terminal emulators swallow silently and a supervising host extracts
//! without disturbing rendering.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire grammar, scanner, stream demultiplexer, writer
//!
//! The `ptywire` binary (behind the `cli` feature) adds `emit`, `watch`,
//! and `strip` commands for working with real streams.

/// Re-export frame types.
pub mod frame {
    pub use ptywire_frame::*;
}
