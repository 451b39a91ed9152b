//! ABI bindings for the contracts the relayer interacts with.
//!
//! The relayer treats every contract as an opaque callable endpoint: this
//! crate only carries the event and function encodings, plus small helpers
//! bridging between the generated types and the primitive forms used across
//! the workspace.

pub mod abi;

pub use abi::try_decode_log;
