//! Top-level facade crate for emfbuf.
//!
//! Re-exports the core buffer and the Lambda-side orchestration so users can depend on a single crate.

pub mod core {
    pub use emfbuf_core::*;
}

pub mod lambda {
    pub use emfbuf_lambda::*;
}
