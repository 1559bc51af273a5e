//! Fixed-layout binary record codec
//!
//! Records published by the AMM and order-book programs are flat byte
//! buffers with no framing: every field sits at a fixed offset and the
//! buffer length is part of the format. A [`Schema`] lists the fields in
//! wire order; [`decode`] and [`encode`] walk it with a running offset.
//!
//! Schemas are versioned by tag (see [`schemas`]). A format change on chain
//! gets a new schema rather than an edit to an existing one.

pub mod codec;
pub mod error;
pub mod schema;
pub mod schemas;

pub use codec::*;
pub use error::*;
pub use schema::*;
