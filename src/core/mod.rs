//! # Core Wire Components
//!
//! Field encoding, packet framing, and stream codecs.
//!
//! ## Components
//! - **Binary**: typed field writer/reader (`BinaryWriter`, `BinaryReader`)
//! - **Packet**: the `Packet` trait and the tagged `Frame`
//! - **Codec**: tokio codec for length-prefixed frames over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Tag(2)] [Payload(N)]
//! ```
//!
//! ## Limits
//! - Maximum frame size is configurable (16MB default)
//! - Length is validated before allocation

pub mod binary;
pub mod codec;
pub mod packet;
