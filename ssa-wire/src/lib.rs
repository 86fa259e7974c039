//! Wire framing for the streaming protocol: the fixed message header, its
//! big-endian encoding, and a `tokio_util` codec for turning a byte stream
//! into a sequence of frames.
#![deny(missing_docs, rustdoc::missing_crate_level_docs)]

mod codec;
mod header;

pub use codec::{Frame, FrameCodec};
pub use header::{Flags, MsgHeader, Op, HEADER_LEN, PROTOCOL_CLASS, PROTOCOL_VERSION};
