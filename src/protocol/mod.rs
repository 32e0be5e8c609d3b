//! Wire protocol
//!
//! JSON-RPC 2.0 messages carried in netstring frames.

mod envelope;
mod netstring;

pub use envelope::{
    error_response, parse_incoming, Envelope, Incoming, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, PARSE_ERROR, TARGET_KEY,
};
pub use netstring::{decode_frame, encode_frame, write_frame, FrameError, FrameReader, MAX_FRAME_LEN};
