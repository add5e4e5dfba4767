//! Protocol module containing message types, the tag/value wire primitives,
//! the per-schema codec, and the dispatcher façade.

pub mod codec;
pub mod dispatcher;
pub mod messages;
pub mod wire;

pub use codec::{
    decode_any, decode_error, decode_heartbeat, decode_status, encode_error, encode_heartbeat,
    encode_status, CodecError,
};
pub use dispatcher::MessageDispatcher;
pub use messages::*;
