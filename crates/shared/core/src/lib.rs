//! Franchise Core
//!
//! Wire-level types shared by the franchise gateway and the simulated peer.
//! This crate contains no async and no I/O.

pub mod clock;
pub mod codec;
pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use clock::{Clock, FixedClock, LocalTimeFields, SystemClock};
pub use codec::{DEFAULT_MAX_FRAME_LEN, FrameCodec, HEADER_LEN, MAX_HEADER_LEN_VALUE};
pub use entities::{ECHO_MTI, Message, MessageKind, ResponseCode, SIGN_ON_MTI};
pub use error::{CodecError, CodecResult};
pub use values::{CorrelationKey, Timestamp};
