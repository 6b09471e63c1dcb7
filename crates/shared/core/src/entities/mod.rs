mod message;
mod message_kind;

pub use message::Message;
pub use message_kind::{ECHO_MTI, MessageKind, ResponseCode, SIGN_ON_MTI};
