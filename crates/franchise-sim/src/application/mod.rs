pub mod peer;

pub use peer::{FranchisePeer, PeerHandle, PeerSession};
