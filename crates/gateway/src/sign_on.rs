//! Sign-on handshake
//!
//! A fixed message written once, right after a connection is established
//! and before any other traffic. The peer is not required to acknowledge it.

use franchise_core::{FrameCodec, Message};
use log::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::transport::Connection;

#[derive(Debug, Clone, Default)]
pub struct SignOn {
    codec: FrameCodec,
}

impl SignOn {
    pub fn new(codec: FrameCodec) -> Self {
        Self { codec }
    }

    /// The handshake message
    pub fn message(&self) -> Message {
        Message::sign_on()
    }

    /// Write the handshake on `connection`
    pub async fn send(&self, connection: &Connection) -> GatewayResult<()> {
        let frame = self.codec.encode(&self.message())?;
        connection
            .write_all(&frame)
            .await
            .map_err(|e| GatewayError::SignOn(e.to_string()))?;

        debug!("Sign-on sent on connection {}", connection.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franchise_sim::infrastructure::read_frame;
    use franchise_core::MessageKind;

    #[tokio::test]
    async fn test_sign_on_is_one_frame() {
        let (local, mut peer) = tokio::io::duplex(1024);
        let (r, w) = tokio::io::split(local);
        let conn = Connection::new(r, w);

        SignOn::default().send(&conn).await.unwrap();

        let msg = read_frame(&mut peer, &FrameCodec::default()).await.unwrap().unwrap();
        assert_eq!(msg.kind(), MessageKind::SignOn);
    }

    #[tokio::test]
    async fn test_write_failure_is_sign_on_error() {
        let (local, _peer) = tokio::io::duplex(1024);
        let (r, w) = tokio::io::split(local);
        let conn = Connection::new(r, w);
        conn.close().await.unwrap();

        assert!(matches!(
            SignOn::default().send(&conn).await,
            Err(GatewayError::SignOn(_))
        ));
    }
}
