use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use super::{ChannelLink, Connector};
use crate::error::ClientError;

/// Opens the agora channel over a websocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<ChannelLink, ClientError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        debug!(target = "agora::websocket", url = %self.url, "websocket open");

        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<String>();
        tokio::spawn(handle_websocket(ws_stream, rx_out, tx_in));

        Ok(ChannelLink {
            outbound: tx_out,
            inbound: rx_in,
        })
    }
}

/// Moves text frames between the socket and the link channels until either
/// side goes away. Dropping `tx_in` on exit is what tells the driver the link
/// is gone.
async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<String>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // The driver dropped its sender: close politely so the read half ends.
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx_in.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if tx_in.send(text).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(target = "agora::websocket", error = %err, "dropping non-utf8 binary frame");
                }
            },
            Ok(Message::Close(frame)) => {
                debug!(target = "agora::websocket", ?frame, "server closed websocket");
                break;
            }
            Err(err) => {
                warn!(target = "agora::websocket", error = %err, "websocket read failed");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    let _ = send_task.await;
}
