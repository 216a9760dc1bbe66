use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_model::{
    ClientEvent, EnginePacket, MessagePayload, ServerEvent, SocketPacket, DEFAULT_NAMESPACE,
};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Channel, ChannelEvent, TransportErrors};

type WsTx = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRx = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);
const BACKOFF_MULTIPLIER: u32 = 2;
// Applies until the open packet announces the server heartbeat.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// An application event waiting for the writer, with the slot its outcome
/// is reported on.
struct Outbound {
    message: Message,
    written: oneshot::Sender<Result<(), TransportErrors>>,
}

struct Link {
    // Handshake replies and pongs; never queued behind an event.
    control_tx: mpsc::UnboundedSender<Message>,
    outbound_tx: mpsc::Sender<Outbound>,
    // Cancelled when the connection is torn down or a write stalls.
    closed: CancellationToken,
    write_timeout: Duration,
    // Namespace connect acknowledged by the server.
    ready: bool,
}

enum Flow {
    Continue,
    Close,
    Refused,
}

enum SessionEnd {
    Lost { established: bool },
    /// The server rejected the namespace; reconnecting would be rejected again.
    Refused,
}

struct Backoff {
    delay: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: INITIAL_RETRY_DELAY,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = std::cmp::min(self.delay * BACKOFF_MULTIPLIER, MAX_RETRY_DELAY);
        delay
    }

    fn reset(&mut self) {
        self.delay = INITIAL_RETRY_DELAY;
    }
}

/// Socket.IO client over a single WebSocket, reconnecting until the server
/// refuses the namespace or shutdown is requested.
pub struct SocketIoChannel {
    url: Url,
    link: Mutex<Option<Link>>,
}

impl SocketIoChannel {
    pub fn new_shared(url: Url) -> Arc<Self> {
        Arc::new(Self {
            url,
            link: Mutex::new(None),
        })
    }

    async fn connect(&self) -> Result<(WsRx, CancellationToken), TransportErrors> {
        tracing::info!("Connecting to {}", self.url);
        let ws_stream = match timeout(
            HANDSHAKE_TIMEOUT,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(err)) => return Err(TransportErrors::ConnectionFailed(err.to_string())),
            Err(_) => {
                return Err(TransportErrors::ConnectionFailed(format!(
                    "no WebSocket handshake within {HANDSHAKE_TIMEOUT:?}"
                )))
            }
        };
        tracing::info!("WebSocket opened");

        let (ws_tx, ws_rx) = ws_stream.split();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        // A single slot: the writer holds at most one event besides this one.
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        let closed = CancellationToken::new();
        tokio::spawn(write_loop(ws_tx, control_rx, outbound_rx, closed.clone()));

        *self.link.lock().await = Some(Link {
            control_tx,
            outbound_tx,
            closed: closed.clone(),
            write_timeout: HANDSHAKE_TIMEOUT,
            ready: false,
        });
        Ok((ws_rx, closed))
    }

    /// Queues a protocol packet ahead of any pending event. Never waits on the socket.
    async fn send_control(&self, packet: EnginePacket) -> Result<(), TransportErrors> {
        let text = packet.encode()?;
        match self.link.lock().await.as_ref() {
            Some(link) => link
                .control_tx
                .send(Message::text(text))
                .map_err(|_| TransportErrors::ConnectionIsNotOpened),
            None => Err(TransportErrors::ConnectionIsNotOpened),
        }
    }

    async fn on_open(&self, write_timeout: Duration) {
        if let Some(link) = self.link.lock().await.as_mut() {
            link.write_timeout = write_timeout;
        }
    }

    async fn mark_ready(&self) {
        if let Some(link) = self.link.lock().await.as_mut() {
            link.ready = true;
        }
    }

    async fn drop_link(&self) {
        if let Some(link) = self.link.lock().await.take() {
            link.closed.cancel();
        }
    }

    /// Main loop: connect, serve until the connection is lost, back off, repeat.
    ///
    /// Every connection the server acknowledged ends with exactly one
    /// [`ChannelEvent::Disconnected`].
    pub async fn run(
        self: Arc<Self>,
        events_tx: mpsc::UnboundedSender<ChannelEvent>,
        shutdown: CancellationToken,
    ) {
        let mut backoff = Backoff::new();

        loop {
            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown.cancelled() => break,
            };

            match connected {
                Ok((ws_rx, closed)) => {
                    let end = self.serve(ws_rx, &closed, &events_tx, &shutdown).await;
                    self.drop_link().await;
                    match end {
                        SessionEnd::Refused => {
                            tracing::error!("{} refused the namespace, not reconnecting", self.url);
                            break;
                        }
                        SessionEnd::Lost { established: true } => {
                            backoff.reset();
                            tracing::warn!("Disconnected from {}", self.url);
                            if events_tx.send(ChannelEvent::Disconnected).is_err() {
                                break;
                            }
                        }
                        SessionEnd::Lost { established: false } => {}
                    }
                }
                Err(err) => tracing::error!("{err}"),
            }

            if shutdown.is_cancelled() || events_tx.is_closed() {
                break;
            }

            let delay = backoff.next_delay();
            tracing::info!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Channel to {} shut down", self.url);
    }

    async fn serve(
        &self,
        mut ws_rx: WsRx,
        closed: &CancellationToken,
        events_tx: &mpsc::UnboundedSender<ChannelEvent>,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let mut established = false;
        let mut liveness = HANDSHAKE_TIMEOUT;

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = closed.cancelled() => {
                    tracing::warn!("Outbound writes stalled, dropping the connection");
                    break;
                }
                next = timeout(liveness, ws_rx.next()) => next,
            };

            let text = match next {
                Err(_) => {
                    tracing::warn!("No packet from server within {liveness:?}");
                    break;
                }
                Ok(None) => {
                    tracing::warn!("WebSocket stream ended");
                    break;
                }
                Ok(Some(Err(err))) => {
                    tracing::error!("WebSocket error: {err}");
                    break;
                }
                Ok(Some(Ok(Message::Text(text)))) => text,
                Ok(Some(Ok(Message::Close(_)))) => {
                    tracing::warn!("WebSocket connection closed by server");
                    break;
                }
                Ok(Some(Ok(_))) => continue,
            };

            let packet = match EnginePacket::decode(text.as_str()) {
                Ok(packet) => packet,
                Err(err) => {
                    tracing::error!("Dropping unparsable packet ({} bytes): {err}", text.len());
                    continue;
                }
            };

            match self
                .handle_engine_packet(packet, &mut established, &mut liveness, events_tx)
                .await
            {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => break,
                Ok(Flow::Refused) => return SessionEnd::Refused,
                Err(err) => tracing::error!("Failed to handle incoming packet: {err}"),
            }
        }

        SessionEnd::Lost { established }
    }

    async fn handle_engine_packet(
        &self,
        packet: EnginePacket,
        established: &mut bool,
        liveness: &mut Duration,
        events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<Flow, TransportErrors> {
        match packet {
            EnginePacket::Open(handshake) => {
                *liveness =
                    Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                tracing::info!(
                    "Engine.IO session {} opened, heartbeat window {:?}",
                    handshake.sid,
                    liveness
                );
                self.on_open(*liveness).await;
                let connect = SocketPacket::connect().encode()?;
                self.send_control(EnginePacket::Message(connect)).await?;
            }
            EnginePacket::Ping(data) => {
                tracing::trace!("Ping from server");
                self.send_control(EnginePacket::Pong(data)).await?;
            }
            EnginePacket::Close => {
                tracing::warn!("Server closed the Engine.IO session");
                return Ok(Flow::Close);
            }
            EnginePacket::Message(body) => {
                let packet = SocketPacket::decode(&body)?;
                return self.handle_socket_packet(packet, established, events_tx).await;
            }
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
        Ok(Flow::Continue)
    }

    async fn handle_socket_packet(
        &self,
        packet: SocketPacket,
        established: &mut bool,
        events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<Flow, TransportErrors> {
        if packet.namespace() != DEFAULT_NAMESPACE {
            tracing::debug!("Ignoring packet for namespace {}", packet.namespace());
            return Ok(Flow::Continue);
        }

        let mut flow = Flow::Continue;
        let event = match packet {
            SocketPacket::Connect { .. } if *established => {
                tracing::debug!("Duplicate connect acknowledgement");
                return Ok(Flow::Continue);
            }
            SocketPacket::Connect { .. } => {
                self.mark_ready().await;
                *established = true;
                tracing::info!("Connected to {}", self.url);
                ChannelEvent::Connected
            }
            SocketPacket::Disconnect { .. } => {
                tracing::warn!("Server disconnected the client");
                return Ok(Flow::Close);
            }
            SocketPacket::Event { name, args, .. } => {
                match ServerEvent::from_event(&name, &args)? {
                    Some(event) => ChannelEvent::Server(event),
                    None => {
                        tracing::debug!("Ignoring unhandled event {name}");
                        return Ok(Flow::Continue);
                    }
                }
            }
            SocketPacket::ConnectError { data, .. } => {
                let message = data
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| data.to_string());
                tracing::error!("Server refused connection: {message}");
                flow = Flow::Refused;
                ChannelEvent::Server(ServerEvent::Error(MessagePayload { message }))
            }
            SocketPacket::Ack { id, .. } => {
                tracing::debug!("Ignoring ack {id}");
                return Ok(Flow::Continue);
            }
        };

        if events_tx.send(event).is_err() {
            tracing::warn!("Channel event receiver dropped");
            return Ok(Flow::Close);
        }
        Ok(flow)
    }
}

/// Owns the socket sink. Control messages go first; events wait for the
/// previous write to finish. Stops when the link is closed.
async fn write_loop(
    mut ws_tx: WsTx,
    mut control_rx: mpsc::UnboundedReceiver<Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    closed: CancellationToken,
) {
    loop {
        let (message, written) = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            Some(message) = control_rx.recv() => (message, None),
            Some(outbound) = outbound_rx.recv() => (outbound.message, Some(outbound.written)),
            else => break,
        };

        let result = tokio::select! {
            _ = closed.cancelled() => break,
            result = ws_tx.send(message) => result,
        };
        let failed = result.is_err();
        let result = result.map_err(|err| {
            tracing::error!("Failed to send text message: {err}");
            TransportErrors::SendFailed(err.to_string())
        });
        if let Some(written) = written {
            // The emitter may have given up waiting.
            let _ = written.send(result);
        }
        if failed {
            closed.cancel();
            break;
        }
    }

    match timeout(CLOSE_TIMEOUT, ws_tx.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!("Closing dead socket: {err}"),
        Err(_) => tracing::debug!("Socket did not close within {CLOSE_TIMEOUT:?}"),
    }
}

async fn deliver(
    outbound_tx: mpsc::Sender<Outbound>,
    message: Message,
) -> Result<(), TransportErrors> {
    let (written_tx, written_rx) = oneshot::channel();
    outbound_tx
        .send(Outbound {
            message,
            written: written_tx,
        })
        .await
        .map_err(|_| TransportErrors::ConnectionIsNotOpened)?;
    written_rx
        .await
        .map_err(|_| TransportErrors::SendFailed("connection dropped during write".to_owned()))?
}

#[async_trait]
impl Channel for SocketIoChannel {
    /// Resolves once the event is on the socket. A write that does not finish
    /// within the heartbeat window fails and tears the connection down.
    async fn emit(&self, event: ClientEvent) -> Result<(), TransportErrors> {
        let body = EnginePacket::Message(event.to_packet()?.encode()?).encode()?;
        let (outbound_tx, closed, write_timeout) = match self.link.lock().await.as_ref() {
            Some(link) if link.ready => (
                link.outbound_tx.clone(),
                link.closed.clone(),
                link.write_timeout,
            ),
            _ => return Err(TransportErrors::ConnectionIsNotOpened),
        };
        tracing::debug!("Emitting {} ({} bytes)", event.name(), body.len());

        match timeout(write_timeout, deliver(outbound_tx, Message::text(body))).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "Emitting {} did not finish within {write_timeout:?}",
                    event.name()
                );
                closed.cancel();
                Err(TransportErrors::SendFailed(format!(
                    "write stalled for {write_timeout:?}"
                )))
            }
        }
    }
}
