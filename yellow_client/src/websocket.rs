use {
    self::connection::{connection_event_loop, ConnectionControl},
    crate::{error::ClientError, HttpRequest},
    clearnode_rpc::rpc::{Notification, RequestPayload},
    std::time::Duration,
    tokio::sync::{
        mpsc::{self, UnboundedSender},
        oneshot,
    },
};
pub use {outbound::*, stream::*, tokio_tungstenite::tungstenite::protocol::CloseFrame};

pub type TransportError = tokio_tungstenite::tungstenite::Error;

/// Wrapper around the websocket [`CloseFrame`] providing info about the
/// connection closing reason.
#[derive(Debug, Clone)]
pub struct CloseReason(pub Option<CloseFrame<'static>>);

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(frame) = &self.0 {
            frame.fmt(f)
        } else {
            f.write_str("<close frame unavailable>")
        }
    }
}

mod connection;
mod outbound;
mod stream;

/// Reconnection policy applied after an unexpected socket drop.
///
/// Attempt `k` (1-based) is made after a delay of
/// `initial_delay * 2^(k - 1)`; once `max_attempts` have failed the
/// connection is declared closed.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Backoff delay before attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));

        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Handlers for the connection events.
pub trait ConnectionHandler: Send + 'static {
    /// Called when a connection to the relay is established, both on the
    /// initial connect and after a successful reconnect.
    fn connected(&mut self) {}

    /// Called when the connection is closed for good: after an explicit
    /// disconnect, or once reconnect attempts are exhausted.
    fn disconnected(&mut self, _frame: Option<CloseFrame<'static>>) {}

    /// Called for every notification pushed by the relay.
    fn notification(&mut self, notification: Notification);

    /// Called when an inbound error occurs, such as data deserialization
    /// failure or an unroutable relay error.
    fn inbound_error(&mut self, _error: ClientError) {}

    /// Called when an outbound error occurs, i.e. failed to write to the
    /// websocket stream.
    fn outbound_error(&mut self, _error: ClientError) {}
}

/// The ClearNode WebSocket client.
///
/// A cheap handle to the connection actor; all socket IO happens on a
/// dedicated task spawned by [`Client::new`].
#[derive(Debug, Clone)]
pub struct Client {
    control_tx: UnboundedSender<ConnectionControl>,
}

impl Client {
    /// Creates a new [`Client`] with the provided handler.
    pub fn new<T>(handler: T, policy: ReconnectPolicy) -> Self
    where
        T: ConnectionHandler,
    {
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        tokio::spawn(connection_event_loop(policy, control_rx, handler));

        Self { control_tx }
    }

    /// Sends a request and returns a future that resolves with its response.
    ///
    /// The protocol carries no request ids, so responses are correlated by
    /// the method they come back under: concurrent requests with distinct
    /// response methods never cross-talk, and concurrent requests sharing a
    /// response method resolve in send order. A waiter abandoned before its
    /// response arrives (e.g. by a timeout) is skipped, not misdelivered.
    pub fn request<T>(&self, payload: T) -> ResponseFuture<T>
    where
        T: RequestPayload,
    {
        let (request, response) = create_request(payload);

        if let Some(request) = request {
            self.send(request);
        }

        response
    }

    /// Sends a request without waiting for its response. A response arriving
    /// later is discarded.
    pub fn notify<T>(&self, payload: T)
    where
        T: RequestPayload,
    {
        let (request, _response) = create_request(payload);

        if let Some(request) = request {
            self.send(request);
        }
    }

    /// Opens a connection to the relay.
    pub async fn connect(&self, request: HttpRequest<()>) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();

        if self
            .control_tx
            .send(ConnectionControl::Connect { request, tx })
            .is_ok()
        {
            rx.await.map_err(|_| ClientError::ChannelClosed)?
        } else {
            Err(ClientError::ChannelClosed)
        }
    }

    /// Closes the relay connection, rejecting all pending waiters. No
    /// reconnection is attempted afterwards.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();

        if self
            .control_tx
            .send(ConnectionControl::Disconnect { tx })
            .is_ok()
        {
            rx.await.map_err(|_| ClientError::ChannelClosed)?
        } else {
            Err(ClientError::ChannelClosed)
        }
    }

    fn send(&self, request: OutboundRequest) {
        if let Err(err) = self
            .control_tx
            .send(ConnectionControl::OutboundRequest(request))
        {
            let ConnectionControl::OutboundRequest(request) = err.0 else {
                unreachable!();
            };

            request.tx.send(Err(ClientError::ChannelClosed)).ok();
        }
    }
}
