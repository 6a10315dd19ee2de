use {
    super::{outbound::OutboundRequest, CloseReason, TransportError},
    crate::{error::ClientError, HttpRequest},
    clearnode_rpc::rpc::{ErrorReply, Method, Notification, RawMessage},
    futures_util::{stream::FusedStream, SinkExt, Stream, StreamExt},
    std::{
        collections::{HashMap, VecDeque},
        pin::Pin,
        sync::Arc,
        task::{Context, Poll},
    },
    tokio::{
        net::TcpStream,
        sync::{
            mpsc::{self, UnboundedReceiver, UnboundedSender},
            oneshot,
        },
    },
    tokio_tungstenite::{
        connect_async,
        tungstenite::{protocol::CloseFrame, Message},
        MaybeTlsStream,
        WebSocketStream,
    },
};

pub type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Waiter = oneshot::Sender<Result<serde_json::Value, ClientError>>;

/// Opens a connection to the relay and returns a [`ClientStream`] for the
/// connection.
pub async fn create_stream(request: HttpRequest<()>) -> Result<ClientStream, ClientError> {
    let (socket, _) = connect_async(request)
        .await
        .map_err(ClientError::ConnectionFailed)?;

    Ok(ClientStream::new(socket))
}

/// Possible events produced by the [`ClientStream`].
///
/// The events are produced by polling [`ClientStream`] in a loop.
#[derive(Debug)]
pub enum StreamEvent {
    /// A notification pushed by the relay outside of request/response pairs.
    Notification(Notification),

    /// Error generated when failed to parse an inbound message, or a relay
    /// error that could not be routed to a waiter.
    InboundError(ClientError),

    /// Error generated when failed to write data to the underlying websocket
    /// stream.
    OutboundError(ClientError),

    /// The websocket connection was closed.
    ///
    /// This is the last event that can be produced by the stream.
    ConnectionClosed(Option<CloseFrame<'static>>),
}

/// Lower-level [`FusedStream`] interface for the relay connection.
///
/// The stream produces [`StreamEvent`] when polled, and sends requests
/// submitted via [`ClientStream::send_raw()`]. Responses are correlated by
/// method name through a per-method FIFO of pending waiters.
pub struct ClientStream {
    socket: SocketStream,
    outbound_tx: UnboundedSender<Message>,
    outbound_rx: UnboundedReceiver<Message>,
    waiters: HashMap<Method, VecDeque<Waiter>>,
    close_frame: Option<CloseFrame<'static>>,
}

impl ClientStream {
    pub fn new(socket: SocketStream) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            socket,
            outbound_tx,
            outbound_rx,
            waiters: HashMap::new(),
            close_frame: None,
        }
    }

    /// Serializes and sends an [`OutboundRequest`], registering its waiter
    /// under the expected response method.
    pub fn send_raw(&mut self, request: OutboundRequest) {
        let OutboundRequest {
            method,
            response_method,
            params,
            tx,
        } = request;

        let raw = RawMessage {
            method: Arc::from(method.as_str()),
            params,
        };

        match serde_json::to_string(&raw) {
            Ok(data) => {
                self.waiters.entry(response_method).or_default().push_back(tx);
                self.outbound_tx.send(Message::Text(data)).ok();
            }

            Err(err) => {
                tx.send(Err(ClientError::Serialization(err))).ok();
            }
        }
    }

    /// Closes the connection.
    pub async fn close(&mut self, frame: Option<CloseFrame<'static>>) -> Result<(), ClientError> {
        self.close_frame = frame.clone();
        self.socket
            .close(frame)
            .await
            .map_err(ClientError::ClosingFailed)
    }

    fn next_waiter(&mut self, method: Method) -> Option<Waiter> {
        let queue = self.waiters.get_mut(&method)?;

        // Skip waiters whose receiver half is gone (timed out or dropped) so
        // an abandoned call cannot consume a later caller's response.
        while let Some(tx) = queue.pop_front() {
            if !tx.is_closed() {
                return Some(tx);
            }
        }

        None
    }

    fn dispatch_error(&mut self, raw: RawMessage) -> Option<StreamEvent> {
        let reply: ErrorReply = match serde_json::from_value(raw.params) {
            Ok(reply) => reply,
            Err(err) => return Some(StreamEvent::InboundError(ClientError::Deserialization(err))),
        };

        if let Ok(method) = reply.method.as_ref().parse::<Method>() {
            if let Some(tx) = self.next_waiter(method.response_method()) {
                tx.send(Err(ClientError::Relay(reply.message))).ok();
                return None;
            }
        }

        Some(StreamEvent::InboundError(ClientError::Relay(reply.message)))
    }

    fn parse_inbound(&mut self, result: Result<Message, TransportError>) -> Option<StreamEvent> {
        match result {
            Ok(message) => match &message {
                Message::Binary(_) | Message::Text(_) => {
                    let raw: RawMessage = match serde_json::from_slice(&message.into_data()) {
                        Ok(raw) => raw,

                        Err(err) => {
                            return Some(StreamEvent::InboundError(ClientError::Deserialization(
                                err,
                            )))
                        }
                    };

                    if raw.method.as_ref() == Method::Error.as_str() {
                        return self.dispatch_error(raw);
                    }

                    if let Ok(method) = raw.method.as_ref().parse::<Method>() {
                        if let Some(tx) = self.next_waiter(method) {
                            tx.send(Ok(raw.params)).ok();
                            return None;
                        }
                    }

                    Some(StreamEvent::Notification(Notification::from_raw(raw)))
                }

                Message::Close(frame) => {
                    self.close_frame = frame.clone();
                    Some(StreamEvent::ConnectionClosed(frame.clone()))
                }

                _ => None,
            },

            Err(error) => Some(StreamEvent::InboundError(ClientError::Transport(error))),
        }
    }

    fn poll_write(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), TransportError>> {
        let mut should_flush = false;

        loop {
            // `poll_ready()` needs to be called before each `start_send()` to
            // make sure the sink is ready to accept more data.
            match self.socket.poll_ready_unpin(cx) {
                // The sink is ready to accept more data.
                Poll::Ready(Ok(())) => {
                    if let Poll::Ready(Some(next_message)) = self.outbound_rx.poll_recv(cx) {
                        if let Err(err) = self.socket.start_send_unpin(next_message) {
                            return Poll::Ready(Err(err));
                        }

                        should_flush = true;
                    } else if should_flush {
                        // We've sent out some messages, now we need to flush.
                        return self.socket.poll_flush_unpin(cx);
                    } else {
                        return Poll::Pending;
                    }
                }

                Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),

                // The sink is not ready.
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Stream for ClientStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.socket.is_terminated() {
            return Poll::Ready(None);
        }

        while let Poll::Ready(data) = self.socket.poll_next_unpin(cx) {
            match data {
                Some(result) => {
                    if let Some(event) = self.parse_inbound(result) {
                        return Poll::Ready(Some(event));
                    }
                }

                None => {
                    return Poll::Ready(Some(StreamEvent::ConnectionClosed(
                        self.close_frame.clone(),
                    )))
                }
            }
        }

        match self.poll_write(cx) {
            Poll::Ready(Err(error)) => {
                Poll::Ready(Some(StreamEvent::OutboundError(ClientError::Transport(
                    error,
                ))))
            }

            _ => Poll::Pending,
        }
    }
}

impl FusedStream for ClientStream {
    fn is_terminated(&self) -> bool {
        self.socket.is_terminated()
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        let reason = CloseReason(self.close_frame.take());

        for (_, queue) in self.waiters.drain() {
            for tx in queue {
                tx.send(Err(ClientError::ConnectionClosed(reason.clone())))
                    .ok();
            }
        }
    }
}
