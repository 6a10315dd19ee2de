use {
    super::{
        outbound::OutboundRequest,
        stream::{create_stream, ClientStream, StreamEvent},
        ConnectionHandler,
        ReconnectPolicy,
        TransportError,
    },
    crate::{error::ClientError, HttpRequest},
    futures_util::{stream::FusedStream, Stream, StreamExt},
    std::{
        pin::Pin,
        task::{Context, Poll},
    },
    tokio::sync::{mpsc::UnboundedReceiver, oneshot},
};

pub(super) enum ConnectionControl {
    Connect {
        request: HttpRequest<()>,
        tx: oneshot::Sender<Result<(), ClientError>>,
    },

    Disconnect {
        tx: oneshot::Sender<Result<(), ClientError>>,
    },

    OutboundRequest(OutboundRequest),
}

pub(super) async fn connection_event_loop<T>(
    policy: ReconnectPolicy,
    mut control_rx: UnboundedReceiver<ConnectionControl>,
    mut handler: T,
) where
    T: ConnectionHandler,
{
    let mut conn = Connection::new(policy);

    loop {
        tokio::select! {
            event = control_rx.recv() => {
                match event {
                    Some(event) => match event {
                        ConnectionControl::Connect { request, tx } => {
                            let result = conn.connect(request).await;

                            if result.is_ok() {
                                handler.connected();
                            }

                            tx.send(result).ok();
                        }

                        ConnectionControl::Disconnect { tx } => {
                            tx.send(conn.disconnect().await).ok();
                            handler.disconnected(None);
                        }

                        ConnectionControl::OutboundRequest(request) => {
                            conn.request(request);
                        }
                    }

                    // Control TX has been dropped, shutting down.
                    None => {
                        conn.disconnect().await.ok();
                        handler.disconnected(None);
                        break;
                    }
                }
            }

            event = conn.select_next_some() => {
                match event {
                    StreamEvent::Notification(notification) => {
                        handler.notification(notification);
                    }

                    StreamEvent::InboundError(error) => {
                        handler.inbound_error(error);
                    }

                    StreamEvent::OutboundError(error) => {
                        handler.outbound_error(error);
                    }

                    StreamEvent::ConnectionClosed(frame) => {
                        if conn.reestablish().await {
                            handler.connected();
                        } else {
                            conn.reset();
                            handler.disconnected(frame);
                        }
                    }
                }
            }
        }
    }
}

struct Connection {
    policy: ReconnectPolicy,
    stream: Option<ClientStream>,
    request: Option<HttpRequest<()>>,
}

impl Connection {
    fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            stream: None,
            request: None,
        }
    }

    async fn connect(&mut self, request: HttpRequest<()>) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream.take() {
            stream.close(None).await.ok();
        }

        self.stream = Some(create_stream(clone_request(&request)).await?);
        self.request = Some(request);

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ClientError> {
        // Dropping the stored request guarantees no reconnection is attempted
        // after an explicit disconnect.
        self.request = None;

        match self.stream.take() {
            Some(mut stream) => stream.close(None).await,

            None => Err(ClientError::ClosingFailed(TransportError::AlreadyClosed)),
        }
    }

    fn request(&mut self, request: OutboundRequest) {
        match &mut self.stream {
            Some(stream) => stream.send_raw(request),

            None => {
                request.tx.send(Err(ClientError::NotConnected)).ok();
            }
        }
    }

    fn reset(&mut self) {
        self.stream = None;
        self.request = None;
    }

    /// Redials the relay after an unexpected close, backing off exponentially
    /// between attempts. Returns whether a new stream was established.
    async fn reestablish(&mut self) -> bool {
        self.stream = None;

        let Some(request) = &self.request else {
            return false;
        };

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.delay(attempt)).await;

            match create_stream(clone_request(request)).await {
                Ok(stream) => {
                    tracing::debug!(attempt, "relay connection re-established");
                    self.stream = Some(stream);
                    return true;
                }

                Err(error) => {
                    tracing::warn!(attempt, %error, "reconnect attempt failed");
                }
            }
        }

        false
    }
}

// `http::Request` is not `Clone`; the websocket handshake only needs the
// method, URI and headers.
fn clone_request(request: &HttpRequest<()>) -> HttpRequest<()> {
    let mut out = HttpRequest::new(());

    *out.method_mut() = request.method().clone();
    *out.uri_mut() = request.uri().clone();
    *out.headers_mut() = request.headers().clone();

    out
}

impl Stream for Connection {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(stream) = &mut self.stream {
            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(event)) => Poll::Ready(Some(event)),

                // The socket ended without a close frame (abrupt reset).
                Poll::Ready(None) => {
                    self.stream = None;
                    Poll::Ready(Some(StreamEvent::ConnectionClosed(None)))
                }

                Poll::Pending => Poll::Pending,
            }
        } else {
            Poll::Pending
        }
    }
}

impl FusedStream for Connection {
    fn is_terminated(&self) -> bool {
        false
    }
}
