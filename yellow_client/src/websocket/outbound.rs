use {
    crate::error::ClientError,
    clearnode_rpc::rpc::{Method, RequestPayload},
    pin_project::pin_project,
    std::{
        future::Future,
        marker::PhantomData,
        pin::Pin,
        task::{ready, Context, Poll},
    },
    tokio::sync::oneshot,
};

/// An outbound request wrapper created by [`create_request()`]. Intended to
/// be used with [`ClientStream`][crate::websocket::ClientStream].
#[derive(Debug)]
pub struct OutboundRequest {
    pub(super) method: Method,
    pub(super) response_method: Method,
    pub(super) params: serde_json::Value,
    pub(super) tx: oneshot::Sender<Result<serde_json::Value, ClientError>>,
}

/// Future that resolves with the response for the specified request.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[pin_project]
pub struct ResponseFuture<T> {
    #[pin]
    rx: oneshot::Receiver<Result<serde_json::Value, ClientError>>,
    _marker: PhantomData<T>,
}

impl<T> ResponseFuture<T> {
    fn new(rx: oneshot::Receiver<Result<serde_json::Value, ClientError>>) -> Self {
        Self {
            rx,
            _marker: PhantomData,
        }
    }
}

impl<T> Future for ResponseFuture<T>
where
    T: RequestPayload,
{
    type Output = Result<T::Response, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let result = ready!(this.rx.poll(cx)).map_err(|_| ClientError::ChannelClosed)?;

        let result = match result {
            Ok(value) => serde_json::from_value(value).map_err(ClientError::Deserialization),

            Err(err) => Err(err),
        };

        Poll::Ready(result)
    }
}

/// Creates a protocol request and returns a tuple of the serialized request
/// and a response future. On a serialization failure the request slot is
/// empty and the future resolves with the error.
pub fn create_request<T>(payload: T) -> (Option<OutboundRequest>, ResponseFuture<T>)
where
    T: RequestPayload,
{
    let (tx, rx) = oneshot::channel();
    let response = ResponseFuture::new(rx);

    match serde_json::to_value(&payload) {
        Ok(params) => (
            Some(OutboundRequest {
                method: T::METHOD,
                response_method: T::RESPONSE_METHOD,
                params,
                tx,
            }),
            response,
        ),

        Err(err) => {
            tx.send(Err(ClientError::Serialization(err))).ok();
            (None, response)
        }
    }
}
