// SPDX-License-Identifier: MIT OR Apache-2.0
//! Message streams as seen by streaming handlers.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};

/// Send/receive half of one streaming call.
#[async_trait]
pub trait ServerStream: Send {
    /// Messages sent by the client.
    type Request: Send + 'static;
    /// Messages sent to the client.
    type Response: Send + 'static;

    /// Metadata the client attached to the call.
    fn metadata(&self) -> &MetadataMap;

    /// Send one message to the client.
    async fn send(&mut self, message: Self::Response) -> Result<(), Status>;

    /// Receive the next client message; `Ok(None)` once the client is done.
    async fn recv(&mut self) -> Result<Option<Self::Request>, Status>;
}

/// A [`ServerStream`] over a tonic request stream and an mpsc response
/// channel.
///
/// The receiving end of the channel, wrapped in a [`ReceiverStream`], is what
/// a tonic streaming method returns as its response body.
pub struct ChannelStream<Req, Resp> {
    metadata: MetadataMap,
    inbound: BoxStream<'static, Result<Req, Status>>,
    outbound: mpsc::Sender<Result<Resp, Status>>,
}

impl<Req, Resp> ChannelStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Wrap an inbound stream (typically `tonic::Streaming<Req>`) and an
    /// outbound sender.
    pub fn new<S>(request: Request<S>, outbound: mpsc::Sender<Result<Resp, Status>>) -> Self
    where
        S: Stream<Item = Result<Req, Status>> + Send + 'static,
    {
        let (metadata, _extensions, inbound) = request.into_parts();
        Self {
            metadata,
            inbound: inbound.boxed(),
            outbound,
        }
    }

    /// Like [`new`](Self::new), creating the response channel with room for
    /// `buffer` messages.
    pub fn channel<S>(
        request: Request<S>,
        buffer: usize,
    ) -> (Self, ReceiverStream<Result<Resp, Status>>)
    where
        S: Stream<Item = Result<Req, Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(request, tx), ReceiverStream::new(rx))
    }

    /// Server-streaming form: the single request message is the only inbound
    /// item.
    pub fn single(
        request: Request<Req>,
        buffer: usize,
    ) -> (Self, ReceiverStream<Result<Resp, Status>>) {
        let (metadata, extensions, message) = request.into_parts();
        let inbound = stream::iter([Ok::<_, Status>(message)]);
        Self::channel(Request::from_parts(metadata, extensions, inbound), buffer)
    }

    /// A handle for pushing into the response channel directly.
    pub fn sender(&self) -> mpsc::Sender<Result<Resp, Status>> {
        self.outbound.clone()
    }
}

#[async_trait]
impl<Req, Resp> ServerStream for ChannelStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    async fn send(&mut self, message: Resp) -> Result<(), Status> {
        self.outbound
            .send(Ok(message))
            .await
            .map_err(|_| Status::cancelled("response stream closed by client"))
    }

    async fn recv(&mut self) -> Result<Option<Req>, Status> {
        self.inbound.next().await.transpose()
    }
}

impl<Req, Resp> std::fmt::Debug for ChannelStream<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStream")
            .field("metadata", &self.metadata)
            .field("closed", &self.outbound.is_closed())
            .finish_non_exhaustive()
    }
}
