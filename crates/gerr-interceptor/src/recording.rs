// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream decorator that keeps the last message seen in each direction.

use crate::stream::ServerStream;
use async_trait::async_trait;
use tonic::Status;
use tonic::metadata::MetadataMap;
use tracing::trace;

/// Stream decorator that remembers the last message in each direction.
///
/// Lives for one call. A message counts as sent only once the inner stream
/// accepted it, and as received only when the inner stream yielded it.
pub struct RecordingStream<S: ServerStream> {
    inner: S,
    last_request: Option<S::Request>,
    last_response: Option<S::Response>,
}

impl<S: ServerStream> RecordingStream<S> {
    /// Start recording `inner` with nothing seen yet.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_request: None,
            last_response: None,
        }
    }

    /// The most recent message received from the client.
    pub fn last_request(&self) -> Option<&S::Request> {
        self.last_request.as_ref()
    }

    /// The most recent message sent to the client.
    pub fn last_response(&self) -> Option<&S::Response> {
        self.last_response.as_ref()
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Stop recording and return the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> ServerStream for RecordingStream<S>
where
    S: ServerStream,
    S::Request: Clone,
    S::Response: Clone,
{
    type Request = S::Request;
    type Response = S::Response;

    fn metadata(&self) -> &MetadataMap {
        self.inner.metadata()
    }

    async fn send(&mut self, message: S::Response) -> Result<(), Status> {
        let copy = message.clone();
        self.inner.send(message).await?;
        trace!("recorded outbound message");
        self.last_response = Some(copy);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<S::Request>, Status> {
        let message = self.inner.recv().await?;
        if let Some(ref m) = message {
            trace!("recorded inbound message");
            self.last_request = Some(m.clone());
        }
        Ok(message)
    }
}

impl<S> std::fmt::Debug for RecordingStream<S>
where
    S: ServerStream + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStream")
            .field("inner", &self.inner)
            .field("has_request", &self.last_request.is_some())
            .field("has_response", &self.last_response.is_some())
            .finish()
    }
}
