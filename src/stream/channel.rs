//! Push-style producers for [`Stream::channel`](super::Stream::channel).

use futures::channel::mpsc;
use futures::future::ready;
use futures::{SinkExt, StreamExt};

use crate::progress::{Emission, Progress};
use crate::{BoxFuture, BoxStream};

/// Error returned when the consumer of a channel stream has gone away.
///
/// A producer that sees it should stop; nothing will read further emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterClosed;

impl std::fmt::Display for EmitterClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream consumer dropped")
    }
}

impl std::error::Error for EmitterClosed {}

/// Sending half handed to a channel stream's producer.
pub struct Emitter<T, E> {
    sender: mpsc::Sender<Emission<T, E>>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Emitter {
            sender: self.sender.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<T, E> Emitter<T, E> {
    /// Push one emission, waiting until the consumer has room for it.
    pub async fn emit(&mut self, emission: Emission<T, E>) -> Result<(), EmitterClosed> {
        self.sender.send(emission).await.map_err(|_| EmitterClosed)
    }

    /// Push a successful emission.
    pub async fn success(&mut self, value: T, progress: Progress) -> Result<(), EmitterClosed> {
        self.emit(Emission::success(value, progress)).await
    }

    /// Push a failed emission.
    pub async fn failure(&mut self, error: E, progress: Progress) -> Result<(), EmitterClosed> {
        self.emit(Emission::failure(error, progress)).await
    }

    /// Returns true once the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(super) fn bounded<T, E>() -> (Emitter<T, E>, mpsc::Receiver<Emission<T, E>>) {
    let (sender, receiver) = mpsc::channel(0);
    (Emitter { sender }, receiver)
}

/// Poll the producer alongside its receiver.
///
/// The producer's own completion contributes no items; the merged stream ends
/// once the producer is done and every buffered emission has been read.
pub(super) fn drive<'a, T, E>(
    producer: BoxFuture<'a, ()>,
    receiver: mpsc::Receiver<Emission<T, E>>,
) -> BoxStream<'a, Emission<T, E>>
where
    T: Send + 'a,
    E: Send + 'a,
{
    let done = futures::stream::once(producer).filter_map(|()| ready(None::<Emission<T, E>>));
    futures::stream::select(receiver, done).boxed()
}
