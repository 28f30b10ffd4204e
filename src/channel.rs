//! Handoff channels linking pipeline stages.
//!
//! With a buffer size of zero the channel is a rendezvous: `send` resolves
//! only once the receiving side has taken the element, so a slow consumer
//! stalls every producer upstream of it and nothing queues in between. A
//! positive buffer size turns the link into a plain bounded queue.

use std::future::poll_fn;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

struct Envelope<T> {
    item: T,
    ack: Option<oneshot::Sender<()>>,
}

/// Sending half of a handoff channel. Owned by exactly one task.
pub struct HandoffSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
    rendezvous: bool,
}

/// Receiving half of a handoff channel.
pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
}

/// Create a handoff channel.
///
/// `buffer_size == 0` gives rendezvous semantics; any other value gives a
/// bounded queue of that capacity.
pub fn channel<T>(buffer_size: usize) -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (
        HandoffSender {
            tx,
            rendezvous: buffer_size == 0,
        },
        HandoffReceiver { rx },
    )
}

impl<T> HandoffSender<T> {
    /// Hand an element to the receiver.
    ///
    /// Fails with [`Error::ChannelClosed`] when the receiver is gone, including
    /// when it was dropped while this element was still waiting to be taken.
    pub async fn send(&self, item: T) -> Result<()> {
        if !self.rendezvous {
            return self
                .tx
                .send(Envelope { item, ack: None })
                .await
                .map_err(|_| Error::ChannelClosed);
        }

        let (ack, taken) = oneshot::channel();
        self.tx
            .send(Envelope {
                item,
                ack: Some(ack),
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        taken.await.map_err(|_| Error::ChannelClosed)
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiving half has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

impl<T> HandoffReceiver<T> {
    /// Receive the next element, or `None` once the sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Poll for the next element, releasing the sender on success.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx).map(|envelope| {
            envelope.map(|Envelope { item, ack }| {
                if let Some(ack) = ack {
                    // The sender may have given up already; nothing to release then.
                    let _ = ack.send(());
                }
                item
            })
        })
    }
}
