//! Generation-stamped reply stream
//!
//! A [`SendStream`] wraps the provider's reply channel, demultiplexes each
//! chunk and stamps every item with the generation of the session that
//! produced it. It yields any number of events followed by exactly one
//! terminal item, then ends.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::demux::{DemuxedChunk, SendEvent};
use crate::backend::ProviderEvent;
use crate::error::StreamFailure;
use crate::messages::Generation;

/// One item of a reply stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamItem {
    /// A text or grounding event
    Event(SendEvent),
    /// The reply finished normally
    Completed,
    /// The reply failed
    Failed(StreamFailure),
}

/// A stream item tagged with the generation that produced it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampedEvent {
    /// Generation of the originating session
    pub generation: Generation,
    /// The item
    pub item: StreamItem,
}

/// Result of a non-blocking poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamPoll {
    /// An item was ready
    Item(StampedEvent),
    /// Nothing ready yet
    Idle,
    /// The stream already yielded its terminal item
    Ended,
}

/// Lazy, single-pass stream of stamped reply items
#[derive(Debug)]
pub struct SendStream {
    generation: Generation,
    receiver: Option<mpsc::Receiver<ProviderEvent>>,
    pending: VecDeque<StreamItem>,
    /// Terminal item has been queued
    finished: bool,
}

impl SendStream {
    /// Wrap a provider reply channel
    pub fn new(generation: Generation, receiver: mpsc::Receiver<ProviderEvent>) -> Self {
        Self {
            generation,
            receiver: Some(receiver),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// A stream that fails immediately (the request never started)
    pub fn failed(generation: Generation, failure: StreamFailure) -> Self {
        Self {
            generation,
            receiver: None,
            pending: VecDeque::from([StreamItem::Failed(failure)]),
            finished: true,
        }
    }

    /// Generation this stream is stamped with
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Take the next item if one is ready, without waiting
    pub fn try_recv(&mut self) -> StreamPoll {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return StreamPoll::Item(self.stamp(item));
            }
            if self.finished {
                return StreamPoll::Ended;
            }
            let event = match self.receiver.as_mut().map(mpsc::Receiver::try_recv) {
                Some(Ok(event)) => Some(event),
                Some(Err(TryRecvError::Empty)) => return StreamPoll::Idle,
                Some(Err(TryRecvError::Disconnected)) | None => None,
            };
            self.ingest(event);
        }
    }

    /// Queue the items for one provider event; `None` means the channel
    /// closed
    fn ingest(&mut self, event: Option<ProviderEvent>) {
        match event {
            Some(ProviderEvent::Chunk(chunk)) => {
                let events = DemuxedChunk::classify(chunk).into_events();
                self.pending.extend(events.into_iter().map(StreamItem::Event));
            }
            Some(ProviderEvent::Failed(reason)) => {
                self.terminate(StreamItem::Failed(StreamFailure::new(reason)));
            }
            None => self.terminate(StreamItem::Completed),
        }
    }

    fn terminate(&mut self, item: StreamItem) {
        self.pending.push_back(item);
        self.finished = true;
        // Dropping the receiver stops the producer on its next send
        self.receiver = None;
    }

    fn stamp(&self, item: StreamItem) -> StampedEvent {
        StampedEvent {
            generation: self.generation,
            item,
        }
    }
}

impl Stream for SendStream {
    type Item = StampedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StampedEvent>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(this.stamp(item)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            let event = match this.receiver.as_mut() {
                Some(receiver) => ready!(receiver.poll_recv(cx)),
                None => None,
            };
            this.ingest(event);
        }
    }
}
