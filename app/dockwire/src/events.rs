//! The engine event stream.

use crate::filters::Filters;
use crate::options::Options;
use crate::request::RequestBuilder;
use chrono::{DateTime, Utc};
use dockwire_error::Result;
use dockwire_protocol::{Event, JsonLinesCodec};
use dockwire_transport::{ResponseMode, Transport};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Parameters for an event subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsOptions {
    /// Replay events from this time. Without it only new events are sent.
    pub since: Option<DateTime<Utc>>,
    /// Stop at this time. Without it the stream never ends on its own.
    pub until: Option<DateTime<Utc>>,
    pub filters: Filters,
}

impl EventsOptions {
    fn to_options(&self) -> Options {
        let mut options = Options::new();
        if let Some(since) = self.since {
            options.insert("since", timestamp(since));
        }
        if let Some(until) = self.until {
            options.insert("until", timestamp(until));
        }
        if !self.filters.is_empty() {
            options.insert("filters", self.filters.clone());
        }
        options
    }
}

/// `seconds.nanoseconds`, the format the engine accepts for `since`/`until`.
fn timestamp(time: DateTime<Utc>) -> String {
    format!("{}.{:09}", time.timestamp(), time.timestamp_subsec_nanos())
}

type EventReader = BoxStream<'static, Result<Event>>;

/// The decoder and the response body under it. Emptied on cancel, which
/// drops the connection.
type ReaderSlot = Arc<Mutex<Option<EventReader>>>;

/// Stops an [`EventStream`] from another task.
#[derive(Clone)]
pub struct EventsHandle {
    token: CancellationToken,
    reader: ReaderSlot,
}

impl EventsHandle {
    /// Ends the stream and closes its connection right away, whether or not
    /// the stream is being polled.
    pub fn cancel(&self) {
        release(&self.reader);
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for EventsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn release(reader: &ReaderSlot) {
    if let Ok(mut slot) = reader.lock() {
        if slot.take().is_some() {
            tracing::debug!("event subscription closed");
        }
    }
}

/// A live subscription to engine events.
///
/// Yields one [`Event`] per document; nothing is read ahead of the consumer.
/// A decode or connection error is the last item.
pub struct EventStream {
    inner: BoxStream<'static, Result<Event>>,
    token: CancellationToken,
    reader: ReaderSlot,
    transport: Arc<dyn Transport>,
    options: EventsOptions,
    last_seen: Option<DateTime<Utc>>,
}

impl EventStream {
    pub(crate) async fn subscribe(
        transport: Arc<dyn Transport>,
        options: EventsOptions,
    ) -> Result<Self> {
        let response = RequestBuilder::get("/events")
            .options(None, Some(&options.to_options()))
            .mode(ResponseMode::Ndjson)
            .send(transport.as_ref())
            .await?
            .into_stream()?;

        let token = CancellationToken::new();
        let events: EventReader =
            FramedRead::new(response.into_reader(), JsonLinesCodec::<Event>::new()).boxed();
        let reader: ReaderSlot = Arc::new(Mutex::new(Some(events)));
        let inner = futures::stream::unfold(
            (Arc::clone(&reader), token.clone(), false),
            |(reader, token, done)| async move {
                if done {
                    release(&reader);
                    return None;
                }
                let slot = Arc::clone(&reader);
                let next = futures::future::poll_fn(move |cx| match slot.lock() {
                    Ok(mut slot) => match slot.as_mut() {
                        Some(events) => events.poll_next_unpin(cx),
                        None => Poll::Ready(None),
                    },
                    Err(_) => Poll::Ready(None),
                });
                tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    next = next => match next {
                        Some(Ok(event)) => Some((Ok(event), (reader, token, false))),
                        Some(Err(e)) => Some((Err(e), (reader, token, true))),
                        None => {
                            release(&reader);
                            None
                        }
                    },
                }
            },
        )
        .boxed();

        tracing::debug!(since = ?options.since, until = ?options.until, "subscribed to events");
        Ok(Self {
            inner,
            token,
            reader,
            transport,
            options,
            last_seen: None,
        })
    }

    /// A handle that can cancel this stream from elsewhere.
    #[must_use]
    pub fn handle(&self) -> EventsHandle {
        EventsHandle {
            token: self.token.clone(),
            reader: Arc::clone(&self.reader),
        }
    }

    /// Time of the last event delivered.
    #[must_use]
    pub const fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Re-issues the subscription after a disconnect.
    ///
    /// Replays from the last delivered event (inclusive, so the engine may
    /// repeat it), or from the original `since` if none was delivered.
    ///
    /// # Errors
    ///
    /// Returns the error of the new subscription request.
    pub async fn resubscribe(self) -> Result<Self> {
        self.handle().cancel();
        let mut options = self.options;
        if let Some(last) = self.last_seen {
            options.since = Some(last);
        }
        Self::subscribe(self.transport, options).await
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(Some(Ok(event))) = &next {
            if let Some(time) = event.timestamp() {
                self.last_seen = Some(time);
            }
        }
        next
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("options", &self.options)
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}
