use std::pin::Pin;
use std::task::{Context, Poll};

use bluest::Uuid;
use futures_util::stream::{FusedStream, Stream, StreamExt};
use tracing::{debug, trace};

use crate::assembler::StatusAssembler;
use crate::error::Error;
use crate::status::Status;
use crate::uuids;

/// A stream of [`Status`] readings over a subscription to the telemetry characteristic.
///
/// `source` is the raw notification stream of the subscription. The stream owns it,
/// so dropping a `StatusStream` drops the subscription and, with `bluest`, unsubscribes.
///
/// The first error, whether it comes from the source or from a notification that can't
/// be decoded or paired, is yielded once and ends the stream.
pub struct StatusStream<S> {
    source: S,
    assembler: StatusAssembler,
    terminated: bool,
}

impl<S, E> StatusStream<S>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: Into<Error>,
{
    pub fn new(characteristic: Uuid, source: S) -> Result<Self, Error> {
        if characteristic != uuids::TELEMETRY_CHARACTERISTIC {
            return Err(Error::WrongCharacteristic(characteristic));
        }
        Ok(Self {
            source,
            assembler: StatusAssembler::new(),
            terminated: false,
        })
    }
}

impl<S, E> Stream for StatusStream<S>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: Into<Error>,
{
    type Item = Result<Status, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        loop {
            let result = match futures_util::ready!(this.source.poll_next_unpin(cx)) {
                None => {
                    if this.assembler.is_awaiting_line() {
                        debug!("notification stream ended between energy and line notifications");
                    }
                    this.terminated = true;
                    return Poll::Ready(None);
                }
                Some(Err(err)) => Err(err.into()),
                Some(Ok(data)) => {
                    trace!(data = %hex::encode(&data), "RX notification");
                    match this.assembler.push_bytes(&data) {
                        Ok(None) => continue,
                        Ok(Some(status)) => Ok(status),
                        Err(err) => Err(err),
                    }
                }
            };

            if result.is_err() {
                this.terminated = true;
            }
            return Poll::Ready(Some(result));
        }
    }
}

impl<S, E> FusedStream for StatusStream<S>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: Into<Error>,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
