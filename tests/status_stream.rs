use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, FusedStream};
use futures_util::StreamExt;
use powerwatchdog::{
    uuids, DecodeError, Error, Line, SequenceError, Status, StatusStream,
};

const ENERGY: &str = "01032000125ba4000143070093c808006acd6800";
const LINE: &str = "0003700011aaf30000000000001775e22a000000";

fn notifications(fixtures: &[&str]) -> Vec<Result<Vec<u8>, Error>> {
    fixtures
        .iter()
        .map(|fixture| Ok(hex::decode(fixture).unwrap()))
        .collect()
}

fn status_stream(
    items: Vec<Result<Vec<u8>, Error>>,
) -> StatusStream<impl futures_util::Stream<Item = Result<Vec<u8>, Error>> + Unpin> {
    StatusStream::new(uuids::TELEMETRY_CHARACTERISTIC, stream::iter(items)).unwrap()
}

fn expected_status() -> Status {
    Status {
        line: Line::L1,
        frequency: 60.05,
        voltage: 120.3108,
        amperage: 8.2695,
        watts: 968.5,
        total_watts: 699.94,
    }
}

#[tokio::test]
async fn test_pairs_become_statuses() {
    let statuses: Vec<Status> = status_stream(notifications(&[ENERGY, LINE, ENERGY, LINE]))
        .map(|status| status.unwrap())
        .collect()
        .await;

    assert_eq!(statuses, vec![expected_status(), expected_status()]);
}

#[tokio::test]
async fn test_rejects_other_characteristics() {
    let result = StatusStream::new(uuids::RX_CHARACTERISTIC, stream::iter(notifications(&[])));
    assert!(matches!(result, Err(Error::WrongCharacteristic(uuid)) if uuid == uuids::RX_CHARACTERISTIC));
}

#[tokio::test]
async fn test_sequence_error_ends_the_stream() {
    let mut statuses = status_stream(notifications(&[ENERGY, LINE, ENERGY, ENERGY, LINE]));

    assert_eq!(statuses.next().await.unwrap().unwrap(), expected_status());
    assert!(matches!(
        statuses.next().await,
        Some(Err(Error::Sequence(SequenceError::UnpairedEnergy)))
    ));
    assert!(statuses.is_terminated());
    assert!(statuses.next().await.is_none());
}

#[tokio::test]
async fn test_line_first_ends_the_stream() {
    let mut statuses = status_stream(notifications(&[LINE, ENERGY, LINE]));

    assert!(matches!(
        statuses.next().await,
        Some(Err(Error::Sequence(SequenceError::LineWithoutEnergy)))
    ));
    assert!(statuses.next().await.is_none());
}

#[tokio::test]
async fn test_malformed_notification_ends_the_stream() {
    let mut items = notifications(&[ENERGY]);
    items.push(Ok(vec![0x00; 12]));
    items.extend(notifications(&[ENERGY, LINE]));
    let mut statuses = status_stream(items);

    assert!(matches!(
        statuses.next().await,
        Some(Err(Error::Decode(DecodeError::Length(12))))
    ));
    assert!(statuses.next().await.is_none());
}

#[tokio::test]
async fn test_transport_error_is_passed_through() {
    let mut items = notifications(&[ENERGY, LINE]);
    items.push(Err(Error::BluetoothUnavailable));
    items.extend(notifications(&[ENERGY, LINE]));
    let mut statuses = status_stream(items);

    assert_eq!(statuses.next().await.unwrap().unwrap(), expected_status());
    assert!(matches!(statuses.next().await, Some(Err(Error::BluetoothUnavailable))));
    assert!(statuses.next().await.is_none());
}

#[tokio::test]
async fn test_source_end_with_pending_energy_ends_quietly() {
    let mut statuses = status_stream(notifications(&[ENERGY, LINE, ENERGY]));

    assert_eq!(statuses.next().await.unwrap().unwrap(), expected_status());
    assert!(statuses.next().await.is_none());
    assert!(statuses.is_terminated());
}

/// Stand-in for a subscription handle that unsubscribes on drop
struct Subscription {
    unsubscribed: Arc<AtomicBool>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_dropping_the_stream_releases_the_subscription() {
    let unsubscribed = Arc::new(AtomicBool::new(false));
    let subscription = Subscription { unsubscribed: unsubscribed.clone() };

    let source = stream::iter(notifications(&[ENERGY, LINE]))
        .chain(stream::pending())
        .map(move |item| {
            let _held = &subscription;
            item
        });
    let mut statuses = StatusStream::new(uuids::TELEMETRY_CHARACTERISTIC, source).unwrap();

    assert_eq!(statuses.next().await.unwrap().unwrap(), expected_status());
    assert!(!unsubscribed.load(Ordering::SeqCst));

    drop(statuses);
    assert!(unsubscribed.load(Ordering::SeqCst));
}
