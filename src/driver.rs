//! Event loop that drives a [`Board`] from a transport.
//!
//! A blocking reader thread turns the transport's read half into
//! [`TransportEvent`]s. [`run`] feeds those into the session one at a time
//! and fires the handshake timer when its deadline passes, so the session is
//! only ever touched from one task.

use crate::board::Board;
use crate::port::SerialPortAdapter;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 1024;

/// Back-off after a read that returned nothing.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Notifications from the transport's read half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Data(Vec<u8>),
    Error(String),
    Close,
    Disconnect,
}

pub type TransportSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Pump `reader` on a blocking thread.
///
/// `Open` is sent first. Timeouts and empty reads are retried; any other
/// read error is sent as `Error` followed by `Disconnect`, and the reader
/// stops. The reader also stops once the receiver is dropped.
pub fn spawn_reader<R>(reader: R) -> (JoinHandle<()>, TransportReceiver)
where
    R: SerialPortAdapter + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || read_loop(reader, tx));
    (handle, rx)
}

fn read_loop<R: SerialPortAdapter>(mut reader: R, tx: TransportSender) {
    if tx.send(TransportEvent::Open).is_err() {
        return;
    }
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    while !tx.is_closed() {
        match reader.read_bytes(&mut buffer) {
            Ok(0) => std::thread::sleep(IDLE_POLL),
            Ok(n) => {
                if tx.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.is_transient() => std::thread::sleep(IDLE_POLL),
            Err(err) => {
                warn!(port = reader.name(), %err, "read failed");
                let _ = tx.send(TransportEvent::Error(err.to_string()));
                let _ = tx.send(TransportEvent::Disconnect);
                break;
            }
        }
    }
    debug!(port = reader.name(), "reader stopped");
}

/// Drive `board` until `shutdown` resolves, the transport closes, or the
/// reader goes away.
///
/// The session sees `on_close` exactly once on the way out.
pub async fn run<S>(board: &mut Board, mut transport: TransportReceiver, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let deadline = board.handshake_deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            event = transport.recv() => match event {
                Some(TransportEvent::Close) | None => break,
                Some(event) => deliver(board, event),
            },
            _ = timer => {
                if let Err(err) = board.on_handshake_timeout() {
                    board.on_transport_error(err);
                }
            }
        }
    }

    board.on_close();
}

fn deliver(board: &mut Board, event: TransportEvent) {
    match event {
        TransportEvent::Open => board.on_open(),
        TransportEvent::Data(bytes) => board.on_data(&bytes),
        TransportEvent::Error(message) => board.on_transport_error(message),
        TransportEvent::Disconnect => board.on_disconnect(),
        TransportEvent::Close => board.on_close(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardEvent, BoardOptions, EventReceiver};
    use crate::port::MockSerialPort;
    use tokio::sync::oneshot;

    async fn next_matching<F>(events: &mut EventReceiver, mut wanted: F) -> BoardEvent
    where
        F: FnMut(&BoardEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Some(event) if wanted(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_drives_handshake_to_ready() {
        let port = MockSerialPort::new("MOCK0");
        let options = BoardOptions {
            skip_capabilities: true,
            pin_count: Some(20),
            ..BoardOptions::default()
        };
        let (mut board, mut events) = Board::new(port.clone(), options);
        let (_reader, transport) = spawn_reader(port.clone());
        let (stop, stopped) = oneshot::channel::<()>();

        let session = tokio::spawn(async move {
            run(&mut board, transport, async {
                let _ = stopped.await;
            })
            .await;
            board
        });

        port.enqueue_read(&[0xF9, 2, 5]);
        next_matching(&mut events, |e| matches!(e, BoardEvent::VersionReport { .. })).await;
        port.enqueue_read(&[0xF0, 0x79, 2, 5, b'A', 0, b'B', 0, 0xF7]);
        next_matching(&mut events, |e| *e == BoardEvent::Ready).await;

        let _ = stop.send(());
        let board = session.await.unwrap();
        assert!(board.is_ready());
        assert_eq!(board.pins().len(), 20);
        assert_eq!(board.firmware().unwrap().name, "AB");
        next_matching(&mut events, |e| *e == BoardEvent::Close).await;
    }

    #[tokio::test]
    async fn test_timer_requeries_version() {
        let port = MockSerialPort::new("MOCK0");
        let options = BoardOptions {
            report_version_timeout: Duration::from_millis(20),
            ..BoardOptions::default()
        };
        let (mut board, _events) = Board::new(port.clone(), options);
        let (_reader, transport) = spawn_reader(port.clone());

        run(&mut board, transport, tokio::time::sleep(Duration::from_millis(150))).await;

        let log = port.get_write_log();
        assert!(board.handshake_retries() >= 1);
        assert!(log.contains(&vec![0xF9]));
        assert!(log.contains(&vec![0xF0, 0x79, 0xF7]));
    }

    #[tokio::test]
    async fn test_read_failure_disconnects() {
        let port = MockSerialPort::new("MOCK0");
        let (mut board, mut events) = Board::new(port.clone(), BoardOptions::default());
        let (_reader, transport) = spawn_reader(port.clone());
        port.disconnect();

        run(&mut board, transport, std::future::pending()).await;

        next_matching(&mut events, |e| matches!(e, BoardEvent::Error { .. })).await;
        next_matching(&mut events, |e| *e == BoardEvent::Disconnect).await;
        next_matching(&mut events, |e| *e == BoardEvent::Close).await;
        assert!(board.handshake_deadline().is_none());
    }
}
