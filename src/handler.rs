//! Per-connection protocol loop.
//!
//! Reads one request line at a time, dispatches it, and writes the response
//! line before reading the next. The loop ends when the peer closes the
//! connection, an I/O error or timeout occurs, or the server shuts down
//! while the connection is waiting for its next request.
//!
//! Lines are read as bytes and decoded lossily, so a request that is not
//! valid UTF-8 still gets an `ERROR|...` answer. A line longer than
//! [`MAX_LINE_LENGTH`] is discarded up to its terminator and answered with
//! `ERROR|Invalid request format`.

use crate::dispatch::dispatch_line;
use crate::error::ProtocolError;
use crate::protocol::Response;
use crate::repository::Repository;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Longest request line accepted, terminator included
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// One framed read from the peer
#[derive(Debug)]
enum Frame {
    Line(String),
    TooLong,
    Closed,
}

/// Handle a single client connection.
///
/// A request that has already arrived is always answered, even if shutdown
/// was requested in the meantime. The stream is dropped, and so closed, on
/// every return path.
pub async fn handle_connection<S>(
    stream: S,
    repository: &Repository,
    mut shutdown: watch::Receiver<bool>,
    io_timeout: Option<Duration>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(1024);

    loop {
        let frame = tokio::select! {
            biased;
            frame = with_timeout(io_timeout, read_frame(&mut reader, &mut buf)) => frame?,
            _ = shutdown_requested(&mut shutdown) => {
                trace!("Closing idle connection for shutdown");
                return Ok(());
            }
        };

        let response = match frame {
            Frame::Line(line) => dispatch_line(&line, repository),
            Frame::TooLong => {
                debug!(limit = MAX_LINE_LENGTH, "Discarded oversized request");
                Response::from(ProtocolError::InvalidFormat)
            }
            Frame::Closed => {
                trace!("Connection closed by client");
                return Ok(());
            }
        };
        trace!(success = response.is_success(), "Sending response");

        with_timeout(io_timeout, writer.write_all(&response.to_line())).await?;
    }
}

/// Read the next request line into `buf`.
///
/// A final line without a terminator is still returned before the close.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_LENGTH as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;

    if n == 0 {
        return Ok(Frame::Closed);
    }
    if buf.len() == MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
        discard_line(reader).await?;
        return Ok(Frame::TooLong);
    }
    Ok(Frame::Line(String::from_utf8_lossy(buf).into_owned()))
}

/// Skip input up to and including the next terminator, or to end of stream.
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Resolves once the shutdown flag is set. Never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn with_timeout<F, T>(limit: Option<Duration>, io: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, io).await.map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no progress within {limit:?}"),
            )
        })?,
        None => io.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use std::sync::Arc;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    fn repository() -> Arc<Repository> {
        Repository::with_students(sample::students().unwrap())
    }

    #[tokio::test]
    async fn test_request_response_sequence() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"GET_FOO\n")
            .write(b"ERROR|Unknown command: GET_FOO\n")
            .read(b"GET_STUDENT_BY_ID|S999\r\n")
            .write(b"ERROR|Student not found\n")
            .read(b"\n")
            .write(b"ERROR|Invalid request format\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"GET_STUDENTS_")
            .read(b"BY_YEAR|abc\n")
            .write(b"ERROR|Invalid year format\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_error_and_connection_stays_open() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"\xff\n")
            .write("ERROR|Unknown command: \u{FFFD}\n".as_bytes())
            .read(b"GET_STUDENT_BY_ID|S\xff01\n")
            .write(b"ERROR|Student not found\n")
            .read(b"GET_STUDENTS_BY_YEAR|abc\n")
            .write(b"ERROR|Invalid year format\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_rejected_then_next_request_served() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);
        let oversized = vec![b'a'; MAX_LINE_LENGTH + 100];

        let mock = Builder::new()
            .read(&oversized)
            .read(b"aaaa\nGET_FOO\n")
            .write(b"ERROR|Invalid request format\n")
            .write(b"ERROR|Unknown command: GET_FOO\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);
        let mut line = b"SEARCH_STUDENTS|".to_vec();
        line.resize(MAX_LINE_LENGTH - 1, b'z');
        line.push(b'\n');

        let mock = Builder::new()
            .read(&line)
            .write(b"SUCCESS|[]\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_answered() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"GET_STUDENT_BY_ID|S999")
            .write(b"ERROR|Student not found\n")
            .build();

        handle_connection(mock, &repository, rx, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_ends_connection_with_error() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"GET_STATISTICS\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
            .build();

        let err = handle_connection(mock, &repository, rx, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_read_failure_ends_connection_with_error() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);

        let mock = Builder::new()
            .read(b"GET_FOO\n")
            .write(b"ERROR|Unknown command: GET_FOO\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = handle_connection(mock, &repository, rx, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_pending_request_answered_after_shutdown() {
        let repository = repository();
        let (tx, rx) = watch::channel(false);
        let (mut client, server) = duplex(4096);

        client.write_all(b"GET_STATISTICS\n").await.unwrap();
        tx.send(true).unwrap();

        handle_connection(server, &repository, rx, None).await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(
            response,
            "SUCCESS|Total Students: 5; Average GPA: 3.62; Honors Students: 4\n"
        );
    }

    #[tokio::test]
    async fn test_idle_connection_closed_on_shutdown() {
        let repository = repository();
        let (tx, rx) = watch::channel(false);
        let (_client, server) = duplex(4096);

        let shutdown = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });

        handle_connection(server, &repository, rx, None).await.unwrap();
        shutdown.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let repository = repository();
        let (_tx, rx) = watch::channel(false);
        let (_client, server) = duplex(4096);

        let err = handle_connection(server, &repository, rx, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_shutdown_requested_ignores_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(
            Duration::from_millis(20),
            shutdown_requested(&mut rx),
        )
        .await;
        assert!(waited.is_err());
    }
}
