//! TCP server for the student protocol.
//!
//! Binds the listener, runs the accept loop on its own task, and hands each
//! accepted connection to a handler task. A semaphore caps how many handlers
//! run at once: the accept loop takes a permit before accepting, so a full
//! pool stops accepting instead of queueing work or spawning more tasks.

use crate::config::Config;
use crate::handler::{handle_connection, shutdown_requested};
use crate::repository::Repository;
use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance, not yet listening
pub struct Server {
    listen: String,
    max_connections: u32,
    io_timeout: Option<Duration>,
    repository: Arc<Repository>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: &Config, repository: Arc<Repository>) -> Self {
        Server {
            listen: config.listen_addr(),
            max_connections: config.max_connections,
            io_timeout: config.io_timeout,
            repository,
        }
    }

    /// Bind the listener and start accepting connections.
    pub async fn start(self) -> io::Result<RunningServer> {
        let addr = resolve(&self.listen)?;
        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, max_connections = self.max_connections, "Server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            repository: self.repository,
            connection_limit: Arc::new(Semaphore::new(self.max_connections as usize)),
            active: AtomicUsize::new(0),
            io_timeout: self.io_timeout,
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared), shutdown_rx));

        Ok(RunningServer {
            local_addr,
            max_connections: self.max_connections,
            shutdown: shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
            shared,
        })
    }
}

/// State shared by the accept loop and every handler task
struct Shared {
    repository: Arc<Repository>,
    connection_limit: Arc<Semaphore>,
    active: AtomicUsize,
    io_timeout: Option<Duration>,
}

/// Handle to a listening server
pub struct RunningServer {
    local_addr: SocketAddr,
    max_connections: u32,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl RunningServer {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Connections currently being served
    pub fn active_connections(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.shared.repository
    }

    /// Stop accepting, close the listener, and wait for in-flight handlers.
    ///
    /// Handlers finish the request they are serving; idle connections are
    /// closed. Safe to call more than once.
    pub async fn stop(&self) {
        let was_running = !self.shutdown.send_replace(true);
        if was_running {
            info!("Stopping server");
        }

        let accept_task = self.accept_task.lock().take();
        if let Some(accept_task) = accept_task {
            if let Err(e) = accept_task.await {
                error!(error = %e, "Accept loop terminated abnormally");
            }
        }

        // Every permit back in hand means no handler is left running
        match self
            .shared
            .connection_limit
            .acquire_many(self.max_connections)
            .await
        {
            Ok(_drained) => {}
            Err(e) => error!(error = %e, "Connection pool closed during shutdown"),
        }

        if was_running {
            info!("Server stopped");
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        // Lets the accept loop and idle handlers exit if stop() was never called
        self.shutdown.send_replace(true);
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        // Wait for a connection slot
        let permit = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            permit = Arc::clone(&shared.connection_limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, peer) = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };
        debug!(peer = %peer, "New connection");

        let shared = Arc::clone(&shared);
        let shutdown = shutdown.clone();
        shared.active.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let result =
                handle_connection(stream, &shared.repository, shutdown, shared.io_timeout).await;
            match result {
                Ok(()) => debug!(peer = %peer, "Connection closed"),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    warn!(peer = %peer, error = %e, "Connection timed out")
                }
                Err(e) => debug!(peer = %peer, error = %e, "Connection error"),
            }
            shared.active.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
    }

    drop(listener);
    info!("Listener closed");
}

fn resolve(listen: &str) -> io::Result<SocketAddr> {
    listen.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address found for {listen}"),
        )
    })
}

fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn config(max_connections: u32) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections,
            ..Config::default()
        }
    }

    async fn request(addr: SocketAddr, line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
        let mut response = String::new();
        BufReader::new(stream).read_line(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_requests() {
        let server = Server::new(&config(4), Repository::new())
            .start()
            .await
            .unwrap();
        assert!(server.is_running());
        assert_eq!(server.repository().count(), 0);

        let response = request(server.local_addr(), "GET_ALL_STUDENTS").await;
        assert_eq!(response, "SUCCESS|[]\n");

        server.stop().await;
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_closes_listener() {
        let server = Server::new(&config(2), Repository::new())
            .start()
            .await
            .unwrap();
        let addr = server.local_addr();

        server.stop().await;
        server.stop().await;

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_saturated_pool_applies_backpressure() {
        let server = Server::new(&config(1), Repository::new())
            .start()
            .await
            .unwrap();
        let addr = server.local_addr();

        // Occupies the only slot
        let mut first = TcpStream::connect(addr).await.unwrap();
        while server.active_connections() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Connects through the backlog but is not served yet
        let second = tokio::spawn(request(addr, "GET_STATISTICS"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());
        assert_eq!(server.active_connections(), 1);

        first.shutdown().await.unwrap();
        drop(first);

        let response = second.await.unwrap();
        assert_eq!(response, "SUCCESS|No students found.\n");

        server.stop().await;
    }
}
