//! Listener bind and lifecycle handle over the `may_minihttp` server.

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

const READY_TIMEOUT: Duration = Duration::from_millis(500);

/// Handle to a bound listener.
pub struct ListenerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ListenerHandle {
    /// Poll the bound address until it accepts connections, up to a fixed
    /// deadline. Useful in tests to avoid racing the accept loop.
    pub fn wait_ready(&self) -> io::Result<()> {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} not accepting after {:?}", self.addr, READY_TIMEOUT),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Stop accepting and wait for the accept coroutine to unwind.
    pub fn stop(self) {
        let co = self.handle.coroutine();
        // SAFETY: the accept loop blocks in accept() indefinitely;
        // cancelling the coroutine we own is the only way to end it.
        unsafe { co.cancel() };
        let _ = self.handle.join();
    }
}

/// Bind one IPv4 listening socket and start serving. Bind or listen
/// failure is fatal and surfaces to the caller.
pub fn bind<T>(addr: &str, service: T) -> io::Result<ListenerHandle>
where
    T: HttpService + Clone + Send + Sync + 'static,
{
    let addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid listen address"))?;
    let handle = HttpServer(service).start(addr)?;
    Ok(ListenerHandle { addr, handle })
}
