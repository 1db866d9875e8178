//! Connection to the chat server.
//!
//! [`WsTransport`] owns a background thread holding the websocket. The
//! thread reconnects on a fixed interval whenever the connection drops and
//! reports everything that happens to the socket as [`TransportEvent`]s on
//! a channel, which the dispatch loop drains.

use std::{
    cell::Cell,
    io,
    net::{TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use tungstenite::{
    client::IntoClientRequest, client_tls, error::UrlError, stream::MaybeTlsStream,
    HandshakeError, Message, WebSocket,
};

use crate::error::ChatError;

/// How long a read blocks before the worker checks for outgoing messages.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for the TCP connect and for the websocket upgrade.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `shutdown` waits for the worker before leaving it behind.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Open,
    Close,
    Error(String),
    Message(String),
    /// Text accepted by `send` that never reached the server.
    Undelivered(usize),
}

pub trait Transport {
    /// Sends one text record. Fails immediately when there is no open
    /// connection; nothing is queued for later delivery.
    fn send(&mut self, text: &str) -> Result<(), ChatError>;

    /// Closes the connection and stops reconnecting.
    fn shutdown(&mut self);
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    outgoing: Sender<String>,
    worker: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Starts connecting to `url` in the background.
    pub fn open(
        url: &str,
        retry_interval: Duration,
    ) -> io::Result<(WsTransport, Receiver<TransportEvent>)> {
        let (event_sender, events) = channel();
        let (outgoing, outgoing_receiver) = channel();
        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            url: url.to_string(),
            retry_interval,
            events: event_sender,
            outgoing: outgoing_receiver,
            undelivered: Cell::new(0),
            connected: connected.clone(),
            stop: stop.clone(),
        };
        let handle = thread::Builder::new()
            .name("wschat-transport".into())
            .spawn(move || worker.run())?;

        Ok((
            WsTransport {
                connected,
                stop,
                outgoing,
                worker: Some(handle),
            },
            events,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Transport for WsTransport {
    fn send(&mut self, text: &str) -> Result<(), ChatError> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        self.outgoing
            .send(text.to_string())
            .map_err(|_| ChatError::NotConnected)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return;
        };

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if !worker.is_finished() {
            // it exits on its own once the blocking call returns
            warn!("Transport thread did not stop in time, leaving it behind");
        } else if worker.join().is_err() {
            warn!("Transport thread panicked");
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    url: String,
    retry_interval: Duration,
    events: Sender<TransportEvent>,
    outgoing: Receiver<String>,
    undelivered: Cell<usize>,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        while !self.stopped() {
            self.emit(TransportEvent::Connecting);
            info!("Connecting to {}", self.url);
            match self.connect() {
                Ok(socket) => self.serve(socket),
                Err(e) => {
                    warn!("Could not connect to {}: {}", self.url, e);
                    self.emit(TransportEvent::Error(e.to_string()));
                }
            }
            self.wait_before_retry();
        }
        debug!("Transport thread stopped");
    }

    fn serve(&self, mut socket: Socket) {
        if let Err(e) = set_read_timeout(&socket, POLL_INTERVAL) {
            warn!("Could not set read timeout: {}", e);
        }

        // text accepted by a connection that has since died is never replayed
        self.discard_outgoing();

        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to {}", self.url);
        self.emit(TransportEvent::Open);

        let result = self.pump(&mut socket);
        self.connected.store(false, Ordering::SeqCst);
        self.discard_outgoing();
        match result {
            Ok(()) => info!("Connection to {} closed", self.url),
            Err(e) => {
                warn!("Connection to {} lost: {}", self.url, e);
                self.emit(TransportEvent::Error(e.to_string()));
            }
        }
        self.emit(TransportEvent::Close);
    }

    fn pump(&self, socket: &mut Socket) -> tungstenite::Result<()> {
        loop {
            self.flush_outgoing(socket)?;
            if self.stopped() {
                // a farewell queued right before shutdown still goes out
                self.flush_outgoing(socket)?;
                let _ = socket.close(None);
                let _ = socket.flush();
                return Ok(());
            }

            match socket.read() {
                Ok(Message::Text(text)) => self.emit(TransportEvent::Message(text)),
                Ok(Message::Close(frame)) => {
                    debug!("Server closed the connection: {:?}", frame);
                    return Ok(());
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Opens the TCP connection and performs the websocket upgrade, giving
    /// up after `CONNECT_TIMEOUT` or as soon as the worker is stopped.
    fn connect(&self) -> tungstenite::Result<Socket> {
        let request = self.url.as_str().into_client_request()?;
        let secure = request.uri().scheme_str() == Some("wss");
        let host = request
            .uri()
            .host()
            .ok_or(tungstenite::Error::Url(UrlError::NoHostName))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = request
            .uri()
            .port_u16()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host has no addresses");
        let mut stream = None;
        for addr in (host.as_str(), port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(e) => last_error = e,
            }
        }
        let stream = stream.ok_or(last_error)?;
        stream.set_write_timeout(Some(CONNECT_TIMEOUT))?;
        // native-tls cannot resume an interrupted handshake, so only plain
        // upgrades are polled
        if !secure {
            stream.set_read_timeout(Some(POLL_INTERVAL))?;
        }

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        let mut handshake = client_tls(request, stream);
        loop {
            match handshake {
                Ok((socket, _)) => return Ok(socket),
                Err(HandshakeError::Failure(e)) => return Err(e),
                Err(HandshakeError::Interrupted(mid)) => {
                    if self.stopped() || Instant::now() >= deadline {
                        return Err(tungstenite::Error::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "websocket upgrade timed out",
                        )));
                    }
                    handshake = mid.handshake();
                }
            }
        }
    }

    fn flush_outgoing(&self, socket: &mut Socket) -> tungstenite::Result<()> {
        for text in self.outgoing.try_iter() {
            if let Err(e) = socket.send(Message::Text(text)) {
                self.undelivered.set(self.undelivered.get() + 1);
                return Err(e);
            }
        }
        Ok(())
    }

    fn discard_outgoing(&self) {
        let lost = self.undelivered.replace(0) + self.outgoing.try_iter().count();
        if lost > 0 {
            warn!("{} message(s) were not delivered", lost);
            self.emit(TransportEvent::Undelivered(lost));
        }
    }

    fn wait_before_retry(&self) {
        let deadline = Instant::now() + self.retry_interval;
        while !self.stopped() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }

    fn emit(&self, event: TransportEvent) {
        // nobody is listening any more
        if self.events.send(event).is_err() {
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

fn set_read_timeout(socket: &Socket, timeout: Duration) -> io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        MaybeTlsStream::NativeTls(stream) => stream.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}
