// src/server/livereload.rs

//! Live-reload channel.
//!
//! Browsers connect over a websocket and receive one text message per
//! signal:
//! - `reload` asks for a full page reload,
//! - `css:<path>` asks to re-fetch one stylesheet without reloading.
//!
//! The accept loop and the broadcaster run on plain threads with blocking
//! `tungstenite` sockets. Each handshake runs on its own thread under a
//! timeout, and sends are bounded by a write timeout so a stalled peer is
//! dropped instead of holding up the others.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tungstenite::WebSocket;

/// Browsers kept connected at most; older sockets are closed first.
const MAX_CLIENTS: usize = 10;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// One message for connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadSignal {
    Reload,
    InjectCss(String),
}

impl ReloadSignal {
    fn to_message(&self) -> String {
        match self {
            ReloadSignal::Reload => "reload".to_string(),
            ReloadSignal::InjectCss(path) => format!("css:{path}"),
        }
    }
}

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

#[derive(Debug, Default)]
struct Inner {
    sender: Mutex<Option<Sender<ReloadSignal>>>,
    sent: AtomicUsize,
    port: Mutex<Option<u16>>,
}

/// Cloneable handle used by tasks to signal connected browsers.
///
/// Signals sent before [`LiveReload::listen`] are counted but go nowhere.
#[derive(Debug, Clone, Default)]
pub struct LiveReload {
    inner: Arc<Inner>,
}

impl LiveReload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the websocket listener and start broadcasting.
    ///
    /// Returns the bound port. Calling it again while listening is a no-op
    /// returning the existing port.
    pub fn listen(&self, host: &str, port: u16) -> Result<u16> {
        let mut bound = lock(&self.inner.port);
        if let Some(port) = *bound {
            return Ok(port);
        }

        let listener = TcpListener::bind((host, port))
            .with_context(|| format!("binding live-reload socket on {host}:{port}"))?;
        let port = listener.local_addr()?.port();

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        spawn_accept_loop(listener, clients.clone());
        let tx = spawn_broadcaster(clients);

        *lock(&self.inner.sender) = Some(tx);
        *bound = Some(port);
        info!(port, "live-reload listening");
        Ok(port)
    }

    pub fn port(&self) -> Option<u16> {
        *lock(&self.inner.port)
    }

    /// Ask browsers for a full reload.
    pub fn reload(&self) {
        self.send(ReloadSignal::Reload);
    }

    /// Ask browsers to re-fetch the given stylesheets (paths as served).
    pub fn inject_css<S: AsRef<str>>(&self, paths: &[S]) {
        for path in paths {
            self.send(ReloadSignal::InjectCss(path.as_ref().to_string()));
        }
    }

    /// Number of signals emitted so far.
    pub fn signals_sent(&self) -> usize {
        self.inner.sent.load(Ordering::SeqCst)
    }

    fn send(&self, signal: ReloadSignal) {
        self.inner.sent.fetch_add(1, Ordering::SeqCst);
        debug!(?signal, "live-reload signal");
        if let Some(tx) = lock(&self.inner.sender).as_ref() {
            if tx.send(signal).is_err() {
                warn!("live-reload broadcaster stopped");
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_accept_loop(listener: TcpListener, clients: Clients) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!("live-reload accept failed: {e}");
                    continue;
                }
            };
            let clients = clients.clone();
            thread::spawn(move || handshake(stream, clients));
        }
    });
}

fn handshake(stream: TcpStream, clients: Clients) {
    if let Err(e) = stream
        .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
        .and_then(|_| stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT)))
    {
        warn!("live-reload socket setup failed: {e}");
        return;
    }

    let socket = match tungstenite::accept(stream) {
        Ok(socket) => socket,
        Err(e) => {
            debug!("live-reload handshake failed: {e}");
            return;
        }
    };

    let tcp = socket.get_ref();
    if let Err(e) = tcp
        .set_read_timeout(None)
        .and_then(|_| tcp.set_write_timeout(Some(SEND_TIMEOUT)))
    {
        warn!("live-reload socket setup failed: {e}");
        return;
    }

    debug!("live-reload client connected");
    lock(&clients).push(socket);
}

fn spawn_broadcaster(clients: Clients) -> Sender<ReloadSignal> {
    let (tx, rx) = mpsc::channel::<ReloadSignal>();

    thread::spawn(move || {
        while let Ok(signal) = rx.recv() {
            let message = signal.to_message();
            // Sockets are sent to outside the lock so handshakes can finish.
            let mut sockets = std::mem::take(&mut *lock(&clients));

            sockets.retain_mut(|socket| match socket.send(message.as_str().into()) {
                Ok(_) => true,
                Err(tungstenite::Error::Io(e)) => {
                    debug!("dropping live-reload client: {e}");
                    false
                }
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => false,
                Err(e) => {
                    error!("live-reload send failed: {e:?}");
                    true
                }
            });

            let mut clients = lock(&clients);
            sockets.append(&mut clients);
            *clients = sockets;

            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
        }
    });

    tx
}

/// Client script served at `/livereload.js`.
pub fn client_script(port: u16) -> String {
    CLIENT_SCRIPT.replace("__PORT__", &port.to_string())
}

const CLIENT_SCRIPT: &str = r#"(function () {
  var url = "ws://" + location.hostname + ":__PORT__/";
  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (event) {
      var data = String(event.data);
      if (data.indexOf("css:") === 0) {
        var name = data.slice(4).split("/").pop();
        var links = document.querySelectorAll('link[rel="stylesheet"]');
        for (var i = 0; i < links.length; i++) {
          var href = links[i].getAttribute("href") || "";
          if (href.split("?")[0].split("/").pop() === name) {
            links[i].href = href.split("?")[0] + "?lr=" + Date.now();
          }
        }
      } else {
        location.reload();
      }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
"#;
