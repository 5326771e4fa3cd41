// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Async client for the Edbot Studio WebSocket API.
//!
//! The client owns a [`Session`] behind a short synchronous lock and spawns
//! one dispatch task per connection. The dispatch task processes channel
//! events in arrival order; requests and accessors run on the caller's task.
//! The lock is never held across an await or a listener call.

use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use edbot_core::{Envelope, RequestType};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::{ConnectionState, Session, Settlement};
use crate::transport::{
    Channel, ChannelEvent, Transport, WebSocketTransport, CLOSE_ABNORMAL, CLOSE_NORMAL,
};

/// Callback receiving every dispatched RESPONSE, UPDATE and DELETE, plus the
/// locally synthesized CLOSE.
pub type Listener = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// State shared between the client handle, its replies and dispatch tasks.
struct Shared {
    session: Mutex<Session>,
    state_tx: watch::Sender<ConnectionState>,
    /// Highest generation whose close has been fully processed.
    closed_tx: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (closed_tx, _) = watch::channel(0);
        Shared {
            session: Mutex::new(Session::new()),
            state_tx,
            closed_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the session and publishes any state change.
    fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.lock();
        let result = f(&mut session);
        let state = session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        result
    }

    fn close(&self, generation: u64, code: u16, reason: String, listener: Option<&Listener>) {
        if let Some(abandoned) = self.update(|s| s.on_close(generation)) {
            info!(code, %reason, abandoned = abandoned.len(), "Connection closed");
            for (sequence, responder) in abandoned {
                debug!(sequence, "Rejecting abandoned call");
                let _ = responder.send(Err(Error::ConnectionClosed {
                    code,
                    reason: reason.clone(),
                }));
            }
            notify(listener, &Envelope::close(code, reason));
        }
        self.closed_tx.send_if_modified(|closed| {
            if *closed < generation {
                *closed = generation;
                true
            } else {
                false
            }
        });
    }
}

/// Calls the listener. A panicking listener is logged and skipped so the
/// dispatch task keeps settling calls.
fn notify(listener: Option<&Listener>, envelope: &Envelope) {
    let Some(listener) = listener else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| listener(envelope))).is_err() {
        warn!(category = ?envelope.category, "Listener panicked");
    }
}

/// Processes one connection's events until the channel closes.
async fn dispatch_loop(
    shared: Arc<Shared>,
    listener: Option<Listener>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Message(text) => {
                let envelope = match Envelope::from_json(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(error = %e, "Ignoring undecodable envelope");
                        continue;
                    }
                };
                let Some(dispatched) = shared.update(|s| s.dispatch(generation, envelope)) else {
                    continue;
                };
                notify(listener.as_ref(), &dispatched.envelope);
                if let Some((sequence, outcome)) = dispatched.settle {
                    shared.update(|s| s.settle(generation, sequence, outcome));
                }
            }
            ChannelEvent::Error(reason) => {
                shared.update(|s| s.on_channel_error(generation, reason));
            }
            ChannelEvent::Closed { code, reason } => {
                shared.close(generation, code, reason, listener.as_ref());
                return;
            }
        }
    }
    // Transport went away without a final event.
    shared.close(
        generation,
        CLOSE_ABNORMAL,
        "channel dropped".to_string(),
        listener.as_ref(),
    );
}

/// Client for one Edbot Studio server.
///
/// Generic over the transport so tests can inject an in-memory peer.
pub struct Client<T: Transport = WebSocketTransport> {
    config: ClientConfig,
    transport: T,
    shared: Arc<Shared>,
    listener: Option<Listener>,
}

impl Client<WebSocketTransport> {
    /// Create a client that connects over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        let transport = WebSocketTransport::new().with_close_timeout(config.close_timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client with a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Client {
            config,
            transport,
            shared: Arc::new(Shared::new()),
            listener: None,
        }
    }

    /// Attach a listener. It applies to connections opened afterwards.
    ///
    /// The listener runs on the dispatch task. If it panics, the panic is
    /// caught and logged, and dispatch carries on with the next envelope.
    pub fn with_listener(mut self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Whether the session is synchronized.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Synchronized
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Connect and complete the handshake.
    ///
    /// Returns immediately when already synchronized. Fails with
    /// [`Error::ConnectInProgress`] while another connect is running.
    pub async fn connect(&self) -> Result<()> {
        let Some(generation) = self.shared.update(Session::begin_connect)? else {
            debug!("Already synchronized");
            return Ok(());
        };

        let url = self.config.url();
        info!(%url, generation, "Connecting");
        let Channel { outbound, events } = match self.transport.open(&url).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(%url, error = %e, "Failed to open channel");
                self.shared.update(|s| s.abort_connect(generation));
                return Err(e.into());
            }
        };

        let params = self.config.init_params();
        let (sequence, settlement) = self
            .shared
            .update(|s| s.handshake(generation, outbound, params))?;
        tokio::spawn(dispatch_loop(
            Arc::clone(&self.shared),
            self.listener.clone(),
            generation,
            events,
        ));

        let reply = self.reply(generation, sequence, settlement);
        match reply.await {
            Ok(_) => {
                info!(%url, generation, "Connected");
                Ok(())
            }
            Err(e) => {
                warn!(%url, error = %e, "Handshake failed");
                self.shared.update(|s| s.abort_connect(generation));
                Err(e)
            }
        }
    }

    /// Close the channel and wait until its close has been processed.
    ///
    /// The state reads [`ConnectionState::Disconnected`] as soon as this is
    /// called. A connect still opening its channel is cancelled. Returns at
    /// once when there is no channel.
    pub async fn disconnect(&self) -> Result<()> {
        let mut closed = self.shared.closed_tx.subscribe();
        let Some(generation) = self
            .shared
            .update(|s| s.request_close(CLOSE_NORMAL, "Closed by client"))
        else {
            return Ok(());
        };
        // The sender lives in `shared`, so this only ends once the close lands.
        let _ = closed.wait_for(|closed| *closed >= generation).await;
        Ok(())
    }

    /// Send a request of any type.
    ///
    /// Fails with [`Error::NotConnected`], without sending anything, unless
    /// synchronized. The returned [`Reply`] settles with the response data.
    pub fn request(&self, kind: RequestType, params: Value) -> Result<Reply> {
        let (generation, sequence, settlement) = self.shared.update(|s| {
            let (sequence, settlement) = s.request(kind, params)?;
            Ok::<_, Error>((s.generation(), sequence, settlement))
        })?;
        debug!(?kind, sequence, "Request sent");
        Ok(self.reply(generation, sequence, settlement))
    }

    fn reply(&self, generation: u64, sequence: u64, settlement: Settlement) -> Reply {
        Reply {
            shared: Arc::clone(&self.shared),
            generation,
            sequence,
            timeout: self.config.request_timeout(),
            settlement,
        }
    }

    /// List the clients connected to the server.
    pub fn get_clients(&self) -> Result<Reply> {
        self.request(RequestType::GetClients, Value::Null)
    }

    /// List the servers known to the server.
    pub fn get_servers(&self) -> Result<Reply> {
        self.request(RequestType::GetServers, Value::Null)
    }

    pub fn get_sensors(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::GetSensors, params)
    }

    pub fn run_motion(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::RunMotion, params)
    }

    pub fn set_servos(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::SetServos, params)
    }

    pub fn set_speaker(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::SetSpeaker, params)
    }

    pub fn set_display(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::SetDisplay, params)
    }

    pub fn set_options(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::SetOptions, params)
    }

    pub fn set_custom(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::SetCustom, params)
    }

    /// Speak text on a robot.
    pub fn say(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::Say, params)
    }

    pub fn reset(&self, params: Value) -> Result<Reply> {
        self.request(RequestType::Reset, params)
    }

    /// An owned copy of the mirrored state tree.
    pub fn snapshot(&self) -> Result<Value> {
        self.read(|tree| Value::Object(tree.clone()))
    }

    /// Runs `f` against the live tree under the session lock.
    ///
    /// Keep `f` short; the dispatch task waits while it runs.
    pub fn read<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> Result<R> {
        self.shared.lock().read(f)
    }

    /// The registry entry of a robot.
    pub fn robot(&self, name: &str) -> Result<Value> {
        self.shared.lock().robot(name).cloned()
    }

    /// Names of configured robots, optionally limited to one model type.
    pub fn robot_names(&self, model: Option<&str>) -> Result<Vec<String>> {
        self.shared.lock().robot_names(model)
    }

    /// Whether this client currently controls the named robot.
    pub fn have_control(&self, name: &str) -> Result<bool> {
        self.shared.lock().have_control(name)
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        self.shared
            .update(|s| s.request_close(CLOSE_NORMAL, "Client dropped"));
    }
}

/// Outcome of a request, awaited with `.await`.
#[must_use = "a reply does nothing unless awaited"]
pub struct Reply {
    shared: Arc<Shared>,
    generation: u64,
    sequence: u64,
    timeout: Option<Duration>,
    settlement: Settlement,
}

impl Reply {
    /// The sequence number the request was sent with.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    async fn wait(self) -> Result<Value> {
        let Reply {
            shared,
            generation,
            sequence,
            timeout,
            settlement,
        } = self;

        let received = match timeout {
            None => settlement.await,
            Some(limit) => match tokio::time::timeout(limit, settlement).await {
                Ok(received) => received,
                Err(_) => {
                    shared.update(|s| s.forget(generation, sequence));
                    debug!(sequence, ?limit, "Request timed out");
                    return Err(Error::Timeout(limit));
                }
            },
        };
        received.unwrap_or_else(|_| {
            Err(Error::ConnectionClosed {
                code: CLOSE_ABNORMAL,
                reason: "session dropped".to_string(),
            })
        })
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("generation", &self.generation)
            .field("sequence", &self.sequence)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl IntoFuture for Reply {
    type Output = Result<Value>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
