//! TCP server for the live draft
//!
//! Each connection authenticates (register, login, join) and is then attached
//! to the broadcast bus. Intents are routed to the coordinator or the clock;
//! errors go back to the requester only.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use draftboard_core::accounts::{self, Authenticator, SessionAuthenticator};
use draftboard_core::{
    ClockEngine, ClockOutcome, Database, DraftCoordinator, DraftEvent, PickRequest, Principal,
    Publisher, SlotId,
};

use crate::bus::BroadcastBus;
use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::Message;

/// Outbound messages queued per session
const SESSION_QUEUE: usize = 64;

/// How long a closing session may spend flushing queued messages
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a session needs to serve intents
pub struct ServerContext {
    pub db: Arc<Mutex<Database>>,
    pub coordinator: Arc<DraftCoordinator>,
    pub clock: Arc<ClockEngine>,
    pub bus: BroadcastBus,
    pub authenticator: Arc<dyn Authenticator>,
    pub session_hours: i64,
}

impl ServerContext {
    /// Wire the clock, coordinator and authenticator around one database
    pub fn new(db: Arc<Mutex<Database>>, clock_duration_ms: u64, session_hours: i64) -> Self {
        let bus = BroadcastBus::new();
        let publisher: Arc<dyn Publisher> = Arc::new(bus.clone());
        let clock = ClockEngine::new(clock_duration_ms, publisher.clone());
        let coordinator = Arc::new(DraftCoordinator::new(db.clone(), clock.clone(), publisher));
        let authenticator = Arc::new(SessionAuthenticator::new(db.clone()));

        Self {
            db,
            coordinator,
            clock,
            bus,
            authenticator,
            session_hours,
        }
    }
}

/// Draft server handle
pub struct Server {
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Start a new server on the given port (0 picks a free port)
    pub async fn start(port: u16, ctx: ServerContext) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Draft server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let ctx = Arc::new(ctx);

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, ctx.clone(), shutdown_tx.clone(), shutdown_rx));

        Ok(Server {
            addr: bound_addr,
            ctx,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of joined sessions
    pub fn sessions(&self) -> usize {
        self.ctx.bus.subscriber_count()
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(stream, addr, ctx.clone(), shutdown_tx.subscribe()));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let principal = match handshake(&mut reader, &mut writer, &ctx).await {
        Ok(principal) => principal,
        Err(e) => {
            debug!(addr = %addr, error = %e, "Handshake ended");
            return;
        }
    };

    // Subscribe before reading join state so nothing published in between is lost
    let events = ctx.bus.subscribe();
    let join_state = match ctx.coordinator.join_state() {
        Ok(state) => state,
        Err(e) => {
            error!(addr = %addr, error = %e, "Could not load join state");
            return;
        }
    };

    info!(addr = %addr, username = %principal.username, "Session joined");

    let (msg_tx, msg_rx) = mpsc::channel(SESSION_QUEUE);
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    let replay = [
        Message::JoinAccepted {
            username: principal.username.clone(),
        },
        Message::from(DraftEvent::BoardUpdate(join_state.board)),
        Message::from(DraftEvent::OwnerLoad(join_state.owners)),
        Message::from(DraftEvent::ClockUpdate(join_state.clock)),
    ];
    for msg in replay {
        let _ = msg_tx.send(msg).await;
    }

    let forward_handle = tokio::spawn(forward_events(events, msg_tx.clone(), principal.username.clone()));

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => match result {
                Ok(msg) => {
                    if let Some(reply) = dispatch(msg, &ctx, &principal).await {
                        if msg_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Err(Error::Decode(e)) => {
                    warn!(username = %principal.username, error = %e, "Skipping undecodable message");
                }
                Err(Error::ConnectionClosed) => {
                    debug!(username = %principal.username, "Connection closed");
                    break;
                }
                Err(e) => {
                    warn!(username = %principal.username, error = %e, "Read error");
                    break;
                }
            },
            _ = shutdown_rx.recv() => {
                let _ = msg_tx.send(Message::ServerShutdown).await;
                break;
            }
        }
    }

    forward_handle.abort();
    drop(msg_tx);
    if tokio::time::timeout(FLUSH_TIMEOUT, writer_handle).await.is_err() {
        debug!(username = %principal.username, "Writer did not drain in time");
    }

    info!(addr = %addr, username = %principal.username, "Session disconnected");
}

/// Serve register/login requests until the connection joins.
///
/// A failed join is answered with `join_rejected` and ends the connection, as
/// does any frame that is not part of the handshake.
async fn handshake(
    reader: &mut ReadHalf<TcpStream>,
    writer: &mut WriteHalf<TcpStream>,
    ctx: &Arc<ServerContext>,
) -> Result<Principal> {
    loop {
        match read_frame(reader).await? {
            Message::Register { username, password } => {
                let db = ctx.db.clone();
                let reply = match blocking(move || {
                    let db = lock(&db)?;
                    accounts::register(&db, &username, &password)
                })
                .await
                {
                    Ok(user) => Message::Registered { user_id: user.id },
                    Err(e) => Message::Rejected {
                        reason: e.client_message(),
                    },
                };
                write_frame(writer, &reply).await?;
            }
            Message::Login { username, password } => {
                let db = ctx.db.clone();
                let hours = ctx.session_hours;
                let reply = match blocking(move || {
                    let db = lock(&db)?;
                    accounts::login(&db, &username, &password, hours)
                })
                .await
                {
                    Ok(session) => Message::LoginAccepted {
                        token: session.token(),
                        expires_at: session.expires_at,
                    },
                    Err(e) => {
                        debug!(error = %e, "Login refused");
                        Message::Rejected {
                            reason: "Invalid username or password".into(),
                        }
                    }
                };
                write_frame(writer, &reply).await?;
            }
            Message::Join { token } => {
                let result = match token.as_deref() {
                    Some(token) => ctx.authenticator.authenticate(token),
                    None => Err(draftboard_core::Error::Unauthorized("no token provided".into())),
                };
                return match result {
                    Ok(principal) => Ok(principal),
                    Err(e) => {
                        let reason = e.to_string();
                        write_frame(writer, &Message::JoinRejected { reason: reason.clone() }).await?;
                        Err(Error::Rejected(reason))
                    }
                };
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected message before join: {:?}",
                    other
                )));
            }
        }
    }
}

fn lock(db: &Mutex<Database>) -> draftboard_core::Result<std::sync::MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| draftboard_core::Error::TransactionFailure("database lock poisoned".into()))
}

/// Run password hashing off the async workers
async fn blocking<T, F>(f: F) -> draftboard_core::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> draftboard_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| draftboard_core::Error::TransactionFailure(e.to_string()))?
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Relay bus events into a session's outbound queue
async fn forward_events(
    mut events: broadcast::Receiver<DraftEvent>,
    tx: mpsc::Sender<Message>,
    username: String,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if tx.send(Message::from(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(username = %username, skipped, "Session lagging behind draft events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Map a core failure to the requester's `draft_error`
fn reject(principal: &Principal, intent: &str, err: draftboard_core::Error) -> Option<Message> {
    warn!(username = %principal.username, intent, error = %err, "Intent failed");
    Some(Message::draft_error(err.client_message()))
}

/// Handle one intent. Returns the reply for the requester, if any.
async fn dispatch(msg: Message, ctx: &ServerContext, principal: &Principal) -> Option<Message> {
    match msg {
        Message::Pick {
            from_slot_id,
            to_slot_id,
            player,
        } => {
            let request = PickRequest {
                from_slot_id: from_slot_id.filter(|id| !id.is_empty()).map(SlotId::from),
                to_slot_id: SlotId::from(to_slot_id),
                player_id: player.and_then(|p| p.id),
            };
            ctx.coordinator
                .pick(request)
                .err()
                .and_then(|e| reject(principal, "pick", e))
        }
        Message::Reset => {
            info!(username = %principal.username, "Board reset requested");
            ctx.coordinator
                .reset()
                .err()
                .and_then(|e| reject(principal, "reset", e))
        }
        Message::DeleteMultiple { slot_ids } => {
            let slot_ids: Vec<SlotId> = slot_ids
                .unwrap_or_default()
                .into_iter()
                .map(SlotId::from)
                .collect();
            ctx.coordinator
                .delete_multiple(&slot_ids)
                .err()
                .and_then(|e| reject(principal, "delete_multiple", e))
        }
        Message::Undo => ctx
            .coordinator
            .undo()
            .err()
            .and_then(|e| reject(principal, "undo", e)),
        Message::ClockStart { owner_id } => {
            if owner_id.trim().is_empty() {
                return Some(Message::draft_error("Invalid request: owner id is required"));
            }
            ctx.clock.start(owner_id);
            None
        }
        Message::ClockStop => {
            ctx.clock.stop();
            None
        }
        Message::ClockSetDuration { duration } => {
            if let ClockOutcome::Ignored(skip) = ctx.clock.set_duration(duration) {
                debug!(username = %principal.username, ?skip, "Duration change ignored");
            }
            None
        }
        Message::OwnerRename { owner_id, name } => ctx
            .coordinator
            .rename_owner(&owner_id, &name)
            .err()
            .and_then(|e| reject(principal, "owner_rename", e)),
        Message::SearchPlayers { query } => match ctx.coordinator.search_players(&query) {
            Ok(players) => Some(Message::SearchResults { players }),
            Err(e) => reject(principal, "search_players", e),
        },
        Message::GetConfig => match ctx.coordinator.layout() {
            Ok(layout) => Some(Message::Config {
                owners: layout.owners,
                rounds: layout.rounds,
            }),
            Err(e) => reject(principal, "get_config", e),
        },
        Message::AddPlayer(player) => match ctx.coordinator.add_player(player) {
            Ok(player) => Some(Message::PlayerAdded { player }),
            Err(e) => reject(principal, "add_player", e),
        },
        Message::Ping => Some(Message::Pong),
        Message::Register { .. } | Message::Login { .. } | Message::Join { .. } => {
            debug!(username = %principal.username, "Ignoring handshake message after join");
            None
        }
        other => {
            debug!(username = %principal.username, message = ?other, "Ignoring unexpected message type");
            None
        }
    }
}
