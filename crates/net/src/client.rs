//! TCP client for a draft server
//!
//! Keeps a local mirror of the board, owner names and clock that is replaced
//! (or merged, for single owner renames) as server events arrive.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use draftboard_core::{BoardSnapshot, ClockState, NewPlayer, Player, PlayerId};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, PlayerRef};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Session token issued by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Event received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Joined { username: String },
    JoinRejected { reason: String },
    Board(BoardSnapshot),
    Clock(ClockState),
    OwnersLoaded(BTreeMap<String, String>),
    OwnerUpdated { owner_id: String, name: String },
    /// A request from this client failed
    DraftError(String),
    SearchResults(Vec<Player>),
    Config { owners: u32, rounds: u32 },
    PlayerAdded(Player),
    Pong,
    ServerShutdown,
    Disconnected,
}

/// Client handle for network operations
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::Receiver<ServerEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

struct ClientState {
    connection: ConnectionState,
    username: Option<String>,
    board: BoardSnapshot,
    owners: BTreeMap<String, String>,
    clock: Option<ClockState>,
}

enum ClientCommand {
    Send(Message),
    Disconnect,
}

/// One request/response exchange on a short-lived connection
async fn request(addr: SocketAddr, msg: Message) -> Result<Message> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, &msg).await?;
    read_frame(&mut stream).await
}

impl Client {
    /// Create an account on the server
    pub async fn register(addr: SocketAddr, username: &str, password: &str) -> Result<Uuid> {
        let msg = Message::Register {
            username: username.to_string(),
            password: password.to_string(),
        };
        match request(addr, msg).await? {
            Message::Registered { user_id } => Ok(user_id),
            Message::Rejected { reason } => Err(Error::Rejected(reason)),
            other => Err(Error::Protocol(format!("unexpected reply to register: {:?}", other))),
        }
    }

    /// Exchange a username and password for a session token
    pub async fn login(addr: SocketAddr, username: &str, password: &str) -> Result<Credentials> {
        let msg = Message::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match request(addr, msg).await? {
            Message::LoginAccepted { token, expires_at } => Ok(Credentials { token, expires_at }),
            Message::Rejected { reason } => Err(Error::Rejected(reason)),
            other => Err(Error::Protocol(format!("unexpected reply to login: {:?}", other))),
        }
    }

    /// Join the live draft with a session token
    pub async fn connect(addr: SocketAddr, token: String) -> Result<Self> {
        info!(addr = %addr, "Connecting to draft server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = tokio::io::split(stream);

        write_frame(&mut writer, &Message::Join { token: Some(token) }).await?;

        let state = Arc::new(RwLock::new(ClientState {
            connection: ConnectionState::Connecting,
            username: None,
            board: BoardSnapshot::default(),
            owners: BTreeMap::new(),
            clock: None,
        }));

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(reader, writer, state.clone(), event_tx, cmd_rx));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next server event
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.recv().await
    }

    async fn send(&self, msg: Message) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Draft `player_id` into `to_slot_id`, moving it out of `from_slot_id`
    /// when given
    pub async fn pick(&self, from_slot_id: Option<&str>, to_slot_id: &str, player_id: PlayerId) -> Result<()> {
        self.send(Message::Pick {
            from_slot_id: from_slot_id.map(str::to_string),
            to_slot_id: to_slot_id.to_string(),
            player: Some(PlayerRef {
                id: Some(player_id),
                name: None,
            }),
        })
        .await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Message::Reset).await
    }

    pub async fn delete_slots(&self, slot_ids: Vec<String>) -> Result<()> {
        self.send(Message::DeleteMultiple {
            slot_ids: Some(slot_ids),
        })
        .await
    }

    pub async fn undo(&self) -> Result<()> {
        self.send(Message::Undo).await
    }

    pub async fn start_clock(&self, owner_id: &str) -> Result<()> {
        self.send(Message::ClockStart {
            owner_id: owner_id.to_string(),
        })
        .await
    }

    pub async fn stop_clock(&self) -> Result<()> {
        self.send(Message::ClockStop).await
    }

    /// Set the pick duration in minutes
    pub async fn set_clock_duration(&self, minutes: f64) -> Result<()> {
        self.send(Message::ClockSetDuration { duration: minutes }).await
    }

    pub async fn rename_owner(&self, owner_id: &str, name: &str) -> Result<()> {
        self.send(Message::OwnerRename {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        })
        .await
    }

    pub async fn search_players(&self, query: &str) -> Result<()> {
        self.send(Message::SearchPlayers {
            query: query.to_string(),
        })
        .await
    }

    pub async fn get_config(&self) -> Result<()> {
        self.send(Message::GetConfig).await
    }

    pub async fn add_player(&self, player: NewPlayer) -> Result<()> {
        self.send(Message::AddPlayer(player)).await
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.send(Message::Ping).await
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    pub async fn username(&self) -> Option<String> {
        self.state.read().await.username.clone()
    }

    /// Latest board received from the server
    pub async fn board(&self) -> BoardSnapshot {
        self.state.read().await.board.clone()
    }

    pub async fn owners(&self) -> BTreeMap<String, String> {
        self.state.read().await.owners.clone()
    }

    pub async fn clock(&self) -> Option<ClockState> {
        self.state.read().await.clock.clone()
    }
}

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::Sender<ServerEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    // Wait for join response
    match read_frame(&mut reader).await {
        Ok(Message::JoinAccepted { username }) => {
            {
                let mut s = state.write().await;
                s.connection = ConnectionState::Connected;
                s.username = Some(username.clone());
            }
            info!(username = %username, "Joined draft");
            let _ = event_tx.send(ServerEvent::Joined { username }).await;
        }
        Ok(Message::JoinRejected { reason }) => {
            state.write().await.connection = ConnectionState::Disconnected;
            warn!(reason = %reason, "Join rejected");
            let _ = event_tx.send(ServerEvent::JoinRejected { reason }).await;
            return;
        }
        Ok(other) => {
            warn!(message = ?other, "Unexpected first message");
            state.write().await.connection = ConnectionState::Disconnected;
            let _ = event_tx.send(ServerEvent::Disconnected).await;
            return;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read join response");
            state.write().await.connection = ConnectionState::Disconnected;
            let _ = event_tx.send(ServerEvent::Disconnected).await;
            return;
        }
    }

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(msg) => {
                        handle_server_message(msg, &state, &event_tx).await;
                    }
                    Err(Error::Decode(e)) => {
                        warn!(error = %e, "Skipping undecodable server message");
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    state.write().await.connection = ConnectionState::Disconnected;
    let _ = event_tx.send(ServerEvent::Disconnected).await;
    info!("Disconnected from draft server");
}

/// Update the local mirror and surface the message as an event
async fn handle_server_message(
    msg: Message,
    state: &Arc<RwLock<ClientState>>,
    event_tx: &mpsc::Sender<ServerEvent>,
) {
    let event = match msg {
        Message::BoardUpdate { board } => {
            state.write().await.board = board.clone();
            ServerEvent::Board(board)
        }
        Message::ClockUpdate { clock } => {
            state.write().await.clock = Some(clock.clone());
            ServerEvent::Clock(clock)
        }
        Message::OwnerLoad { owners } => {
            state.write().await.owners = owners.clone();
            ServerEvent::OwnersLoaded(owners)
        }
        Message::OwnerUpdated { owner_id, name } => {
            state
                .write()
                .await
                .owners
                .insert(owner_id.clone(), name.clone());
            ServerEvent::OwnerUpdated { owner_id, name }
        }
        Message::DraftError { message } => ServerEvent::DraftError(message),
        Message::SearchResults { players } => ServerEvent::SearchResults(players),
        Message::Config { owners, rounds } => ServerEvent::Config { owners, rounds },
        Message::PlayerAdded { player } => ServerEvent::PlayerAdded(player),
        Message::Pong => ServerEvent::Pong,
        Message::ServerShutdown => ServerEvent::ServerShutdown,
        _ => {
            debug!("Ignoring unexpected message");
            return;
        }
    };
    let _ = event_tx.send(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Server, ServerContext};
    use draftboard_core::{Database, DraftLayout, SlotId, DEFAULT_DURATION_MS};
    use std::sync::Mutex;
    use std::time::Duration;

    async fn start_server() -> (Server, SocketAddr) {
        let mut db = Database::open_in_memory().unwrap();
        db.initialize_draft(DraftLayout { owners: 2, rounds: 2 }).unwrap();
        let ctx = ServerContext::new(Arc::new(Mutex::new(db)), DEFAULT_DURATION_MS, 24);
        let server = Server::start(0, ctx).await.unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.addr().port()));
        (server, addr)
    }

    async fn next(client: &mut Client) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(5), client.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_register_login_join_and_draft() {
        let (server, addr) = start_server().await;

        Client::register(addr, "commish", "s3cret").await.unwrap();
        assert!(matches!(
            Client::register(addr, "commish", "other").await,
            Err(Error::Rejected(_))
        ));
        assert!(matches!(
            Client::login(addr, "commish", "wrong").await,
            Err(Error::Rejected(_))
        ));
        let credentials = Client::login(addr, "commish", "s3cret").await.unwrap();

        let mut client = Client::connect(addr, credentials.token).await.unwrap();
        assert_eq!(
            next(&mut client).await,
            ServerEvent::Joined {
                username: "commish".into()
            }
        );
        assert_eq!(next(&mut client).await, ServerEvent::Board(BoardSnapshot::default()));
        assert!(matches!(next(&mut client).await, ServerEvent::OwnersLoaded(owners) if owners.len() == 2));
        assert!(matches!(next(&mut client).await, ServerEvent::Clock(_)));
        assert_eq!(client.connection_state().await, ConnectionState::Connected);

        client
            .add_player(NewPlayer::new("Josh Allen", "QB").with_team("BUF", 12))
            .await
            .unwrap();
        let player = match next(&mut client).await {
            ServerEvent::PlayerAdded(player) => player,
            other => panic!("expected player_added, got {:?}", other),
        };

        client.pick(None, "T1-R2", player.id).await.unwrap();
        assert!(matches!(next(&mut client).await, ServerEvent::Clock(clock) if !clock.is_running));
        assert!(matches!(next(&mut client).await, ServerEvent::Board(_)));
        assert_eq!(
            client.board().await.slot_of(player.id),
            Some(&SlotId::from("T1-R2"))
        );

        client.rename_owner("T2", "Waiver Wire Warriors").await.unwrap();
        assert!(matches!(next(&mut client).await, ServerEvent::OwnerUpdated { .. }));
        let owners = client.owners().await;
        assert_eq!(owners["T2"], "Waiver Wire Warriors");
        assert_eq!(owners["T1"], "Team 1");

        client.disconnect().await;
        assert_eq!(next(&mut client).await, ServerEvent::Disconnected);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_connect_with_bad_token() {
        let (server, addr) = start_server().await;

        let mut client = Client::connect(addr, "garbage".into()).await.unwrap();
        assert!(matches!(
            next(&mut client).await,
            ServerEvent::JoinRejected { .. }
        ));
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_clock_duration_and_start() {
        let (server, addr) = start_server().await;
        let credentials = {
            Client::register(addr, "timer", "pw").await.unwrap();
            Client::login(addr, "timer", "pw").await.unwrap()
        };
        let mut client = Client::connect(addr, credentials.token).await.unwrap();
        for _ in 0..4 {
            next(&mut client).await;
        }

        client.set_clock_duration(1.5).await.unwrap();
        match next(&mut client).await {
            ServerEvent::Clock(clock) => assert_eq!(clock.duration_ms, 90_000),
            other => panic!("expected clock update, got {:?}", other),
        }

        client.start_clock("T2").await.unwrap();
        match next(&mut client).await {
            ServerEvent::Clock(clock) => {
                assert!(clock.is_running);
                assert_eq!(clock.owner_id.as_deref(), Some("T2"));
            }
            other => panic!("expected clock update, got {:?}", other),
        }

        // Ignored while running: the next event is the stop
        client.set_clock_duration(5.0).await.unwrap();
        client.stop_clock().await.unwrap();
        match next(&mut client).await {
            ServerEvent::Clock(clock) => {
                assert!(!clock.is_running);
                assert_eq!(clock.duration_ms, 90_000);
            }
            other => panic!("expected clock update, got {:?}", other),
        }
        server.shutdown();
    }
}
