use crate::config::AppConfig;
use crate::entities::attributes::AttributeId;
use crate::net::channel::{self, FrameHeader, SequenceCounter, SequenceTracker};
use crate::net::packet::PacketReader;
use crate::net::protocol::{self, PacketType};
use crate::net::session::SessionManager;
use crate::persistence::store::{CharacterSnapshot, SaveStore};
use crate::scripting::effects::EffectTable;
use crate::telemetry;
use crate::world::entity::Entity;
use crate::world::game_data::GameData;
use crate::world::registry::NetworkId;
use crate::world::state::{Outbound, WorldState};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const MAX_DATAGRAM: usize = 1400;
const SOCKET_POLL: Duration = Duration::from_millis(20);

/// Cooperative shutdown handle shared with signal handlers and tests.
#[derive(Debug, Clone)]
pub struct ServerControl {
    running: Arc<AtomicBool>,
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct Connection {
    peer: SocketAddr,
    account: Option<String>,
    player: Option<NetworkId>,
    tracker: SequenceTracker,
    counter: SequenceCounter,
    pending_send: Vec<Vec<u8>>,
}

impl Connection {
    fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            account: None,
            player: None,
            tracker: SequenceTracker::new(),
            counter: SequenceCounter::default(),
            pending_send: Vec::new(),
        }
    }

    /// Queues a reliable control response; the main loop flushes it.
    fn queue(&mut self, payload: &[u8]) {
        let header = FrameHeader {
            reliable: true,
            sequence: self.counter.advance(),
        };
        self.pending_send.push(channel::frame(header, payload));
    }
}

struct NetEvent {
    peer: SocketAddr,
    data: Vec<u8>,
}

/// Boots the whole server: telemetry, game data, saves, then the
/// socket thread and the simulation loop. Blocks until shutdown.
pub fn run(config: AppConfig) -> Result<(), String> {
    let control = ServerControl::new();
    run_with_control(config, control)
}

pub fn run_with_control(config: AppConfig, control: ServerControl) -> Result<(), String> {
    telemetry::init(&config.root)?;
    let data = GameData::load(&config.root.join("data"))?;
    let mut store = SaveStore::new(config.root.join("save"), 64)?;
    let mut sessions = SessionManager::new(seed_from_time());

    let seed = config.settings.battle_seed.unwrap_or_else(seed_from_time);
    let mut world = WorldState::new(
        data,
        Box::new(EffectTable::new()),
        config.settings.registry_capacity,
        config.settings.tick_rate,
        seed,
    );

    let socket = UdpSocket::bind(&config.bind_addr)
        .map_err(|err| format!("bind {} failed: {}", config.bind_addr, err))?;
    socket
        .set_read_timeout(Some(SOCKET_POLL))
        .map_err(|err| format!("socket timeout set failed: {}", err))?;
    let send_socket = socket
        .try_clone()
        .map_err(|err| format!("socket clone failed: {}", err))?;
    telemetry::log_game(&format!("listening on {}", config.bind_addr));

    let inbound = spawn_socket_thread(socket, control.clone());

    let mut connections: HashMap<SocketAddr, Connection> = HashMap::new();
    let mut last_tick = Instant::now();
    let mut last_save = Instant::now();
    let save_interval = Duration::from_secs(config.settings.save_interval_secs.max(1));

    while control.is_running() {
        while let Ok(event) = inbound.try_recv() {
            handle_datagram(
                &mut world,
                &mut sessions,
                &mut store,
                &mut connections,
                event,
            );
        }

        let now = Instant::now();
        world.tick(now.duration_since(last_tick).as_secs_f64());
        last_tick = now;

        for message in world.drain_outbound() {
            deliver(&send_socket, &mut connections, message);
        }
        for connection in connections.values_mut() {
            for framed in connection.pending_send.drain(..) {
                if let Err(err) = send_socket.send_to(&framed, connection.peer) {
                    telemetry::log_error(&format!("send to {} failed: {}", connection.peer, err));
                }
            }
        }

        if last_save.elapsed() >= save_interval {
            save_players(&world, &connections, &mut store);
            last_save = Instant::now();
        }

        thread::sleep(Duration::from_millis(5));
    }

    save_players(&world, &connections, &mut store);
    telemetry::log_game("server stopped");
    Ok(())
}

fn seed_from_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or(1)
}

fn spawn_socket_thread(socket: UdpSocket, control: ServerControl) -> Receiver<NetEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = [0u8; MAX_DATAGRAM];
        while control.is_running() {
            match socket.recv_from(&mut buffer) {
                Ok((len, peer)) => {
                    let event = NetEvent {
                        peer,
                        data: buffer[..len].to_vec(),
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(err) => {
                    telemetry::log_error(&format!("socket receive failed: {}", err));
                    break;
                }
            }
        }
    });
    rx
}

fn handle_datagram(
    world: &mut WorldState,
    sessions: &mut SessionManager,
    store: &mut SaveStore,
    connections: &mut HashMap<SocketAddr, Connection>,
    event: NetEvent,
) {
    let connection = connections
        .entry(event.peer)
        .or_insert_with(|| Connection::new(event.peer));

    let Some((header, payload)) = channel::unframe(&event.data) else {
        telemetry::log_netload(&format!("{}: malformed frame", event.peer));
        return;
    };
    if !header.reliable && !connection.tracker.accept(header.sequence) {
        return;
    }

    let mut reader = PacketReader::new(payload);
    let packet_type = reader.read_u8().and_then(PacketType::from_u8);
    match packet_type {
        Some(PacketType::AccountLogin) => {
            let Some((account, password)) = protocol::parse_login(&mut reader) else {
                return;
            };
            // First contact creates the account; afterwards the digest
            // must match.
            let login = sessions.login(&account, &password).or_else(|_| {
                sessions
                    .register(&account, &password)
                    .and_then(|_| sessions.login(&account, &password))
            });
            match login {
                Ok(key) => {
                    connection.account = Some(account.clone());
                    telemetry::log_game(&format!("account '{}' logged in", account));
                    connection.queue(&protocol::build_login_response(true, &key));
                }
                Err(err) => {
                    telemetry::log_game(&format!("login for '{}' rejected: {}", account, err));
                    connection.queue(&protocol::build_login_response(false, ""));
                }
            }
        }
        Some(PacketType::CharacterPlay) => {
            let Some(name) = reader.read_string() else {
                return;
            };
            let Some(account) = connection.account.clone() else {
                telemetry::log_netload(&format!("{}: character play before login", event.peer));
                return;
            };
            match enter_world(world, store, &account, &name) {
                Ok(id) => {
                    connection.player = Some(id);
                    telemetry::log_game(&format!("'{}' entered the world as {}", name, id));
                }
                Err(err) => telemetry::log_error(&format!("character play failed: {}", err)),
            }
        }
        Some(PacketType::AccountLogout) => {
            if let Some(id) = connection.player.take() {
                leave_world(world, store, id);
            }
            connection.account = None;
        }
        Some(_) => {
            let Some(player) = connection.player else {
                telemetry::log_netload(&format!("{}: game packet before character play", event.peer));
                return;
            };
            world.handle_packet(player, payload);
        }
        None => {
            telemetry::log_netload(&format!("{}: empty or unknown packet", event.peer));
        }
    }
}

/// Restores a saved character or rolls a fresh one at the first level
/// row with the starter kit.
fn enter_world(
    world: &mut WorldState,
    store: &mut SaveStore,
    account: &str,
    name: &str,
) -> Result<NetworkId, String> {
    let entity = match store.load_snapshot(name)? {
        Some(snapshot) => {
            if snapshot.account != account {
                return Err(format!("character '{}' belongs to another account", name));
            }
            snapshot.into_entity()?
        }
        None => {
            let mut entity = Entity::player(name, account);
            let row = world.data.level_for_experience(0);
            entity.attributes.set_int(AttributeId::MAX_HEALTH, row.health);
            entity.attributes.set_int(AttributeId::HEALTH, row.health);
            entity.attributes.set_int(AttributeId::MAX_MANA, row.mana);
            entity.attributes.set_int(AttributeId::MANA, row.mana);
            entity.attributes.set_int(AttributeId::BATTLE_SPEED, 100);
            entity.attributes.set_int(AttributeId::MIN_DAMAGE, 1);
            entity.attributes.set_int(AttributeId::MAX_DAMAGE, 3);
            entity
        }
    };
    world.spawn_player(entity)
}

fn leave_world(world: &mut WorldState, store: &mut SaveStore, id: NetworkId) {
    if let Some(entity) = world.registry.get(id) {
        match CharacterSnapshot::from_entity(entity) {
            Ok(snapshot) => {
                if let Err(err) = store.save_snapshot(&snapshot) {
                    telemetry::log_error(&format!("logout save failed: {}", err));
                }
            }
            Err(err) => telemetry::log_error(&format!("logout snapshot failed: {}", err)),
        }
    }
    world.registry.mark_deleted(id);
}

fn save_players(world: &WorldState, connections: &HashMap<SocketAddr, Connection>, store: &mut SaveStore) {
    for connection in connections.values() {
        let Some(id) = connection.player else {
            continue;
        };
        let Some(entity) = world.registry.get(id) else {
            continue;
        };
        if let Ok(snapshot) = CharacterSnapshot::from_entity(entity) {
            if let Err(err) = store.save_snapshot(&snapshot) {
                telemetry::log_error(&format!("periodic save failed: {}", err));
            }
        }
    }
}

fn deliver(
    socket: &UdpSocket,
    connections: &mut HashMap<SocketAddr, Connection>,
    message: Outbound,
) {
    match message {
        Outbound::Broadcast(payload) => {
            for connection in connections.values_mut() {
                if connection.player.is_none() {
                    continue;
                }
                let header = FrameHeader {
                    reliable: true,
                    sequence: connection.counter.advance(),
                };
                let framed = channel::frame(header, &payload);
                if let Err(err) = socket.send_to(&framed, connection.peer) {
                    telemetry::log_error(&format!("send to {} failed: {}", connection.peer, err));
                }
            }
        }
        Outbound::To(id, payload) => {
            for connection in connections.values_mut() {
                if connection.player != Some(id) {
                    continue;
                }
                let header = FrameHeader {
                    reliable: true,
                    sequence: connection.counter.advance(),
                };
                let framed = channel::frame(header, &payload);
                if let Err(err) = socket.send_to(&framed, connection.peer) {
                    telemetry::log_error(&format!("send to {} failed: {}", connection.peer, err));
                }
                break;
            }
        }
    }
}
