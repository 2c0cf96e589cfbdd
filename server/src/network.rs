//! Store network layer: request handling and change-feed fan-out over UDP

use crate::table::PlayerTable;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ChangeEvent, Packet, Reply, StoreFault, SubscriptionStatus, MAX_DATAGRAM, PLAYERS_TABLE};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

type SendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Subscribers silent for longer than this are dropped
    pub subscriber_timeout: Duration,
    /// Probability in `[0, 1]` that an update is rejected
    pub update_failure_rate: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            subscriber_timeout: Duration::from_secs(10),
            update_failure_rate: 0.0,
        }
    }
}

/// Messages sent from the receiver task to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
}

/// Player store serving one `players` table
pub struct Server {
    socket: Arc<UdpSocket>,
    table: PlayerTable,
    subscribers: HashMap<SocketAddr, Instant>,
    config: ServerConfig,
    rng: StdRng,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Player store listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            table: PlayerTable::new(),
            subscribers: HashMap::new(),
            config,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn table(&self) -> &PlayerTable {
        &self.table
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self, server_tx: mpsc::UnboundedSender<ServerMessage>) {
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                debug!("Main loop stopped, receiver exiting");
                                break;
                            }
                        }
                        Err(_) => warn!("Failed to deserialize packet from {}", addr),
                    },
                    Err(e) => {
                        // ICMP errors from departed clients surface here
                        debug!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), SendError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = Self::send_packet_impl(&self.socket, packet, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    async fn reply(&self, addr: SocketAddr, request_id: u64, result: Result<Reply, StoreFault>) {
        self.send_packet(&Packet::Reply { request_id, result }, addr)
            .await;
    }

    /// Sends a change event to every subscriber, the writer included
    async fn publish(&self, event: ChangeEvent) {
        let packet = Packet::Change(event);
        let subscribers: Vec<SocketAddr> = self.subscribers.keys().copied().collect();
        for addr in subscribers {
            self.send_packet(&packet, addr).await;
        }
    }

    fn should_fail_update(&mut self) -> bool {
        let rate = self.config.update_failure_rate;
        rate > 0.0 && self.rng.gen_bool(rate.min(1.0))
    }

    /// Processes one request and publishes any resulting change
    pub async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Some(last_seen) = self.subscribers.get_mut(&addr) {
            *last_seen = Instant::now();
        }

        match packet {
            Packet::Insert { request_id, player } => {
                let id = player.id;
                match self.table.insert(player) {
                    Ok((row, event)) => {
                        self.reply(addr, request_id, Ok(Reply::Inserted(Some(row))))
                            .await;
                        self.publish(event).await;
                    }
                    Err(e) => {
                        warn!("Rejected insert of player {} from {}: {}", id, addr, e);
                        self.reply(addr, request_id, Err(e.into())).await;
                    }
                }
            }

            Packet::Update { request_id, id, x, y } => {
                if self.should_fail_update() {
                    debug!("Injecting failure for update of player {}", id);
                    let fault = StoreFault::new("XX000", "injected update failure")
                        .with_hint("lower --update-failure-rate");
                    self.reply(addr, request_id, Err(fault)).await;
                    return;
                }

                let event = self.table.update(id, x, y);
                self.reply(addr, request_id, Ok(Reply::Updated)).await;
                if let Some(event) = event {
                    self.publish(event).await;
                }
            }

            Packet::Delete { request_id, id } => {
                let event = self.table.delete(id);
                self.reply(addr, request_id, Ok(Reply::Deleted)).await;
                if let Some(event) = event {
                    self.publish(event).await;
                }
            }

            Packet::SelectAll { request_id } => {
                let rows = self.table.select_all();
                self.reply(addr, request_id, Ok(Reply::Rows(rows))).await;
            }

            Packet::Subscribe { table } => {
                let status = if table == PLAYERS_TABLE {
                    info!("Subscriber {} joined the players feed", addr);
                    self.subscribers.insert(addr, Instant::now());
                    SubscriptionStatus::Subscribed
                } else {
                    warn!("Subscriber {} asked for unknown table {}", addr, table);
                    SubscriptionStatus::ChannelError(Some(
                        StoreFault::new("42P01", format!("relation \"{}\" does not exist", table))
                            .with_hint(format!("subscribe to \"{}\"", PLAYERS_TABLE)),
                    ))
                };
                self.send_packet(&Packet::Status(status), addr).await;
            }

            Packet::Unsubscribe => {
                if self.subscribers.remove(&addr).is_some() {
                    info!("Subscriber {} left the players feed", addr);
                    self.send_packet(&Packet::Status(SubscriptionStatus::Closed), addr)
                        .await;
                }
            }

            Packet::Heartbeat => {}

            other => warn!("Unexpected packet from {}: {:?}", addr, other),
        }
    }

    /// Drops subscribers that stopped sending heartbeats and tells each one
    pub async fn drop_stale_subscribers(&mut self) -> Vec<SocketAddr> {
        let timeout = self.config.subscriber_timeout;
        let stale: Vec<SocketAddr> = self
            .subscribers
            .iter()
            .filter(|(_, last_seen)| last_seen.elapsed() > timeout)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &stale {
            self.send_packet(&Packet::Status(SubscriptionStatus::TimedOut), *addr)
                .await;
            self.subscribers.remove(addr);
            info!("Subscriber {} timed out", addr);
        }
        stale
    }

    pub async fn run(&mut self) -> std::io::Result<()> {
        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        self.spawn_network_receiver(server_tx);

        let mut sweep = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        None => {
                            error!("Network receiver stopped");
                            return Err(std::io::Error::new(
                                std::io::ErrorKind::BrokenPipe,
                                "network receiver stopped",
                            ));
                        }
                    }
                },

                _ = sweep.tick() => {
                    self.drop_stale_subscribers().await;
                },
            }
        }
    }
}
