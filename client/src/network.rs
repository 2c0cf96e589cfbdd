//! UDP link between the UI thread and the player store
//!
//! The socket lives on its own thread with a current-thread tokio runtime.
//! Packets cross between the two threads over unbounded channels, so the
//! engine is only ever touched by whoever drains `try_recv`.

use crate::session::Transport;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_DATAGRAM};
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

pub struct StoreLink {
    outbound: Option<mpsc::UnboundedSender<Packet>>,
    inbound: mpsc::UnboundedReceiver<Packet>,
    worker: Option<JoinHandle<()>>,
}

impl StoreLink {
    /// Binds a local socket and starts the link thread
    ///
    /// `fake_ping_ms` delays each direction by half the given amount.
    pub fn connect(
        store_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store_addr: SocketAddr = store_addr.parse()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel::<std::io::Result<()>>();

        let worker = std::thread::Builder::new()
            .name("store-link".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let socket = match bind(store_addr).await {
                        Ok(socket) => socket,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    run_link(socket, outbound_rx, inbound_tx, fake_ping_ms).await;
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err("store link thread exited during startup".into()),
        }

        info!("Connected to player store at {}", store_addr);
        if fake_ping_ms > 0 {
            info!("Simulating {}ms latency", fake_ping_ms);
        }

        Ok(Self {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            worker: Some(worker),
        })
    }

    /// Flushes queued packets and stops the link thread
    ///
    /// Does not wait for replies to anything already sent.
    pub fn shutdown(&mut self) {
        self.outbound.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Store link thread panicked");
            }
        }
    }
}

impl Transport for StoreLink {
    fn send(&mut self, packet: Packet) {
        match &self.outbound {
            Some(outbound) => {
                if outbound.send(packet).is_err() {
                    warn!("Store link is down, dropping packet");
                }
            }
            None => warn!("Store link was shut down, dropping packet"),
        }
    }

    fn try_recv(&mut self) -> Option<Packet> {
        self.inbound.try_recv().ok()
    }
}

impl Drop for StoreLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn bind(store_addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let local = if store_addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(store_addr).await?;
    Ok(socket)
}

async fn send_packet(socket: &UdpSocket, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send(&data).await?;
    Ok(())
}

async fn run_link(
    socket: UdpSocket,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: mpsc::UnboundedSender<Packet>,
    fake_ping_ms: u64,
) {
    let mut buffer = vec![0u8; MAX_DATAGRAM];
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(packet) = message else {
                    debug!("Outbound queue closed, stopping store link");
                    break;
                };

                if fake_ping_ms > 0 {
                    sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                }

                if let Err(e) = send_packet(&socket, &packet).await {
                    error!("Error sending packet: {}", e);
                }
            },

            result = socket.recv(&mut buffer) => {
                match result {
                    Ok(len) => {
                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }

                        match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => {
                                if inbound.send(packet).is_err() {
                                    debug!("Inbound queue closed, stopping store link");
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        sleep(Duration::from_millis(100)).await;
                    }
                }
            },

            _ = heartbeat.tick() => {
                if let Err(e) = send_packet(&socket, &Packet::Heartbeat).await {
                    debug!("Error sending heartbeat: {}", e);
                }
            },
        }
    }
}
