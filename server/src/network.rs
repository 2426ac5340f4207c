//! Server network layer: TCP text framing, matchmaking and the single
//! event loop that owns all match state.
//!
//! Each accepted connection gets a reader task (lines in, events out) and
//! a writer task (outbound queue to socket). Nothing touches game state
//! from those tasks; they only enqueue [`ServerEvent`]s consumed by the
//! main loop, so every mutation happens on one consumer and the pending
//! input queues have exactly one writer and one reader.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::protocol::{ClientFrame, ServerFrame};
use shared::{FixedStep, TICK_SECONDS};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

use crate::registry::{ConnectionId, MatchId, MatchRegistry};

/// Events feeding the main loop.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection was accepted; `outbound` is its line queue.
    Connected {
        conn: ConnectionId,
        outbound: mpsc::UnboundedSender<String>,
    },
    /// One text frame arrived on a connection.
    FrameReceived { conn: ConnectionId, line: String },
    /// A frame re-injected after the artificial latency delay.
    DelayedFrame { conn: ConnectionId, line: String },
    /// A connection closed or errored.
    Disconnected { conn: ConnectionId },
    /// A match's ticker produced `steps` whole simulation steps.
    MatchTick { match_id: MatchId, steps: u32 },
}

/// Coordinates connections, matchmaking and per-match simulation.
pub struct Server {
    listener: Option<TcpListener>,
    registry: MatchRegistry,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,

    /// Milliseconds of artificial delay applied to inbound input frames.
    /// Testing aid, settable over the wire.
    fake_latency_ms: u64,
}

impl Server {
    pub async fn new(addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            registry: MatchRegistry::new(),
            connections: HashMap::new(),
            event_tx,
            event_rx,
            fake_latency_ms: 0,
        })
    }

    /// The bound address, useful when the port was chosen by the OS.
    /// `None` once [`run`](Self::run) has taken the listener.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Accepts connections forever, handing each one off to its own
    /// reader/writer tasks.
    fn spawn_acceptor(listener: TcpListener, event_tx: mpsc::UnboundedSender<ServerEvent>) {
        tokio::spawn(async move {
            let mut next_conn: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn = next_conn;
                        next_conn += 1;
                        info!("connection {} accepted from {}", conn, addr);
                        spawn_connection_tasks(conn, stream, event_tx.clone());
                    }
                    Err(e) => {
                        error!("accept failed: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Drives the fixed-step cadence for one match. The accumulator turns
    /// wall-clock wakeups into whole simulation steps; the handle is kept
    /// in the registry so removing the match cancels the cadence.
    fn spawn_ticker(&self, match_id: MatchId) -> JoinHandle<()> {
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs_f32(TICK_SECONDS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut accumulator = FixedStep::new(TICK_SECONDS);
            let mut last = Instant::now();

            // The first tick fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let now = Instant::now();
                let elapsed = (now - last).as_secs_f32();
                last = now;

                let steps = accumulator.advance(elapsed);
                if steps > 0
                    && event_tx
                        .send(ServerEvent::MatchTick { match_id, steps })
                        .is_err()
                {
                    break;
                }
            }
        })
    }

    /// Main loop: consumes events until the process shuts down.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.listener.take().ok_or("server is already running")?;
        Self::spawn_acceptor(listener, self.event_tx.clone());

        let mut event_rx = std::mem::replace(&mut self.event_rx, mpsc::unbounded_channel().1);

        info!("server started");
        while let Some(event) = event_rx.recv().await {
            self.handle_event(event);
        }

        info!("server shutting down");
        Ok(())
    }

    /// Applies one event to server state. Synchronous: every await point
    /// lives in the network tasks, never in state handling.
    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { conn, outbound } => {
                self.connections.insert(conn, outbound);
                self.enter_matchmaking(conn);
            }
            ServerEvent::FrameReceived { conn, line } => self.handle_frame(conn, line, false),
            ServerEvent::DelayedFrame { conn, line } => self.handle_frame(conn, line, true),
            ServerEvent::Disconnected { conn } => self.handle_disconnect(conn),
            ServerEvent::MatchTick { match_id, steps } => self.step_match(match_id, steps),
        }
    }

    /// Seats a connection: join the open match if one is waiting,
    /// otherwise create a new match with this connection as host.
    fn enter_matchmaking(&mut self, conn: ConnectionId) {
        if let Some(match_id) = self.registry.find_open() {
            if let Some(host) = self.registry.join(match_id, conn) {
                let server_time = match self.registry.get_mut(match_id) {
                    Some(entry) => {
                        entry.state.start();
                        entry.state.server_time
                    }
                    None => 0.0,
                };

                self.send_frame(conn, &ServerFrame::Joining { host_id: host });
                self.send_frame(conn, &ServerFrame::Ready { server_time });
                self.send_frame(host, &ServerFrame::Ready { server_time });
                return;
            }
        }

        let match_id = self.registry.create_match(conn);
        let server_time = self
            .registry
            .get(match_id)
            .map(|entry| entry.state.server_time)
            .unwrap_or(0.0);
        self.send_frame(conn, &ServerFrame::Hosting { server_time });

        let ticker = self.spawn_ticker(match_id);
        self.registry.attach_ticker(match_id, ticker);
    }

    fn handle_frame(&mut self, conn: ConnectionId, line: String, already_delayed: bool) {
        let frame = match ClientFrame::parse(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping bad frame from connection {}: {}", conn, e);
                return;
            }
        };

        match frame {
            ClientFrame::Input(command) => {
                if self.fake_latency_ms > 0 && !already_delayed {
                    let event_tx = self.event_tx.clone();
                    let delay = Duration::from_millis(self.fake_latency_ms);
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = event_tx.send(ServerEvent::DelayedFrame { conn, line });
                    });
                    return;
                }

                let Some(match_id) = self.registry.match_of(conn) else {
                    debug!("input from connection {} outside any match", conn);
                    return;
                };
                if let Some(entry) = self.registry.get_mut(match_id) {
                    if let Some(role) = entry.role_of(conn) {
                        entry.state.queue_input(role, command);
                    }
                }
            }

            ClientFrame::Ping { millis } => {
                self.send_frame(conn, &ServerFrame::Pong { millis });
            }

            ClientFrame::Color(color) => {
                let other = self
                    .registry
                    .match_of(conn)
                    .and_then(|id| self.registry.get(id))
                    .and_then(|entry| entry.other_connection(conn));
                if let Some(other) = other {
                    self.send_frame(other, &ServerFrame::ColorChanged(color));
                }
            }

            ClientFrame::Latency { millis } => {
                info!("artificial input latency set to {}ms", millis);
                self.fake_latency_ms = millis;
            }
        }
    }

    /// Runs `steps` simulation steps for one match and broadcasts every
    /// snapshot that comes due.
    fn step_match(&mut self, match_id: MatchId, steps: u32) {
        let (frames, recipients) = {
            let Some(entry) = self.registry.get_mut(match_id) else {
                return;
            };

            let mut frames = Vec::new();
            for _ in 0..steps {
                entry.state.step();
                if entry.state.should_broadcast() {
                    frames.push(ServerFrame::Snapshot(entry.state.snapshot()));
                }
            }

            let recipients: Vec<ConnectionId> = entry.participants().collect();
            (frames, recipients)
        };

        for frame in &frames {
            for conn in &recipients {
                self.send_frame(*conn, frame);
            }
        }
    }

    /// A lost connection is terminal for its match: notify the survivor,
    /// stop the cadence, and re-queue the survivor for a new match.
    fn handle_disconnect(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        info!("connection {} closed", conn);

        let Some(match_id) = self.registry.match_of(conn) else {
            return;
        };
        let Some(entry) = self.registry.remove(match_id) else {
            return;
        };

        let survivor = entry.participants().find(|&c| c != conn);
        if let Some(survivor) = survivor {
            self.send_frame(survivor, &ServerFrame::End);
            self.enter_matchmaking(survivor);
        }
    }

    fn send_frame(&self, conn: ConnectionId, frame: &ServerFrame) {
        let Some(outbound) = self.connections.get(&conn) else {
            debug!("no outbound queue for connection {}", conn);
            return;
        };
        match frame.encode() {
            Ok(line) => {
                if outbound.send(line).is_err() {
                    debug!("outbound queue for connection {} is gone", conn);
                }
            }
            Err(e) => error!("failed to encode frame for connection {}: {}", conn, e),
        }
    }
}

/// Reader and writer tasks for one connection.
fn spawn_connection_tasks(
    conn: ConnectionId,
    stream: TcpStream,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    if event_tx
        .send(ServerEvent::Connected {
            conn,
            outbound: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    tokio::spawn(async move {
        while let Some(mut line) = outbound_rx.recv().await {
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if event_tx
                        .send(ServerEvent::FrameReceived { conn, line })
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = event_tx.send(ServerEvent::Disconnected { conn });
                    break;
                }
                Err(e) => {
                    warn!("read error on connection {}: {}", conn, e);
                    let _ = event_tx.send(ServerEvent::Disconnected { conn });
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Role, HOST_SPAWN, PLAYER_SPEED};
    use tokio::time::timeout;

    async fn test_server() -> Server {
        Server::new("127.0.0.1:0").await.unwrap()
    }

    fn connect(server: &mut Server, conn: ConnectionId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        server.handle_event(ServerEvent::Connected {
            conn,
            outbound: tx,
        });
        rx
    }

    fn frame(server: &mut Server, conn: ConnectionId, line: &str) {
        server.handle_event(ServerEvent::FrameReceived {
            conn,
            line: line.to_string(),
        });
    }

    #[tokio::test]
    async fn first_connection_hosts_second_joins() {
        let mut server = test_server().await;

        let mut host_rx = connect(&mut server, 1);
        let hosted = host_rx.try_recv().unwrap();
        assert!(hosted.starts_with("s.h."), "expected hosting frame, got {}", hosted);
        assert_eq!(server.registry.len(), 1);

        let mut guest_rx = connect(&mut server, 2);
        let joining = guest_rx.try_recv().unwrap();
        assert_eq!(joining, "s.j.1");
        assert!(guest_rx.try_recv().unwrap().starts_with("s.r."));
        assert!(host_rx.try_recv().unwrap().starts_with("s.r."));
        assert_eq!(server.registry.len(), 1);
    }

    #[tokio::test]
    async fn third_connection_creates_a_second_match() {
        let mut server = test_server().await;
        connect(&mut server, 1);
        connect(&mut server, 2);

        let mut third_rx = connect(&mut server, 3);
        assert!(third_rx.try_recv().unwrap().starts_with("s.h."));
        assert_eq!(server.registry.len(), 2);
    }

    #[tokio::test]
    async fn input_moves_player_and_snapshot_reaches_both() {
        let mut server = test_server().await;
        let mut host_rx = connect(&mut server, 1);
        let mut guest_rx = connect(&mut server, 2);
        // Drain the handshake frames.
        while host_rx.try_recv().is_ok() {}
        while guest_rx.try_recv().is_ok() {}

        let match_id = server.registry.match_of(1).unwrap();
        frame(&mut server, 1, "i.l.1");
        server.handle_event(ServerEvent::MatchTick { match_id, steps: 3 });

        let line = host_rx.try_recv().unwrap();
        let snapshot = match ServerFrame::parse(&line).unwrap() {
            ServerFrame::Snapshot(s) => s,
            other => panic!("expected snapshot, got {:?}", other),
        };
        let expected_x = HOST_SPAWN.0 - PLAYER_SPEED * TICK_SECONDS;
        assert!((snapshot.host_position.x - expected_x).abs() < 1e-3);
        assert_eq!(snapshot.host_last_seq, 1);

        assert!(guest_rx.try_recv().is_ok(), "guest missed the snapshot");
    }

    #[tokio::test]
    async fn ping_is_echoed() {
        let mut server = test_server().await;
        let mut rx = connect(&mut server, 1);
        rx.try_recv().unwrap(); // hosting frame

        frame(&mut server, 1, "p.123456");
        assert_eq!(rx.try_recv().unwrap(), "s.p.123456");
    }

    #[tokio::test]
    async fn color_change_is_forwarded_to_the_other_participant() {
        let mut server = test_server().await;
        let mut host_rx = connect(&mut server, 1);
        let mut guest_rx = connect(&mut server, 2);
        while host_rx.try_recv().is_ok() {}
        while guest_rx.try_recv().is_ok() {}

        frame(&mut server, 1, "c.#cc8822");
        assert_eq!(guest_rx.try_recv().unwrap(), "s.c.#cc8822");
        assert!(host_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_ends_match_and_requeues_survivor() {
        let mut server = test_server().await;
        let mut host_rx = connect(&mut server, 1);
        let mut guest_rx = connect(&mut server, 2);
        while host_rx.try_recv().is_ok() {}
        while guest_rx.try_recv().is_ok() {}

        server.handle_event(ServerEvent::Disconnected { conn: 1 });

        assert_eq!(guest_rx.try_recv().unwrap(), "s.e");
        // The survivor hosts a fresh match.
        assert!(guest_rx.try_recv().unwrap().starts_with("s.h."));
        assert_eq!(server.registry.len(), 1);
        assert!(server.registry.match_of(2).is_some());
        assert_eq!(server.registry.match_of(1), None);
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let mut server = test_server().await;
        let mut rx = connect(&mut server, 1);
        rx.try_recv().unwrap();

        frame(&mut server, 1, "garbage.frame");
        frame(&mut server, 1, "i.q.1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn artificial_latency_delays_input_frames() {
        let mut server = test_server().await;
        connect(&mut server, 1);

        frame(&mut server, 1, "l.20");
        frame(&mut server, 1, "i.r.1");

        // Nothing queued yet; the frame is parked in the delay task.
        let match_id = server.registry.match_of(1).unwrap();
        assert!(server
            .registry
            .get(match_id)
            .unwrap()
            .state
            .players[Role::Host]
            .pending_inputs
            .is_empty());

        // The ticker also feeds event_rx, so wait specifically for the
        // delayed frame.
        let deadline = Duration::from_millis(500);
        let delayed = loop {
            match timeout(deadline, server.event_rx.recv()).await {
                Ok(Some(event @ ServerEvent::DelayedFrame { .. })) => break event,
                Ok(Some(_)) => continue,
                other => panic!("delayed frame never arrived: {:?}", other),
            }
        };
        server.handle_event(delayed);

        let entry = server.registry.get(match_id).unwrap();
        assert_eq!(entry.state.players[Role::Host].pending_inputs.len(), 1);
    }
}
