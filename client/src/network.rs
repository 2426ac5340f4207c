//! Client network loop: TCP text framing and the three cadences.
//!
//! One `tokio::select!` loop multiplexes inbound server frames, the
//! accumulator-driven fixed simulation step, the render tick, and a 1 Hz
//! ping. Frame handling never blocks on I/O; handlers mutate the engine
//! and hand back any frames that must go out.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use shared::protocol::{ClientFrame, ServerFrame};
use shared::{FixedStep, TICK_SECONDS};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::game::ClientGame;
use crate::input::DirectionSource;

pub struct Client {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,

    pub game: ClientGame,
    source: Box<dyn DirectionSource>,

    color: String,
    /// Artificial input latency to request from the server, for testing.
    requested_latency_ms: u64,

    ping_ms: u64,
    /// One-way latency estimate (half the measured round trip).
    latency_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        color: String,
        requested_latency_ms: u64,
        source: Box<dyn DirectionSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        info!("connected to {}", server_addr);

        let (read_half, write_half) = stream.into_split();

        Ok(Client {
            reader: BufReader::new(read_half).lines(),
            writer: write_half,
            game: ClientGame::new(),
            source,
            color,
            requested_latency_ms,
            ping_ms: 0,
            latency_ms: 0,
        })
    }

    async fn send_frame(&mut self, frame: &ClientFrame) -> Result<(), Box<dyn std::error::Error>> {
        let mut line = frame.encode();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Applies one inbound frame and returns any frames to send back.
    fn handle_frame(&mut self, line: &str) -> Vec<ClientFrame> {
        let frame = match ServerFrame::parse(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping bad frame from server: {}", e);
                return Vec::new();
            }
        };

        match frame {
            ServerFrame::Hosting { server_time } => {
                self.game.on_hosting(server_time + self.latency_secs());
            }
            ServerFrame::Joining { host_id } => {
                self.game.on_joining(host_id);
            }
            ServerFrame::Ready { server_time } => {
                self.game.on_ready(server_time + self.latency_secs());
                // Let the opponent see our color now that both are in.
                return vec![ClientFrame::Color(self.color.clone())];
            }
            ServerFrame::End => {
                self.game.on_end();
            }
            ServerFrame::Pong { millis } => {
                self.ping_ms = unix_millis().saturating_sub(millis);
                self.latency_ms = self.ping_ms / 2;
            }
            ServerFrame::ColorChanged(color) => {
                info!("opponent changed color to {}", color);
            }
            ServerFrame::Snapshot(snapshot) => {
                self.game.on_snapshot(snapshot);
            }
        }

        Vec::new()
    }

    fn latency_secs(&self) -> f32 {
        self.latency_ms as f32 / 1000.0
    }

    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }

    /// Runs until the server closes the connection.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.requested_latency_ms > 0 {
            info!(
                "requesting {}ms artificial input latency",
                self.requested_latency_ms
            );
            self.send_frame(&ClientFrame::Latency {
                millis: self.requested_latency_ms,
            })
            .await?;
        }

        let mut sim_interval = interval(Duration::from_secs_f32(TICK_SECONDS));
        sim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut render_interval = interval(Duration::from_millis(16));
        render_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping_interval = interval(Duration::from_secs(1));

        let mut accumulator = FixedStep::new(TICK_SECONDS);
        let mut last_sim = Instant::now();
        let mut last_render = Instant::now();

        loop {
            tokio::select! {
                line = self.reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let responses = self.handle_frame(&line);
                            for frame in responses {
                                self.send_frame(&frame).await?;
                            }
                        }
                        Ok(None) => {
                            info!("server closed the connection");
                            break;
                        }
                        Err(e) => {
                            error!("read error: {}", e);
                            break;
                        }
                    }
                },

                _ = sim_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = (now - last_sim).as_secs_f32();
                    last_sim = now;

                    for _ in 0..accumulator.advance(elapsed) {
                        let directions = self.source.sample();
                        if let Some(command) = self.game.on_fixed_tick(directions) {
                            self.send_frame(&ClientFrame::Input(command)).await?;
                        }
                    }
                },

                _ = render_interval.tick() => {
                    let now = Instant::now();
                    let dt = (now - last_render).as_secs_f32();
                    last_render = now;

                    self.game.on_render_tick(dt);
                },

                _ = ping_interval.tick() => {
                    self.send_frame(&ClientFrame::Ping { millis: unix_millis() }).await?;
                },
            }
        }

        Ok(())
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
