//! Listener and acceptor
//!
//! Binds the configured address, starts the broadcast router, and spawns
//! one session task per accepted connection.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::Registry;
use crate::router::Router;
use crate::session::{handle_connection, SessionContext};

/// A bound relay server, ready to accept
pub struct RelayServer {
    listener: TcpListener,
    registry: Registry,
    config: RelayConfig,
}

impl RelayServer {
    /// Bind the listener
    ///
    /// Failing to bind is the one fatal server error.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            registry: Registry::new(),
            config,
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the connection registry
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Start the router and accept connections forever
    ///
    /// Accept errors are logged and the loop keeps going.
    pub async fn run(self) {
        let (events, router) = Router::channel(self.registry.clone());
        tokio::spawn(router.run());

        let ctx = SessionContext::new(self.registry, events, &self.config);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let ctx = ctx.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, ctx).await {
                            error!("Session for {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);
    const QUIET_WINDOW: Duration = Duration::from_millis(200);

    struct TestClient {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read_half, writer) = stream.into_split();
            Self {
                lines: BufReader::new(read_half).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> String {
            timeout(RECV_TIMEOUT, self.lines.next_line())
                .await
                .expect("timed out waiting for a line")
                .unwrap()
                .expect("connection closed")
        }

        async fn assert_quiet(&mut self) {
            let res = timeout(QUIET_WINDOW, self.lines.next_line()).await;
            assert!(res.is_err(), "unexpected line: {:?}", res);
        }
    }

    async fn start() -> (SocketAddr, Registry) {
        start_with(RelayConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            ..RelayConfig::default()
        })
        .await
    }

    async fn start_with(config: RelayConfig) -> (SocketAddr, Registry) {
        let server = RelayServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        tokio::spawn(server.run());
        (addr, registry)
    }

    async fn wait_for_members(registry: &Registry, expected: usize) {
        timeout(RECV_TIMEOUT, async {
            while registry.len() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }

    async fn join(addr: SocketAddr, registry: &Registry, name: &str) -> TestClient {
        let expected = registry.len() + 1;
        let mut client = TestClient::connect(addr).await;
        client.send(name).await;
        wait_for_members(registry, expected).await;
        client
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let res = RelayServer::bind(RelayConfig {
            listen_addr: addr,
            ..RelayConfig::default()
        })
        .await;

        assert!(matches!(res, Err(RelayError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_join_is_announced_to_others_only() {
        let (addr, registry) = start().await;
        let mut bob = join(addr, &registry, "bob").await;
        let mut alice = join(addr, &registry, "alice").await;

        assert_eq!(bob.recv().await, "> User alice joined");
        alice.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_chat_round_trip_without_self_echo() {
        let (addr, registry) = start().await;
        let mut carol = join(addr, &registry, "carol").await;
        let mut dave = join(addr, &registry, "dave").await;
        let mut erin = join(addr, &registry, "erin").await;
        carol.recv().await;
        carol.recv().await;
        dave.recv().await;

        carol.send("hello").await;

        assert_eq!(dave.recv().await, "[carol]: hello");
        assert_eq!(erin.recv().await, "[carol]: hello");
        carol.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_identifier_and_text_are_trimmed() {
        let (addr, registry) = start().await;
        let mut listener = join(addr, &registry, "listener").await;
        let mut talker = join(addr, &registry, "  frank \r").await;

        assert_eq!(listener.recv().await, "> User frank joined");
        talker.send("  spaced out \r").await;
        assert_eq!(listener.recv().await, "[frank]: spaced out");
    }

    #[tokio::test]
    async fn test_blank_lines_are_ignored() {
        let (addr, registry) = start().await;
        let mut listener = join(addr, &registry, "listener").await;
        let mut talker = join(addr, &registry, "talker").await;
        listener.recv().await;

        talker.send("   ").await;
        talker.send("\t").await;
        talker.send("").await;
        talker.send("real").await;

        assert_eq!(listener.recv().await, "[talker]: real");
    }

    #[tokio::test]
    async fn test_leave_is_announced() {
        let (addr, registry) = start().await;
        let mut alice = join(addr, &registry, "alice").await;
        let bob = join(addr, &registry, "bob").await;
        alice.recv().await;

        drop(bob);

        assert_eq!(alice.recv().await, "User bob left the chat");
        wait_for_members(&registry, 1).await;
    }

    #[tokio::test]
    async fn test_disconnect_during_handshake_is_silent() {
        let (addr, registry) = start().await;
        let mut alice = join(addr, &registry, "alice").await;

        let silent = TcpStream::connect(addr).await.unwrap();
        drop(silent);

        let mut partial = TcpStream::connect(addr).await.unwrap();
        partial.write_all(b"eve").await.unwrap();
        drop(partial);

        alice.assert_quiet().await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_exit_is_an_ordinary_message() {
        let (addr, registry) = start().await;
        let mut alice = join(addr, &registry, "alice").await;
        let mut gina = join(addr, &registry, "gina").await;
        alice.recv().await;

        gina.send("exit").await;

        assert_eq!(alice.recv().await, "[gina]: exit");
    }

    #[tokio::test]
    async fn test_concurrent_senders_each_deliver_everything() {
        const SENDERS: [&str; 3] = ["ann", "ben", "cat"];
        const PER_SENDER: usize = 200;

        let (addr, registry) = start().await;
        let mut clients = Vec::new();
        for name in SENDERS {
            clients.push(join(addr, &registry, name).await);
        }
        // Drain join notices for later arrivals.
        for (i, client) in clients.iter_mut().enumerate() {
            for _ in i + 1..SENDERS.len() {
                client.recv().await;
            }
        }

        let mut iter = clients.into_iter();
        let (mut a, mut b, mut c) = (
            iter.next().unwrap(),
            iter.next().unwrap(),
            iter.next().unwrap(),
        );
        async fn burst(writer: &mut OwnedWriteHalf, count: usize) {
            for n in 0..count {
                writer.write_all(format!("{}\n", n).as_bytes()).await.unwrap();
            }
        }
        tokio::join!(
            burst(&mut a.writer, PER_SENDER),
            burst(&mut b.writer, PER_SENDER),
            burst(&mut c.writer, PER_SENDER),
        );

        for (me, client) in SENDERS.iter().zip([&mut a, &mut b, &mut c]) {
            let mut next_from = std::collections::HashMap::new();
            for _ in 0..PER_SENDER * (SENDERS.len() - 1) {
                let line = client.recv().await;
                let (sender, n) = line
                    .strip_prefix('[')
                    .and_then(|rest| rest.split_once("]: "))
                    .unwrap();
                assert_ne!(sender, *me, "self-echo to {}", me);

                let expected = next_from.entry(sender.to_string()).or_insert(0usize);
                assert_eq!(n.parse::<usize>().unwrap(), *expected);
                *expected += 1;
            }
            assert_eq!(next_from.len(), SENDERS.len() - 1);
            assert!(next_from.values().all(|&count| count == PER_SENDER));
            client.assert_quiet().await;
        }
    }

    #[tokio::test]
    async fn test_burst_reaches_reader_without_gaps() {
        const LINES: usize = 2000;

        let (addr, registry) = start().await;
        let mut reader = join(addr, &registry, "reader").await;
        let mut talker = join(addr, &registry, "talker").await;
        assert_eq!(reader.recv().await, "> User talker joined");

        let burst: String = (0..LINES).map(|n| format!("{}\n", n)).collect();
        talker.writer.write_all(burst.as_bytes()).await.unwrap();

        for n in 0..LINES {
            assert_eq!(reader.recv().await, format!("[talker]: {}", n));
        }
        reader.assert_quiet().await;
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_reader_does_not_stall_others() {
        let (addr, registry) = start_with(RelayConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            write_timeout: Duration::from_millis(100),
        })
        .await;
        let mut reader = join(addr, &registry, "reader").await;
        // Joins and then never reads.
        let _idle = join(addr, &registry, "idle").await;
        let mut talker = join(addr, &registry, "talker").await;
        assert_eq!(reader.recv().await, "> User idle joined");
        assert_eq!(reader.recv().await, "> User talker joined");

        for n in 0..50 {
            talker.send(&format!("msg {}", n)).await;
            assert_eq!(reader.recv().await, format!("[talker]: msg {}", n));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stalled_reader_is_detached() {
        const LINES: usize = 400;
        const LINE_BYTES: usize = 64 * 1024;

        let (addr, registry) = start_with(RelayConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            write_timeout: Duration::from_millis(500),
        })
        .await;
        let mut reader = join(addr, &registry, "reader").await;
        // Joins and then never reads, so its socket buffers fill up.
        let _stalled = join(addr, &registry, "stalled").await;
        let TestClient {
            lines: _talker_lines,
            writer: mut talker_writer,
        } = join(addr, &registry, "talker").await;
        assert_eq!(reader.recv().await, "> User stalled joined");
        assert_eq!(reader.recv().await, "> User talker joined");

        let sending = tokio::spawn(async move {
            let payload = "x".repeat(LINE_BYTES);
            for _ in 0..LINES {
                talker_writer.write_all(payload.as_bytes()).await.unwrap();
                talker_writer.write_all(b"\n").await.unwrap();
            }
            talker_writer
        });

        let mut chat = 0;
        let mut stalled_left = false;
        while chat < LINES || !stalled_left {
            let line = reader.recv().await;
            if line == "User stalled left the chat" {
                stalled_left = true;
            } else {
                assert_eq!(line.len(), "[talker]: ".len() + LINE_BYTES);
                chat += 1;
            }
        }
        let _talker_writer = sending.await.unwrap();

        wait_for_members(&registry, 2).await;
    }
}
