//! Scripted lircd stand-in for integration tests.
//!
//! Listens on a loopback port, answers `VERSION`, `LIST`, `LIST <remote>` and
//! `SEND_ONCE` from an in-memory inventory, records every `SEND_ONCE` and can
//! broadcast `SIGHUP` to all connected clients.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lirc_gateway::infrastructure::lirc_conn::{LircConnectionConfig, ReconnectPolicy};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};

#[derive(Default)]
struct State {
    remotes: BTreeMap<String, Vec<String>>,
    sent: Vec<String>,
    /// Close the connection instead of answering `LIST <remote>`.
    drop_on_list: Option<String>,
    connections: usize,
}

pub struct FakeLircd {
    pub port: u16,
    state: Arc<Mutex<State>>,
    sighup: broadcast::Sender<()>,
}

impl FakeLircd {
    pub async fn start(remotes: &[(&str, &[&str])]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let (sighup, _) = broadcast::channel(8);

        let fake = Self {
            port,
            state: Arc::clone(&state),
            sighup: sighup.clone(),
        };
        fake.set_remotes(remotes).await;

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                state.lock().await.connections += 1;
                tokio::spawn(serve(stream, Arc::clone(&state), sighup.subscribe()));
            }
        });
        fake
    }

    pub async fn set_remotes(&self, remotes: &[(&str, &[&str])]) {
        self.state.lock().await.remotes = remotes
            .iter()
            .map(|(remote, commands)| {
                (
                    remote.to_string(),
                    commands.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect();
    }

    pub async fn drop_on_list(&self, remote: Option<&str>) {
        self.state.lock().await.drop_on_list = remote.map(str::to_string);
    }

    /// Every `SEND_ONCE` line received so far.
    pub async fn sent(&self) -> Vec<String> {
        self.state.lock().await.sent.clone()
    }

    pub async fn connections(&self) -> usize {
        self.state.lock().await.connections
    }

    pub fn broadcast_sighup(&self) {
        let _ = self.sighup.send(());
    }

    /// Connection settings with short timings suited to tests.
    pub fn config(&self) -> LircConnectionConfig {
        LircConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                multiplier: 2,
                max_retries: 0,
            },
        }
    }
}

fn block(command: &str, status: &str, data: &[String]) -> String {
    let mut out = format!("BEGIN\n{command}\n{status}\n");
    if !data.is_empty() {
        out.push_str(&format!("DATA\n{}\n", data.len()));
        for line in data {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("END\n");
    out
}

async fn serve(stream: TcpStream, state: Arc<Mutex<State>>, mut sighup: broadcast::Receiver<()>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => return,
            },
            Ok(()) = sighup.recv() => {
                if writer.write_all(b"BEGIN\nSIGHUP\nEND\n").await.is_err() {
                    return;
                }
                continue;
            }
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        let reply = {
            let mut state = state.lock().await;
            match words.as_slice() {
                ["VERSION"] => block(&line, "SUCCESS", &["0.10.1".to_string()]),
                ["LIST"] => {
                    let remotes: Vec<String> = state.remotes.keys().cloned().collect();
                    block(&line, "SUCCESS", &remotes)
                }
                ["LIST", remote] => {
                    if state.drop_on_list.as_deref() == Some(*remote) {
                        return;
                    }
                    match state.remotes.get(*remote) {
                        Some(commands) => {
                            let data: Vec<String> = commands
                                .iter()
                                .enumerate()
                                .map(|(i, c)| format!("{:016x} {c}", i + 1))
                                .collect();
                            block(&line, "SUCCESS", &data)
                        }
                        None => block(&line, "ERROR", &[format!("unknown remote: \"{remote}\"")]),
                    }
                }
                ["SEND_ONCE", _, _] => {
                    state.sent.push(line.clone());
                    block(&line, "SUCCESS", &[])
                }
                _ => block(&line, "ERROR", &[format!("unknown directive: \"{line}\"")]),
            }
        };

        if writer.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
