//! Terminal viewer: follows the live board over the relay's WebSocket and
//! forwards done-toggles through the action bridge.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, warn};

use super::board::{ActionSink, Board};
use super::bridge::ActionBridge;
use crate::event::IssueEvent;

/// Detaches bridge calls so the viewer loop never blocks on the network.
/// A failed close surfaces as an error log; softer failures are handled
/// inside the bridge.
struct BridgeSink {
    bridge: Arc<ActionBridge>,
}

impl ActionSink for BridgeSink {
    fn close_requested(&mut self, iid: u64) {
        let bridge = Arc::clone(&self.bridge);
        tokio::spawn(async move {
            if let Err(error) = bridge.toggle(iid, true).await {
                error!(iid, %error, "close request failed");
            }
        });
    }

    fn reopen_requested(&mut self, iid: u64) {
        let bridge = Arc::clone(&self.bridge);
        tokio::spawn(async move {
            if let Err(error) = bridge.toggle(iid, false).await {
                error!(iid, %error, "reopen dispatch failed");
            }
        });
    }
}

/// Derive the WebSocket endpoint from the relay's HTTP base URL.
fn ws_url(server: &str) -> String {
    let base = server.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws}/ws")
}

/// Connect to a running relay and follow the board until EOF or `quit`.
///
/// Commands on stdin: `toggle <iid>` flips a row's done control the way a
/// checkbox click would; `quit` exits.
pub async fn run(server: &str) -> Result<()> {
    let url = ws_url(server);
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let mut board = Board::new();
    let mut sink = BridgeSink {
        bridge: Arc::new(ActionBridge::new(server)),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render(&board);

    loop {
        tokio::select! {
            message = socket.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<IssueEvent>(text.as_str()) {
                            Ok(event) => {
                                board.apply(&event, &mut sink);
                                render(&board);
                            }
                            Err(error) => warn!(%error, "dropping undecodable event"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "websocket error");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        if !handle_command(line.trim(), &mut board, &mut sink) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Returns `false` when the viewer should exit.
fn handle_command(line: &str, board: &mut Board, sink: &mut dyn ActionSink) -> bool {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        [] => true,
        ["quit"] | ["q"] => false,
        ["toggle", iid] => {
            match iid.parse::<u64>() {
                Ok(iid) => {
                    if !board.toggle(iid, sink) {
                        println!("no such issue: {iid}");
                    }
                }
                Err(_) => println!("usage: toggle <iid>"),
            }
            render(board);
            true
        }
        _ => {
            println!("commands: toggle <iid> | quit");
            true
        }
    }
}

fn render(board: &Board) {
    println!();
    println!("{}", style(" done  iid   title - description").bold());
    for row in board.rows() {
        let mark = if row.done() { "[x]" } else { "[ ]" };
        let line = format!(" {mark}   #{:<4} {} - {}", row.iid, row.title, row.description);
        if row.muted() {
            println!("{}", style(line).dim());
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        closes: Vec<u64>,
        reopens: Vec<u64>,
    }

    impl ActionSink for RecordingSink {
        fn close_requested(&mut self, iid: u64) {
            self.closes.push(iid);
        }

        fn reopen_requested(&mut self, iid: u64) {
            self.reopens.push(iid);
        }
    }

    #[test]
    fn ws_url_swaps_schemes() {
        assert_eq!(ws_url("http://127.0.0.1:8080"), "ws://127.0.0.1:8080/ws");
        assert_eq!(ws_url("https://relay.example.com/"), "wss://relay.example.com/ws");
        assert_eq!(ws_url("relay.example.com"), "ws://relay.example.com/ws");
    }

    #[test]
    fn quit_command_stops_the_loop() {
        let mut board = Board::new();
        let mut sink = RecordingSink::default();
        assert!(!handle_command("quit", &mut board, &mut sink));
        assert!(!handle_command("q", &mut board, &mut sink));
        assert!(handle_command("", &mut board, &mut sink));
    }

    #[test]
    fn toggle_command_reaches_the_sink() {
        let mut board = Board::new();
        let mut sink = RecordingSink::default();
        board.apply(
            &IssueEvent::Snapshot(vec![crate::relay::gitlab::GitLabIssue {
                iid: 5,
                title: "T".to_string(),
                description: None,
                state: "opened".to_string(),
                author: None,
                extra: serde_json::Map::new(),
            }]),
            &mut sink,
        );

        assert!(handle_command("toggle 5", &mut board, &mut sink));
        assert_eq!(sink.closes, vec![5]);
    }

    #[test]
    fn malformed_toggle_is_tolerated() {
        let mut board = Board::new();
        let mut sink = RecordingSink::default();
        assert!(handle_command("toggle five", &mut board, &mut sink));
        assert!(handle_command("toggle", &mut board, &mut sink));
        assert!(sink.closes.is_empty() && sink.reopens.is_empty());
    }
}
