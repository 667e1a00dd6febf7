/// Scene feed: keeps a websocket session to OBS open and forwards program
/// scene changes to the daemon event loop.
///
/// Connection settings are re-read from the shared config before every
/// attempt, so edits to `[obs]` apply on the next reconnect.
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::protocol::{self, ServerMessage};
use crate::config::{Config, ObsConfig};
use crate::event::DaemonEvent;

const CURRENT_SCENE_REQUEST_ID: &str = "scenetag-current-scene";

/// Why a session ended without an error.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// OBS closed the socket or announced shutdown.
    Closed,
    /// The event loop is gone; the feed should stop.
    ReceiverGone,
}

/// Runs until the daemon event channel closes.
pub async fn run(config: Arc<RwLock<Config>>, tx: mpsc::Sender<DaemonEvent>) {
    loop {
        let obs = config.read().await.obs.clone();
        let mut identified = false;

        match session(&obs, &tx, &mut identified).await {
            Ok(SessionEnd::ReceiverGone) => break,
            Ok(SessionEnd::Closed) => info!("OBS connection closed"),
            Err(e) => warn!("OBS connection to {} failed: {e:#}", obs.url()),
        }

        if identified && tx.send(DaemonEvent::ObsDisconnected).await.is_err() {
            break;
        }

        let delay = obs.effective_reconnect_interval();
        debug!("Reconnecting to OBS in {delay}s");
        sleep(Duration::from_secs(delay)).await;
    }
}

/// One connect → identify → listen cycle.
async fn session(
    obs: &ObsConfig,
    tx: &mpsc::Sender<DaemonEvent>,
    identified: &mut bool,
) -> Result<SessionEnd> {
    let url = obs.url();
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
    let (mut sink, mut stream) = ws.split();

    while let Some(frame) = stream.next().await {
        let text = match frame.context("Websocket read failed")? {
            Message::Text(text) => text,
            Message::Close(close) => {
                if let Some(close) = close {
                    info!(
                        code = u16::from(close.code),
                        reason = %close.reason,
                        "OBS closed the websocket"
                    );
                }
                return Ok(SessionEnd::Closed);
            }
            _ => continue,
        };

        match protocol::parse_server_message(&text)? {
            ServerMessage::Hello {
                obs_version,
                authentication,
            } => {
                debug!("OBS websocket {obs_version} says hello");
                let auth = authentication.map(|challenge| {
                    if obs.password.is_empty() {
                        warn!("OBS requires a password but none is configured");
                    }
                    protocol::compute_auth(&obs.password, &challenge.salt, &challenge.challenge)
                });
                sink.send(Message::Text(protocol::create_identify(auth)?))
                    .await
                    .context("Failed to send Identify")?;
            }
            ServerMessage::Identified => {
                *identified = true;
                info!("Connected to OBS at {url}");
                if tx.send(DaemonEvent::ObsConnected).await.is_err() {
                    return Ok(SessionEnd::ReceiverGone);
                }
                // Sync with whatever scene is live right now.
                let request = protocol::create_request(
                    protocol::GET_CURRENT_SCENE_REQUEST,
                    CURRENT_SCENE_REQUEST_ID,
                )?;
                sink.send(Message::Text(request))
                    .await
                    .context("Failed to request current scene")?;
            }
            ServerMessage::ProgramScene(name) => {
                debug!(scene = %name, "Program scene");
                if tx.send(DaemonEvent::SceneChanged(name)).await.is_err() {
                    return Ok(SessionEnd::ReceiverGone);
                }
            }
            ServerMessage::ExitStarted => {
                info!("OBS is shutting down");
                return Ok(SessionEnd::Closed);
            }
            ServerMessage::RequestFailed {
                request_type,
                code,
                comment,
            } => warn!(
                "OBS request {request_type} failed with code {code}: {}",
                comment.as_deref().unwrap_or("no comment")
            ),
            ServerMessage::Ignored => {}
        }
    }

    Ok(SessionEnd::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Fake OBS: handshake, current-scene answer, scripted scene events, exit.
    async fn fake_obs(
        scenes: Vec<&'static str>,
        expect_auth: bool,
    ) -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let auth = if expect_auth {
                r#","authentication":{"challenge":"chal","salt":"salt"}"#
            } else {
                ""
            };
            let hello = format!(r#"{{"op":0,"d":{{"obsWebSocketVersion":"5.4.2","rpcVersion":1{auth}}}}}"#);
            ws.send(Message::Text(hello)).await.unwrap();

            let identify = match ws.next().await.unwrap().unwrap() {
                Message::Text(t) => t,
                other => panic!("expected Identify, got {other:?}"),
            };
            let identify: serde_json::Value = serde_json::from_str(&identify).unwrap();
            assert_eq!(identify["op"], 1);
            if expect_auth {
                assert_eq!(
                    identify["d"]["authentication"],
                    protocol::compute_auth("secret", "salt", "chal")
                );
            }
            ws.send(Message::Text(r#"{"op":2,"d":{"negotiatedRpcVersion":1}}"#.to_string()))
                .await
                .unwrap();

            let request = match ws.next().await.unwrap().unwrap() {
                Message::Text(t) => t,
                other => panic!("expected Request, got {other:?}"),
            };
            let request: serde_json::Value = serde_json::from_str(&request).unwrap();
            assert_eq!(request["d"]["requestType"], protocol::GET_CURRENT_SCENE_REQUEST);
            ws.send(Message::Text(
                r#"{"op":7,"d":{"requestType":"GetCurrentProgramScene","requestId":"scenetag-current-scene","requestStatus":{"result":true,"code":100},"responseData":{"currentProgramSceneName":"Starting Soon"}}}"#
                    .to_string(),
            ))
            .await
            .unwrap();

            for scene in scenes {
                let event = format!(
                    r#"{{"op":5,"d":{{"eventType":"CurrentProgramSceneChanged","eventIntent":4,"eventData":{{"sceneName":"{scene}"}}}}}}"#
                );
                ws.send(Message::Text(event)).await.unwrap();
            }
            ws.send(Message::Text(
                r#"{"op":5,"d":{"eventType":"ExitStarted","eventIntent":1}}"#.to_string(),
            ))
            .await
            .unwrap();
            let _ = ws.close(None).await;
        });
        (port, handle)
    }

    fn obs_config(port: u16, password: &str) -> ObsConfig {
        ObsConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: password.to_string(),
            ..ObsConfig::default()
        }
    }

    fn drain(rx: &mut mpsc::Receiver<DaemonEvent>) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            match evt {
                DaemonEvent::ObsConnected => seen.push("connected".to_string()),
                DaemonEvent::SceneChanged(name) => seen.push(name),
                _ => seen.push("other".to_string()),
            }
        }
        seen
    }

    #[tokio::test]
    async fn session_forwards_current_and_changed_scenes() {
        let (port, server) = fake_obs(vec!["Game Capture", "Lobby"], false).await;
        let (tx, mut rx) = mpsc::channel(16);
        let mut identified = false;

        let end = session(&obs_config(port, ""), &tx, &mut identified).await.unwrap();
        server.await.unwrap();

        assert_eq!(end, SessionEnd::Closed);
        assert!(identified);
        assert_eq!(
            drain(&mut rx),
            ["connected", "Starting Soon", "Game Capture", "Lobby"]
        );
    }

    #[tokio::test]
    async fn session_answers_auth_challenge() {
        let (port, server) = fake_obs(vec![], true).await;
        let (tx, mut rx) = mpsc::channel(16);
        let mut identified = false;

        session(&obs_config(port, "secret"), &tx, &mut identified).await.unwrap();
        server.await.unwrap();

        assert!(identified);
        assert_eq!(drain(&mut rx), ["connected", "Starting Soon"]);
    }

    #[tokio::test]
    async fn session_reports_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, _rx) = mpsc::channel(1);
        let mut identified = false;
        assert!(session(&obs_config(port, ""), &tx, &mut identified).await.is_err());
        assert!(!identified);
    }

    #[tokio::test]
    async fn session_stops_when_receiver_is_gone() {
        let (port, server) = fake_obs(vec!["Game Capture"], false).await;
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let mut identified = false;

        let end = session(&obs_config(port, ""), &tx, &mut identified).await.unwrap();
        assert_eq!(end, SessionEnd::ReceiverGone);
        server.abort();
    }
}
