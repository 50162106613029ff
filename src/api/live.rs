//! Live tally updates over a WebSocket.
//!
//! Each connection is one observer. It joins and leaves election rooms with
//! JSON frames, and is sent a `voteUpdate` frame for every vote committed in a
//! room it is in.

use rocket::{
    futures::{Sink, SinkExt, StreamExt},
    serde::json,
    Route, State,
};
use rocket_ws::{result::Error as WsError, Channel, Message, WebSocket};

use crate::{
    broadcast::{Broadcaster, ObserverId},
    config::Config,
    model::api::live::{ClientFrame, ServerFrame},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![live]
}

#[get("/live")]
fn live(
    ws: WebSocket,
    broadcaster: &State<Broadcaster>,
    store: &State<Store>,
    config: &State<Config>,
) -> Channel<'static> {
    let broadcaster = broadcaster.inner().clone();
    let store = store.inner().clone();
    let capacity = config.observer_buffer();

    ws.channel(move |stream| {
        Box::pin(async move {
            let (observer, mut updates) = broadcaster.connect(capacity);
            let (mut sink, mut source) = stream.split();

            let result = loop {
                rocket::tokio::select! {
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let reply = handle_frame(&text, observer, &broadcaster, &store).await;
                            if let Err(e) = send(&mut sink, &reply).await {
                                break Err(e);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break Ok(()),
                        // Pings are answered by the protocol layer.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break Err(e),
                    },
                    delta = updates.recv() => match delta {
                        Some(delta) => {
                            if let Err(e) = send(&mut sink, &delta.into()).await {
                                break Err(e);
                            }
                        }
                        None => break Ok(()),
                    },
                }
            };

            broadcaster.disconnect(observer);
            if let Err(ref e) = result {
                debug!("Observer {observer} dropped: {e}");
            }
            result
        })
    })
}

async fn send<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), WsError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match json::to_string(frame) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(e) => {
            error!("Failed to encode live frame: {e}");
            Ok(())
        }
    }
}

/// Apply one frame from an observer and produce the reply.
async fn handle_frame(
    text: &str,
    observer: ObserverId,
    broadcaster: &Broadcaster,
    store: &Store,
) -> ServerFrame {
    let frame: ClientFrame = match json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            return ServerFrame::Error {
                message: format!("Malformed frame: {e}"),
            }
        }
    };

    match frame {
        ClientFrame::JoinElection { election_id } => {
            match store.election(election_id.into()).await {
                Ok(Some(_)) => {
                    broadcaster.join(observer, election_id.into());
                    ServerFrame::Joined { election_id }
                }
                Ok(None) => ServerFrame::Error {
                    message: "Election not found".to_string(),
                },
                Err(e) => {
                    error!("Failed to look up election {election_id}: {e}");
                    ServerFrame::Error {
                        message: "Internal server error".to_string(),
                    }
                }
            }
        }
        ClientFrame::LeaveElection { election_id } => {
            broadcaster.leave(observer, election_id.into());
            ServerFrame::Left { election_id }
        }
    }
}
