/// The client event loop.
///
/// A single task owns the `GroupClient` and multiplexes the poll timer
/// with application commands. Handlers run to completion before the next
/// one starts, so local state needs no locking.
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::ledger::Ledger;
use crate::GroupError;

use super::{ClientEvent, GroupClient, RuntimeCommand, RuntimeConfig};

pub(super) async fn runtime_loop<L: Ledger>(
    mut client: GroupClient<L>,
    config: RuntimeConfig,
    mut cmd_rx: mpsc::Receiver<RuntimeCommand>,
    event_tx: mpsc::Sender<ClientEvent>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // ── 1. Poll the log ─────────────────────────────────
            _ = poll.tick() => {
                match client.sync().await {
                    Ok(events) => {
                        for event in events {
                            let _ = event_tx.send(event).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("{}: poll failed: {e}", client.local_id());
                        let _ = event_tx.send(notice("log unavailable", &e)).await;
                    }
                }
            }

            // ── 2. Application commands ─────────────────────────
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    RuntimeCommand::AddMember { id } => {
                        let event = match client.add_member(id.clone()).await {
                            Ok(()) => ClientEvent::MemberAdded { id },
                            Err(e) => notice("addMember refused", &e),
                        };
                        let _ = event_tx.send(event).await;
                    }
                    RuntimeCommand::RequestToken => {
                        let event = match client.request_token().await {
                            Ok(sequence_id) => ClientEvent::TokenRequested { sequence_id },
                            Err(e) => notice("requestToken refused", &e),
                        };
                        let _ = event_tx.send(event).await;
                    }
                    RuntimeCommand::SendMessage { text } => {
                        let event = match client.send_message(&text).await {
                            Ok(sequence_id) => ClientEvent::MessageSent { sequence_id },
                            Err(e) => notice("message not sent", &e),
                        };
                        let _ = event_tx.send(event).await;
                    }
                    RuntimeCommand::GetMessages { reply } => {
                        let _ = reply.send(client.messages().to_vec());
                    }
                    RuntimeCommand::GetTokenStatus { reply } => {
                        let _ = reply.send(client.token_status());
                    }
                    RuntimeCommand::Shutdown => break,
                }
            }
        }
    }

    tracing::debug!("{}: runtime stopped", client.local_id());
}

fn notice(context: &str, error: &GroupError) -> ClientEvent {
    ClientEvent::Notice {
        description: format!("{context}: {error}"),
    }
}
