/// Integration test: spawned client runtimes.
///
/// Owner and member each run on their own task, polling a shared
/// `InMemoryLedger`. The application only talks to `RuntimeHandle` and
/// reads `ClientEvent`s.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use trusted_group::{
    AccountId, ClientEvent, GroupClient, GroupRuntime, GroupToken, InMemoryLedger, RuntimeConfig,
    TokenStatus,
};

fn account(name: &str) -> AccountId {
    AccountId::new(name).unwrap()
}

fn config() -> RuntimeConfig {
    RuntimeConfig::default().poll_interval(Duration::from_millis(10))
}

/// Wait for the first event matching `pred`, skipping others.
async fn recv_until<F>(events: &mut mpsc::Receiver<ClientEvent>, pred: F) -> ClientEvent
where
    F: Fn(&ClientEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("runtime stopped"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn spawned_runtimes_exchange_token_and_messages() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let ledger = InMemoryLedger::new(account("owner"));
    let owner = GroupClient::connect(
        ledger.clone(),
        account("owner"),
        Some(GroupToken::from_passphrase("Secure Group Token").unwrap()),
    )
    .await
    .unwrap();
    let mut owner_rt = GroupRuntime::spawn(owner, config());

    owner_rt.handle.add_member(account("bob")).await;
    let added = recv_until(&mut owner_rt.events, |e| {
        matches!(e, ClientEvent::MemberAdded { .. })
    })
    .await;
    assert_eq!(added, ClientEvent::MemberAdded { id: account("bob") });

    let bob = GroupClient::connect(ledger.clone(), account("bob"), None)
        .await
        .unwrap();
    let mut bob_rt = GroupRuntime::spawn(bob, config());

    bob_rt.handle.request_token().await;
    recv_until(&mut bob_rt.events, |e| {
        matches!(e, ClientEvent::TokenRequested { .. })
    })
    .await;

    recv_until(&mut owner_rt.events, |e| {
        matches!(e, ClientEvent::TokenRequestAnswered { .. })
    })
    .await;
    recv_until(&mut bob_rt.events, |e| *e == ClientEvent::TokenInstalled).await;
    assert_eq!(
        bob_rt.handle.token_status().await,
        Some(TokenStatus::HasToken)
    );

    bob_rt.handle.send_message("hello").await;
    let received = recv_until(&mut owner_rt.events, |e| {
        matches!(e, ClientEvent::MessageReceived(_))
    })
    .await;
    let ClientEvent::MessageReceived(msg) = received else {
        unreachable!();
    };
    assert_eq!(msg.text, "hello");
    assert_eq!(msg.sender, account("bob"));

    let owner_messages = owner_rt.handle.messages().await;
    assert_eq!(owner_messages.len(), 1);

    owner_rt.handle.shutdown().await;
    bob_rt.handle.shutdown().await;
    owner_rt.join.await.unwrap();
    bob_rt.join.await.unwrap();
}

#[tokio::test]
async fn refused_calls_surface_as_notices() {
    let ledger = InMemoryLedger::new(account("owner"));
    let carol = GroupClient::connect(ledger.clone(), account("carol"), None)
        .await
        .unwrap();
    let mut carol_rt = GroupRuntime::spawn(carol, config());

    carol_rt.handle.request_token().await;
    let notice = recv_until(&mut carol_rt.events, |e| {
        matches!(e, ClientEvent::Notice { .. })
    })
    .await;
    let ClientEvent::Notice { description } = notice else {
        unreachable!();
    };
    assert!(description.contains("permission denied"));

    carol_rt.handle.send_message("hi").await;
    let notice = recv_until(&mut carol_rt.events, |e| {
        matches!(e, ClientEvent::Notice { .. })
    })
    .await;
    assert!(matches!(notice, ClientEvent::Notice { description } if description.contains("no group token")));

    assert_eq!(
        carol_rt.handle.token_status().await,
        Some(TokenStatus::NoToken)
    );
    carol_rt.handle.shutdown().await;
    carol_rt.join.await.unwrap();
}

#[tokio::test]
async fn unreachable_ledger_reports_and_recovers() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let ledger = InMemoryLedger::new(account("owner"));
    let owner = GroupClient::connect(ledger.clone(), account("owner"), None)
        .await
        .unwrap();
    let mut owner_rt = GroupRuntime::spawn(owner, config());

    ledger.set_reachable(false);
    recv_until(&mut owner_rt.events, |e| {
        matches!(e, ClientEvent::Notice { description } if description.contains("unreachable"))
    })
    .await;

    ledger.set_reachable(true);
    owner_rt.handle.send_message("back").await;
    recv_until(&mut owner_rt.events, |e| {
        matches!(e, ClientEvent::MessageReceived(m) if m.text == "back")
    })
    .await;

    owner_rt.handle.shutdown().await;
    owner_rt.join.await.unwrap();
}

#[tokio::test]
async fn dropping_handle_stops_runtime() {
    let ledger = InMemoryLedger::new(account("owner"));
    let owner = GroupClient::connect(ledger, account("owner"), None)
        .await
        .unwrap();
    let channels = GroupRuntime::spawn(owner, config());

    drop(channels.handle);
    timeout(Duration::from_secs(5), channels.join)
        .await
        .expect("runtime did not stop")
        .unwrap();
}
