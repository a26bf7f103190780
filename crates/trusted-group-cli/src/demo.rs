/// Demo scenario: one owner, N members, one outsider, all sharing an
/// in-memory ledger. Each member obtains the token and broadcasts once.
use trusted_group::{
    AccountId, ClientEvent, GroupClient, GroupError, GroupToken, InMemoryLedger, TokenStatus,
};

use crate::events::{emit, EventStep, EventSummary};

pub struct DemoConfig {
    pub members: usize,
    pub message: String,
    pub token: GroupToken,
}

pub async fn run(config: DemoConfig) -> anyhow::Result<EventSummary> {
    let owner_id = AccountId::new("owner")?;
    let ledger = InMemoryLedger::new(owner_id.clone());
    let mut owner = GroupClient::connect(ledger.clone(), owner_id, Some(config.token)).await?;

    // ── Add members ────────────────────────────────────────────────
    tracing::info!("demo: adding {} members", config.members);
    let mut members = Vec::with_capacity(config.members);
    for i in 1..=config.members {
        let id = AccountId::new(format!("member-{i}"))?;
        owner.add_member(id.clone()).await?;
        emit(&EventStep::ok(owner.local_id(), "addMember", id.as_str()));
        members.push(GroupClient::connect(ledger.clone(), id, None).await?);
    }

    // ── Key exchange ───────────────────────────────────────────────
    tracing::info!("demo: key exchange");
    for member in &mut members {
        let seq = member.request_token().await?;
        emit(&EventStep::ok(member.local_id(), "requestToken", seq.to_string()));
    }
    for event in owner.sync().await? {
        report(&owner, event);
    }
    for member in &mut members {
        for event in member.sync().await? {
            report(member, event);
        }
    }

    // ── Outsider ───────────────────────────────────────────────────
    tracing::info!("demo: outsider requests the token");
    let mut outsider = GroupClient::connect(ledger.clone(), AccountId::new("outsider")?, None).await?;
    let outsider_refused = match outsider.request_token().await {
        Err(e @ GroupError::PermissionDenied { .. }) => {
            emit(&EventStep::failed(outsider.local_id(), "requestToken", e.to_string()));
            true
        }
        Err(e) => return Err(e.into()),
        Ok(seq) => {
            emit(&EventStep::ok(outsider.local_id(), "requestToken", seq.to_string()));
            false
        }
    };

    // ── Broadcasts ─────────────────────────────────────────────────
    tracing::info!("demo: broadcasting {:?}", config.message);
    for member in &members {
        match member.send_message(&config.message).await {
            Ok(seq) => emit(&EventStep::ok(member.local_id(), "communicate", seq.to_string())),
            Err(e) => emit(&EventStep::failed(member.local_id(), "communicate", e.to_string())),
        }
    }

    for event in owner.sync().await? {
        report(&owner, event);
    }
    for member in &mut members {
        for event in member.sync().await? {
            report(member, event);
        }
    }

    let token_holders = members
        .iter()
        .filter(|m| m.token_status() == TokenStatus::HasToken)
        .count();
    let messages_per_reader = std::iter::once(owner.messages().len())
        .chain(members.iter().map(|m| m.messages().len()))
        .collect();

    let summary = EventSummary {
        event: "summary",
        members: owner.members().await?.len(),
        token_holders,
        messages_per_reader,
        outsider_refused,
    };
    emit(&summary);
    tracing::info!("demo: done, {token_holders} token holders");

    Ok(summary)
}

fn report(client: &GroupClient<InMemoryLedger>, event: ClientEvent) {
    let actor = client.local_id();
    let step = match event {
        ClientEvent::TokenRequestAnswered {
            requester,
            sequence_id,
        } => EventStep::ok(actor, "sendToken", format!("{requester} {sequence_id}")),
        ClientEvent::TokenInstalled => EventStep::ok(actor, "installToken", "group token cached"),
        ClientEvent::TokenUnwrapFailed { reason } => {
            EventStep::failed(actor, "installToken", reason)
        }
        ClientEvent::MessageReceived(msg) => EventStep::ok(
            actor,
            "receive",
            format!("{} {}: {}", msg.sequence_id, msg.sender, msg.text),
        ),
        ClientEvent::Notice { description } => EventStep::failed(actor, "notice", description),
        other => EventStep::ok(actor, "event", format!("{other:?}")),
    };
    emit(&step);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_member_reads_every_broadcast() {
        let summary = run(DemoConfig {
            members: 3,
            message: "hello".into(),
            token: GroupToken::from_passphrase("Secure Group Token").unwrap(),
        })
        .await
        .unwrap();

        assert_eq!(summary.members, 4);
        assert_eq!(summary.token_holders, 3);
        assert_eq!(summary.messages_per_reader, vec![3, 3, 3, 3]);
        assert!(summary.outsider_refused);
    }

    #[tokio::test]
    async fn owner_alone_still_refuses_outsider() {
        let summary = run(DemoConfig {
            members: 0,
            message: "hello".into(),
            token: GroupToken::generate(),
        })
        .await
        .unwrap();

        assert_eq!(summary.members, 1);
        assert_eq!(summary.token_holders, 0);
        assert_eq!(summary.messages_per_reader, vec![0]);
        assert!(summary.outsider_refused);
    }
}
