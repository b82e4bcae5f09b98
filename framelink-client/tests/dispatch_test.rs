//! Integration tests for the client send pipeline
//!
//! Each test runs a full in-process loop: the client dispatcher on one side,
//! a host-page task plus a real `HostSigner` behind the signing-endpoint
//! seam on the other.

mod support;

use std::sync::Arc;
use std::time::Duration;

use framelink_client::{
    inbound_channel, ChannelTransport, ClientError, ClientSlot, RateLimitConfig,
};
use framelink_signer::{HostKeyMaterial, HostSigner};
use framelink_wire::RequestBody;
use support::{client_config, spawn_host, HostOptions, LocalEndpoint};
use tokio::sync::mpsc;

struct Loop {
    // The slot owns the client lifecycle; keep it alive for the test body
    _slot: ClientSlot,
    endpoint: Arc<LocalEndpoint>,
    seen: mpsc::UnboundedReceiver<RequestBody>,
}

async fn start(
    options: HostOptions,
    configure: impl FnOnce(&mut framelink_client::ClientConfig),
) -> anyhow::Result<(Loop, Arc<framelink_client::PluginClient>)> {
    let signer = Arc::new(HostSigner::new(HostKeyMaterial::generate()));
    let endpoint = LocalEndpoint::new(Arc::clone(&signer));

    let (transport, outbound_rx) = ChannelTransport::new();
    let (inbound_tx, inbound_rx) = inbound_channel();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    spawn_host(
        Arc::clone(&signer),
        outbound_rx,
        inbound_tx,
        seen_tx,
        options,
    );

    let mut config = client_config(&signer);
    configure(&mut config);

    let slot = ClientSlot::new();
    let client = slot
        .initialize(config, Arc::new(transport), inbound_rx, endpoint.clone())
        .await?;

    Ok((
        Loop {
            _slot: slot,
            endpoint,
            seen: seen_rx,
        },
        client,
    ))
}

#[tokio::test]
async fn test_user_info_resolves_typed_payload() {
    let (harness, client) = start(HostOptions::default(), |_| {}).await.unwrap();

    let envelope = client.user_info().await.unwrap();
    assert_eq!(envelope.data.id, "u1");
    assert_eq!(envelope.data.name, "Ann");
    assert!(envelope.data.roles.is_empty());

    // The raw response is carried for independent re-verification
    assert!(envelope.raw.contains(r#""requestId""#));
    // Exactly the one signed read consulted the signing endpoint
    assert_eq!(harness.endpoint.calls(), 1);
}

#[tokio::test]
async fn test_signed_reads_decode_their_views() {
    let (_harness, client) = start(HostOptions::default(), |_| {}).await.unwrap();

    let community = client.community_info().await.unwrap();
    assert_eq!(community.data.title, "Rustaceans");
    assert_eq!(community.data.roles, vec!["r9".to_string()]);

    let friends = client.user_friends(10, 0).await.unwrap();
    assert_eq!(friends.data.friends.len(), 1);
    assert_eq!(friends.data.friends[0].name, "Bo");
}

#[tokio::test]
async fn test_context_established_by_init() {
    let (mut harness, client) = start(HostOptions::default(), |_| {}).await.unwrap();

    let context = client.context_data().unwrap();
    assert_eq!(context.plugin_id, "p1");
    assert_eq!(context.user_id, "u1");
    assert_eq!(context.assignable_roles, vec!["r9".to_string()]);

    // The handshake was a safe request, not a signed one
    let first = harness.seen.recv().await.unwrap();
    assert!(matches!(first, RequestBody::Safe { .. }));
    assert_eq!(harness.endpoint.calls(), 0);
}

#[tokio::test]
async fn test_give_role_uses_action_category() {
    let (mut harness, client) = start(HostOptions::default(), |_| {}).await.unwrap();

    client.give_role("r9", "u2").await.unwrap();

    let mut saw_action = false;
    while let Ok(body) = harness.seen.try_recv() {
        if let RequestBody::Action { data, .. } = body {
            assert_eq!(
                serde_json::to_value(&data).unwrap(),
                serde_json::json!({ "type": "giveRole", "roleId": "r9", "userId": "u2" })
            );
            saw_action = true;
        }
    }
    assert!(saw_action);
    assert_eq!(harness.endpoint.calls(), 1);
}

#[tokio::test]
async fn test_navigate_skips_signing_endpoint_and_ignores_duplicates() {
    let options = HostOptions {
        duplicate_responses: true,
        ..HostOptions::default()
    };
    let (harness, client) = start(options, |_| {}).await.unwrap();

    let envelope = client.navigate("/page").await.unwrap();
    assert_eq!(envelope.data["ok"], true);
    assert_eq!(harness.endpoint.calls(), 0);

    // The duplicate delivery was dropped without disturbing the pump;
    // later operations still resolve
    let user = client.user_info().await.unwrap();
    assert_eq!(user.data.id, "u1");
}

#[tokio::test]
async fn test_invalid_signature_rejects_the_call() {
    let options = HostOptions {
        corrupt_after_init: true,
        ..HostOptions::default()
    };
    let (_harness, client) = start(options, |_| {}).await.unwrap();

    let err = client.user_info().await.unwrap_err();
    assert!(matches!(err, ClientError::SignatureInvalid));
}

#[tokio::test]
async fn test_remote_error_shape_rejects_with_message() {
    let options = HostOptions {
        remote_errors: true,
        ..HostOptions::default()
    };
    let (_harness, client) = start(options, |_| {}).await.unwrap();

    let err = client.user_info().await.unwrap_err();
    match err {
        ClientError::Remote(message) => assert_eq!(message, "operation refused"),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_redispatches_then_times_out() {
    let options = HostOptions {
        ignore_safe_after_init: true,
        ..HostOptions::default()
    };
    let (mut harness, client) = start(options, |_| {}).await.unwrap();
    // Drain the init handshake
    let _ = harness.seen.recv().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = client.navigate("/page").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ClientError::Timeout { attempts: 3 }));
    // Redispatched at ~2000ms and ~4000ms, rejected at ~6000ms
    assert!(elapsed >= Duration::from_millis(6000));
    assert!(elapsed < Duration::from_millis(6500));

    let mut navigate_posts = 0;
    while let Ok(body) = harness.seen.try_recv() {
        if matches!(body, RequestBody::Safe { .. }) {
            navigate_posts += 1;
        }
    }
    assert_eq!(navigate_posts, 3);
}

#[tokio::test]
async fn test_rate_ceiling_denies_without_dispatching() {
    let (mut harness, client) = start(HostOptions::default(), |config| {
        config.rate = RateLimitConfig {
            ceiling: 2,
            window: Duration::from_secs(60),
        };
    })
    .await
    .unwrap();

    // init consumed one admission, this navigate the second
    client.navigate("/a").await.unwrap();

    let err = client.navigate("/b").await.unwrap_err();
    assert!(matches!(err, ClientError::RateLimited));

    // Only init and the first navigate ever reached the wire
    let mut posts = 0;
    while harness.seen.try_recv().is_ok() {
        posts += 1;
    }
    assert_eq!(posts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_frames_from_wrong_origin_are_dropped() {
    let options = HostOptions {
        origin: Some("https://host.example".to_string()),
        origin_after_init: Some("https://evil.example".to_string()),
        ..HostOptions::default()
    };
    let (_harness, client) = start(options, |config| {
        config.host_origin = Some("https://host.example".to_string());
    })
    .await
    .unwrap();

    // Every response now arrives from the wrong origin and is silently
    // dropped, so the request runs out of retry attempts
    let err = client.navigate("/page").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { attempts: 3 }));
}
