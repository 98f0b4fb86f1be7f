//! End-to-end tests of the client facade with a mock peer connection.

mod common;

use axum::http::Method;
use std::sync::{Arc, Mutex};

use common::{wait_until, within, Behaviour, FakeEndpoint};
use wisp_signal::mock::{MockMediaSource, MockPeer, MockTrack};
use wisp_signal::{
    sdp_fragment, ClientConfig, ConnectionState, IceCandidate, IceServer, MediaKind,
    PeerConnection, PeerEvent, RemoteTrack, Role, SessionEvent, SessionState, StreamPairing,
    StreamSink, WhipClient,
};

#[derive(Default)]
struct RecordingSink {
    rendered: Mutex<Vec<(usize, String, Option<String>)>>,
}

impl RecordingSink {
    fn rendered(&self) -> Vec<(usize, String, Option<String>)> {
        self.rendered.lock().unwrap().clone()
    }
}

impl StreamSink<()> for RecordingSink {
    fn render(&self, pairing: &StreamPairing<()>) {
        self.rendered.lock().unwrap().push((
            pairing.index,
            pairing.video.id.clone(),
            pairing.audio.as_ref().map(|a| a.id.clone()),
        ));
    }
}

fn remote(id: &str, kind: MediaKind, streams: &[&str]) -> RemoteTrack<()> {
    RemoteTrack {
        id: id.to_string(),
        kind,
        stream_ids: streams.iter().map(|s| s.to_string()).collect(),
        handle: (),
    }
}

fn config_for(endpoint: &FakeEndpoint) -> ClientConfig {
    ClientConfig::new(endpoint.url("/whep/live"))
}

#[tokio::test]
async fn test_subscriber_adds_receive_transceivers() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let config = config_for(&endpoint).with_simulcast(3);
    let client = WhipClient::new(config, Role::Subscriber, Arc::clone(&peer)).unwrap();

    assert!(client.start().await.unwrap());
    assert_eq!(client.state(), SessionState::Negotiated);
    assert_eq!(
        peer.transceivers(),
        vec![
            MediaKind::Video,
            MediaKind::Video,
            MediaKind::Video,
            MediaKind::Audio
        ]
    );
    assert!(peer.tracks().is_empty());
    assert!(peer.has_sink());
}

#[tokio::test]
async fn test_publisher_without_media_sends_nothing() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Publisher, Arc::clone(&peer))
        .unwrap()
        .with_media_source(MockMediaSource::denied());

    assert!(!client.start().await.unwrap());
    assert_eq!(client.state(), SessionState::Idle);
    assert!(endpoint.requests().is_empty());
    assert_eq!(peer.offers_created(), 0);
}

#[tokio::test]
async fn test_publisher_attaches_local_tracks() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let tracks = vec![MockTrack::video("cam"), MockTrack::audio("mic")];
    let client = WhipClient::new(config_for(&endpoint), Role::Publisher, Arc::clone(&peer))
        .unwrap()
        .with_media_source(MockMediaSource::granted(tracks.clone()));

    assert!(client.start().await.unwrap());
    assert_eq!(peer.tracks(), tracks);
    assert!(peer.transceivers().is_empty());
    assert_eq!(endpoint.requests_with(Method::POST).len(), 1);
}

#[tokio::test]
async fn test_duplex_receives_and_sends() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Duplex, Arc::clone(&peer))
        .unwrap()
        .with_media_source(MockMediaSource::granted(vec![MockTrack::video("cam")]));

    assert!(client.start().await.unwrap());
    assert_eq!(peer.transceivers(), vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(peer.tracks(), vec![MockTrack::video("cam")]);
}

#[tokio::test]
async fn test_duplex_without_media_sends_nothing() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Duplex, Arc::clone(&peer))
        .unwrap()
        .with_media_source(MockMediaSource::denied());

    assert!(!client.start().await.unwrap());
    assert_eq!(client.state(), SessionState::Idle);
    assert!(endpoint.requests().is_empty());
    assert!(peer.transceivers().is_empty());
    assert!(peer.tracks().is_empty());
    assert_eq!(peer.offers_created(), 0);
}

#[tokio::test]
async fn test_engine_candidates_are_trickled() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer)).unwrap();

    assert!(client.start().await.unwrap());

    let host = IceCandidate::new("candidate:1 1 udp 2130706431 192.0.2.1 50000 typ host")
        .with_mid("0")
        .with_ufrag("wisp");
    assert!(peer.emit(PeerEvent::Candidate(Some(host.clone()))));
    assert!(peer.emit(PeerEvent::Candidate(None)));

    let patches = within(endpoint.wait_for_patches(1)).await;
    assert_eq!(patches[0].path, "/session/abc123");
    assert_eq!(patches[0].body, sdp_fragment(&host));

    // End of gathering never reaches the wire.
    client.stop().await.unwrap();
    assert_eq!(endpoint.patches().len(), 1);
}

#[tokio::test]
async fn test_remote_tracks_are_paired_in_arrival_order() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let sink = Arc::new(RecordingSink::default());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer))
        .unwrap()
        .with_sink(Arc::clone(&sink) as Arc<dyn StreamSink<()>>);
    let mut events = client.events();

    assert!(client.start().await.unwrap());

    // Video is held back until audio shows up.
    peer.emit(PeerEvent::Track(remote("v0", MediaKind::Video, &[])));
    peer.emit(PeerEvent::Track(remote("v1", MediaKind::Video, &["s1"])));
    peer.emit(PeerEvent::Track(remote("v2", MediaKind::Video, &["s2"])));
    peer.emit(PeerEvent::Track(remote("a1", MediaKind::Audio, &["s1"])));
    peer.emit(PeerEvent::Track(remote("v3", MediaKind::Video, &["s3"])));

    let mut paired = Vec::new();
    while paired.len() < 3 {
        match within(events.recv()).await {
            Some(SessionEvent::TrackPaired(pairing)) => paired.push(pairing),
            Some(_) => continue,
            None => panic!("event stream closed"),
        }
    }

    let summary: Vec<(usize, &str, Option<&str>)> = paired
        .iter()
        .map(|p| {
            (
                p.index,
                p.video.id.as_str(),
                p.audio.as_ref().map(|a| a.id.as_str()),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![(0, "v1", Some("a1")), (1, "v2", None), (2, "v3", None)]
    );

    assert_eq!(
        sink.rendered(),
        vec![
            (0, "v1".to_string(), Some("a1".to_string())),
            (1, "v2".to_string(), None),
            (2, "v3".to_string(), None),
        ]
    );
    assert_eq!(client.pairings().len(), 3);
}

#[tokio::test]
async fn test_audio_first_joins_stream_zero() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer)).unwrap();

    assert!(client.start().await.unwrap());

    peer.emit(PeerEvent::Track(remote("a", MediaKind::Audio, &["s"])));
    peer.emit(PeerEvent::Track(remote("v", MediaKind::Video, &["s"])));

    within(wait_until(|| client.pairings().len() == 1)).await;
    let pairings = client.pairings();
    let pairing = &pairings[0];
    assert_eq!(pairing.index, 0);
    assert_eq!(pairing.video.id, "v");
    assert_eq!(pairing.audio.as_ref().map(|a| a.id.as_str()), Some("a"));
    assert_eq!(pairing.stream_id(), Some("s"));
}

#[tokio::test]
async fn test_connection_state_is_forwarded() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer)).unwrap();
    let mut events = client.events();

    assert!(client.start().await.unwrap());
    peer.emit(PeerEvent::ConnectionState(ConnectionState::Connected));

    loop {
        match within(events.recv()).await {
            Some(SessionEvent::ConnectionState(state)) => {
                assert_eq!(state, ConnectionState::Connected);
                break;
            }
            Some(_) => continue,
            None => panic!("event stream closed"),
        }
    }
}

#[tokio::test]
async fn test_stop_tears_down_and_closes_peer() {
    let endpoint = FakeEndpoint::start(Behaviour::default()).await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer)).unwrap();

    assert!(client.start().await.unwrap());
    client.stop().await.unwrap();

    assert!(peer.is_closed());
    assert_eq!(client.state(), SessionState::Closed);
    let deletes = endpoint.requests_with(Method::DELETE);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, "/session/abc123");
}

#[tokio::test]
async fn test_configured_servers_win_over_link_header() {
    let endpoint = FakeEndpoint::start(Behaviour {
        links: vec![r#"<turn:relay.example>; rel="ice-server"; username="u"; credential="p""#.into()],
        ..Default::default()
    })
    .await;
    let peer = Arc::new(MockPeer::new());
    let configured = vec![IceServer::new("stun:stun.example:3478")];
    let config = config_for(&endpoint).with_ice_servers(configured.clone());
    let client = WhipClient::new(config, Role::Subscriber, Arc::clone(&peer)).unwrap();

    assert!(client.start().await.unwrap());
    assert_eq!(peer.ice_servers().await, configured);
    assert_eq!(peer.ice_server_updates(), 1);
}

#[tokio::test]
async fn test_rejected_offer_reports_not_started() {
    let endpoint = FakeEndpoint::start(Behaviour {
        status: axum::http::StatusCode::UNAUTHORIZED,
        location: None,
        answer: String::new(),
        ..Default::default()
    })
    .await;
    let peer = Arc::new(MockPeer::new());
    let client = WhipClient::new(config_for(&endpoint), Role::Subscriber, Arc::clone(&peer)).unwrap();
    let mut events = client.events();

    assert!(!client.start().await.unwrap());
    assert_eq!(client.state(), SessionState::Failed);
    match within(events.recv()).await {
        Some(SessionEvent::ResponseError(response)) => assert_eq!(response.status, 401),
        other => panic!("expected response error, got {:?}", other),
    }
}
