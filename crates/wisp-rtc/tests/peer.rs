use webrtc::track::track_local::TrackLocal;
use wisp_common::{Error, IceServer};
use wisp_rtc::{RtcPeer, StaticMediaSource};
use wisp_signal::{
    parse_link_header, MediaSource, PeerConnection, RelayServerDiscovery, Role, SdpType,
};

#[tokio::test]
async fn test_subscriber_offer_requests_receive_only_media() {
    let peer = RtcPeer::new(&[]).await.unwrap();
    Role::Subscriber
        .prepare::<RtcPeer>(&peer, 2, Vec::new())
        .await
        .unwrap();

    let offer = peer.create_offer().await.unwrap();
    assert_eq!(offer.sdp_type, SdpType::Offer);
    assert_eq!(offer.sdp.matches("m=video").count(), 2);
    assert_eq!(offer.sdp.matches("m=audio").count(), 1);
    assert_eq!(offer.sdp.matches("a=recvonly").count(), 3);

    peer.close().await.unwrap();
}

#[tokio::test]
async fn test_relay_servers_are_reported_as_installed() {
    let initial = vec![IceServer::new("stun:stun.example.com:3478")];
    let peer = RtcPeer::new(&initial).await.unwrap();
    assert_eq!(peer.ice_servers().await, initial);

    // Reinstalling the construction-time list is a no-op.
    peer.set_ice_servers(initial.clone()).await.unwrap();
    assert_eq!(peer.ice_servers().await, initial);

    let relay = vec![IceServer::new("turn:turn.example.com:3478").with_credentials("u", "p")];
    peer.set_ice_servers(relay.clone()).await.unwrap();
    assert_eq!(peer.ice_servers().await, relay);

    peer.close().await.unwrap();
}

#[tokio::test]
async fn test_link_header_servers_install_on_unconfigured_peer() {
    let peer = RtcPeer::new(&[]).await.unwrap();
    let discovered = parse_link_header(
        r#"<turn:turn.example.com>; rel="ice-server"; username="u"; credential="p""#,
    );

    assert!(RelayServerDiscovery::apply(&peer, discovered).await.unwrap());
    assert_eq!(
        peer.ice_servers().await,
        vec![IceServer::new("turn:turn.example.com").with_credentials("u", "p")]
    );

    peer.close().await.unwrap();
}

#[tokio::test]
async fn test_link_header_ignored_when_servers_configured() {
    let configured = vec![IceServer::new("stun:stun.example.com:3478")];
    let peer = RtcPeer::new(&configured).await.unwrap();
    let discovered = parse_link_header(r#"<turn:turn.example.com>; rel="ice-server""#);

    assert!(!RelayServerDiscovery::apply(&peer, discovered).await.unwrap());
    assert_eq!(peer.ice_servers().await, configured);

    peer.close().await.unwrap();
}

#[tokio::test]
async fn test_publisher_offer_carries_local_tracks() {
    let peer = RtcPeer::new(&[]).await.unwrap();
    let tracks = StaticMediaSource::new(true, true).acquire().await.unwrap();
    assert_eq!(tracks.len(), 2);

    Role::Publisher.prepare(&peer, 1, tracks).await.unwrap();
    let offer = peer.create_offer().await.unwrap();
    assert!(offer.sdp.contains("m=video"));
    assert!(offer.sdp.contains("m=audio"));
    assert!(!offer.sdp.contains("a=recvonly"));

    peer.close().await.unwrap();
}

#[tokio::test]
async fn test_static_source_track_kinds() {
    let source = StaticMediaSource::new(false, true);
    let tracks = source.acquire().await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].id(), "audio");
    assert!(source.video_track().is_none());
    assert!(source.audio_track().is_some());

    let err = StaticMediaSource::new(false, false).acquire().await.err().expect("expected MediaAccess error");
    assert!(matches!(err, Error::MediaAccess(_)));
}
