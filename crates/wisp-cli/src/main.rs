//! Wisp CLI: run WHIP/WHEP sessions from the command line.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::track::track_remote::TrackRemote;

use wisp_rtc::{RtcPeer, StaticMediaSource};
use wisp_signal::{
    parse_link_header, ClientConfig, IceServer, Role, SessionEvent, StreamPairing, StreamSink,
    WhipClient,
};

#[derive(Parser, Debug)]
#[command(name = "wisp")]
#[command(about = "WHIP/WHEP signaling client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish local media to a WHIP endpoint
    Publish(SessionArgs),

    /// Play a stream from a WHEP endpoint
    Subscribe(SessionArgs),

    /// Send and receive media over one session
    Duplex(SessionArgs),

    /// Print the relay servers advertised by a Link header value as JSON
    ParseLink {
        /// Header value, e.g. '<turn:turn.example.com>; rel="ice-server"; username="u"'
        header: String,
    },

    /// Show version information
    Version,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct SessionArgs {
    /// Signaling endpoint URL
    #[arg(long, env = "WISP_ENDPOINT_URL")]
    endpoint: Option<String>,

    /// Bearer token sent with every signaling request
    #[arg(long, env = "WISP_AUTH_TOKEN")]
    token: Option<String>,

    /// STUN/TURN server URL (repeatable or comma separated)
    #[arg(long = "ice-server", env = "WISP_ICE_SERVERS", value_delimiter = ',')]
    ice_servers: Vec<String>,

    /// Number of video layers to request when receiving
    #[arg(long)]
    simulcast: Option<u8>,

    /// JSON client configuration; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not send video
    #[arg(long, default_value = "false")]
    no_video: bool,

    /// Do not send audio
    #[arg(long, default_value = "false")]
    no_audio: bool,
}

impl SessionArgs {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<ClientConfig>(&text)
                    .with_context(|| format!("invalid client config in {}", path.display()))?
            }
            None => {
                let endpoint = self
                    .endpoint
                    .clone()
                    .ok_or_else(|| anyhow!("--endpoint or --config is required"))?;
                ClientConfig::new(endpoint)
            }
        };

        if let Some(endpoint) = &self.endpoint {
            config.endpoint_url = endpoint.clone();
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        let servers: Vec<IceServer> = self
            .ice_servers
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(IceServer::new)
            .collect();
        if !servers.is_empty() {
            config.ice_servers = servers;
        }
        if let Some(simulcast) = self.simulcast {
            config.simulcast = simulcast;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Drains paired remote tracks and logs packet counts.
struct LoggingSink;

impl StreamSink<Arc<TrackRemote>> for LoggingSink {
    fn render(&self, pairing: &StreamPairing<Arc<TrackRemote>>) {
        let index = pairing.index;
        let tracks = std::iter::once(&pairing.video).chain(pairing.audio.iter());
        for track in tracks {
            let remote = Arc::clone(&track.handle);
            let kind = track.kind;
            tokio::spawn(async move {
                let mut packets = 0u64;
                while let Ok((packet, _)) = remote.read_rtp().await {
                    packets += 1;
                    if packets % 500 == 0 {
                        debug!(
                            "Stream {} {}: {} RTP packets (last {} bytes)",
                            index,
                            kind,
                            packets,
                            packet.payload.len()
                        );
                    }
                }
                info!("Stream {} {} ended after {} packets", index, kind, packets);
            });
        }
    }
}

async fn run_session(role: Role, args: SessionArgs) -> Result<()> {
    let config = args.client_config()?;
    let peer = Arc::new(RtcPeer::new(&config.ice_servers).await?);

    let mut client = WhipClient::new(config, role, peer)?;
    if role.sends_media() {
        client = client.with_media_source(StaticMediaSource::new(!args.no_video, !args.no_audio));
    }
    if role.receives_media() {
        client = client.with_sink(Arc::new(LoggingSink));
    }

    let mut events = client.events();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::ResponseError(response) => warn!(
                    "Endpoint answered {}: {}",
                    response.status,
                    response.body.trim()
                ),
                SessionEvent::TrackPaired(pairing) => {
                    info!(
                        "Playing stream {} ({})",
                        pairing.index,
                        pairing.stream_id().unwrap_or("-")
                    )
                }
                SessionEvent::ConnectionState(state) => info!("Connection {}", state),
            }
        }
    });

    if !client.start().await? {
        client.stop().await?;
        return Err(anyhow!("{} session was not started", role));
    }
    if let Some(url) = client.session_url().await {
        println!("Session: {}", url);
    }

    info!("Press Ctrl+C to end the session");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    client.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    wisp_common::init_tracing();

    let args = Args::parse();

    match args.command {
        Command::Publish(session) => run_session(Role::Publisher, session).await?,
        Command::Subscribe(session) => run_session(Role::Subscriber, session).await?,
        Command::Duplex(session) => run_session(Role::Duplex, session).await?,
        Command::ParseLink { header } => {
            let servers = parse_link_header(&header);
            println!("{}", serde_json::to_string_pretty(&servers)?);
        }
        Command::Version => {
            println!("wisp {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
