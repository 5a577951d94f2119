use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use signtalk::capture::{
    Camera, DeviceError, IntervalScheduler, ReplayCamera, ReplayExtractor, VideoFrame,
};
use signtalk::{
    create_router, run_event_loop, AppState, CaptureParts, ChatClient, ClientOptions, Config,
    HttpChatBackend, Identity, MessageChannel, NatsTransport,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "signtalk", version, about = "Sign-language chat client")]
struct Cli {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/signtalk")]
    config: String,

    /// Override the signed-in user
    #[arg(long)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the relay and serve the local control API
    Serve,
    /// List friends
    Friends,
    /// Search users by name or member id
    Search {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        member_id: Option<String>,
    },
}

/// Stand-in when no capture source is configured; arming always fails
struct NoCamera;

#[async_trait::async_trait]
impl Camera for NoCamera {
    async fn open(&self) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable(
            "no capture source configured".to_string(),
        ))
    }

    async fn read_frame(&self) -> Result<VideoFrame, DeviceError> {
        Err(DeviceError::Disconnected("no capture source".to_string()))
    }

    fn release(&self) {}

    fn name(&self) -> &str {
        "none"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let identity = Identity::new(cli.identity.unwrap_or_else(|| cfg.user.identity.clone()));
    if identity.as_str().is_empty() {
        bail!("No identity configured, set user.identity or pass --identity");
    }

    info!("SignTalk v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let backend = Arc::new(HttpChatBackend::new(
        cfg.backend.base_url.clone(),
        cfg.backend.request_timeout(),
    )?);

    match cli.command {
        Command::Serve => serve(cfg, identity, backend).await,
        Command::Friends => {
            for friend in backend.list_friends(&identity).await? {
                println!("{}\t{}", friend.user_id, friend.user_name);
            }
            Ok(())
        }
        Command::Search { name, member_id } => {
            let users = backend
                .search_users(&identity, name.as_deref(), member_id.as_deref())
                .await?;
            for user in users {
                println!("{}\t{}\t{}", user.member_no, user.member_id, user.user_name);
            }
            Ok(())
        }
    }
}

async fn serve(cfg: Config, identity: Identity, backend: Arc<HttpChatBackend>) -> Result<()> {
    let transport = NatsTransport::connect(
        &cfg.channel.nats_url,
        &cfg.channel.subject_prefix,
        identity.clone(),
    )
    .await?;

    let channel = MessageChannel::new(Arc::new(transport));

    let camera: Arc<dyn Camera> = match &cfg.capture.replay_path {
        Some(path) => Arc::new(ReplayCamera::new(path)),
        None => {
            warn!("No capture source configured, capture will be unavailable");
            Arc::new(NoCamera)
        }
    };

    let (client, events) = ChatClient::new(
        identity,
        Arc::clone(&channel),
        backend,
        CaptureParts {
            camera,
            extractor: Arc::new(ReplayExtractor),
            schedulers: IntervalScheduler::factory(cfg.capture.frames_per_second),
        },
        ClientOptions {
            resolve_timeout: cfg.backend.request_timeout(),
            auto_send_final: cfg.recognition.auto_send_final,
            display_name: cfg.user.display_name.clone(),
        },
    );

    channel.open().await?;

    let client = Arc::new(Mutex::new(client));
    tokio::spawn(run_event_loop(Arc::clone(&client), events));

    let app = create_router(AppState::new(Arc::clone(&client)));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Control API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    client.lock().await.shutdown().await;

    Ok(())
}
