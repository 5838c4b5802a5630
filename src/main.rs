//! ジェスチャークライアント。ランドマークストリームを監視して認識結果を表示し、
//! 記録セッションとジェスチャールールのコマンドをコンソールで受け付ける

use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gesture_client::app::{AppContext, Command, Reply, HELP};
use gesture_client::backend::{Backend, HttpBackend};
use gesture_client::config::{Config, LoggingConfig};
use gesture_client::connection::{ConnectionManager, TokioTimer, WsTransport};
use gesture_client::recognition::RecognitionState;
use gesture_client::render::OverlayStyle;
use gesture_client::rules::Confirm;

const DEFAULT_CONFIG_PATH: &str = "gesture_client.toml";

#[derive(Parser, Debug)]
#[command(name = "gesture-client", about = "Gesture recognition and exercise recording client")]
struct Cli {
    /// Config file (defaults are used when it does not exist)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override [server] api_url
    #[arg(long)]
    api_url: Option<String>,

    /// Override [server] stream_url
    #[arg(long)]
    stream_url: Option<String>,
}

fn init_logging(config: &LoggingConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("failed to create log dir {}", config.dir))?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = Path::new(&config.dir).join(format!("gesture_client_{ts}.log"));
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(path)
}

/// コンソールで y/N を確認する
struct StdinConfirm<'a> {
    lines: &'a mut Lines<BufReader<Stdin>>,
}

impl Confirm for StdinConfirm<'_> {
    async fn confirm(&mut self, prompt: &str) -> bool {
        println!("{prompt} [y/N]");
        match self.lines.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim(), "y" | "Y" | "yes"),
            _ => false,
        }
    }
}

#[cfg(feature = "desktop")]
fn spawn_window(app: &AppContext<HttpBackend>) -> Result<()> {
    use gesture_client::render::skeleton::{CANVAS_HEIGHT, CANVAS_WIDTH};
    use gesture_client::render::MinifbRenderer;
    use std::time::Duration;

    let mut window = MinifbRenderer::new("Gesture Client", CANVAS_WIDTH, CANVAS_HEIGHT)?;
    let renderer = app.renderer();
    tokio::task::spawn_local(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(33));
        while window.is_open() {
            tick.tick().await;
            let result = {
                let renderer = renderer.borrow();
                let video = renderer.video();
                let video = video.borrow();
                window.present(&video, renderer.overlay())
            };
            if let Err(e) = result {
                warn!("[window] update failed: {e:#}");
                break;
            }
        }
        info!("[window] closed");
    });
    Ok(())
}

#[cfg(not(feature = "desktop"))]
fn spawn_window(_app: &AppContext<HttpBackend>) -> Result<()> {
    warn!("[window] render.window is set but this build has no desktop feature");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let backend = Rc::new(HttpBackend::new(&config.server.api_url, config.server.request_timeout())?);
    match backend.health().await {
        Ok(health) => info!(status = %health.status, "[health] backend reachable"),
        Err(e) => warn!("[health] backend unreachable: {e}"),
    }

    let style = OverlayStyle {
        marker_radius: config.render.marker_radius,
        line_width: config.render.line_width,
    };
    let mut app = AppContext::new(Rc::clone(&backend), RecognitionState::new(config.recognition.ordering), style);
    if let Err(e) = app.rules_mut().load_mappings().await {
        warn!("[rules] {e}");
    }

    let mut manager = ConnectionManager::new(
        WsTransport::new(config.server.stream_url.as_str()),
        TokioTimer,
        config.stream.reconnect_delay(),
    );
    app.attach(&mut manager);
    tokio::task::spawn_local(async move { manager.run().await });

    if config.render.window {
        spawn_window(&app)?;
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e:#}");
                continue;
            }
        };
        let mut confirm = StdinConfirm { lines: &mut lines };
        match app.execute(command, &mut confirm).await {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            Err(e) => println!("error: {e:#}"),
        }
    }
    info!("shutting down");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(url) = cli.api_url {
        config.server.api_url = url;
    }
    if let Some(url) = cli.stream_url {
        config.server.stream_url = url;
    }

    let log_path = init_logging(&config.logging)?;
    info!("Gesture Client ({})", env!("GIT_VERSION"));
    info!(log = %log_path.display(), config = %cli.config.display(), "[config] loaded");
    info!(
        "[config] api_url={}, stream_url={}, ordering={:?}",
        config.server.api_url, config.server.stream_url, config.recognition.ordering
    );

    LocalSet::new().run_until(run(config)).await
}
