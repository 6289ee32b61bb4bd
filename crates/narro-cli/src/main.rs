//! narro CLI: article-to-audio server.
//!
//! ```text
//! narro serve [--port 3000] [--host 127.0.0.1] [--provider elevenlabs|local]
//! narro save https://example.com/post [--server http://localhost:3000]
//! narro health [--server ...]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use narro_lib::narro_core::types::{
    ElevenLabsConfig, FetchSettings, LocalTtsConfig, RenderSettings, ServerConfig, SynthConfig,
};
use narro_lib::pipeline::Pipeline;

const DEFAULT_LOG_FILTER: &str = "narro=info,narro_lib=info,tower_http=info";

/// narro: turn web articles into narrated audio
#[derive(Parser)]
#[command(name = "narro", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    /// ElevenLabs HTTP API
    Elevenlabs,
    /// Local synthesis executable
    Local,
}

#[derive(Subcommand)]
enum Command {
    /// Start the narro HTTP server
    Serve(ServeArgs),
    /// Ask a running server to narrate a URL
    Save {
        /// Page to narrate
        url: String,
        /// Server URL
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,
    },
    /// Check that a server is up
    Health {
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,
    },
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Listen port
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,
    /// Listen host
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,
    /// Static root; audio is written to and served from `<dir>/audio`
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,
    /// Externally visible base URL used in `audioUrl` (defaults to the request Host)
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,
    /// Speech synthesis provider
    #[arg(long, env = "TTS_PROVIDER", value_enum, default_value = "elevenlabs")]
    provider: Provider,
    #[arg(long, env = "ELEVENLABS_API_KEY", default_value = "", hide_env_values = true)]
    elevenlabs_api_key: String,
    #[arg(long, env = "ELEVENLABS_VOICE_ID", default_value = "21m00Tcm4TlvDq8ikWAM")]
    elevenlabs_voice_id: String,
    #[arg(long, env = "ELEVENLABS_MODEL_ID", default_value = "eleven_multilingual_v2")]
    elevenlabs_model_id: String,
    #[arg(long, env = "ELEVENLABS_BASE_URL", default_value = "https://api.elevenlabs.io")]
    elevenlabs_base_url: String,
    /// Local synthesis executable
    #[arg(long, env = "LOCAL_TTS_BIN", default_value = "tts")]
    local_tts_bin: PathBuf,
    /// Model name passed to the local executable
    #[arg(long, env = "LOCAL_TTS_MODEL", default_value = "tts_models/en/ljspeech/vits")]
    local_tts_model: String,
    /// Chromium executable (searched for when unset)
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,
    /// Navigation timeout for the headless renderer
    #[arg(long, default_value = "90")]
    navigation_timeout_secs: u64,
    /// Best-effort wait for network idle after navigation
    #[arg(long, default_value = "3")]
    idle_timeout_secs: u64,
}

impl ServeArgs {
    fn synth_config(&self) -> SynthConfig {
        match self.provider {
            Provider::Elevenlabs => SynthConfig::Remote(ElevenLabsConfig {
                api_key: self.elevenlabs_api_key.clone(),
                voice_id: self.elevenlabs_voice_id.clone(),
                model_id: self.elevenlabs_model_id.clone(),
                base_url: self.elevenlabs_base_url.clone(),
                ..Default::default()
            }),
            Provider::Local => SynthConfig::Local(LocalTtsConfig {
                executable: self.local_tts_bin.clone(),
                model: self.local_tts_model.clone(),
            }),
        }
    }

    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            executable: self.chrome_path.clone(),
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            public_dir: self.public_dir.clone(),
            public_url: self.public_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Save { url, server } => {
            let resp = reqwest::Client::new()
                .post(format!("{server}/save"))
                .json(&serde_json::json!({ "url": url }))
                .send()
                .await;
            print_response(resp).await
        }
        Command::Health { server } => {
            let resp = reqwest::Client::new()
                .get(format!("{server}/health"))
                .send()
                .await;
            print_response(resp).await
        }
    }
}

async fn serve(args: ServeArgs) -> ExitCode {
    let config = args.server_config();
    let synth = args.synth_config();
    if let SynthConfig::Remote(remote) = &synth {
        if remote.api_key.is_empty() {
            warn!("ELEVENLABS_API_KEY is not set; /save will fail at synthesis");
        }
    }

    let audio_dir = config.audio_dir();
    if let Err(e) = tokio::fs::create_dir_all(&audio_dir).await {
        error!("cannot create audio directory {}: {e}", audio_dir.display());
        return ExitCode::FAILURE;
    }

    let pipeline = match Pipeline::standard(
        args.render_settings(),
        &FetchSettings::default(),
        &synth,
        &audio_dir,
    ) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("cannot build pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };

    let app = narro_lib::server::router(pipeline, &config);
    let addr = format!("{}:{}", args.host, args.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("narro listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn print_response(resp: Result<reqwest::Response, reqwest::Error>) -> ExitCode {
    match resp {
        Ok(resp) => {
            let ok = resp.status().is_success();
            println!("{}", resp.text().await.unwrap_or_default());
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("request failed: {e}");
            ExitCode::FAILURE
        }
    }
}
