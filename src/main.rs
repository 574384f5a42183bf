mod session;

use clap::{Parser, Subcommand};
use cooking_coach_lib::capture::{CameraDevice, MediaCapture, SnapshotCamera};
use cooking_coach_lib::config::{self, Settings};
use cooking_coach_lib::llm::{self, AnalysisRequest, GeminiClient};
use cooking_coach_lib::pipeline::{run_analysis, Coach};
use cooking_coach_lib::relay::{self, RelayState};
use cooking_coach_lib::speech::{self, UtteranceQueue};
use cooking_coach_lib::Stage;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cooking-coach", version, about = "AI cooking coach")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive cooking session (default)
    Session {
        /// Image file an external webcam tool keeps updating
        #[arg(long, env = "COACH_CAMERA_SNAPSHOT")]
        camera: Option<PathBuf>,

        /// Disable spoken feedback
        #[arg(long)]
        quiet: bool,
    },
    /// Analyze one image and print the normalized JSON
    Analyze {
        /// ingredients, cooking or finished
        #[arg(short, long, default_value = "ingredients")]
        stage: Stage,

        /// Image file to analyze
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Serve the analysis relay
    Relay {
        /// Address to bind (overrides settings)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check the Gemini key and endpoint with a text-only request
    Check,
    /// Save the Gemini API key to the OS keychain
    SetKey {
        /// The key; read from stdin when omitted
        key: Option<String>,
    },
    /// Print version and configuration summary
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cooking_coach_lib::init();
    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command.unwrap_or(Commands::Session {
        camera: None,
        quiet: false,
    }) {
        Commands::Session { camera, quiet } => {
            let snapshot = camera.or_else(|| settings.camera_snapshot.clone());
            let device = snapshot.map(|path| Arc::new(SnapshotCamera::new(path)) as Arc<dyn CameraDevice>);
            let capture = MediaCapture::new(device).with_jpeg_quality(settings.jpeg_quality);

            let mut coach = Coach::new(llm::resolve_backend(&settings), capture)
                .with_timeout(settings.request_timeout());
            if settings.speech_enabled && !quiet {
                coach = coach.with_speech(UtteranceQueue::spawn(
                    speech::default_speaker(),
                    settings.utterance_gap(),
                ));
            }
            session::run(coach).await?;
        }
        Commands::Analyze { stage, image } => {
            let image = MediaCapture::read_file(&image).await?;
            let backend = llm::resolve_backend(&settings);
            let request = AnalysisRequest::new(stage, image);
            let (result, path) = run_analysis(backend.as_ref(), request, settings.request_timeout()).await?;
            log::info!("[PIPELINE] Parsed via {:?}", path);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Relay { host, port } => {
            let host = host.unwrap_or_else(|| settings.relay_host.clone());
            let port = port.unwrap_or(settings.relay_port);
            let state = Arc::new(RelayState::from_settings(&settings));
            relay::serve(state, &host, port).await?;
        }
        Commands::Check => {
            let credential = config::resolve_credential();
            let Some(credential) = credential else {
                println!("No Gemini key found (GOOGLE_AI_API_KEY, GEMINI_API_KEY or keychain).");
                println!("Run `cooking-coach set-key` to store one.");
                return Ok(());
            };
            println!("Key source: {}", credential.source.as_str());
            let client = GeminiClient::from_settings(&settings, Some(credential.key));
            let report = client.ping().await?;
            println!("Model {}: HTTP {} ({})", settings.model, report.status, if report.ok { "ok" } else { "failed" });
            if !report.ok {
                println!("{}", report.response_text);
            }
        }
        Commands::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin().read_line(&mut line)?;
                    line
                }
            };
            config::save_api_key(&key)?;
            println!("Saved to the OS keychain.");
        }
        Commands::Version => {
            let credential = config::resolve_credential();
            println!("cooking-coach {}", env!("CARGO_PKG_VERSION"));
            println!("  settings:  {}", Settings::path().display());
            println!("  model:     {}", settings.model);
            match &settings.relay_url {
                Some(url) => println!("  backend:   relay ({})", url),
                None => println!("  backend:   gemini ({})", settings.api_base),
            }
            println!(
                "  api key:   {}",
                credential.as_ref().map_or("none", |c| c.source.as_str())
            );
        }
    }

    Ok(())
}
