use anyhow::Context as _;
use casty::Config;
use casty::audio::decode;
use casty::cache::{FsTtsCache, TtsCache};
use casty::pipeline::{ExportJob, ExportOptions, PodcastExporter, UserVoiceChoice};
use casty::speech::{AsrClient, CloningTtsClient, CloudTtsClient};
use casty::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};
use casty::transcript::{Character, Transcript};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const USAGE: &str = "usage: casty <transcript.json> <character.json> <output.mp3> [music-file]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let config = Config::from_env().context("configuration incomplete")?;

    let transcript_json = std::fs::read_to_string(&args[0])
        .with_context(|| format!("failed to read transcript {}", args[0]))?;
    let transcript =
        Transcript::from_json(&transcript_json).context("transcript JSON unreadable")?;

    let character_json = std::fs::read_to_string(&args[1])
        .with_context(|| format!("failed to read character {}", args[1]))?;
    let character: Character =
        serde_json::from_str(&character_json).context("character JSON unreadable")?;

    let background_music = match args.get(3) {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read music file {}", path))?,
        ),
        None => None,
    };

    info!(
        messages = transcript.len(),
        character = %character.name,
        "loaded export inputs"
    );

    let cloud = Arc::new(CloudTtsClient::new(
        config.cloud_tts_url.clone(),
        config.cloud_tts_backup_url.clone(),
        config.api_key.clone(),
    ));
    let cloning = Arc::new(CloningTtsClient::new(config.cloning_tts_url.clone()));
    let asr = Arc::new(AsrClient::new(config.asr_url.clone(), config.api_key.clone()));

    let store: Arc<dyn ObjectStore> = match &config.storage_url {
        Some(url) => Arc::new(HttpObjectStore::new(url.clone(), config.api_key.clone())),
        None => Arc::new(
            LocalObjectStore::new(config.storage_dir.clone())
                .context("failed to open local object store")?,
        ),
    };

    let cache =
        Arc::new(FsTtsCache::open(config.cache_dir.clone()).context("failed to open TTS cache")?);
    let evicted = cache
        .evict_older_than(Duration::from_secs(config.cache_max_age_days * 24 * 3600))
        .await;
    if evicted > 0 {
        info!(evicted, "dropped stale TTS cache entries");
    }

    let exporter = PodcastExporter::new(cloud, cloning, asr, store, cache, config.voices.clone());

    let job = ExportJob {
        transcript,
        character,
        user_voice: UserVoiceChoice::Default,
        user_voice_upload: None,
        background_music,
        options: ExportOptions {
            language: config.language.clone(),
            synthesis_concurrency: config.synthesis_concurrency,
            ..ExportOptions::default()
        },
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message("rendering podcast...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let bytes = exporter.export(job).await.context("export failed")?;

    spinner.finish_with_message("podcast rendered");

    std::fs::write(&args[2], &bytes)
        .with_context(|| format!("failed to write output {}", args[2]))?;

    let duration_ms = decode::decode_to_pipeline(&bytes)
        .map(|clip| clip.duration_ms())
        .unwrap_or(0);
    info!(
        output = %args[2],
        bytes = bytes.len(),
        duration_ms,
        "export complete"
    );

    Ok(())
}
