//! detect_once - run a single occupancy detection against a local image.
//!
//! Prints the detection response as JSON. Optionally renders the result onto
//! the parking map as SVG.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gaia_parking::config::credential_from_env;
use gaia_parking::inference::backends::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use gaia_parking::media::mime_for_upload;
use gaia_parking::{
    overlay, CameraStore, DetectInput, DetectionPipeline, GeminiBackend, GeminiConfig,
    ImagePayload, InferenceBackend, ParkingMap, StubBackend,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify parking spot occupancy in one camera frame"
)]
struct Args {
    /// Camera key from the camera profile document.
    #[arg(long)]
    camera: String,

    /// Camera frame to classify.
    #[arg(long)]
    image: PathBuf,

    /// Camera profile document.
    #[arg(long, env = "CAMERA_CONFIG_PATH", default_value = "config/cameras.json")]
    camera_config: PathBuf,

    /// Labeled reference map image.
    #[arg(
        long,
        env = "REFERENCE_IMAGE_PATH",
        default_value = "config/reference_labeled.png"
    )]
    reference_image: PathBuf,

    /// Inference base URL.
    #[arg(long, env = "GAIA_INFERENCE_URL", default_value = DEFAULT_BASE_URL)]
    inference_url: String,

    /// Inference model name.
    #[arg(long, env = "GAIA_INFERENCE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Inference timeout in seconds.
    #[arg(long, env = "GAIA_INFERENCE_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Skip the network and use this text as the model reply.
    #[arg(long)]
    stub_reply: Option<String>,

    /// Write an SVG overlay of the result to this path.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Parking map geometry used for the overlay.
    #[arg(long, env = "PARKING_MAP_PATH", default_value = "config/parking_map.json")]
    parking_map: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let backend: Arc<dyn InferenceBackend> = match &args.stub_reply {
        Some(reply) => Arc::new(StubBackend::new(reply.clone())),
        None => Arc::new(GeminiBackend::new(GeminiConfig {
            base_url: args.inference_url.clone(),
            model: args.model.clone(),
            timeout: Duration::from_secs(args.timeout_secs),
        })?),
    };
    // The stub never reads the credential.
    let credential = match &args.stub_reply {
        Some(_) => Some("stub".to_string()),
        None => credential_from_env(),
    };

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read image {}", args.image.display()))?;
    let declared = mime_guess::from_path(&args.image).first_raw();
    let image = ImagePayload::new(mime_for_upload(declared, &bytes), bytes);

    let pipeline = DetectionPipeline::new(
        Arc::new(CameraStore::new(&args.camera_config)),
        &args.reference_image,
        credential,
        backend,
    );
    let response = pipeline
        .detect(DetectInput {
            camera: Some(args.camera.clone()),
            image: Some(image),
        })?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(path) = &args.overlay {
        let map = ParkingMap::load(&args.parking_map)?;
        std::fs::write(path, overlay::render_svg(&map, &response.spots))
            .with_context(|| format!("failed to write overlay {}", path.display()))?;
        log::info!("overlay written to {}", path.display());
    }

    Ok(())
}
