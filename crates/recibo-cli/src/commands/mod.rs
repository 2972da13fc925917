//! Subcommands and the engine setup they share.

pub mod batch;
pub mod config;
pub mod correct;
pub mod patterns;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use recibo_core::pdf;
use recibo_core::{
    DocumentInput, LocalStore, OpenAiBackend, OpenAiSettings, ReceiptEngine, ReciboConfig,
};

/// Extensions sent to the vision extractor.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tiff", "tif", "bmp"];

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recibo")
        .join("config.json")
}

/// Load the explicit config file, else the default one when present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ReciboConfig> {
    if let Some(path) = config_path {
        return ReciboConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {path}"));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        return Ok(ReciboConfig::from_file(&default_path)?);
    }
    Ok(ReciboConfig::default())
}

/// Open the store and attach escalation backends.
pub fn open_engine(config: ReciboConfig) -> anyhow::Result<ReceiptEngine> {
    let backend = escalation_backend(&config)?;

    let store = Arc::new(
        LocalStore::open(&config.store.path)
            .with_context(|| format!("Failed to open store {}", config.store.path.display()))?,
    );
    let mut engine = ReceiptEngine::with_local_store(config, store);

    if let Some(backend) = backend {
        engine = engine
            .with_text_escalation(backend.clone())
            .with_vision_escalation(backend);
    }

    Ok(engine)
}

/// Open the engine and seed default patterns into a sparse store.
pub fn build_engine(config: ReciboConfig) -> anyhow::Result<ReceiptEngine> {
    let engine = open_engine(config)?;

    let seeded = engine.reseed_if_needed()?;
    if seeded > 0 {
        info!(seeded, "Seeded default patterns");
    }

    Ok(engine)
}

fn escalation_backend(config: &ReciboConfig) -> anyhow::Result<Option<Arc<OpenAiBackend>>> {
    if !config.escalation.enabled {
        debug!("Escalation disabled");
        return Ok(None);
    }

    let api = &config.escalation.api;
    let Ok(api_key) = std::env::var(&api.api_key_env) else {
        warn!(env = %api.api_key_env, "Escalation enabled but no API key set, using patterns only");
        return Ok(None);
    };

    let backend = OpenAiBackend::new(OpenAiSettings {
        base_url: api.base_url.clone(),
        api_key,
        text_model: api.text_model.clone(),
        vision_model: api.vision_model.clone(),
        temperature: api.temperature,
    })?;
    Ok(Some(Arc::new(backend)))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Whether the file is something `load_document` can read.
pub fn is_supported(path: &Path) -> bool {
    let extension = extension_of(path);
    extension == "txt" || extension == "pdf" || IMAGE_EXTENSIONS.contains(&extension.as_str())
}

fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = fs::read(path)?;
    image::guess_format(&data)
        .with_context(|| format!("Unrecognized image format: {}", path.display()))?;
    Ok(data)
}

/// Build the engine input for a receipt file.
///
/// `.txt` is recognized text, `.pdf` goes through text extraction and images
/// become vision input with optional recognized text from `text_path`.
pub fn load_document(
    path: &Path,
    image_path: Option<&Path>,
    text_path: Option<&Path>,
) -> anyhow::Result<DocumentInput> {
    let extension = extension_of(path);

    let mut input = match extension.as_str() {
        "txt" => DocumentInput::from_text(fs::read_to_string(path)?),
        "pdf" => {
            let text = pdf::extract_text(&fs::read(path)?)?;
            if text.trim().is_empty() {
                warn!(path = %path.display(), "PDF carries no embedded text");
            }
            DocumentInput::from_text(text)
        }
        ext if IMAGE_EXTENSIONS.contains(&ext) => {
            let text = text_path.map(fs::read_to_string).transpose()?.unwrap_or_default();
            DocumentInput::from_text(text).with_image(read_image(path)?)
        }
        _ => anyhow::bail!("Unsupported file format: {}", path.display()),
    };

    if let Some(image_path) = image_path {
        input = input.with_image(read_image(image_path)?);
    }

    Ok(input.with_source_id(path.display().to_string()))
}
