use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::TryOnError;

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// An image ready to be sent inline to the backend: MIME type plus base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`.
    ///
    /// The MIME type runs up to the last `;base64,` marker. Both halves must be
    /// non-empty and the string may not contain line terminators.
    pub fn parse_data_url(raw: &str) -> Result<Self, TryOnError> {
        if raw.contains(['\n', '\r', '\u{2028}', '\u{2029}']) {
            return Err(TryOnError::Format(
                "data URL must be a single line".to_string(),
            ));
        }
        let Some(rest) = raw.strip_prefix(DATA_URL_SCHEME) else {
            return Err(TryOnError::Format(
                "expected a data: URL scheme".to_string(),
            ));
        };
        let Some((mime_type, data)) = rest.rsplit_once(BASE64_MARKER) else {
            return Err(TryOnError::Format(
                "missing ';base64,' separator".to_string(),
            ));
        };
        if mime_type.is_empty() {
            return Err(TryOnError::Format("missing MIME type".to_string()));
        }
        if data.is_empty() {
            return Err(TryOnError::Format("missing base64 payload".to_string()));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_SCHEME}{}{BASE64_MARKER}{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, TryOnError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| TryOnError::Format(format!("payload is not valid base64: {err}")))
    }

    /// SHA-256 of the encoded payload, hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.mime_type.as_bytes());
        hasher.update(b":");
        hasher.update(self.data.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Which workflow input an asset fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    Person,
    Garment,
}

/// Where an asset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    Upload { path: PathBuf },
    Capture { locator: Option<String> },
    Synthesized { item_name: String },
}

impl AssetSource {
    pub fn label(&self) -> String {
        match self {
            Self::Upload { path } => path.to_string_lossy().to_string(),
            Self::Capture { locator: Some(locator) } => format!("3D capture of {locator}"),
            Self::Capture { locator: None } => "3D capture".to_string(),
            Self::Synthesized { item_name } => format!("recommended {item_name}"),
        }
    }
}

/// A user-facing image together with its encoded payload.
///
/// Assets are replaced, never edited: the payload is fixed at construction
/// and always matches the bytes it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    source: AssetSource,
    payload: InlineImage,
}

impl ImageAsset {
    pub fn from_bytes(source: AssetSource, bytes: &[u8], hint: Option<&Path>) -> Self {
        let mime_type = sniff_mime(bytes, hint);
        Self {
            source,
            payload: InlineImage::from_bytes(bytes, mime_type),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Self::from_bytes(
            AssetSource::Upload {
                path: path.to_path_buf(),
            },
            &bytes,
            Some(path),
        ))
    }

    pub fn from_data_url(source: AssetSource, raw: &str) -> Result<Self, TryOnError> {
        let payload = InlineImage::parse_data_url(raw.trim())?;
        payload.decode()?;
        Ok(Self { source, payload })
    }

    pub fn from_inline(source: AssetSource, payload: InlineImage) -> Result<Self, TryOnError> {
        payload.decode()?;
        Ok(Self { source, payload })
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn payload(&self) -> &InlineImage {
        &self.payload
    }

    /// Display handle for the asset.
    pub fn preview_url(&self) -> String {
        self.payload.to_data_url()
    }
}

pub fn sniff_mime(bytes: &[u8], hint: Option<&Path>) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    hint.and_then(mime_for_path)
        .unwrap_or("image/png")
        .to_string()
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}
