use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tryon_contracts::assets::InlineImage;

use crate::backend::{
    BackendRequest, BackendResponse, GenerationBackend, RequestPart, RequestPurpose,
};

const DRYRUN_IMAGE_SIZE: u32 = 256;

/// Offline backend with deterministic answers, for `--dryrun` and tests.
///
/// Garments always pass the safety check; images are flat color swatches
/// seeded from the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryrunBackend;

impl GenerationBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &BackendRequest) -> Result<BackendResponse> {
        let digest = request_digest(request);
        let mut response = BackendResponse::default();
        response
            .metadata
            .insert("endpoint".to_string(), json!("dryrun-native"));
        match request.purpose {
            RequestPurpose::SafetyCheck => {
                response.texts.push(json!({ "valid": true }).to_string());
            }
            RequestPurpose::StyleReview => {
                response.texts.push(
                    "The garment sits cleanly on the shoulders and the color lifts your complexion."
                        .to_string(),
                );
            }
            RequestPurpose::Recommendations => {
                response
                    .texts
                    .push(dryrun_recommendations(&digest).to_string());
            }
            RequestPurpose::Composite | RequestPurpose::ProductImage => {
                let (r, g, b) = (digest[0], digest[1], digest[2]);
                response.images.push(swatch_png(r, g, b)?);
            }
        }
        Ok(response)
    }
}

fn request_digest(request: &BackendRequest) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(request.purpose.as_str().as_bytes());
    for part in &request.parts {
        match part {
            RequestPart::Image(image) => hasher.update(image.data.as_bytes()),
            RequestPart::Text(text) => hasher.update(text.as_bytes()),
        }
    }
    hasher.finalize().to_vec()
}

fn dryrun_recommendations(digest: &[u8]) -> Value {
    let hex = |offset: usize| {
        format!(
            "#{:02X}{:02X}{:02X}",
            digest[offset],
            digest[offset + 1],
            digest[offset + 2]
        )
    };
    json!([
        {
            "itemName": "Slim Chinos",
            "category": "Bottoms",
            "reason": "A tapered trouser balances the garment's silhouette.",
            "color": hex(0),
        },
        {
            "itemName": "Leather Loafers",
            "category": "Shoes",
            "reason": "Polished shoes dress the look up without competing with it.",
            "color": hex(3),
        },
        {
            "itemName": "Canvas Tote",
            "category": "Accessory",
            "reason": "A relaxed bag keeps the outfit casual.",
            "color": hex(6),
        }
    ])
}

fn swatch_png(r: u8, g: u8, b: u8) -> Result<InlineImage> {
    let mut image = RgbImage::new(DRYRUN_IMAGE_SIZE, DRYRUN_IMAGE_SIZE);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .context("failed to encode dryrun swatch")?;
    Ok(InlineImage::from_bytes(bytes.get_ref(), "image/png"))
}
