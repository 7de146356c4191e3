use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tryon_contracts::assets::{AssetSource, ImageAsset};

/// A 3D viewing surface that can hand back its current frame.
pub trait RenderSurface {
    /// Points the surface at a model resource.
    fn load(&mut self, locator: &str) -> Result<()>;
    /// Rasterizes the current frame as a `data:<mime>;base64,` URL.
    fn rasterize(&self) -> Result<String>;
    fn locator(&self) -> Option<&str>;
}

/// Turns rendered frames into garment assets.
///
/// No checks beyond the data-URL parse happen here; the safety gate still
/// runs on the captured garment before any generation.
pub struct CaptureBridge;

impl CaptureBridge {
    pub fn capture(surface: &dyn RenderSurface) -> Result<ImageAsset> {
        let frame = surface.rasterize().context("3D frame capture failed")?;
        let asset = ImageAsset::from_data_url(
            AssetSource::Capture {
                locator: surface.locator().map(str::to_string),
            },
            &frame,
        )?;
        Ok(asset)
    }

    pub fn load_and_capture(surface: &mut dyn RenderSurface, locator: &str) -> Result<ImageAsset> {
        surface
            .load(locator)
            .with_context(|| format!("failed to load 3D model {locator}"))?;
        Self::capture(surface)
    }
}

/// Reads frames that an external renderer exported to disk as data URLs.
///
/// `load` selects the frame file; `rasterize` re-reads it so a renderer can
/// overwrite the file between captures.
#[derive(Debug, Default)]
pub struct FrameFileSurface {
    frame_path: Option<PathBuf>,
    locator: Option<String>,
}

impl FrameFileSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSurface for FrameFileSurface {
    fn load(&mut self, locator: &str) -> Result<()> {
        let path = PathBuf::from(locator);
        if !path.is_file() {
            anyhow::bail!("frame file not found: {}", path.display());
        }
        self.frame_path = Some(path);
        self.locator = Some(locator.to_string());
        Ok(())
    }

    fn rasterize(&self) -> Result<String> {
        let Some(path) = self.frame_path.as_ref() else {
            anyhow::bail!("no frame loaded");
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(raw.trim().to_string())
    }

    fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tryon_contracts::assets::AssetSource;
    use tryon_contracts::errors::TryOnError;

    use super::{CaptureBridge, FrameFileSurface, RenderSurface};

    struct StaticSurface {
        frame: String,
    }

    impl RenderSurface for StaticSurface {
        fn load(&mut self, _locator: &str) -> Result<()> {
            Ok(())
        }

        fn rasterize(&self) -> Result<String> {
            Ok(self.frame.clone())
        }

        fn locator(&self) -> Option<&str> {
            Some("jacket.glb")
        }
    }

    #[test]
    fn captured_frame_becomes_capture_asset() -> Result<()> {
        let surface = StaticSurface {
            frame: "data:image/png;base64,aW1n".to_string(),
        };
        let asset = CaptureBridge::capture(&surface)?;
        assert_eq!(
            asset.source(),
            &AssetSource::Capture {
                locator: Some("jacket.glb".to_string())
            }
        );
        assert_eq!(asset.preview_url(), "data:image/png;base64,aW1n");
        Ok(())
    }

    #[test]
    fn malformed_frame_is_a_format_error() {
        let surface = StaticSurface {
            frame: "image/png,aW1n".to_string(),
        };
        let err = CaptureBridge::capture(&surface).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TryOnError>(),
            Some(TryOnError::Format(_))
        ));
    }

    #[test]
    fn frame_file_surface_reads_exported_frame() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("frame.txt");
        std::fs::write(&path, "data:image/jpeg;base64,/9j/\n")?;

        let mut surface = FrameFileSurface::new();
        let locator = path.to_string_lossy().to_string();
        let asset = CaptureBridge::load_and_capture(&mut surface, &locator)?;
        assert_eq!(asset.payload().mime_type, "image/jpeg");
        assert!(FrameFileSurface::new().rasterize().is_err());
        Ok(())
    }
}
