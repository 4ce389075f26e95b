//! QR PNG artifacts for the printing directory.

use std::{fs, path::PathBuf};

use image::Luma;
use paperlink_core::{ArtifactId, ArtifactTag, LinkError, VisualEmitter};
use paperlink_proto::to_visual;
use qrcode::{EcLevel, QrCode};

use crate::error::StationError;

/// Visual emitter rendering packets as QR code PNGs.
///
/// Artifacts land in the emitter's directory as `packet_<seq>.png` /
/// `ack_<seq>.png`; a downstream mechanism (printer, screen) surfaces them
/// to the far camera. Retransmissions overwrite their predecessor, which
/// is exactly right - only the newest copy of a sequence number matters.
///
/// Error correction stays at level L: per-symbol overhead is kept minimal
/// because robustness comes from the ARQ layer, not the QR layer. The
/// symbol version is chosen automatically to fit the payload.
#[derive(Debug)]
pub struct QrPngEmitter {
    dir: PathBuf,
}

impl QrPngEmitter {
    /// Pixels per QR module.
    pub const MODULE_PIXELS: u32 = 10;

    /// Create the emitter, making sure the artifact directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StationError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StationError::Config(format!("artifact dir {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Directory the artifacts are written into.
    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl VisualEmitter for QrPngEmitter {
    fn emit(&mut self, packet: &[u8], tag: ArtifactTag) -> Result<ArtifactId, LinkError> {
        let text = to_visual(packet);

        let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::L)
            .map_err(|e| LinkError::Emit(format!("QR encode for {tag}: {e}")))?;

        // 10-pixel modules with the standard 4-module quiet zone.
        let symbol = code
            .render::<Luma<u8>>()
            .module_dimensions(Self::MODULE_PIXELS, Self::MODULE_PIXELS)
            .quiet_zone(true)
            .build();

        let path = self.dir.join(format!("{tag}.png"));
        symbol
            .save(&path)
            .map_err(|e| LinkError::Emit(format!("writing {}: {e}", path.display())))?;

        tracing::debug!(%tag, path = %path.display(), "Emitted QR artifact");
        Ok(ArtifactId(path.display().to_string()))
    }
}
