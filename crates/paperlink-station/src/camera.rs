//! Frame source backed by the webcam multiplexer.
//!
//! The capture server (an external collaborator) owns the physical webcam
//! and serves frames to clients over TCP. The wire format is minimal: a
//! `u32` little-endian byte length followed by one JPEG-compressed frame.
//! This client decodes each frame and scans it for QR codes, so the ARQ
//! layer only ever sees detected payloads.

use std::{io, io::Read, net::TcpStream, time::Duration};

use bytes::Bytes;
use paperlink_core::{CameraFrame, CancelFlag, FrameSource, LinkError};

use crate::error::StationError;

/// Upper bound on one frame's JPEG size; anything larger means the stream
/// is desynchronized.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// How often a blocked read wakes up to observe the cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Camera client: connects to the multiplexer, yields decoded frames.
///
/// Holds the connection exclusively for the lifetime of the session.
/// Blocking reads wake periodically so user cancellation is observed even
/// while the camera is silent.
#[derive(Debug)]
pub struct CameraFrameSource {
    stream: TcpStream,
    cancel: CancelFlag,
}

impl CameraFrameSource {
    /// Connect to the capture server at `addr` (e.g. `127.0.0.1:5000`).
    pub fn connect(addr: &str, cancel: CancelFlag) -> Result<Self, StationError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(CANCEL_POLL_INTERVAL))?;

        tracing::info!(addr, "Connected to camera multiplexer");
        Ok(Self { stream, cancel })
    }

    fn read_jpeg(&mut self) -> io::Result<Vec<u8>> {
        let mut len = [0u8; 4];
        self.stream.read_exact(&mut len)?;

        let len = u32::from_le_bytes(len) as usize;
        if len == 0 || len > MAX_FRAME_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("implausible frame length {len}"),
            ));
        }

        let mut jpeg = vec![0u8; len];
        self.stream.read_exact(&mut jpeg)?;
        Ok(jpeg)
    }

    fn scan(jpeg: &[u8]) -> Result<CameraFrame, LinkError> {
        let frame = image::load_from_memory(jpeg)
            .map_err(|e| LinkError::FrameSource(format!("JPEG decode: {e}")))?
            .to_luma8();

        let mut prepared = rqrr::PreparedImage::prepare(frame);
        let mut payloads = Vec::new();
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => payloads.push(Bytes::from(content.into_bytes())),
                // A half-seen symbol in an otherwise fine frame; the ARQ
                // layer will see the next frame anyway.
                Err(error) => tracing::debug!(%error, "QR grid detected but failed to decode"),
            }
        }

        Ok(CameraFrame { payloads })
    }
}

impl FrameSource for CameraFrameSource {
    fn next_frame(&mut self) -> Result<CameraFrame, LinkError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(LinkError::Cancelled);
            }

            let jpeg = match self.read_jpeg() {
                Ok(jpeg) => jpeg,
                // Read timeout: the camera is quiet, go observe the flag.
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                },
                Err(e) => return Err(LinkError::FrameSource(format!("camera read: {e}"))),
            };

            return Self::scan(&jpeg);
        }
    }
}
