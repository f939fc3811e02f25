use crate::frame::Frame;
use bytes::{Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

pub const BOUNDARY: &str = "frame";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

// Convert a BGR frame to JPEG bytes
pub fn frame_to_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let img = frame.to_rgb_image();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&img)?;
    Ok(buf)
}

// Wraps one JPEG as a part of a multipart/x-mixed-replace body.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(jpeg.len() + 96);
    buf.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    buf.extend_from_slice(b"Content-Type: image/jpeg\r\n");
    buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}
