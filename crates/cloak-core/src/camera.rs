//! Camera access.
//!
//! Device handles are opened and used on a dedicated `camera-capture`
//! thread; async code talks to it through a [`CameraHandle`] and gets one
//! frame per request.

use crate::config::CameraConfig;
use crate::frame::Frame;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera is not available")]
    Unavailable,
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("camera session closed")]
    Closed,
}

/// A source of frames, driven from the capture thread.
pub trait FrameGrabber {
    fn grab(&mut self) -> Result<Frame, CameraError>;
}

pub struct NokhwaGrabber {
    camera: Camera,
    mirror: bool,
}

impl NokhwaGrabber {
    pub fn open(cfg: &CameraConfig) -> Result<Self, CameraError> {
        let index = CameraIndex::Index(cfg.device_id);
        let preferred = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new_from(cfg.width, cfg.height, FrameFormat::MJPEG, cfg.fps),
        ));

        let mut camera = match Camera::new(index.clone(), preferred) {
            Ok(camera) => camera,
            Err(e) => {
                tracing::warn!(error = %e, "requested camera format refused, using device default");
                let fallback =
                    RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
                Camera::new(index, fallback).map_err(|e| {
                    tracing::error!(error = %e, device_id = cfg.device_id, "failed to open camera");
                    CameraError::Unavailable
                })?
            }
        };

        camera.open_stream().map_err(|e| {
            tracing::error!(error = %e, "failed to start camera stream");
            CameraError::Unavailable
        })?;

        let format = camera.camera_format();
        tracing::info!(
            device_id = cfg.device_id,
            width = format.width(),
            height = format.height(),
            fps = format.frame_rate(),
            "camera opened"
        );

        Ok(Self {
            camera,
            mirror: cfg.mirror,
        })
    }
}

impl FrameGrabber for NokhwaGrabber {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Read(e.to_string()))?;

        let frame = Frame::from_rgb(decoded.width(), decoded.height(), decoded.as_raw())
            .map_err(|e| CameraError::Read(e.to_string()))?;
        Ok(if self.mirror { frame.mirrored() } else { frame })
    }
}

impl Drop for NokhwaGrabber {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!(error = %e, "failed to stop camera stream");
        }
    }
}

enum Request {
    Frame(oneshot::Sender<Result<Frame, CameraError>>),
    Shutdown,
}

/// Owns the capture thread. Dropping it (or calling [`shutdown`]) releases
/// the device; outstanding handles then report [`CameraError::Closed`].
///
/// [`shutdown`]: CameraSession::shutdown
pub struct CameraSession {
    handle: CameraHandle,
    worker: Option<JoinHandle<()>>,
}

#[derive(Clone, Debug)]
pub struct CameraHandle {
    requests: mpsc::UnboundedSender<Request>,
    available: Arc<AtomicBool>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Frame(_) => f.write_str("Frame"),
            Request::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl CameraSession {
    pub fn open(cfg: CameraConfig) -> std::io::Result<Self> {
        Self::spawn(move || NokhwaGrabber::open(&cfg))
    }

    // `open` runs on the capture thread, so the grabber itself never has
    // to be `Send`.
    pub fn spawn<G, F>(open: F) -> std::io::Result<Self>
    where
        G: FrameGrabber,
        F: FnOnce() -> Result<G, CameraError> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let available = Arc::new(AtomicBool::new(false));
        let worker_available = available.clone();

        let worker = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || capture_loop(open, rx, worker_available))?;

        Ok(Self {
            handle: CameraHandle {
                requests: tx,
                available,
            },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> CameraHandle {
        self.handle.clone()
    }

    // Blocks until the capture thread has released the device.
    pub fn shutdown(mut self) {
        let _ = self.handle.requests.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("camera thread panicked");
            }
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.handle.requests.send(Request::Shutdown);
        }
    }
}

fn capture_loop<G, F>(
    open: F,
    mut requests: mpsc::UnboundedReceiver<Request>,
    available: Arc<AtomicBool>,
) where
    G: FrameGrabber,
    F: FnOnce() -> Result<G, CameraError>,
{
    let mut grabber = match open() {
        Ok(grabber) => {
            available.store(true, Ordering::Release);
            Some(grabber)
        }
        Err(e) => {
            tracing::warn!(error = %e, "camera unavailable, streaming placeholder frames");
            None
        }
    };

    while let Some(request) = requests.blocking_recv() {
        match request {
            Request::Frame(reply) => {
                let result = match grabber.as_mut() {
                    Some(grabber) => grabber.grab(),
                    None => Err(CameraError::Unavailable),
                };
                let _ = reply.send(result);
            }
            Request::Shutdown => break,
        }
    }

    available.store(false, Ordering::Release);
    drop(grabber);
    tracing::info!("camera released");
}

impl CameraHandle {
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub async fn read_frame(&self) -> Result<Frame, CameraError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Frame(reply))
            .map_err(|_| CameraError::Closed)?;
        response.await.map_err(|_| CameraError::Closed)?
    }
}
