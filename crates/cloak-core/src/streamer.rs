use crate::camera::{CameraError, CameraHandle};
use crate::config::Config;
use crate::effect::SharedEffect;
use crate::frame::Frame;
use crate::streaming::{frame_to_jpeg, multipart_part};
use bytes::Bytes;
use cloak_detection::Hsv;
use futures_util::{stream, Stream};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct StreamSettings {
    pub jpeg_quality: u8,
    pub retry_delay: Duration,
    pub capture_delay: Duration,
    // Size of the placeholder shown while the camera is unavailable.
    pub placeholder_size: (u32, u32),
}

impl StreamSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            jpeg_quality: cfg.stream.jpeg_quality,
            retry_delay: cfg.stream.retry_delay(),
            capture_delay: cfg.effect.capture_delay(),
            placeholder_size: (cfg.camera.width, cfg.camera.height),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub ready: bool,
    pub capturing: bool,
    pub camera_available: bool,
    pub fps: u32,
    pub target: Option<Hsv>,
}

/// Frames per second over the last completed one-second window.
#[derive(Debug)]
pub struct FpsCounter {
    window: Mutex<FpsWindow>,
}

#[derive(Debug)]
struct FpsWindow {
    started: Instant,
    count: u32,
    last: u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(started: Instant) -> Self {
        Self {
            window: Mutex::new(FpsWindow {
                started,
                count: 0,
                last: 0,
            }),
        }
    }

    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&self, now: Instant) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.count += 1;
        if now.duration_since(window.started) >= Duration::from_secs(1) {
            window.last = window.count;
            window.count = 0;
            window.started = now;
        }
    }

    pub fn fps(&self) -> u32 {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls frames from the camera, runs the cloak effect and encodes the
/// result for streaming. Each stream reads its next frame only when polled.
#[derive(Clone)]
pub struct VideoStreamer {
    camera: CameraHandle,
    effect: SharedEffect,
    settings: StreamSettings,
    fps: Arc<FpsCounter>,
}

impl VideoStreamer {
    pub fn new(camera: CameraHandle, effect: SharedEffect, settings: StreamSettings) -> Self {
        Self {
            camera,
            effect,
            settings,
            fps: Arc::new(FpsCounter::new()),
        }
    }

    pub fn effect(&self) -> &SharedEffect {
        &self.effect
    }

    pub fn fps(&self) -> u32 {
        self.fps.fps()
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            ready: self.effect.is_ready(),
            capturing: self.effect.is_capturing(),
            camera_available: self.camera.is_available(),
            fps: self.fps(),
            target: self.effect.target_color(),
        }
    }

    // Endless multipart body; ends only once the camera session closes.
    pub fn frames(&self) -> impl Stream<Item = Bytes> + Send + 'static {
        stream::unfold((self.clone(), false), |(streamer, throttle)| async move {
            if throttle {
                tokio::time::sleep(streamer.settings.retry_delay).await;
            }
            let (part, throttle) = streamer.pull().await?;
            Some((part, (streamer, throttle)))
        })
    }

    pub async fn next_part(&self) -> Option<Bytes> {
        self.pull().await.map(|(part, _)| part)
    }

    // The flag is set when the part is a placeholder: the caller should wait
    // `retry_delay` before pulling again.
    async fn pull(&self) -> Option<(Bytes, bool)> {
        let mut failed_reads = 0u32;
        loop {
            let frame = match self.camera.read_frame().await {
                Ok(frame) => frame,
                Err(CameraError::Unavailable) => {
                    let (width, height) = self.settings.placeholder_size;
                    match self.encode(Frame::placeholder(width, height)).await {
                        Some(part) => return Some((part, true)),
                        None => {
                            tokio::time::sleep(self.settings.retry_delay).await;
                            continue;
                        }
                    }
                }
                Err(CameraError::Read(e)) => {
                    if failed_reads == 0 {
                        tracing::warn!(error = %e, "camera read failed, retrying");
                    } else {
                        tracing::debug!(error = %e, failed_reads, "camera read failed again");
                    }
                    failed_reads += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                    continue;
                }
                Err(CameraError::Closed) => {
                    tracing::info!("camera session closed, ending stream");
                    return None;
                }
            };

            self.fps.tick();
            if let Some(part) = self.process(frame).await {
                return Some((part, false));
            }
        }
    }

    async fn process(&self, frame: Frame) -> Option<Bytes> {
        let effect = self.effect.clone();
        let quality = self.settings.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || {
            let output = match effect.apply(frame.clone()) {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(error = %e, "cloak effect failed, serving unprocessed frame");
                    frame
                }
            };
            frame_to_jpeg(&output, quality)
        })
        .await;
        finish_part(encoded)
    }

    async fn encode(&self, frame: Frame) -> Option<Bytes> {
        let quality = self.settings.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || frame_to_jpeg(&frame, quality)).await;
        finish_part(encoded)
    }

    pub async fn capture_background(&self) -> bool {
        let _paused = self.effect.begin_capture();
        tracing::info!(
            delay_secs = self.settings.capture_delay.as_secs_f32(),
            "capturing background, waiting for the subject to leave the frame"
        );
        tokio::time::sleep(self.settings.capture_delay).await;

        let frame = match self.camera.read_frame().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "no frame for background capture");
                None
            }
        };
        self.effect.capture_background(frame.as_ref())
    }

    pub fn set_color(&self, rgb: [u8; 3]) -> Option<Hsv> {
        self.effect.set_target_color(rgb)
    }

    pub fn reset(&self) {
        self.effect.reset();
    }
}

fn finish_part(
    encoded: Result<Result<Vec<u8>, crate::streaming::EncodeError>, tokio::task::JoinError>,
) -> Option<Bytes> {
    match encoded {
        Ok(Ok(jpeg)) => Some(multipart_part(&jpeg)),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "dropping frame");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "frame worker failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::camera::tests::ScriptedGrabber;
    use crate::camera::CameraSession;
    use crate::effect::EffectState;
    use futures_util::StreamExt;

    pub(crate) fn settings() -> StreamSettings {
        StreamSettings {
            jpeg_quality: 90,
            retry_delay: Duration::from_millis(1),
            capture_delay: Duration::ZERO,
            placeholder_size: (8, 6),
        }
    }

    pub(crate) fn streamer_with(
        script: Vec<Result<Frame, CameraError>>,
    ) -> (CameraSession, VideoStreamer) {
        let session = CameraSession::spawn(move || Ok(ScriptedGrabber::new(script))).unwrap();
        let effect = SharedEffect::new(EffectState::new(100, 0));
        let streamer = VideoStreamer::new(session.handle(), effect, settings());
        (session, streamer)
    }

    fn decode(part: &Bytes) -> image::RgbImage {
        let start = part
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|p| p + 4)
            .unwrap();
        image::load_from_memory(&part[start..part.len() - 2])
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn fps_reports_last_full_window() {
        let start = Instant::now();
        let counter = FpsCounter::starting_at(start);
        for i in 0..10 {
            counter.tick_at(start + Duration::from_millis(i * 50));
        }
        assert_eq!(counter.fps(), 0);
        counter.tick_at(start + Duration::from_millis(1000));
        assert_eq!(counter.fps(), 11);
    }

    #[tokio::test]
    async fn skips_failed_reads_and_streams_frames() {
        let script = vec![
            Err(CameraError::Read("glitch".into())),
            Ok(Frame::filled(8, 8, [255, 0, 0])),
        ];
        let (_session, streamer) = streamer_with(script);

        let part = streamer.next_part().await.unwrap();
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
        let img = decode(&part);
        assert_eq!(img.dimensions(), (8, 8));
        let [r, _, b] = img.get_pixel(3, 3).0;
        assert!(b > 200 && r < 60);
    }

    #[tokio::test]
    async fn unavailable_camera_streams_placeholder() {
        let session =
            CameraSession::spawn(|| Err::<ScriptedGrabber, _>(CameraError::Unavailable)).unwrap();
        let effect = SharedEffect::new(EffectState::new(100, 0));
        let streamer = VideoStreamer::new(session.handle(), effect, settings());

        let parts: Vec<Bytes> = streamer.frames().take(2).collect().await;
        assert_eq!(parts.len(), 2);
        assert_eq!(decode(&parts[0]).dimensions(), (8, 6));
    }

    #[tokio::test]
    async fn placeholder_is_served_before_retry_wait() {
        let session =
            CameraSession::spawn(|| Err::<ScriptedGrabber, _>(CameraError::Unavailable)).unwrap();
        let effect = SharedEffect::new(EffectState::new(100, 0));
        let slow = StreamSettings {
            retry_delay: Duration::from_secs(30),
            ..settings()
        };
        let streamer = VideoStreamer::new(session.handle(), effect, slow);

        let mut frames = Box::pin(streamer.frames());
        let first = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("first placeholder should not wait for the retry delay");
        assert_eq!(decode(&first.unwrap()).dimensions(), (8, 6));
    }

    #[tokio::test]
    async fn background_size_mismatch_keeps_streaming_live_frames() {
        let wall = Frame::filled(4, 4, [90, 90, 90]);
        let green = Frame::filled(8, 8, [0, 255, 0]);
        let (_session, streamer) =
            streamer_with(vec![Ok(wall), Ok(green.clone()), Ok(green)]);

        assert!(streamer.capture_background().await);
        streamer.set_color([255, 0, 0]);
        assert!(streamer.status().ready);

        let parts: Vec<Bytes> = streamer.frames().take(2).collect().await;
        assert_eq!(parts.len(), 2);
        for part in &parts {
            let img = decode(part);
            assert_eq!(img.dimensions(), (8, 8));
            let [r, g, b] = img.get_pixel(4, 4).0;
            assert!(g > 200 && r < 60 && b < 60, "expected live green, got {:?}", [r, g, b]);
        }
        assert!(streamer.status().ready);
    }

    #[tokio::test]
    async fn stream_ends_when_camera_closes() {
        let (session, streamer) = streamer_with(vec![Ok(Frame::filled(4, 4, [0, 0, 0]))]);
        tokio::task::spawn_blocking(move || session.shutdown())
            .await
            .unwrap();
        let parts: Vec<Bytes> = streamer.frames().collect().await;
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn capture_then_color_cloaks_stream() {
        let wall = Frame::filled(8, 8, [90, 90, 90]);
        let red = Frame::filled(8, 8, [0, 0, 255]);
        let (_session, streamer) = streamer_with(vec![Ok(wall), Ok(red)]);

        assert!(streamer.capture_background().await);
        assert!(!streamer.status().ready);
        assert_eq!(streamer.set_color([255, 0, 0]), Some(Hsv::new(0, 255, 255)));
        assert!(streamer.status().ready);

        let img = decode(&streamer.next_part().await.unwrap());
        let [r, g, b] = img.get_pixel(4, 4).0;
        assert!(r.abs_diff(90) < 12 && g.abs_diff(90) < 12 && b.abs_diff(90) < 12);
    }

    #[tokio::test]
    async fn failed_background_capture_reports_false() {
        let (_session, streamer) =
            streamer_with(vec![Err(CameraError::Read("no signal".into()))]);
        assert!(!streamer.capture_background().await);
        assert!(!streamer.status().capturing);
    }

    #[tokio::test]
    async fn reset_clears_readiness() {
        let (_session, streamer) = streamer_with(vec![Ok(Frame::filled(4, 4, [1, 2, 3]))]);
        streamer.capture_background().await;
        streamer.set_color([0, 255, 0]);
        assert!(streamer.status().ready);
        streamer.reset();
        let status = streamer.status();
        assert!(!status.ready);
        assert_eq!(status.target, None);
    }
}
