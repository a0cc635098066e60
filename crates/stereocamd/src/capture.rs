use chrono::{DateTime, Utc};
use std::thread::JoinHandle;
use stereocam_hw::{CameraBackend, CameraConfig, CameraError, ErrorKind, Frame, StereoCamera};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("capture thread exited")]
    ChannelClosed,
}

impl CaptureError {
    /// Fault class of the underlying camera error. `None` when the failure
    /// is in the driver itself.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Camera(e) => Some(e.kind()),
            Self::Spawn(_) | Self::ChannelClosed => None,
        }
    }
}

/// One triggered stereo pair, left first.
pub struct StereoPair {
    pub left: Frame,
    pub right: Frame,
}

struct GrabRequest {
    trigger: DateTime<Utc>,
    reply: oneshot::Sender<Result<StereoPair, CameraError>>,
}

/// Clone-safe handle to the capture thread.
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<GrabRequest>,
}

impl CaptureHandle {
    /// Grab the left then the right image for one trigger instant.
    pub async fn grab(&self, trigger: DateTime<Utc>) -> Result<StereoPair, CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(GrabRequest {
                trigger,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CaptureError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| CaptureError::ChannelClosed)??)
    }
}

/// Spawn the camera on a dedicated OS thread.
///
/// The camera is opened and configured before the thread starts, so a bad
/// port or a missing BGR format fails here rather than on the first grab.
/// The thread closes the camera once every handle is dropped, or right after
/// reporting a failed grab; the join handle carries the teardown result.
pub fn spawn_capture<B>(
    backend: B,
    config: &CameraConfig,
) -> Result<(CaptureHandle, JoinHandle<Result<(), CameraError>>), CaptureError>
where
    B: CameraBackend + Send + 'static,
{
    let mut camera = StereoCamera::open(backend, config)?;
    let target = camera.target_format();
    tracing::info!(
        left = %camera.port(stereocam_hw::Side::Left),
        right = %camera.port(stereocam_hw::Side::Right),
        width = target.width(),
        height = target.height(),
        "stereo camera streaming"
    );

    let (tx, mut rx) = mpsc::channel::<GrabRequest>(2);

    let join = std::thread::Builder::new()
        .name("stereocam-capture".into())
        .spawn(move || {
            tracing::info!("capture thread started");
            while let Some(GrabRequest { trigger, reply }) = rx.blocking_recv() {
                let result = camera
                    .grab_pair(trigger)
                    .map(|(left, right)| StereoPair { left, right });
                let failed = result.is_err();
                let _ = reply.send(result);
                if failed {
                    break;
                }
            }
            tracing::info!("capture thread exiting");
            camera.close()
        })?;

    Ok((CaptureHandle { tx }, join))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stereocam_hw::sim::SimBackend;
    use stereocam_hw::Port;

    fn config() -> CameraConfig {
        CameraConfig {
            port_left: 1,
            port_right: 2,
            gain_left: 100,
            gain_right: 100,
            set_gain: true,
            exposure_left: 5.0,
            exposure_right: 5.0,
            set_exposure: true,
            timeout_ms: 100,
            frame_id: "stereo".into(),
            enable_logging: false,
        }
    }

    #[tokio::test]
    async fn test_grab_pair_through_handle() {
        let backend = SimBackend::stereo_rig().with_resolution(16, 8);
        let (handle, join) = spawn_capture(backend, &config()).unwrap();

        let trigger = Utc::now();
        let pair = handle.grab(trigger).await.unwrap();
        assert_eq!(pair.left.port.number(), 1);
        assert_eq!(pair.right.port.number(), 2);
        assert_eq!(pair.left.timestamp, trigger);
        assert_eq!(pair.right.timestamp, trigger);
        assert_eq!(pair.left.data.len(), 16 * 8 * 3);

        drop(handle);
        join.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_is_reported_before_spawn() {
        let mut cfg = config();
        cfg.port_right = 7;
        let err = spawn_capture(SimBackend::stereo_rig(), &cfg).err().unwrap();
        assert!(matches!(err, CaptureError::Camera(CameraError::InvalidPort(7))));
        assert_eq!(err.kind(), Some(ErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_failed_grab_ends_thread() {
        let backend = SimBackend::stereo_rig().starved(Port::new(2).unwrap());
        let (handle, join) = spawn_capture(backend, &config()).unwrap();

        let err = handle.grab(Utc::now()).await.err().unwrap();
        assert!(matches!(err, CaptureError::Camera(ref e) if e.is_timeout()));
        assert_eq!(err.kind(), Some(ErrorKind::HardwareFault));
        assert!(matches!(
            handle.grab(Utc::now()).await,
            Err(CaptureError::ChannelClosed)
        ));
        assert_eq!(CaptureError::ChannelClosed.kind(), None);
        join.join().unwrap().unwrap();
    }
}
