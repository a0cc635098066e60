use crate::capture::StereoPair;
use stereocam_hw::{Frame, Side};

/// Running totals for one side of the rig.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SideStats {
    pub frames: u64,
    pub dropped: u64,
}

impl SideStats {
    fn record(&mut self, frame: &Frame) {
        self.frames += 1;
        self.dropped += u64::from(frame.frames_dropped);
    }
}

/// Receives every delivered pair. Frames are logged and counted; transport
/// to downstream consumers is outside this daemon.
#[derive(Debug, Default)]
pub struct Publisher {
    left: SideStats,
    right: SideStats,
}

impl Publisher {
    pub fn publish(&mut self, pair: &StereoPair) {
        for (side, frame) in [(Side::Left, &pair.left), (Side::Right, &pair.right)] {
            tracing::debug!(
                side = %side,
                port = %frame.port,
                width = frame.width,
                height = frame.height,
                step = frame.step,
                encoding = frame.encoding.as_str(),
                frame_id = %frame.frame_id,
                stamp = %frame.timestamp,
                "frame published"
            );
            self.stats_mut(side).record(frame);
        }
    }

    pub fn stats(&self, side: Side) -> SideStats {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn stats_mut(&mut self, side: Side) -> &mut SideStats {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn pairs(&self) -> u64 {
        self.left.frames.min(self.right.frames)
    }

    pub fn log_summary(&self) {
        let (left, right) = (self.stats(Side::Left), self.stats(Side::Right));
        tracing::info!(
            pairs = self.pairs(),
            left_dropped = left.dropped,
            right_dropped = right.dropped,
            "capture summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stereocam_hw::{Encoding, Port};

    fn frame(port: u32, dropped: u32) -> Frame {
        Frame {
            data: vec![0; 12],
            width: 2,
            height: 2,
            step: 6,
            encoding: Encoding::Bgr8,
            timestamp: Utc::now(),
            frame_id: "stereo".into(),
            port: Port::new(port).unwrap(),
            frames_dropped: dropped,
        }
    }

    #[test]
    fn test_totals_per_side() {
        let mut publisher = Publisher::default();
        publisher.publish(&StereoPair {
            left: frame(1, 0),
            right: frame(2, 3),
        });
        publisher.publish(&StereoPair {
            left: frame(1, 1),
            right: frame(2, 2),
        });

        assert_eq!(publisher.pairs(), 2);
        assert_eq!(
            publisher.stats(Side::Left),
            SideStats {
                frames: 2,
                dropped: 1
            }
        );
        assert_eq!(
            publisher.stats(Side::Right),
            SideStats {
                frames: 2,
                dropped: 5
            }
        );
    }
}
