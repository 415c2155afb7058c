//! Fixed-cadence frame pacing for sources

use std::thread;
use std::time::{Duration, Instant};

pub struct FrameClock {
    interval: Duration,
    next_deadline: Instant,
    overruns: u64,
}

/// Result of waiting for the next frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Slept until the deadline
    OnTime,
    /// The deadline had already passed; the schedule was reset to now
    Late(Duration),
}

impl FrameClock {
    /// Clock ticking `fps` times per second. Zero means unpaced.
    pub fn new(fps: u32) -> Self {
        let interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(1_000_000_000 / fps as u64)
        };
        Self::with_interval(interval)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
            overruns: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Frames that started late
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Sleep until the next frame is due
    pub fn tick(&mut self) -> Tick {
        if self.interval.is_zero() {
            return Tick::OnTime;
        }

        let now = Instant::now();
        if now <= self.next_deadline {
            thread::sleep(self.next_deadline - now);
            self.next_deadline += self.interval;
            Tick::OnTime
        } else {
            let behind = now - self.next_deadline;
            // Do not try to catch up with a burst of frames
            self.next_deadline = now + self.interval;
            self.overruns += 1;
            Tick::Late(behind)
        }
    }
}
