use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::Clock("system clock before epoch".into()))
}

/// Hybrid logical timestamp used to order answers to the same field.
///
/// Stored as 12 bytes: 8 bytes wall_ms (big-endian) followed by 4 bytes
/// counter (big-endian), so byte order equals logical order in SQLite.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Hlc {
    wall_ms: u64,
    counter: u32,
}

impl Hlc {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let mut wall = [0u8; 8];
        let mut counter = [0u8; 4];
        wall.copy_from_slice(&bytes[..8]);
        counter.copy_from_slice(&bytes[8..]);
        Self {
            wall_ms: u64::from_be_bytes(wall),
            counter: u32::from_be_bytes(counter),
        }
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then(self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Issues strictly increasing timestamps even when the wall clock stalls
/// or steps backwards.
#[derive(Debug, Default)]
pub struct HlcClock {
    last: Option<Hlc>,
}

impl HlcClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn tick(&mut self) -> Result<Hlc, CoreError> {
        Ok(self.tick_at(physical_now()?))
    }

    /// Next timestamp given an explicit wall-clock reading.
    pub fn tick_at(&mut self, now_ms: u64) -> Hlc {
        let hlc = match self.last {
            Some(last) if last.wall_ms >= now_ms => Hlc::new(last.wall_ms, last.counter + 1),
            _ => Hlc::new(now_ms, 0),
        };
        self.last = Some(hlc);
        hlc
    }
}
