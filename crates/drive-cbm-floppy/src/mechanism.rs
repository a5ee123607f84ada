//! Head mechanism and rotating media.
//!
//! The mechanism owns the mounted image and a GCR buffer holding the sector
//! currently passing under the head. A periodic timer calls
//! [`DriveMechanism::tick`] twice per GCR byte: the first call ends the
//! previous byte-ready pulse, the second moves to the next byte and starts a
//! new pulse. When the buffer runs out the next sector of the track is
//! encoded in its place.

use emu_core::Ticks;
use format_cbm_disk::DiskImage;
use format_gcr::{SECTOR_GCR_LEN, SpeedZone, encode_sector};

use crate::bits::Step;

/// Highest track the head reaches with no disk inserted.
pub const DEFAULT_MAX_TRACK: u8 = 35;

/// Consecutive `$FF` bytes that make a sync mark.
const SYNC_RUN: u8 = 5;

/// Control outputs the drive CPU drives into the mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub stepper: u8,
    pub motor: bool,
    pub led: bool,
    pub zone: SpeedZone,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            stepper: 0,
            motor: false,
            led: false,
            zone: SpeedZone::SLOWEST,
        }
    }
}

/// What a rotation tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteTick {
    /// Byte-ready pulse ended.
    Released,
    /// A new byte is under the head and byte-ready is pulsing.
    Ready,
}

/// Per-drive head, motor and media state.
#[derive(Debug, Clone)]
pub struct DriveMechanism {
    image: Option<DiskImage>,
    /// Head position in half-tracks above track 1.
    half_tracks: u16,
    sector: u8,
    buffer: Vec<u8>,
    cursor: usize,
    ff_run: u8,
    sync: bool,
    ready: bool,
    /// The next tick advances to the next byte.
    advance_next: bool,
    /// The byte at `cursor` hasn't passed the head yet (fresh buffer after
    /// a mount or a head move).
    fresh: bool,
    controls: Controls,
    bytes_read: u64,
}

impl DriveMechanism {
    #[must_use]
    pub fn new() -> Self {
        Self {
            image: None,
            half_tracks: 0,
            sector: 0,
            buffer: Vec::new(),
            cursor: 0,
            ff_run: 0,
            sync: false,
            ready: false,
            advance_next: false,
            fresh: true,
            controls: Controls::default(),
            bytes_read: 0,
        }
    }

    /// Head to track 1, motor off, read electronics idle. The disk stays in.
    pub fn reset(&mut self) {
        let image = self.image.take();
        *self = Self::new();
        self.image = image;
        self.regenerate();
    }

    /// Insert a disk. The head stays put unless it's past the new disk's
    /// last track.
    pub fn mount(&mut self, image: DiskImage) -> Option<DiskImage> {
        log::debug!(
            "mounted {} image, id {:02X}{:02X}",
            image.format(),
            image.disk_id().first,
            image.disk_id().second
        );
        let previous = self.image.replace(image);
        self.half_tracks = self.half_tracks.min(self.max_half_tracks());
        self.sector = 0;
        self.restart_track();
        previous
    }

    /// Remove the disk. The GCR buffer is left as it was.
    pub fn unmount(&mut self) -> Option<DiskImage> {
        let image = self.image.take();
        if image.is_some() {
            log::debug!("disk removed");
        }
        image
    }

    #[must_use]
    pub fn image(&self) -> Option<&DiskImage> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.image.is_some()
    }

    /// Last track the head can reach.
    #[must_use]
    pub fn max_track(&self) -> u8 {
        self.image
            .as_ref()
            .map_or(DEFAULT_MAX_TRACK, DiskImage::max_track)
            .max(1)
    }

    fn max_half_tracks(&self) -> u16 {
        (u16::from(self.max_track()) - 1) * 2
    }

    /// Head position in tracks, in steps of 0.5.
    #[must_use]
    pub fn track(&self) -> f64 {
        1.0 + f64::from(self.half_tracks) / 2.0
    }

    /// Whole track under the head (rounded down on a half-track).
    #[must_use]
    pub fn whole_track(&self) -> u8 {
        (1 + self.half_tracks / 2) as u8
    }

    #[must_use]
    pub fn half_tracks(&self) -> u16 {
        self.half_tracks
    }

    #[must_use]
    pub fn on_half_track(&self) -> bool {
        self.half_tracks & 1 != 0
    }

    #[must_use]
    pub fn sector(&self) -> u8 {
        self.sector
    }

    /// The GCR byte under the head. Zero before anything was ever encoded.
    #[must_use]
    pub fn current_byte(&self) -> u8 {
        self.buffer.get(self.cursor).copied().unwrap_or(0)
    }

    /// The encoded sector passing under the head.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[must_use]
    pub fn sync(&self) -> bool {
        self.sync
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn controls(&self) -> Controls {
        self.controls
    }

    #[must_use]
    pub fn motor(&self) -> bool {
        self.controls.motor
    }

    #[must_use]
    pub fn led(&self) -> bool {
        self.controls.led
    }

    #[must_use]
    pub fn zone(&self) -> SpeedZone {
        self.controls.zone
    }

    /// Bytes that have passed under the head since power-on.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the media should be turning.
    #[must_use]
    pub fn spinning(&self) -> bool {
        self.controls.motor && self.image.is_some()
    }

    /// Interval between rotation ticks: half a byte time in the current zone.
    #[must_use]
    pub fn tick_period(&self) -> Ticks {
        Ticks::new(self.controls.zone.byte_period_ticks() / 2)
    }

    /// Take new control outputs from the drive CPU.
    ///
    /// Returns `true` when the rotation timer must be re-armed, i.e. the
    /// motor or the speed zone changed.
    pub fn apply_controls(&mut self, controls: Controls) -> bool {
        let old = self.controls;
        if controls == old {
            return false;
        }
        self.controls = controls;

        if controls.stepper != old.stepper {
            self.step(Step::between(old.stepper, controls.stepper));
        }
        if controls.led != old.led {
            log::debug!("LED {}", if controls.led { "on" } else { "off" });
        }
        let motor_changed = controls.motor != old.motor;
        let zone_changed = controls.zone != old.zone;
        if motor_changed {
            log::debug!("motor {}", if controls.motor { "on" } else { "off" });
        }
        if zone_changed {
            log::debug!("speed zone {}", controls.zone.density());
        }
        motor_changed || zone_changed
    }

    /// Move the head one half-track, clamped to the disk's tracks.
    /// Returns `true` if the head moved.
    pub fn step(&mut self, step: Step) -> bool {
        let target = match step {
            Step::Inward if self.half_tracks < self.max_half_tracks() => self.half_tracks + 1,
            Step::Outward if self.half_tracks > 0 => self.half_tracks - 1,
            _ => return false,
        };
        self.half_tracks = target;
        let sectors = self.sectors_on_track();
        self.sector = if sectors == 0 { 0 } else { self.sector % sectors };
        self.restart_track();
        log::debug!("head at track {:.1}", self.track());
        true
    }

    /// One rotation timer event.
    pub fn tick(&mut self) -> ByteTick {
        if !self.advance_next {
            self.advance_next = true;
            self.ready = false;
            return ByteTick::Released;
        }
        self.advance_next = false;

        if self.fresh {
            self.fresh = false;
        } else {
            self.cursor += 1;
            if self.cursor >= self.buffer.len() {
                self.cursor = 0;
                self.next_sector();
            }
        }

        if self.current_byte() == 0xFF {
            self.ff_run = self.ff_run.saturating_add(1);
            if self.ff_run >= SYNC_RUN {
                self.sync = true;
            }
        } else {
            self.ff_run = 0;
            self.sync = false;
        }

        self.ready = true;
        self.bytes_read += 1;
        ByteTick::Ready
    }

    /// The rotation timer stopped: end any byte-ready pulse.
    pub fn stop(&mut self) {
        self.ready = false;
    }

    fn restart_track(&mut self) {
        self.cursor = 0;
        self.fresh = true;
        self.ff_run = 0;
        self.sync = false;
        self.regenerate();
    }

    fn sectors_on_track(&self) -> u8 {
        self.image
            .as_ref()
            .map_or(0, |image| image.sectors_per_track(self.whole_track()))
    }

    fn next_sector(&mut self) {
        let sectors = self.sectors_on_track();
        self.sector = if sectors == 0 {
            0
        } else {
            (self.sector + 1) % sectors
        };
        self.regenerate();
    }

    /// Re-encode the sector under the head. Without a disk the old buffer
    /// stays; between tracks there is only unformatted media.
    fn regenerate(&mut self) {
        let Some(image) = &self.image else {
            return;
        };
        let track = self.whole_track();
        if self.on_half_track() || image.sectors_per_track(track) == 0 {
            self.buffer.clear();
            self.buffer.resize(SECTOR_GCR_LEN, 0x00);
            return;
        }
        let data = image.read_sector(track, self.sector);
        self.buffer = encode_sector(track, self.sector, image.disk_id(), &data);
    }
}

impl Default for DriveMechanism {
    fn default() -> Self {
        Self::new()
    }
}
