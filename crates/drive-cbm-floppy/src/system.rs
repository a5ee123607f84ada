//! The drive subsystem as a whole: host port, serial bus, drives and the
//! scheduler that turns their media.
//!
//! Drives live in a registry owned by [`System`] and are addressed by
//! [`DriveHandle`]. Everything runs on the caller's thread: the host and
//! drive CPU cores call in through the bus and port methods, and
//! [`System::run_until`] dispatches the timers that fell due.

use cbm_serial_bus::{Edge, Levels, Line, LineObserver, OutputChange, ParticipantId, SerialBus};
use emu_core::{Bus, MasterClock, Scheduler, Ticks};
use format_cbm_disk::{DiskError, DiskImage};

use crate::config::DriveConfig;
use crate::drive::{CpuLines, Drive};
use crate::tpi_controller::TpiController;

/// The 1551's periodic IRQ rate.
pub const TIMER_IRQ_HZ: u64 = 60;

/// Interval at which a deferred periodic IRQ is offered again.
pub const IRQ_RETRY_PERIOD: Ticks = Ticks::new(1024);

/// Index of a drive in its [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriveHandle(usize);

impl DriveHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Timer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveEvent {
    /// Half a GCR byte has passed under the head.
    ByteTick(DriveHandle),
    /// 1551 periodic IRQ.
    TimerIrq(DriveHandle),
    /// Try again to deliver a periodic IRQ.
    IrqRetry(DriveHandle),
}

#[derive(Debug)]
pub struct System {
    clock: MasterClock,
    scheduler: Scheduler<DriveEvent>,
    bus: SerialBus,
    host: ParticipantId,
    host_edges: Vec<Edge>,
    drives: Vec<Drive>,
}

/// Routes bus edges to the host and the drives.
struct Participants<'a> {
    host: ParticipantId,
    host_edges: &'a mut Vec<Edge>,
    drives: &'a mut [Drive],
}

impl LineObserver for Participants<'_> {
    fn on_edge(
        &mut self,
        participant: ParticipantId,
        edge: Edge,
        levels: Levels,
        follow_ups: &mut Vec<OutputChange>,
    ) {
        if participant == self.host {
            self.host_edges.push(edge);
            return;
        }
        let Some(drive) = self
            .drives
            .iter_mut()
            .find(|d| d.participant() == Some(participant))
        else {
            return;
        };
        follow_ups.extend(drive.on_bus_edge(levels).into_iter().map(|(line, level)| {
            OutputChange {
                participant,
                line,
                level,
            }
        }));
    }
}

impl System {
    /// An empty system: the host is on the bus, no drives yet.
    #[must_use]
    pub fn new() -> Self {
        let mut bus = SerialBus::new();
        let host = bus.connect();
        Self {
            clock: MasterClock::XTAL_16MHZ,
            scheduler: Scheduler::new(),
            bus,
            host,
            host_edges: Vec::new(),
            drives: Vec::new(),
        }
    }

    /// Add a drive and switch it on. A 1541 joins the serial bus.
    pub fn add_drive(&mut self, config: DriveConfig) -> DriveHandle {
        let mut drive = Drive::new(config);
        if drive.model().uses_serial_bus() {
            drive.participant = Some(self.bus.connect());
        }
        log::debug!(
            "{} added as device {}",
            drive.model().name(),
            drive.device_number()
        );
        self.drives.push(drive);
        let handle = DriveHandle(self.drives.len() - 1);
        self.power_on(handle);
        handle
    }

    #[must_use]
    pub fn drive(&self, handle: DriveHandle) -> Option<&Drive> {
        self.drives.get(handle.0)
    }

    #[must_use]
    pub fn drives(&self) -> usize {
        self.drives.len()
    }

    #[must_use]
    pub fn bus(&self) -> &SerialBus {
        &self.bus
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<DriveEvent> {
        &self.scheduler
    }

    #[must_use]
    pub fn now(&self) -> Ticks {
        self.scheduler.now()
    }

    /// Switch a drive on: cold board, head on track 1.
    pub fn power_on(&mut self, handle: DriveHandle) {
        let timer_period = self.clock.period_of_hz(TIMER_IRQ_HZ);
        let Some(drive) = self.drives.get_mut(handle.0) else {
            return;
        };
        drive.power_on();
        if !drive.model().uses_serial_bus() && drive.irq_timer.is_none() {
            drive.irq_timer = Some(
                self.scheduler
                    .schedule_periodic(timer_period, DriveEvent::TimerIrq(handle)),
            );
        }
        let levels = self.bus.levels();
        let changes = drive.on_bus_edge(levels);
        self.apply_bus_changes(handle, changes);
        self.rearm_rotation(handle);
    }

    /// Switch a drive off. Its timers stop and its bus latches let go.
    pub fn power_off(&mut self, handle: DriveHandle) {
        let Some(drive) = self.drives.get_mut(handle.0) else {
            return;
        };
        for token in [
            drive.rotation_timer.take(),
            drive.irq_timer.take(),
            drive.irq_retry.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.scheduler.cancel(token);
        }
        drive.power_off();
        if let Some(id) = drive.participant() {
            let changes = vec![(Line::Clock, true), (Line::Data, true)];
            self.set_outputs(id, changes);
        }
    }

    /// Insert a disk. Returns the one that was in the drive.
    pub fn mount(&mut self, handle: DriveHandle, image: DiskImage) -> Option<DiskImage> {
        let previous = self.drives.get_mut(handle.0)?.mount(image);
        self.rearm_rotation(handle);
        previous
    }

    /// Insert a disk from file contents, picking the format from the
    /// extension and size.
    pub fn insert_file(
        &mut self,
        handle: DriveHandle,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<(), DiskError> {
        let image = DiskImage::from_file_bytes(extension, bytes)?;
        self.mount(handle, image);
        Ok(())
    }

    /// Remove the disk. The media stops turning.
    pub fn unmount(&mut self, handle: DriveHandle) -> Option<DiskImage> {
        let drive = self.drives.get_mut(handle.0)?;
        let image = drive.unmount();
        for token in [drive.rotation_timer.take(), drive.irq_retry.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(token);
        }
        image
    }

    /// Drive CPU read.
    pub fn drive_read(&mut self, handle: DriveHandle, address: u16) -> u8 {
        self.drives
            .get_mut(handle.0)
            .map_or(0xFF, |drive| drive.read(address))
    }

    /// Drive CPU write. Motor, zone and bus changes take effect before
    /// this returns.
    pub fn drive_write(&mut self, handle: DriveHandle, address: u16, value: u8) {
        let Some(drive) = self.drives.get_mut(handle.0) else {
            return;
        };
        let rearm = drive.write(address, value);
        let changes = drive.take_bus_outputs();
        if rearm {
            self.rearm_rotation(handle);
        }
        self.apply_bus_changes(handle, changes);
    }

    /// The drive CPU's view of its address space.
    pub fn drive_bus(&mut self, handle: DriveHandle) -> DriveBus<'_> {
        DriveBus {
            system: self,
            handle,
        }
    }

    /// One drive CPU cycle of chip time.
    pub fn clock_drive(&mut self, handle: DriveHandle) {
        if let Some(drive) = self.drives.get_mut(handle.0) {
            drive.tick();
        }
    }

    #[must_use]
    pub fn cpu_lines(&self, handle: DriveHandle) -> CpuLines {
        self.drives
            .get(handle.0)
            .map(Drive::cpu_lines)
            .unwrap_or_default()
    }

    /// The drive CPU has serviced the periodic IRQ.
    pub fn acknowledge_irq(&mut self, handle: DriveHandle) {
        if let Some(drive) = self.drives.get_mut(handle.0) {
            drive.acknowledge_timer_irq();
        }
    }

    /// Host pulls (`true`) or releases a serial bus line.
    pub fn host_set_line(&mut self, line: Line, asserted: bool) {
        self.set_outputs(self.host, vec![(line, !asserted)]);
    }

    #[must_use]
    pub fn host_levels(&self) -> Levels {
        self.bus.levels()
    }

    /// Bus edges the host has seen since the last call.
    pub fn take_host_edges(&mut self) -> Vec<Edge> {
        std::mem::take(&mut self.host_edges)
    }

    /// Host side of a 1551's parallel link. Other drives read $FF.
    pub fn host_write_data(&mut self, handle: DriveHandle, value: u8) {
        if let Some(tpi) = self.drives.get_mut(handle.0).and_then(Drive::tpi_mut) {
            tpi.write_data(value);
        }
    }

    #[must_use]
    pub fn host_read_data(&self, handle: DriveHandle) -> u8 {
        self.host_tpi(handle).map_or(0xFF, |tpi| tpi.read_data())
    }

    pub fn host_write_handshake(&mut self, handle: DriveHandle, value: u8) {
        if let Some(tpi) = self.drives.get_mut(handle.0).and_then(Drive::tpi_mut) {
            tpi.write_handshake(value);
        }
    }

    #[must_use]
    pub fn host_read_handshake(&self, handle: DriveHandle) -> u8 {
        self.host_tpi(handle).map_or(0xFF, |tpi| tpi.read_handshake())
    }

    #[must_use]
    pub fn host_read_status(&self, handle: DriveHandle) -> u8 {
        self.host_tpi(handle).map_or(0xFF, |tpi| tpi.read_status())
    }

    /// The host's enable bit for the parallel link.
    pub fn set_host_enabled(&mut self, handle: DriveHandle, enabled: bool) {
        if let Some(tpi) = self.drives.get_mut(handle.0).and_then(Drive::tpi_mut) {
            tpi.set_host_enabled(enabled);
        }
    }

    /// Fire every timer due at or before `time`, then move time there.
    pub fn run_until(&mut self, time: Ticks) {
        while let Some(event) = self.scheduler.pop_due(time) {
            self.dispatch(event);
        }
        self.scheduler.advance_to(time);
    }

    /// Machine reset: every drive's board resets, the bus is released.
    /// Power state and disks are kept.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.host_edges.clear();
        for index in 0..self.drives.len() {
            let handle = DriveHandle(index);
            let drive = &mut self.drives[index];
            if !drive.is_powered() {
                continue;
            }
            if let Some(token) = drive.irq_retry.take() {
                self.scheduler.cancel(token);
            }
            drive.power_off();
            self.power_on(handle);
        }
    }

    fn dispatch(&mut self, event: DriveEvent) {
        match event {
            DriveEvent::ByteTick(handle) => {
                if let Some(drive) = self.drives.get_mut(handle.0) {
                    drive.on_byte_tick();
                }
            }
            DriveEvent::TimerIrq(handle) => {
                let Some(drive) = self.drives.get_mut(handle.0) else {
                    return;
                };
                if !drive.raise_timer_irq() && drive.irq_retry.is_none() {
                    drive.irq_retry = Some(
                        self.scheduler
                            .schedule_periodic(IRQ_RETRY_PERIOD, DriveEvent::IrqRetry(handle)),
                    );
                }
            }
            DriveEvent::IrqRetry(handle) => {
                let Some(drive) = self.drives.get_mut(handle.0) else {
                    return;
                };
                if drive.raise_timer_irq() {
                    if let Some(token) = drive.irq_retry.take() {
                        self.scheduler.cancel(token);
                    }
                }
            }
        }
    }

    /// Cancel the byte timer and arm it again at the drive's current speed,
    /// if the media is turning.
    fn rearm_rotation(&mut self, handle: DriveHandle) {
        let Some(drive) = self.drives.get_mut(handle.0) else {
            return;
        };
        if let Some(token) = drive.rotation_timer.take() {
            self.scheduler.cancel(token);
        }
        match drive.rotation_period() {
            Some(period) => {
                drive.rotation_timer = Some(
                    self.scheduler
                        .schedule_periodic(period, DriveEvent::ByteTick(handle)),
                );
            }
            None => drive.stop_rotation(),
        }
    }

    fn apply_bus_changes(&mut self, handle: DriveHandle, changes: Vec<(Line, bool)>) {
        let Some(id) = self.drives.get(handle.0).and_then(Drive::participant) else {
            return;
        };
        self.set_outputs(id, changes);
    }

    fn set_outputs(&mut self, id: ParticipantId, changes: Vec<(Line, bool)>) {
        let mut observer = Participants {
            host: self.host,
            host_edges: &mut self.host_edges,
            drives: &mut self.drives,
        };
        let mut settled = true;
        for (line, level) in changes {
            settled &= self.bus.set_output(id, line, level, &mut observer);
        }
        if !settled {
            for drive in &mut self.drives {
                if let Some(id) = drive.participant() {
                    drive.resync_bus_outputs(
                        self.bus.output(id, Line::Clock),
                        self.bus.output(id, Line::Data),
                    );
                }
            }
        }
    }

    fn host_tpi(&self, handle: DriveHandle) -> Option<&TpiController> {
        self.drives.get(handle.0).and_then(Drive::tpi)
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

/// A drive's address space, borrowed from its [`System`] for one CPU step.
pub struct DriveBus<'a> {
    system: &'a mut System,
    handle: DriveHandle,
}

impl Bus for DriveBus<'_> {
    fn read(&mut self, address: u16) -> u8 {
        self.system.drive_read(self.handle, address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.system.drive_write(self.handle, address, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::IrqSource;
    use emu_core::Observable;
    use format_cbm_disk::DiskFormat;

    fn d64() -> DiskImage {
        let format = DiskFormat::D64;
        DiskImage::mount(format, vec![0; format.image_len()])
    }

    fn motor_on(system: &mut System, drive: DriveHandle) {
        let mut bus = system.drive_bus(drive);
        bus.write(0x1C02, 0x6F);
        bus.write(0x1C00, 0x04);
    }

    #[test]
    fn host_is_first_participant() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        assert_eq!(system.bus().participants(), 2);
        assert_eq!(
            system.drive(drive).and_then(Drive::participant),
            Some(ParticipantId(1))
        );
    }

    #[test]
    fn parallel_drive_stays_off_the_bus() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::c1551(8, Vec::new()));
        assert_eq!(system.bus().participants(), 1);
        assert!(system.drive(drive).is_some_and(|d| d.participant().is_none()));
    }

    #[test]
    fn rotation_runs_only_with_motor_and_disk() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        motor_on(&mut system, drive);
        assert_eq!(system.scheduler().armed(), 0);

        system.mount(drive, d64());
        assert_eq!(system.scheduler().armed(), 1);
        system.run_until(Ticks::new(512 * 10));
        assert_eq!(system.drive(drive).and_then(|d| d.query("bytes")), Some(10u64.into()));

        system.unmount(drive);
        assert_eq!(system.scheduler().armed(), 0);
    }

    #[test]
    fn zone_change_rearms_at_new_rate() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.mount(drive, d64());
        motor_on(&mut system, drive);
        system.drive_write(drive, 0x1C00, 0x64);
        assert_eq!(system.scheduler().armed(), 1);
        system.run_until(Ticks::new(416 * 10));
        assert_eq!(system.drive(drive).and_then(|d| d.query("bytes")), Some(10u64.into()));
    }

    #[test]
    fn host_atn_is_acknowledged_by_drive() {
        let mut system = System::new();
        let _drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.host_set_line(Line::Atn, true);
        let levels = system.host_levels();
        assert!(!levels.atn);
        assert!(!levels.data, "drive pulls DATA in answer to ATN");
        let edges = system.take_host_edges();
        assert_eq!(
            edges,
            vec![
                Edge { line: Line::Atn, level: false },
                Edge { line: Line::Data, level: false },
            ]
        );
        system.host_set_line(Line::Atn, false);
        assert!(system.host_levels().data);
    }

    #[test]
    fn drive_write_reaches_bus() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.drive_write(drive, 0x1802, 0x1A);
        system.drive_write(drive, 0x1800, 0x08);
        assert!(!system.host_levels().clock);
        system.drive_write(drive, 0x1800, 0x00);
        assert!(system.host_levels().clock);
    }

    #[test]
    fn power_off_releases_bus_and_timers() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.mount(drive, d64());
        motor_on(&mut system, drive);
        system.drive_write(drive, 0x1802, 0x1A);
        system.drive_write(drive, 0x1800, 0x02);
        assert!(!system.host_levels().data);

        system.power_off(drive);
        assert!(system.host_levels().data);
        assert_eq!(system.scheduler().armed(), 0);

        system.host_set_line(Line::Atn, true);
        assert!(system.host_levels().data, "unpowered drive doesn't answer");
    }

    #[test]
    fn disarming_rotation_ends_byte_ready() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.mount(drive, d64());
        system.drive_write(drive, 0x1C0C, 0xEE);
        motor_on(&mut system, drive);
        system.run_until(Ticks::new(512));
        assert!(system.cpu_lines(drive).so);

        system.unmount(drive);
        assert!(!system.cpu_lines(drive).so);
        assert!(system.drive(drive).is_some_and(|d| !d.mechanism().ready()));

        system.mount(drive, d64());
        system.run_until(Ticks::new(1024));
        assert!(system.cpu_lines(drive).so);
        system.drive_write(drive, 0x1C00, 0x00);
        assert_eq!(system.scheduler().armed(), 0);
        assert!(!system.cpu_lines(drive).so);
    }

    #[test]
    fn periodic_irq_on_1551() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::c1551(8, Vec::new()));
        let period = MasterClock::XTAL_16MHZ.period_of_hz(TIMER_IRQ_HZ);
        assert!(!system.cpu_lines(drive).irq);
        system.run_until(period);
        assert!(system.cpu_lines(drive).irq);
        system.acknowledge_irq(drive);
        assert!(!system.cpu_lines(drive).irq);
    }

    #[test]
    fn deferred_periodic_irq_is_retried() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::c1551(8, Vec::new()));
        let period = MasterClock::XTAL_16MHZ.period_of_hz(TIMER_IRQ_HZ);

        // Left pending: the next one is coalesced, no retry needed.
        system.run_until(period);
        system.run_until(period * 2);
        assert!(system.drive(drive).is_some_and(|d| d.irq_retry.is_none()));
        system.acknowledge_irq(drive);

        // The TPI holds the line when the timer fires.
        system.drives[0].force_irq(IrqSource::Tpi, true);
        system.run_until(period * 3);
        assert!(system.drive(drive).is_some_and(|d| d.irq_retry.is_some()));
        assert_eq!(system.scheduler().armed(), 2);
        system.run_until(period * 3 + IRQ_RETRY_PERIOD);
        assert!(system.drive(drive).is_some_and(|d| d.irq_retry.is_some()));

        system.drives[0].force_irq(IrqSource::Tpi, false);
        assert!(!system.cpu_lines(drive).irq);
        system.run_until(period * 3 + IRQ_RETRY_PERIOD * 2);
        assert!(system.cpu_lines(drive).irq);
        assert!(system.drive(drive).is_some_and(|d| d.irq_retry.is_none()));
        assert_eq!(system.scheduler().armed(), 1);
    }

    #[test]
    fn host_parallel_link() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::c1551(8, Vec::new()));
        system.host_write_data(drive, 0x5A);
        assert_eq!(system.drive_read(drive, 0x4000), 0x5A);

        system.drive_write(drive, 0x4005, 0x0B);
        system.drive_write(drive, 0x4002, 0x09);
        assert_eq!(system.host_read_handshake(drive), 0x80);
        assert_eq!(system.host_read_status(drive), 0x01);

        system.host_write_handshake(drive, 0x00);
        assert_eq!(system.drive_read(drive, 0x4002) & 0x80, 0);

        system.set_host_enabled(drive, false);
        assert_eq!(system.host_read_status(drive), 0xFF);
    }

    #[test]
    fn serial_drive_has_no_parallel_link() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.host_write_data(drive, 0x00);
        assert_eq!(system.host_read_data(drive), 0xFF);
    }

    #[test]
    fn insert_file_detects_format() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        assert!(system.insert_file(drive, "d64", vec![0; 174_848]).is_ok());
        assert!(system.drive(drive).is_some_and(|d| d.mechanism().has_disk()));
        assert!(matches!(
            system.insert_file(drive, "tap", vec![0; 10]),
            Err(DiskError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn reset_keeps_disk_and_stops_motor() {
        let mut system = System::new();
        let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
        system.mount(drive, d64());
        motor_on(&mut system, drive);
        system.reset();
        let d = system.drive(drive).expect("drive");
        assert!(d.mechanism().has_disk());
        assert!(!d.mechanism().motor());
        assert_eq!(system.scheduler().armed(), 0);
    }
}
