//! Commodore floppy drives: the VC1541 on the serial bus and the C1551 on
//! the fast parallel link.
//!
//! A drive is its head mechanism, its controller board and its memory map.
//! The CPU cores (the drive's 6502/6510T and the host's) are not part of
//! this crate; they call in through [`emu_core::Bus`] and the host port
//! methods on [`System`], and see the drive's IRQ and SO lines through
//! [`CpuLines`].
//!
//! ```no_run
//! use drive_cbm_floppy::{DriveConfig, System};
//! use emu_core::{Bus, Ticks};
//!
//! let mut system = System::new();
//! let drive = system.add_drive(DriveConfig::vc1541(8, Vec::new()));
//! system.insert_file(drive, "d64", vec![0; 174_848])?;
//! system.drive_bus(drive).write(0x1C02, 0x6F);
//! system.drive_bus(drive).write(0x1C00, 0x04);
//! system.run_until(Ticks::new(16_000));
//! # Ok::<(), format_cbm_disk::DiskError>(())
//! ```

pub mod bits;
mod config;
mod drive;
mod irq;
pub mod mechanism;
mod system;
mod tpi_controller;
mod via_controller;

pub use config::{DriveConfig, DriveModel};
pub use drive::{Controller, CpuLines, Drive};
pub use irq::{IrqLine, IrqSource};
pub use mechanism::{ByteTick, Controls, DEFAULT_MAX_TRACK, DriveMechanism};
pub use system::{DriveBus, DriveEvent, DriveHandle, IRQ_RETRY_PERIOD, System, TIMER_IRQ_HZ};
pub use tpi_controller::TpiController;
pub use via_controller::ViaController;
