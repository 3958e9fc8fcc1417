//! Device bridge: lifecycle control, command dispatch and readings
//!
//! [`controller`] holds the state machine that keeps the link alive;
//! [`commands`] and [`readings`] are the pluggable collaborators it drives.

pub mod commands;
pub mod controller;
pub mod readings;

pub use commands::{CommandDispatcher, DeviceCommand, DispatchError, ShellCommandDispatcher};
pub use controller::{ActiveCredential, LifecycleController, LinkMonitor, LinkState};
pub use readings::{ReadingSource, SimulatedSensor, TelemetryReading};
