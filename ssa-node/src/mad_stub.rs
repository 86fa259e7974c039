//! A placeholder management-datagram transport and device-event source.
//!
//! The real implementations of [`ManagementDatagramChannel`] and
//! [`FabricDeviceEvents`] sit on top of the fabric's verbs/MAD driver
//! (`libibumad` in the original), which is hardware-specific and out of
//! scope for this crate. This stand-in never produces a datagram or
//! device event, so a node wired to it blocks on fabric I/O exactly the
//! way a node with no cable plugged in would — a faithful placeholder
//! rather than a fake success path.

use async_trait::async_trait;
use ssa_errors::SsaError;
use ssa_server::channels::DevEvent;
use ssa_server::mad::{FabricDeviceEvents, Mad, ManagementDatagramChannel};
use ssa_types::Lid;
use std::time::Duration;

/// A management-datagram channel with no backing fabric device.
#[derive(Debug, Default)]
pub struct NullMadChannel;

#[async_trait]
impl ManagementDatagramChannel for NullMadChannel {
    async fn send_request(&self, _mad: Mad, _timeout: Duration) -> Result<Mad, SsaError> {
        std::future::pending().await
    }

    async fn recv(&self) -> Result<Mad, SsaError> {
        std::future::pending().await
    }
}

/// A fabric-device event source with no backing fabric device.
#[derive(Debug, Default)]
pub struct NullDeviceEvents;

#[async_trait]
impl FabricDeviceEvents for NullDeviceEvents {
    async fn next_event(&self) -> Result<(Lid, DevEvent), SsaError> {
        std::future::pending().await
    }
}
