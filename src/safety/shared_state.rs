// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-safety-io project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Diagnostic snapshot of the safety monitor
//!
//! The daemon publishes a [`SafetySnapshot`] after every cycle so that other
//! tasks (heartbeat, tests, future front-ends) can observe the monitor
//! without touching the register map.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::monitor::{SafetyMonitor, SafetySystemState};
use super::{SafetyZone, SensorStatus};
use crate::modbus::registers::{ANALOG_CHANNELS, DIGITAL_CHANNELS};

/// Analog channel as seen in the latest cycle
#[derive(Debug, Clone, Serialize)]
pub struct AnalogChannelSnapshot {
    pub raw: u16,
    pub distance: f32,
    pub zone: SafetyZone,
    pub status: SensorStatus,
    pub alarm_flags: u16,
    pub error_count: u16,
}

/// Digital input as seen in the latest cycle
#[derive(Debug, Clone, Serialize)]
pub struct DigitalChannelSnapshot {
    pub level: Option<bool>,
    pub triggered: bool,
    pub status: SensorStatus,
    pub change_count: u16,
}

/// Safety monitor state after a cycle
#[derive(Debug, Clone, Serialize)]
pub struct SafetySnapshot {
    pub timestamp: DateTime<Utc>,
    pub system: SafetySystemState,
    pub uptime_seconds: u64,
    pub analog: Vec<AnalogChannelSnapshot>,
    pub digital: Vec<DigitalChannelSnapshot>,
}

impl SafetySnapshot {
    pub fn from_monitor(monitor: &SafetyMonitor) -> Self {
        let system = *monitor.state();
        Self {
            timestamp: Utc::now(),
            system,
            uptime_seconds: system.uptime.as_secs(),
            analog: monitor
                .analog_sensors()
                .iter()
                .map(|s| AnalogChannelSnapshot {
                    raw: s.raw,
                    distance: s.distance,
                    zone: s.zone,
                    status: s.status,
                    alarm_flags: s.alarm_flags,
                    error_count: s.error_count,
                })
                .collect(),
            digital: monitor
                .digital_sensors()
                .iter()
                .map(|s| DigitalChannelSnapshot {
                    level: s.level,
                    triggered: s.triggered,
                    status: s.status,
                    change_count: s.change_count,
                })
                .collect(),
        }
    }
}

impl Default for SafetySnapshot {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            system: SafetySystemState::default(),
            uptime_seconds: 0,
            analog: Vec::with_capacity(ANALOG_CHANNELS),
            digital: Vec::with_capacity(DIGITAL_CHANNELS),
        }
    }
}

/// Latest snapshot shared between the safety daemon and its observers
pub type SharedSafetyState = Arc<RwLock<SafetySnapshot>>;
