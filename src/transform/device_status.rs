// ABOUTME: Builds the single devicestatus document for a snapshot
// ABOUTME: Pump block for insulin pumps; Guardian CGM reports its own battery as the uploader battery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use carelink_core::models::{
    ConnectStatus, InsulinOnBoard, PumpBattery, PumpStatus, UploaderStatus,
};
use carelink_core::time::from_epoch_millis;
use carelink_core::{DeviceFamily, DeviceStatus, Snapshot};

use super::clock::{DeviceTime, PumpClock};
use crate::errors::TransformError;

/// Build the device status dated at the last device upload
pub(crate) fn device_status(
    snapshot: &Snapshot,
    clock: &PumpClock,
    device_clock: &DeviceTime,
) -> Result<DeviceStatus, TransformError> {
    let millis = snapshot.last_medical_device_data_update_server_time;
    let created_at = from_epoch_millis(millis).ok_or(TransformError::ServerTime { millis })?;

    let mut connect = ConnectStatus {
        sensor_state: snapshot.sensor_state.clone(),
        calib_status: snapshot.calib_status.clone(),
        sensor_duration_hours: snapshot.sensor_duration_hours,
        time_to_next_calib_hours: snapshot.time_to_next_calib_hours,
        conduit_in_range: snapshot.conduit_in_range,
        conduit_medical_device_in_range: snapshot.conduit_medical_device_in_range,
        conduit_sensor_in_range: snapshot.conduit_sensor_in_range,
        medical_device_battery_level_percent: None,
        medical_device_family: None,
    };

    if snapshot.device_family() == DeviceFamily::Guardian {
        connect.medical_device_battery_level_percent = snapshot.medical_device_battery_level_percent;
        connect.medical_device_family = Some(snapshot.medical_device_family.clone());
        return Ok(DeviceStatus {
            created_at,
            device: snapshot.device_name(),
            uploader: UploaderStatus {
                battery: snapshot.medical_device_battery_level_percent,
            },
            pump: None,
            connect,
        });
    }

    let pump_clock = clock
        .resolve_parsed(device_clock)
        .ok_or_else(|| TransformError::DeviceClock {
            raw: snapshot.medical_device_time.clone().unwrap_or_default(),
        })?;
    let bolusiob = snapshot
        .active_insulin
        .as_ref()
        .and_then(|active| active.amount)
        // Any negative amount means the pump does not know its IOB
        .filter(|amount| *amount >= 0.0);

    Ok(DeviceStatus {
        created_at,
        device: snapshot.device_name(),
        uploader: UploaderStatus {
            battery: snapshot.conduit_battery_level,
        },
        pump: Some(PumpStatus {
            battery: PumpBattery {
                percent: snapshot.medical_device_battery_level_percent,
            },
            reservoir: snapshot.reservoir(),
            iob: InsulinOnBoard {
                timestamp: created_at,
                bolusiob,
            },
            clock: pump_clock,
        }),
        connect,
    })
}
