//! Request and response types for the vehicle data API
//!
//! Every status endpoint answers with a JSON array in which each element
//! carries exactly one populated field. The records below mirror that shape:
//! one record per array element, all fields optional, order preserved.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Types
// =============================================================================

/// Latest reading of a single telemetry field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Reading as sent by the vehicle (numbers and booleans arrive as strings)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Readout time in milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Resource {
    pub fn new(value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            value: Some(value.into()),
            timestamp: Some(timestamp),
        }
    }

    /// Readout time as a UTC datetime
    ///
    /// Returns `None` when the timestamp is absent or out of range.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Discoverable resource endpoint of a vehicle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Per-call query options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Vehicle identification number
    pub vehicle_id: String,
}

impl Options {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
        }
    }
}

// =============================================================================
// Domains
// =============================================================================

/// Telemetry category served under `.../containers/{domain}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    VehicleStatus,
    FuelStatus,
    ElectricVehicle,
    VehicleLockStatus,
    PayAsYouDrive,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::VehicleStatus,
        Domain::FuelStatus,
        Domain::ElectricVehicle,
        Domain::VehicleLockStatus,
        Domain::PayAsYouDrive,
    ];

    /// Path segment used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::VehicleStatus => "vehiclestatus",
            Domain::FuelStatus => "fuelstatus",
            Domain::ElectricVehicle => "electricvehicle",
            Domain::VehicleLockStatus => "vehiclelockstatus",
            Domain::PayAsYouDrive => "payasyoudrive",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status record decoded from one element of a container array
pub trait Container: DeserializeOwned + Send + 'static {
    /// Domain this record belongs to
    const DOMAIN: Domain;

    /// Populated fields as `(wire name, resource)` pairs, in declaration order
    fn populated(&self) -> Vec<(&'static str, &Resource)>;

    fn is_empty(&self) -> bool {
        self.populated().is_empty()
    }
}

macro_rules! impl_container {
    ($ty:ty, $domain:expr, { $($field:ident => $wire:literal),+ $(,)? }) => {
        impl Container for $ty {
            const DOMAIN: Domain = $domain;

            fn populated(&self) -> Vec<(&'static str, &Resource)> {
                let mut fields = Vec::new();
                $(
                    if let Some(resource) = &self.$field {
                        fields.push(($wire, resource));
                    }
                )+
                fields
            }
        }
    };
}

// =============================================================================
// Status Containers
// =============================================================================

/// Door, window, light and roof state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decklidstatus: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorstatusfrontleft: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorstatusfrontright: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorstatusrearleft: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorstatusrearright: Option<Resource>,
    #[serde(
        default,
        rename = "interiorLightsFront",
        skip_serializing_if = "Option::is_none"
    )]
    pub interior_lights_front: Option<Resource>,
    #[serde(
        default,
        rename = "interiorLightsRear",
        skip_serializing_if = "Option::is_none"
    )]
    pub interior_lights_rear: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lightswitchposition: Option<Resource>,
    #[serde(
        default,
        rename = "readingLampFrontLeft",
        skip_serializing_if = "Option::is_none"
    )]
    pub reading_lamp_front_left: Option<Resource>,
    #[serde(
        default,
        rename = "readingLampFrontRight",
        skip_serializing_if = "Option::is_none"
    )]
    pub reading_lamp_front_right: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooftopstatus: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunroofstatus: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowstatusfrontleft: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowstatusfrontright: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowstatusrearleft: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowstatusrearright: Option<Resource>,
}

impl_container!(VehicleStatus, Domain::VehicleStatus, {
    decklidstatus => "decklidstatus",
    doorstatusfrontleft => "doorstatusfrontleft",
    doorstatusfrontright => "doorstatusfrontright",
    doorstatusrearleft => "doorstatusrearleft",
    doorstatusrearright => "doorstatusrearright",
    interior_lights_front => "interiorLightsFront",
    interior_lights_rear => "interiorLightsRear",
    lightswitchposition => "lightswitchposition",
    reading_lamp_front_left => "readingLampFrontLeft",
    reading_lamp_front_right => "readingLampFrontRight",
    rooftopstatus => "rooftopstatus",
    sunroofstatus => "sunroofstatus",
    windowstatusfrontleft => "windowstatusfrontleft",
    windowstatusfrontright => "windowstatusfrontright",
    windowstatusrearleft => "windowstatusrearleft",
    windowstatusrearright => "windowstatusrearright",
});

/// Liquid fuel range and tank level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rangeliquid: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tanklevelpercent: Option<Resource>,
}

impl_container!(FuelStatus, Domain::FuelStatus, {
    rangeliquid => "rangeliquid",
    tanklevelpercent => "tanklevelpercent",
});

/// Battery state of charge and electric range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectricVehicleStatus {
    /// State of charge in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rangeelectric: Option<Resource>,
}

impl_container!(ElectricVehicleStatus, Domain::ElectricVehicle, {
    soc => "soc",
    rangeelectric => "rangeelectric",
});

/// Central locking state and heading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleLockStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorlockstatusvehicle: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorlockstatusdecklid: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doorlockstatusgas: Option<Resource>,
    #[serde(
        default,
        rename = "positionHeading",
        skip_serializing_if = "Option::is_none"
    )]
    pub position_heading: Option<Resource>,
}

impl_container!(VehicleLockStatus, Domain::VehicleLockStatus, {
    doorlockstatusvehicle => "doorlockstatusvehicle",
    doorlockstatusdecklid => "doorlockstatusdecklid",
    doorlockstatusgas => "doorlockstatusgas",
    position_heading => "positionHeading",
});

/// Odometer reading for usage-based insurance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayAsYouDriveStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odo: Option<Resource>,
}

impl_container!(PayAsYouDriveStatus, Domain::PayAsYouDrive, {
    odo => "odo",
});
