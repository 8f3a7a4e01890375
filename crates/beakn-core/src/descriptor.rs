//! Beacon descriptors and the validated regions derived from them.
//!
//! A [`BeaconDescriptor`] is what the host app hands to the tracker: a region
//! UUID, a caller-chosen identifier, and optional major/minor scoping values.
//! Validation turns it into a [`BeaconRegion`], which is what gets handed to
//! the platform.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{BeaknError, Result};

/// A beacon region the host app wants to watch.
///
/// Equality and hashing only consider `uuid` and `identifier`. Two descriptors
/// describing the same region family with different major/minor scoping are
/// equal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "uuid": "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0",
    "identifier": "lobby",
    "major": 1,
    "minor": null
}))]
pub struct BeaconDescriptor {
    /// Proximity UUID of the region.
    #[schema(example = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0")]
    pub uuid: String,

    /// Caller-chosen key, unique per logical region.
    #[schema(example = "lobby")]
    pub identifier: String,

    /// Optional major value narrowing the region.
    #[serde(default)]
    pub major: Option<u16>,

    /// Optional minor value; only valid together with `major`.
    #[serde(default)]
    pub minor: Option<u16>,
}

impl BeaconDescriptor {
    /// Create a descriptor.
    pub fn new(
        uuid: impl Into<String>,
        identifier: impl Into<String>,
        major: Option<u16>,
        minor: Option<u16>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            identifier: identifier.into(),
            major,
            minor,
        }
    }

    /// Validate the descriptor and derive the platform region for it.
    ///
    /// # Errors
    ///
    /// - [`BeaknError::InvalidUuidString`] if `uuid` is not a UUID
    /// - [`BeaknError::InvalidBeaknInfo`] if `minor` is set without `major`
    pub fn region(&self) -> Result<BeaconRegion> {
        let uuid = Uuid::parse_str(&self.uuid)
            .map_err(|_| BeaknError::InvalidUuidString(self.uuid.clone()))?;

        let scope = match (self.major, self.minor) {
            (None, None) => RegionScope::Any,
            (Some(major), None) => RegionScope::Major(major),
            (Some(major), Some(minor)) => RegionScope::MajorMinor(major, minor),
            (None, Some(_)) => {
                return Err(BeaknError::InvalidBeaknInfo {
                    identifier: self.identifier.clone(),
                })
            }
        };

        Ok(BeaconRegion::new(uuid, self.identifier.clone(), scope))
    }
}

impl PartialEq for BeaconDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid && self.identifier == other.identifier
    }
}

impl Eq for BeaconDescriptor {}

impl Hash for BeaconDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl std::fmt::Display for BeaconDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UUID: {} - identifier: {} - Major: {} - Minor: {}",
            self.uuid,
            self.identifier,
            OptionalValue(self.major),
            OptionalValue(self.minor)
        )
    }
}

struct OptionalValue(Option<u16>);

impl std::fmt::Display for OptionalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("none"),
        }
    }
}

/// How narrowly a region is scoped below its UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegionScope {
    /// Every beacon advertising the UUID.
    Any,
    /// Beacons with the UUID and this major value.
    Major(u16),
    /// A single beacon: UUID, major and minor.
    MajorMinor(u16, u16),
}

impl RegionScope {
    /// The major value, if the scope has one.
    #[must_use]
    pub const fn major(self) -> Option<u16> {
        match self {
            Self::Any => None,
            Self::Major(major) | Self::MajorMinor(major, _) => Some(major),
        }
    }

    /// The minor value, if the scope has one.
    #[must_use]
    pub const fn minor(self) -> Option<u16> {
        match self {
            Self::Any | Self::Major(_) => None,
            Self::MajorMinor(_, minor) => Some(minor),
        }
    }
}

/// A validated region, ready to be handed to the platform.
///
/// Regions are always configured to notify on entry and on exit, and never
/// to report their state just because the display turned on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct BeaconRegion {
    /// Parsed proximity UUID.
    pub uuid: Uuid,

    /// Identifier shared with the originating descriptor.
    pub identifier: String,

    /// Major/minor scoping.
    pub scope: RegionScope,

    /// Report boundary crossings into the region.
    pub notify_on_entry: bool,

    /// Report boundary crossings out of the region.
    pub notify_on_exit: bool,

    /// Report state whenever the device display turns on.
    pub notify_entry_state_on_display: bool,
}

impl BeaconRegion {
    /// Build a region with entry/exit notifications enabled.
    #[must_use]
    pub const fn new(uuid: Uuid, identifier: String, scope: RegionScope) -> Self {
        Self {
            uuid,
            identifier,
            scope,
            notify_on_entry: true,
            notify_on_exit: true,
            notify_entry_state_on_display: false,
        }
    }

    /// Convert back into a descriptor. The UUID is rendered upper-case.
    #[must_use]
    pub fn descriptor(&self) -> BeaconDescriptor {
        BeaconDescriptor {
            uuid: self.uuid.hyphenated().to_string().to_uppercase(),
            identifier: self.identifier.clone(),
            major: self.scope.major(),
            minor: self.scope.minor(),
        }
    }
}
