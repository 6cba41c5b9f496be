use crate::error::{ExoError, ExoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value carried by a controller point
///
/// Controllers report numbers, booleans and strings; the JSON value is kept
/// as-is so no precision or type information is lost.
pub type PointValue = serde_json::Value;

/// Point address identifying one controller value
///
/// A point address is written `device:item`, where both parts are
/// non-negative integers. It is the key for every value and error
/// reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PointAddress {
    device: u32,
    item: u32,
}

impl PointAddress {
    /// Create a new point address
    ///
    /// # Arguments
    ///
    /// * `device` - Device number (0 is the controller itself)
    /// * `item` - Item index within the device
    pub fn new(device: u32, item: u32) -> Self {
        Self { device, item }
    }

    /// Parse a point address from `device:item` format
    ///
    /// Surrounding whitespace around either number is tolerated; anything
    /// else that is not a non-negative integer is rejected.
    ///
    /// # Returns
    ///
    /// Returns `Ok(PointAddress)` if parsing succeeds, `Err(ExoError::InvalidAddress)` otherwise
    pub fn from_string(s: &str) -> ExoResult<Self> {
        let (device, item) = s.split_once(':').ok_or_else(|| {
            ExoError::InvalidAddress(format!("{}: expected 'device:item'", s))
        })?;

        let device = device
            .trim()
            .parse::<u32>()
            .map_err(|_| ExoError::InvalidAddress(format!("{}: invalid device number", s)))?;
        let item = item
            .trim()
            .parse::<u32>()
            .map_err(|_| ExoError::InvalidAddress(format!("{}: invalid item number", s)))?;

        Ok(Self { device, item })
    }

    /// Get the device number
    pub fn device(&self) -> u32 {
        self.device
    }

    /// Get the item index
    pub fn item(&self) -> u32 {
        self.item
    }
}

impl FromStr for PointAddress {
    type Err = ExoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<String> for PointAddress {
    type Error = ExoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(&value)
    }
}

impl From<PointAddress> for String {
    fn from(address: PointAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for PointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.item)
    }
}
