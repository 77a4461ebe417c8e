//! FCP device records
//!
//! Row types for the `fcp` table: the hardware-discovered part reported by
//! the fleet and the usage part owned by allocation workflows.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// FCP ID
// =============================================================================

/// A 4-hex-digit FCP device address
///
/// Stored lower-case and zero-padded so that string order equals address
/// order. Parsing is case-insensitive and accepts 1-4 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FcpId(String);

impl FcpId {
    /// Build from a numeric device address
    pub fn from_number(n: u16) -> Self {
        Self(format!("{:04x}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric device address
    pub fn number(&self) -> u16 {
        // Constructors only admit valid 4-digit hex.
        u16::from_str_radix(&self.0, 16).unwrap_or_default()
    }

    /// Trailing two hex digits; devices of different paths pair by it
    #[inline]
    pub fn index(&self) -> u8 {
        (self.number() & 0xff) as u8
    }

    /// Upper-case form used in shorthand output
    pub fn to_upper(&self) -> String {
        self.0.to_uppercase()
    }
}

impl FromStr for FcpId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > 4 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "invalid FCP device address: {:?}",
                s
            )));
        }
        let n = u16::from_str_radix(s, 16)
            .map_err(|e| Error::InvalidInput(format!("invalid FCP device address {}: {}", s, e)))?;
        Ok(Self::from_number(n))
    }
}

impl TryFrom<String> for FcpId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FcpId> for String {
    fn from(id: FcpId) -> Self {
        id.0
    }
}

impl std::fmt::Display for FcpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a list of addresses
pub fn parse_fcp_ids<S: AsRef<str>>(ids: &[S]) -> Result<Vec<FcpId>> {
    ids.iter().map(|s| s.as_ref().parse()).collect()
}

// =============================================================================
// FCP State
// =============================================================================

/// Discovery state reported by the hypervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FcpState {
    Free,
    Active,
    Offline,
    #[serde(rename = "notfound")]
    NotFound,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl FcpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FcpState::Free => "free",
            FcpState::Active => "active",
            FcpState::Offline => "offline",
            FcpState::NotFound => "notfound",
            FcpState::Unknown => "",
        }
    }
}

impl std::fmt::Display for FcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for FcpState {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "free" => FcpState::Free,
            "active" => FcpState::Active,
            "offline" => FcpState::Offline,
            "notfound" => FcpState::NotFound,
            _ => FcpState::Unknown,
        }
    }
}

// =============================================================================
// Hardware-Discovered Info
// =============================================================================

/// FCP device information as reported by a hypervisor node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpInfo {
    pub fcp_id: FcpId,
    #[serde(default)]
    pub wwpn_npiv: String,
    #[serde(default)]
    pub wwpn_phy: String,
    #[serde(default)]
    pub chpid: String,
    #[serde(default)]
    pub state: FcpState,
    #[serde(default)]
    pub owner: String,
}

/// Partial update of the hardware-discovered columns
///
/// Each `Some` field is written, `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpInfoPatch {
    pub wwpn_npiv: Option<String>,
    pub wwpn_phy: Option<String>,
    pub chpid: Option<String>,
    pub state: Option<FcpState>,
    pub owner: Option<String>,
}

impl FcpInfoPatch {
    /// Patch carrying only the fields of `reported` that differ from `device`
    pub fn diff(device: &FcpDevice, reported: &FcpInfo) -> Option<Self> {
        let changed = |old: &str, new: &str| (old != new).then(|| new.to_string());
        let patch = Self {
            wwpn_npiv: changed(&device.wwpn_npiv, &reported.wwpn_npiv),
            wwpn_phy: changed(&device.wwpn_phy, &reported.wwpn_phy),
            chpid: changed(&device.chpid, &reported.chpid),
            state: (device.state != reported.state).then_some(reported.state),
            owner: changed(&device.owner, &reported.owner),
        };
        (!patch.is_empty()).then_some(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.wwpn_npiv.is_none()
            && self.wwpn_phy.is_none()
            && self.chpid.is_none()
            && self.state.is_none()
            && self.owner.is_none()
    }

    /// Write the present fields into `device`
    pub fn apply(&self, device: &mut FcpDevice) {
        if let Some(v) = &self.wwpn_npiv {
            device.wwpn_npiv = v.clone();
        }
        if let Some(v) = &self.wwpn_phy {
            device.wwpn_phy = v.clone();
        }
        if let Some(v) = &self.chpid {
            device.chpid = v.clone();
        }
        if let Some(v) = self.state {
            device.state = v;
        }
        if let Some(v) = &self.owner {
            device.owner = v.clone();
        }
    }
}

impl From<&FcpInfo> for FcpInfoPatch {
    fn from(info: &FcpInfo) -> Self {
        Self {
            wwpn_npiv: Some(info.wwpn_npiv.clone()),
            wwpn_phy: Some(info.wwpn_phy.clone()),
            chpid: Some(info.chpid.clone()),
            state: Some(info.state),
            owner: Some(info.owner.clone()),
        }
    }
}

// =============================================================================
// FCP Device Row
// =============================================================================

/// One row of the `fcp` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpDevice {
    pub fcp_id: FcpId,
    /// Guest currently using the device, empty when unassigned
    pub assigner_id: String,
    pub connections: u32,
    pub reserved: bool,
    pub wwpn_npiv: String,
    pub wwpn_phy: String,
    pub chpid: String,
    pub state: FcpState,
    pub owner: String,
    /// Template the usage is accounted against, empty when none
    pub tmpl_id: String,
}

impl FcpDevice {
    /// New unused row from discovered info
    pub fn from_info(info: &FcpInfo) -> Self {
        Self {
            fcp_id: info.fcp_id.clone(),
            assigner_id: String::new(),
            connections: 0,
            reserved: false,
            wwpn_npiv: info.wwpn_npiv.clone(),
            wwpn_phy: info.wwpn_phy.clone(),
            chpid: info.chpid.clone(),
            state: info.state,
            owner: info.owner.clone(),
            tmpl_id: String::new(),
        }
    }

    /// Attached or held by an in-flight allocation
    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.connections > 0 || self.reserved
    }

    /// Can be handed out by the allocation engine
    #[inline]
    pub fn is_eligible(&self) -> bool {
        !self.is_in_use()
            && self.state == FcpState::Free
            && !self.wwpn_npiv.is_empty()
            && !self.wwpn_phy.is_empty()
    }

    pub fn usage(&self) -> FcpUsage {
        FcpUsage {
            assigner_id: self.assigner_id.clone(),
            reserved: self.reserved,
            connections: self.connections,
            tmpl_id: self.tmpl_id.clone(),
        }
    }

    pub fn allocated(&self) -> AllocatedFcp {
        AllocatedFcp {
            fcp_id: self.fcp_id.clone(),
            wwpn_npiv: self.wwpn_npiv.clone(),
            wwpn_phy: self.wwpn_phy.clone(),
        }
    }
}

/// Usage columns of an FCP device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpUsage {
    pub assigner_id: String,
    pub reserved: bool,
    pub connections: u32,
    pub tmpl_id: String,
}

/// A device handed out by the allocation engine
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocatedFcp {
    pub fcp_id: FcpId,
    pub wwpn_npiv: String,
    pub wwpn_phy: String,
}
