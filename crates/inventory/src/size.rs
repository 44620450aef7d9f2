use core::str::FromStr;

use serde::{Deserialize, Serialize};

use storefront_core::DomainError;

/// Garment size. Every stock record carries exactly these four keys.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeKey {
    S,
    M,
    L,
    XL,
}

impl SizeKey {
    pub const ALL: [SizeKey; 4] = [SizeKey::S, SizeKey::M, SizeKey::L, SizeKey::XL];

    /// Document field name for this size.
    pub fn as_str(self) -> &'static str {
        match self {
            SizeKey::S => "S",
            SizeKey::M => "M",
            SizeKey::L => "L",
            SizeKey::XL => "XL",
        }
    }

    /// Recognize a size key. Returns `None` for anything outside the fixed set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "S" => Some(SizeKey::S),
            "M" => Some(SizeKey::M),
            "L" => Some(SizeKey::L),
            "XL" => Some(SizeKey::XL),
            _ => None,
        }
    }
}

impl core::fmt::Display for SizeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::validation(format!("unknown size key: {s:?}")))
    }
}
