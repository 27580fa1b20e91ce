// Alert lifecycle status

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    Pending,
    Read,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Read => "read",
            AlertStatus::Dismissed => "dismissed",
        }
    }
}

impl From<&str> for AlertStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "read" => AlertStatus::Read,
            "dismissed" => AlertStatus::Dismissed,
            _ => AlertStatus::Pending,
        }
    }
}
