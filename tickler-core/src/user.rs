//! Task owners and the contact projection the scanner reads.

use serde::{Deserialize, Serialize};

const DAILY_LIMIT: usize = 10;
const VIP_DAILY_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub is_vip: bool,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            first_name: None,
            email: email.into(),
            is_vip: false,
        }
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_vip(mut self, is_vip: bool) -> Self {
        self.is_vip = is_vip;
        self
    }

    /// Tasks this user may create per UTC day.
    pub fn daily_limit(&self) -> usize {
        if self.is_vip { VIP_DAILY_LIMIT } else { DAILY_LIMIT }
    }

    /// First name when set, account name otherwise.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn contact(&self) -> OwnerContact {
        OwnerContact {
            display_name: self.display_name().to_string(),
            address: self.email.clone(),
        }
    }
}

/// Read-only owner projection handed to the scanner. Never stored on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub display_name: String,
    pub address: String,
}
