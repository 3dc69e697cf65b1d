use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Capability identifier.
///
/// The vocabulary is closed: every capability the platform knows is a variant
/// here, with a canonical `resource:action[:own]` string form. Adding a
/// capability means adding a variant and giving it to the roles that should
/// carry it; the resolver needs no change. The `:own` suffix denotes the
/// variant restricted to resources owned by the principal's client.
///
/// `Wildcard` is the single "all permissions, present and future" sentinel;
/// the only place it is interpreted is the resolver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    Wildcard,

    ShipmentsRead,
    ShipmentsReadOwn,
    ShipmentsWrite,

    TrackingRead,
    TrackingReadOwn,
    TrackingWrite,

    InvoicesRead,
    InvoicesReadOwn,
    InvoicesWrite,

    SupportRead,
    SupportReadOwn,
    SupportWrite,

    ClientsRead,
    ClientsWrite,

    RolesRead,
    RolesWrite,

    UsersRead,
    UsersWrite,
}

/// Every known permission, wildcard included (registry/listing order).
pub const ALL_PERMISSIONS: &[Permission] = &[
    Permission::Wildcard,
    Permission::ShipmentsRead,
    Permission::ShipmentsReadOwn,
    Permission::ShipmentsWrite,
    Permission::TrackingRead,
    Permission::TrackingReadOwn,
    Permission::TrackingWrite,
    Permission::InvoicesRead,
    Permission::InvoicesReadOwn,
    Permission::InvoicesWrite,
    Permission::SupportRead,
    Permission::SupportReadOwn,
    Permission::SupportWrite,
    Permission::ClientsRead,
    Permission::ClientsWrite,
    Permission::RolesRead,
    Permission::RolesWrite,
    Permission::UsersRead,
    Permission::UsersWrite,
];

impl Permission {
    /// Canonical `resource:action[:own]` form (or `*`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Wildcard => "*",
            Permission::ShipmentsRead => "shipments:read",
            Permission::ShipmentsReadOwn => "shipments:read:own",
            Permission::ShipmentsWrite => "shipments:write",
            Permission::TrackingRead => "tracking:read",
            Permission::TrackingReadOwn => "tracking:read:own",
            Permission::TrackingWrite => "tracking:write",
            Permission::InvoicesRead => "invoices:read",
            Permission::InvoicesReadOwn => "invoices:read:own",
            Permission::InvoicesWrite => "invoices:write",
            Permission::SupportRead => "support:read",
            Permission::SupportReadOwn => "support:read:own",
            Permission::SupportWrite => "support:write",
            Permission::ClientsRead => "clients:read",
            Permission::ClientsWrite => "clients:write",
            Permission::RolesRead => "roles:read",
            Permission::RolesWrite => "roles:write",
            Permission::UsersRead => "users:read",
            Permission::UsersWrite => "users:write",
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Permission::Wildcard)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission: '{0}'")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PERMISSIONS
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| ParsePermissionError(s.to_string()))
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
