//! # Mod Compatibility
//!
//! The host's loaded mod set and the check a joining peer's declared set must pass.
//!
//! Mods carry optional capabilities instead of being inspected at runtime:
//! - a [`VersionChecker`] marks a mod as multiplayer-aware; the peer must run it,
//!   at a version the checker accepts
//! - a [`SettingsExporter`] contributes the mod's settings to the handshake response
//!
//! Mods with neither capability are client-optional, but a peer may still only
//! declare mods the host has loaded.

use crate::config::VersionPolicy;
use crate::core::binary::BinaryWriter;
use crate::error::{ProtocolError, Result};
use crate::protocol::disconnect::DisconnectReason;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A `(identifier, version)` pair as declared on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModDescriptor {
    pub identifier: String,
    pub version: String,
}

impl ModDescriptor {
    pub fn new(identifier: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: version.into(),
        }
    }
}

pub trait VersionChecker: Send + Sync {
    fn is_compatible(&self, host_version: &str, peer_version: &str) -> bool;
}

impl VersionChecker for VersionPolicy {
    fn is_compatible(&self, host_version: &str, peer_version: &str) -> bool {
        match self {
            VersionPolicy::Exact => host_version == peer_version,
            VersionPolicy::Compatible => major(host_version) == major(peer_version),
        }
    }
}

fn major(version: &str) -> &str {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .next()
        .unwrap_or_default()
}

pub trait SettingsExporter: Send + Sync {
    /// Append this mod's settings to the handshake response blob
    fn export(&self, writer: &mut BinaryWriter) -> Result<()>;
}

#[derive(Clone)]
pub struct ModEntry {
    pub descriptor: ModDescriptor,
    version_checker: Option<Arc<dyn VersionChecker>>,
    settings_exporter: Option<Arc<dyn SettingsExporter>>,
}

impl ModEntry {
    /// A client-optional mod with no multiplayer capabilities
    pub fn new(identifier: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            descriptor: ModDescriptor::new(identifier, version),
            version_checker: None,
            settings_exporter: None,
        }
    }

    /// Require the mod on peers, comparing versions with `checker`
    pub fn with_version_checker(mut self, checker: Arc<dyn VersionChecker>) -> Self {
        self.version_checker = Some(checker);
        self
    }

    pub fn with_settings_exporter(mut self, exporter: Arc<dyn SettingsExporter>) -> Self {
        self.settings_exporter = Some(exporter);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.descriptor.identifier
    }

    pub fn is_required(&self) -> bool {
        self.version_checker.is_some()
    }
}

impl fmt::Debug for ModEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModEntry")
            .field("identifier", &self.descriptor.identifier)
            .field("version", &self.descriptor.version)
            .field("required", &self.is_required())
            .field("exports_settings", &self.settings_exporter.is_some())
            .finish()
    }
}

/// Mods loaded on the host, in load order
#[derive(Debug, Clone, Default)]
pub struct ModRegistry {
    entries: Vec<ModEntry>,
    index: HashMap<String, usize>,
    policy: VersionPolicy,
}

impl ModRegistry {
    pub fn new(policy: VersionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn register(&mut self, entry: ModEntry) -> Result<()> {
        if self.index.contains_key(entry.identifier()) {
            return Err(ProtocolError::ConfigError(format!(
                "Mod {} registered twice",
                entry.identifier()
            )));
        }
        self.index
            .insert(entry.identifier().to_string(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Register a mod peers must run, checked with the registry's version policy
    pub fn register_multiplayer(
        &mut self,
        identifier: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<()> {
        let checker: Arc<dyn VersionChecker> = Arc::new(self.policy);
        self.register(ModEntry::new(identifier, version).with_version_checker(checker))
    }

    pub fn get(&self, identifier: &str) -> Option<&ModEntry> {
        self.index.get(identifier).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[ModEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `(identifier, settings)` for every mod that exports settings.
    /// Returns how many mods wrote an entry.
    pub fn export_settings(&self, writer: &mut BinaryWriter) -> Result<u32> {
        let mut count = 0;
        for entry in &self.entries {
            if let Some(exporter) = &entry.settings_exporter {
                writer.write_string(entry.identifier());
                exporter.export(writer)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Rejected(DisconnectReason),
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }
}

/// Compare a peer's declared mods with the host's.
///
/// Checks run cheapest first and stop at the first violation:
/// 1. every declared mod must be loaded on the host (`ModIsMissingOnServer`)
/// 2. every required host mod must be declared (`ModIsMissing`)
/// 3. every required host mod's checker must accept the peer's version
///    (`ModVersionMismatch`)
pub fn negotiate(host: &ModRegistry, peer: &[ModDescriptor]) -> Compatibility {
    if let Some(extra) = peer.iter().find(|m| host.get(&m.identifier).is_none()) {
        return Compatibility::Rejected(DisconnectReason::ModIsMissingOnServer(
            extra.identifier.clone(),
        ));
    }

    let declared: HashMap<&str, &str> = peer
        .iter()
        .map(|m| (m.identifier.as_str(), m.version.as_str()))
        .collect();

    let required = || host.entries.iter().filter(|e| e.is_required());

    if let Some(missing) = required().find(|e| !declared.contains_key(e.identifier())) {
        return Compatibility::Rejected(DisconnectReason::ModIsMissing(
            missing.identifier().to_string(),
        ));
    }

    for entry in required() {
        let peer_version = declared[entry.identifier()];
        let accepted = entry
            .version_checker
            .as_ref()
            .is_some_and(|c| c.is_compatible(&entry.descriptor.version, peer_version));
        if !accepted {
            return Compatibility::Rejected(DisconnectReason::ModVersionMismatch {
                identifier: entry.identifier().to_string(),
                peer_version: peer_version.to_string(),
                host_version: entry.descriptor.version.clone(),
            });
        }
    }

    Compatibility::Compatible
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::binary::BinaryReader;

    fn host(policy: VersionPolicy) -> ModRegistry {
        let mut registry = ModRegistry::new(policy);
        registry.register_multiplayer("dev.a", "1.0").unwrap();
        registry.register(ModEntry::new("dev.cosmetic", "0.3")).unwrap();
        registry
    }

    #[test]
    fn test_missing_required_mod() {
        assert_eq!(
            negotiate(&host(VersionPolicy::Exact), &[]),
            Compatibility::Rejected(DisconnectReason::ModIsMissing("dev.a".into()))
        );
    }

    #[test]
    fn test_optional_mod_may_be_absent() {
        let peer = [ModDescriptor::new("dev.a", "1.0")];
        assert!(negotiate(&host(VersionPolicy::Exact), &peer).is_compatible());
    }

    #[test]
    fn test_unknown_peer_mod_checked_first() {
        // also missing dev.a, but the extra declaration is reported
        let peer = [ModDescriptor::new("dev.extra", "9")];
        assert_eq!(
            negotiate(&host(VersionPolicy::Exact), &peer),
            Compatibility::Rejected(DisconnectReason::ModIsMissingOnServer("dev.extra".into()))
        );
    }

    #[test]
    fn test_version_policies() {
        let peer = [ModDescriptor::new("dev.a", "1.4")];
        assert_eq!(
            negotiate(&host(VersionPolicy::Exact), &peer),
            Compatibility::Rejected(DisconnectReason::ModVersionMismatch {
                identifier: "dev.a".into(),
                peer_version: "1.4".into(),
                host_version: "1.0".into(),
            })
        );
        assert!(negotiate(&host(VersionPolicy::Compatible), &peer).is_compatible());
        let peer = [ModDescriptor::new("dev.a", "2.0")];
        assert!(!negotiate(&host(VersionPolicy::Compatible), &peer).is_compatible());
    }

    #[test]
    fn test_custom_checker() {
        struct AnyVersion;
        impl VersionChecker for AnyVersion {
            fn is_compatible(&self, _: &str, _: &str) -> bool {
                true
            }
        }
        let mut registry = ModRegistry::new(VersionPolicy::Exact);
        registry
            .register(ModEntry::new("dev.loose", "3").with_version_checker(Arc::new(AnyVersion)))
            .unwrap();
        let peer = [ModDescriptor::new("dev.loose", "banana")];
        assert!(negotiate(&registry, &peer).is_compatible());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = host(VersionPolicy::Exact);
        assert!(registry.register(ModEntry::new("dev.a", "2.0")).is_err());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_export_settings_layout() {
        struct Difficulty(u32);
        impl SettingsExporter for Difficulty {
            fn export(&self, writer: &mut BinaryWriter) -> Result<()> {
                writer.write_u32(self.0);
                Ok(())
            }
        }
        let mut registry = host(VersionPolicy::Exact);
        registry
            .register(ModEntry::new("dev.settings", "1").with_settings_exporter(Arc::new(Difficulty(3))))
            .unwrap();

        let mut writer = BinaryWriter::new();
        assert_eq!(registry.export_settings(&mut writer).unwrap(), 1);
        let bytes = writer.finish();
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "dev.settings");
        assert_eq!(reader.read_u32().unwrap(), 3);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_major_parsing() {
        assert_eq!(major("v2.1.0"), "2");
        assert_eq!(major("10"), "10");
        assert_eq!(major(""), "");
    }
}
