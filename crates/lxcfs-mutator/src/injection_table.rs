use std::{collections::HashSet, path::Path};

use k8s_openapi::api::core::v1::{HostPathVolumeSource, Volume, VolumeMount};
use serde::{Deserialize, Serialize};

use crate::errors::InjectionTableError;

/// One file exposed by lxcfs: where it lives on the host and where the
/// container should see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionEntry {
    pub name: String,
    pub mount_path: String,
    pub host_path: String,
}

impl InjectionEntry {
    fn new(name: &str, mount_path: &str, host_path: &str) -> Self {
        InjectionEntry {
            name: name.to_owned(),
            mount_path: mount_path.to_owned(),
            host_path: host_path.to_owned(),
        }
    }

    pub fn volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.name.clone(),
            mount_path: self.mount_path.clone(),
            ..Default::default()
        }
    }

    pub fn volume(&self) -> Volume {
        Volume {
            name: self.name.clone(),
            host_path: Some(HostPathVolumeSource {
                path: self.host_path.clone(),
                type_: None,
            }),
            ..Default::default()
        }
    }
}

/// Ordered list of the volumes injected into every mutated pod.
/// Order is preserved in the generated patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionTable {
    entries: Vec<InjectionEntry>,
}

impl Default for InjectionTable {
    fn default() -> Self {
        Self::lxcfs()
    }
}

impl InjectionTable {
    /// The files lxcfs virtualizes, mounted from `/var/lib/lxcfs`.
    pub fn lxcfs() -> Self {
        InjectionTable {
            entries: vec![
                InjectionEntry::new(
                    "lxcfs-cpuinfo",
                    "/proc/cpuinfo",
                    "/var/lib/lxcfs/proc/cpuinfo",
                ),
                InjectionEntry::new(
                    "lxcfs-onlinecpu",
                    "/sys/devices/system/cpu/online",
                    "/var/lib/lxcfs/sys/devices/system/cpu/online",
                ),
                InjectionEntry::new(
                    "lxcfs-meminfo",
                    "/proc/meminfo",
                    "/var/lib/lxcfs/proc/meminfo",
                ),
                InjectionEntry::new(
                    "lxcfs-diskstats",
                    "/proc/diskstats",
                    "/var/lib/lxcfs/proc/diskstats",
                ),
                InjectionEntry::new("lxcfs-stat", "/proc/stat", "/var/lib/lxcfs/proc/stat"),
                InjectionEntry::new("lxcfs-swaps", "/proc/swaps", "/var/lib/lxcfs/proc/swaps"),
                InjectionEntry::new(
                    "lxcfs-uptime",
                    "/proc/uptime",
                    "/var/lib/lxcfs/proc/uptime",
                ),
            ],
        }
    }

    pub fn from_entries(entries: Vec<InjectionEntry>) -> Result<Self, InjectionTableError> {
        if entries.is_empty() {
            return Err(InjectionTableError::Empty);
        }

        let mut names = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            let fields = [
                ("name", &entry.name),
                ("mountPath", &entry.mount_path),
                ("hostPath", &entry.host_path),
            ];
            if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
                return Err(InjectionTableError::EmptyField {
                    index,
                    field: *field,
                });
            }
            if !names.insert(entry.name.as_str()) {
                return Err(InjectionTableError::DuplicateName(entry.name.clone()));
            }
        }

        Ok(InjectionTable { entries })
    }

    /// Parse a YAML list of `{name, mountPath, hostPath}` entries
    pub fn from_yaml_str(input: &str) -> Result<Self, InjectionTableError> {
        let entries: Vec<InjectionEntry> = serde_yaml::from_str(input)?;
        Self::from_entries(entries)
    }

    pub fn from_file(path: &Path) -> Result<Self, InjectionTableError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| InjectionTableError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml_str(&contents)
    }

    pub fn entries(&self) -> &[InjectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn volume_mounts(&self) -> Vec<VolumeMount> {
        self.entries.iter().map(InjectionEntry::volume_mount).collect()
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(InjectionEntry::volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn lxcfs_table_order() {
        let table = InjectionTable::lxcfs();
        let names: Vec<&str> = table.entries().iter().map(|e| e.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "lxcfs-cpuinfo",
                "lxcfs-onlinecpu",
                "lxcfs-meminfo",
                "lxcfs-diskstats",
                "lxcfs-stat",
                "lxcfs-swaps",
                "lxcfs-uptime",
            ]
        );
    }

    #[test]
    fn entries_serialize_as_kubernetes_objects() {
        let table = InjectionTable::lxcfs();

        assert_eq!(
            serde_json::to_value(&table.volume_mounts()[1]).unwrap(),
            json!({"name": "lxcfs-onlinecpu", "mountPath": "/sys/devices/system/cpu/online"})
        );
        assert_eq!(
            serde_json::to_value(&table.volumes()[0]).unwrap(),
            json!({"name": "lxcfs-cpuinfo", "hostPath": {"path": "/var/lib/lxcfs/proc/cpuinfo"}})
        );
    }

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
---
- name: lxcfs-cpuinfo
  mountPath: /proc/cpuinfo
  hostPath: /opt/lxcfs/proc/cpuinfo
- name: lxcfs-meminfo
  mountPath: /proc/meminfo
  hostPath: /opt/lxcfs/proc/meminfo
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let table = InjectionTable::from_file(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[1].host_path, "/opt/lxcfs/proc/meminfo");
    }

    #[test]
    fn reject_empty_table() {
        assert!(matches!(
            InjectionTable::from_yaml_str("[]"),
            Err(InjectionTableError::Empty)
        ));
    }

    #[test]
    fn reject_duplicated_names() {
        let yaml = r#"
- {name: a, mountPath: /proc/stat, hostPath: /x}
- {name: a, mountPath: /proc/uptime, hostPath: /y}
"#;
        assert!(matches!(
            InjectionTable::from_yaml_str(yaml),
            Err(InjectionTableError::DuplicateName(name)) if name == "a"
        ));
    }

    #[test]
    fn reject_empty_fields() {
        let yaml = r#"
- {name: lxcfs-stat, mountPath: /proc/stat, hostPath: /var/lib/lxcfs/proc/stat}
- {name: lxcfs-swaps, mountPath: /proc/swaps, hostPath: ""}
"#;
        assert!(matches!(
            InjectionTable::from_yaml_str(yaml),
            Err(InjectionTableError::EmptyField { index: 1, field: "hostPath" })
        ));
    }

    #[test]
    fn missing_file() {
        let err = InjectionTable::from_file(Path::new("/does/not/exist.yml")).unwrap_err();
        assert!(matches!(err, InjectionTableError::Io { .. }));
    }
}
