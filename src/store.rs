use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::scheme::Registrations;

/// Durable backing for the registry. Calls block; the registry runs them on
/// the blocking pool.
pub trait RegistrationStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Registrations>;
    fn save(&self, registrations: &Registrations) -> anyhow::Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RegistrationStore for JsonFileStore {
    fn load(&self) -> anyhow::Result<Registrations> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Registrations::new())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };

        if content.trim().is_empty() {
            return Ok(Registrations::new());
        }

        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn save(&self, registrations: &Registrations) -> anyhow::Result<()> {
        let content =
            serde_json::to_string_pretty(registrations).context("serializing registrations")?;

        let tmp = self.temp_path();
        std::fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::Registration;

    fn sample() -> Registrations {
        let mut regs = Registrations::new();
        regs.insert(
            "dev-1".into(),
            Registration {
                id: "dev-1".into(),
                channel: "https://example.com/a".into(),
                expiry: Some(10),
                name: Some("Desk".into()),
            },
        );
        regs
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regs.conf"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn saved_registrations_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regs.conf"));

        store.save(&sample()).unwrap();

        assert_eq!(store.load().unwrap(), sample());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn file_is_id_keyed_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("regs.conf"));
        store.save(&sample()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["dev-1"]["channel"], "https://example.com/a");
        assert_eq!(raw["dev-1"]["name"], "Desk");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regs.conf");
        std::fs::write(&path, "{not json").unwrap();

        assert!(JsonFileStore::new(path).load().is_err());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope").join("regs.conf"));
        assert!(store.save(&sample()).is_err());
    }
}
