//! Per-port cassette selection for replay.

use std::path::{Path, PathBuf};

use super::format::Cassette;
use super::ports;
use super::replayer::CassetteReplayer;

/// Cassette file per port. A port without one is unusable during replay.
#[derive(Debug, Clone, Default)]
pub struct CassetteConfig {
    /// Clock cassette.
    pub clock: Option<PathBuf>,
    /// Filesystem cassette.
    pub fs: Option<PathBuf>,
    /// Run id cassette.
    pub id_gen: Option<PathBuf>,
    /// Generation backend cassette.
    pub llm: Option<PathBuf>,
    /// Repository reader cassette.
    pub repo: Option<PathBuf>,
    /// Publisher cassette.
    pub publisher: Option<PathBuf>,
    /// Sandbox cassette.
    pub sandbox: Option<PathBuf>,
}

/// Loaded replayers, one per configured port.
#[derive(Default)]
pub struct PortReplayers {
    /// Clock replayer.
    pub clock: Option<CassetteReplayer>,
    /// Filesystem replayer.
    pub fs: Option<CassetteReplayer>,
    /// Run id replayer.
    pub id_gen: Option<CassetteReplayer>,
    /// Generation backend replayer.
    pub llm: Option<CassetteReplayer>,
    /// Repository reader replayer.
    pub repo: Option<CassetteReplayer>,
    /// Publisher replayer.
    pub publisher: Option<CassetteReplayer>,
    /// Sandbox replayer.
    pub sandbox: Option<CassetteReplayer>,
}

impl CassetteConfig {
    /// Picks up every `<port>.cassette.yaml` present in a recording directory.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        let pick = |port: &str| {
            let path = dir.join(format!("{port}.cassette.yaml"));
            path.is_file().then_some(path)
        };
        Self {
            clock: pick(ports::CLOCK),
            fs: pick(ports::FS),
            id_gen: pick(ports::ID_GEN),
            llm: pick(ports::LLM),
            repo: pick(ports::REPO),
            publisher: pick(ports::PUBLISHER),
            sandbox: pick(ports::SANDBOX),
        }
    }

    /// Reads one cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<CassetteReplayer, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette: Cassette = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
        Ok(CassetteReplayer::new(&cassette))
    }

    /// Loads every configured cassette.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette cannot be read or parsed.
    pub fn load_all(&self) -> Result<PortReplayers, String> {
        let load = |path: &Option<PathBuf>| path.as_deref().map(Self::load).transpose();
        Ok(PortReplayers {
            clock: load(&self.clock)?,
            fs: load(&self.fs)?,
            id_gen: load(&self.id_gen)?,
            llm: load(&self.llm)?,
            repo: load(&self.repo)?,
            publisher: load(&self.publisher)?,
            sandbox: load(&self.sandbox)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, cassette: &Cassette) {
        std::fs::write(path, serde_yaml::to_string(cassette).unwrap()).unwrap();
    }

    #[test]
    fn from_dir_finds_only_present_ports() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("repo.cassette.yaml"), &Cassette::new("r"));
        write(&dir.path().join("llm.cassette.yaml"), &Cassette::new("l"));

        let config = CassetteConfig::from_dir(dir.path());
        assert!(config.repo.is_some());
        assert!(config.llm.is_some());
        assert!(config.sandbox.is_none());
        assert!(config.clock.is_none());
    }

    #[test]
    fn load_all_builds_configured_replayers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.yaml");
        write(&path, &Cassette::new("ids").with("id_gen", "run_id", json!("run-1")));

        let config = CassetteConfig { id_gen: Some(path), ..CassetteConfig::default() };
        let mut replayers = config.load_all().unwrap();
        let ids = replayers.id_gen.as_mut().unwrap();
        let id: String = ids.next_output("id_gen", "run_id").unwrap();
        assert_eq!(id, "run-1");
        assert!(replayers.llm.is_none());
    }

    #[test]
    fn unreadable_cassette_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "interactions: [").unwrap();
        let config = CassetteConfig { llm: Some(path), ..CassetteConfig::default() };
        let Err(message) = config.load_all() else { panic!("malformed cassette loaded") };
        assert!(message.contains("Failed to parse"), "{message}");
    }
}
