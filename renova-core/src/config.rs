use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Top-level configuration for a renewal run and the control service.
///
/// Every section carries defaults matching the reseller portal this bot was
/// written against, so an absent config file still yields a usable setup.
/// Operator-supplied secrets are expected through the environment overrides
/// (`SITE_URL`, `LOGIN_USER`, `LOGIN_PASS`, `PORT`) applied after load.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RenovaConfig {
    pub portal: PortalSection,
    pub credentials: CredentialsSection,
    pub selectors: SelectorSection,
    pub chromium: ChromiumSection,
    pub timing: TimingSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalSection {
    pub login_url: String,
    pub clients_url: String,
    /// Status value marking a record as eligible for inspection. Compared
    /// case-insensitively.
    pub active_status: String,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            login_url: "https://revenda.beijaflorerp.com.br/Home/Login".into(),
            clients_url: "https://revenda.beijaflorerp.com.br/MeusClientes".into(),
            active_status: "Ativa".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub login_user: String,
    pub login_password: String,
    pub login_button: String,
    pub table_rows: String,
    pub edit_link: String,
    pub validity_field: String,
    pub save_button: String,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            login_user: "input[name='Login']".into(),
            login_password: "input[name='Senha']".into(),
            login_button: "#btnEnviar".into(),
            table_rows: "#revendas tbody tr[role='row']".into(),
            edit_link: "a[href*='/MeusClientes/Editar/']".into(),
            validity_field: "#ValidadeLicenca".into(),
            save_button: "#btnGravar".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub headless: bool,
    pub sandbox: bool,
    pub executable_path: Option<String>,
    pub viewport: [u32; 2],
    pub user_agent: String,
    pub nav_timeout_secs: u64,
    pub selector_timeout_secs: u64,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            executable_path: None,
            viewport: [1366, 768],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .into(),
            nav_timeout_secs: 60,
            selector_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    /// Extra wait after the client grid first renders, letting the
    /// server-side table plugin finish populating rows.
    pub listing_settle_ms: u64,
    /// Pacing pause after each saved record.
    pub save_settle_ms: u64,
    /// Per-keystroke delay range when typing into form fields.
    pub typing_delay_ms: [u64; 2],
    /// How long to wait for the portal to navigate after a save click
    /// before tolerating the absence of navigation.
    pub save_nav_timeout_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            listing_settle_ms: 2000,
            save_settle_ms: 800,
            typing_delay_ms: [30, 90],
            save_nav_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

fn load_toml<T: serde::de::DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_ref = path.as_ref();
    let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
        source,
        path: path_ref.to_path_buf(),
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        source,
        path: path_ref.to_path_buf(),
    })
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RenovaConfig> {
    load_toml(path)
}

/// Loads the config file when present, otherwise falls back to defaults.
/// A missing file is normal for env-only deployments; a malformed one is not.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<RenovaConfig> {
    let path_ref = path.as_ref();
    if path_ref.exists() {
        load_config(path_ref)
    } else {
        tracing::info!(path = %path_ref.display(), "config file absent, using defaults");
        Ok(RenovaConfig::default())
    }
}

impl RenovaConfig {
    /// Applies the environment contract the operator tooling relies on.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("SITE_URL") {
            if !url.trim().is_empty() {
                self.portal.login_url = url;
            }
        }
        if let Ok(user) = env::var("LOGIN_USER") {
            if !user.trim().is_empty() {
                self.credentials.user = user;
            }
        }
        if let Ok(pass) = env::var("LOGIN_PASS") {
            if !pass.trim().is_empty() {
                self.credentials.password = pass;
            }
        }
        if let Ok(port) = env::var("PORT") {
            if !port.trim().is_empty() {
                self.server.port = port
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort { value: port })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = RenovaConfig::default();
        assert_eq!(config.portal.active_status, "Ativa");
        assert_eq!(config.selectors.validity_field, "#ValidadeLicenca");
        assert_eq!(config.timing.save_settle_ms, 800);
        assert_eq!(config.server.port, 3001);
        assert!(config.chromium.headless);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[portal]\nlogin_url = \"https://portal.test/login\"\n\n[server]\nport = 4100\n"
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.portal.login_url, "https://portal.test/login");
        assert_eq!(config.portal.active_status, "Ativa");
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.timing.listing_settle_ms, 2000);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[portal\nlogin_url = 1").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
