// ── WiFi provisioning ──
//
// One attempt per call, each step short-circuiting the rest:
// resolve the owner's key, tighten its permissions, then (only then)
// talk to the device: write the supplicant config, optionally reload it,
// and drop the completion sentinel. Nothing is rolled back on failure;
// re-running the same request is always safe.

use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use lampctl_api::Owner;

use crate::config::ProvisioningConfig;
use crate::error::CoreError;
use crate::remote::{RemoteExecutor, RemoteOutput, RemoteTarget};

const MAX_SSID_BYTES: usize = 32;
const MAX_PASSWORD_BYTES: usize = 63;

/// What to provision, and on which device.
#[derive(Clone)]
pub struct ProvisioningRequest {
    pub owner: Owner,
    pub ssid: String,
    /// `None` for open networks.
    pub password: Option<SecretString>,
    /// Provisioning host (e.g., `raspberrypi.local`).
    pub host: String,
}

impl fmt::Debug for ProvisioningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningRequest")
            .field("owner", &self.owner)
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .finish()
    }
}

impl ProvisioningRequest {
    pub fn new(
        owner: Owner,
        ssid: impl Into<String>,
        password: Option<SecretString>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            ssid: ssid.into(),
            password,
            host: host.into(),
        }
    }

    /// Check the request without touching the filesystem or network.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ssid.is_empty() || self.ssid.len() > MAX_SSID_BYTES {
            return Err(invalid(
                "ssid",
                format!("must be 1 to {MAX_SSID_BYTES} bytes"),
            ));
        }
        check_quotable("ssid", &self.ssid)?;

        if let Some(password) = &self.password {
            let password = password.expose_secret();
            if password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
                return Err(invalid(
                    "password",
                    format!("must be 1 to {MAX_PASSWORD_BYTES} bytes"),
                ));
            }
            check_quotable("password", password)?;
        }

        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty".into()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> CoreError {
    CoreError::InvalidRequest { field, reason }
}

fn check_quotable(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.contains(['"', '\n', '\r']) {
        return Err(invalid(
            field,
            "must not contain quotes or line breaks".into(),
        ));
    }
    Ok(())
}

// ── Credentials ──────────────────────────────────────────────────────

/// Location of `owner`'s private key inside `credentials_dir`.
pub fn credential_path(owner: Owner, credentials_dir: &Path) -> PathBuf {
    credentials_dir.join(format!("{}_id_rsa", owner.to_string().to_lowercase()))
}

/// Locate `owner`'s key and restrict it to owner read/write, ready for ssh.
///
/// Fails with `CredentialMissing` when the key is absent and with
/// `CredentialPermission` when it cannot be read or chmod-ed. Touches
/// nothing on the network.
pub async fn prepare_credential(
    owner: Owner,
    credentials_dir: &Path,
) -> Result<PathBuf, CoreError> {
    let key = resolve_credential(owner, credentials_dir).await?;
    restrict_permissions(&key).await?;
    debug!(%owner, key = %key.display(), "credential ready");
    Ok(key)
}

async fn resolve_credential(owner: Owner, credentials_dir: &Path) -> Result<PathBuf, CoreError> {
    let path = credential_path(owner, credentials_dir);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(CoreError::CredentialMissing { owner, path }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CoreError::CredentialMissing { owner, path })
        }
        Err(source) => Err(CoreError::CredentialPermission { path, source }),
    }
}

/// Restrict the key to owner read/write; ssh refuses anything looser.
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| CoreError::CredentialPermission {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ── Supplicant config ────────────────────────────────────────────────

/// Render a complete `wpa_supplicant.conf` for a single network.
pub fn render_wpa_config(ssid: &str, password: Option<&str>, country: &str) -> SecretString {
    let auth = match password {
        Some(psk) => format!("    psk=\"{psk}\"\n"),
        None => "    key_mgmt=NONE\n".to_owned(),
    };
    SecretString::from(format!(
        "ctrl_interface=DIR=/var/run/wpa_supplicant GROUP=netdev\n\
         update_config=1\n\
         country={country}\n\
         \n\
         network={{\n    ssid=\"{ssid}\"\n{auth}}}\n"
    ))
}

/// Single-quote `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ── Provisioner ──────────────────────────────────────────────────────

/// Runs the provisioning workflow over a [`RemoteExecutor`].
pub struct Provisioner<E> {
    config: ProvisioningConfig,
    executor: E,
}

impl<E: RemoteExecutor> Provisioner<E> {
    pub fn new(config: ProvisioningConfig, executor: E) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Provision the device once. No automatic retries.
    pub async fn provision(&self, request: &ProvisioningRequest) -> Result<(), CoreError> {
        request.validate()?;

        let key = prepare_credential(request.owner, &self.config.credentials_dir).await?;

        let target = RemoteTarget::new(self.config.user.clone(), request.host.clone());
        info!(%target, owner = %request.owner, ssid = %request.ssid, "provisioning device");

        let contents = render_wpa_config(
            &request.ssid,
            request.password.as_ref().map(|p| p.expose_secret()),
            &self.config.country,
        );
        let write = format!(
            "sudo tee {} > /dev/null",
            shell_quote(&self.config.wpa_config_path)
        );
        self.step(
            "write network config",
            &target,
            &key,
            &write,
            Some(contents.expose_secret().as_bytes()),
        )
        .await?;

        if self.config.reconfigure {
            let reconfigure = format!(
                "/sbin/wpa_cli -i {} reconfigure",
                shell_quote(&self.config.interface)
            );
            let output = self
                .step("reconfigure interface", &target, &key, &reconfigure, None)
                .await?;
            if output.stdout.trim() != "OK" {
                return Err(CoreError::ProvisioningFailed {
                    step: "reconfigure interface",
                    reason: format!("wpa_cli answered {:?}", output.stdout.trim()),
                });
            }
        }

        let touch = format!("touch {}", shell_quote(&self.config.sentinel_path));
        self.step("create sentinel", &target, &key, &touch, None)
            .await?;

        info!(%target, ssid = %request.ssid, "device provisioned");
        Ok(())
    }

    async fn step(
        &self,
        step: &'static str,
        target: &RemoteTarget,
        key: &Path,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> Result<RemoteOutput, CoreError> {
        debug!(%target, step, "provisioning step");
        let output = self
            .executor
            .execute(target, key, command, stdin)
            .await
            .map_err(|e| CoreError::ProvisioningFailed {
                step,
                reason: format!("cannot reach {target}: {e}"),
            })?;

        if !output.success() {
            warn!(%target, step, code = ?output.code, "provisioning step failed");
            return Err(CoreError::ProvisioningFailed {
                step,
                reason: output.describe_failure(),
            });
        }
        Ok(output)
    }
}
