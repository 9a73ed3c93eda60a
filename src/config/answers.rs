//! Turning flags and prompts into a [`MigrationConfig`].
//!
//! Questions are asked in a fixed order: short hostname, domain, remote
//! host, remote user, export path, auth mode. Anything already given on the
//! command line is not asked. The password is not part of the configuration;
//! it is read when the connection is negotiated.

use anyhow::Result;
use std::sync::Arc;

use super::{AuthMode, HostIdentity, MigrationConfig, MigrationSettings, RemoteTarget};
use crate::prompt::Prompter;

/// Answers supplied up front, usually from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetAnswers {
    pub hostname: Option<String>,
    pub domain: Option<String>,
    pub remote_host: Option<String>,
    pub remote_user: Option<String>,
    pub export_path: Option<String>,
    pub auth: Option<AuthMode>,
}

fn answer<P: Prompter + ?Sized>(
    prompter: &P,
    preset: Option<&String>,
    prompt: &str,
    default: Option<&str>,
    allow_empty: bool,
) -> Result<String> {
    match preset {
        Some(value) => Ok(value.clone()),
        None => prompter.input(prompt, default, allow_empty),
    }
}

/// Ask for the new short hostname and domain.
///
/// # Errors
///
/// Fails if a prompt cannot be answered or the answers are invalid.
pub fn collect_identity<P: Prompter + ?Sized>(prompter: &P, preset: &PresetAnswers) -> Result<HostIdentity> {
    let short = answer(prompter, preset.hostname.as_ref(), "New short hostname", None, false)?;
    let domain = answer(
        prompter,
        preset.domain.as_ref(),
        "Domain (empty for none)",
        None,
        true,
    )?;
    Ok(HostIdentity::new(&short, &domain)?)
}

/// Ask for the remote side: host, user, export path and auth mode.
///
/// # Errors
///
/// Fails if a prompt cannot be answered or the answers are invalid.
pub fn collect_remote<P: Prompter + ?Sized>(
    prompter: &P,
    preset: &PresetAnswers,
    settings: &MigrationSettings,
) -> Result<(RemoteTarget, String)> {
    let host = answer(prompter, preset.remote_host.as_ref(), "Old server host", None, false)?;
    let user = answer(prompter, preset.remote_user.as_ref(), "Old server user", Some("root"), false)?;
    let export_path = answer(
        prompter,
        preset.export_path.as_ref(),
        "Database export path on the old server",
        Some(&settings.export_path),
        false,
    )?;
    let auth = match preset.auth {
        Some(auth) => auth,
        None => {
            let index = prompter.select("Authentication", &["ssh key", "password"], 0)?;
            if index == 1 { AuthMode::Password } else { AuthMode::Key }
        }
    };
    Ok((RemoteTarget::new(&host, &user, auth)?, export_path))
}

/// Build the run configuration, asking for everything not preset.
///
/// With `with_identity` false the hostname questions are not asked.
///
/// # Errors
///
/// Fails if a prompt cannot be answered or any answer is invalid.
pub fn collect_config<P: Prompter + ?Sized>(
    prompter: &P,
    preset: &PresetAnswers,
    settings: Arc<MigrationSettings>,
    with_identity: bool,
) -> Result<MigrationConfig> {
    let identity = if with_identity {
        Some(collect_identity(prompter, preset)?)
    } else {
        None
    };
    let (remote, export_path) = collect_remote(prompter, preset, &settings)?;
    Ok(MigrationConfig::new(identity, remote, &export_path, settings)?)
}
