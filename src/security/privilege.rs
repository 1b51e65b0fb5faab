//! Runtime user switching.
//!
//! # Responsibilities
//! - Look up the configured unprivileged account
//! - Switch supplementary groups, group and user, in that order
//!
//! Workers run in the same process, so they inherit the switched identity.

use nix::unistd::{setgid, setgroups, setuid, Uid, User};

/// Error type for privilege dropping.
#[derive(Debug)]
pub enum PrivilegeError {
    /// The configured account does not exist.
    UnknownUser(String),
    /// Account lookup failed.
    Lookup(nix::Error),
    /// Switching group or user identity failed.
    Switch { account: String, source: nix::Error },
}

impl std::fmt::Display for PrivilegeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivilegeError::UnknownUser(account) => {
                write!(f, "account '{}' does not exist", account)
            }
            PrivilegeError::Lookup(e) => write!(f, "account lookup failed: {}", e),
            PrivilegeError::Switch { account, source } => {
                write!(f, "could not switch to account '{}': {}", account, source)
            }
        }
    }
}

impl std::error::Error for PrivilegeError {}

/// Switch the process to the named unprivileged account.
///
/// Called once at startup, strictly after the listener has bound and strictly
/// before any worker starts accepting. A no-op when the process already runs
/// as the target account.
pub fn drop_privileges(account: &str) -> Result<(), PrivilegeError> {
    let user = User::from_name(account)
        .map_err(PrivilegeError::Lookup)?
        .ok_or_else(|| PrivilegeError::UnknownUser(account.to_string()))?;

    if Uid::effective() == user.uid {
        tracing::debug!(account, "already running as target account");
        return Ok(());
    }

    // Groups first; after setuid the process may no longer be allowed to.
    setgroups(&[user.gid]).map_err(|source| PrivilegeError::Switch {
        account: account.to_string(),
        source,
    })?;
    setgid(user.gid).map_err(|source| PrivilegeError::Switch {
        account: account.to_string(),
        source,
    })?;
    setuid(user.uid).map_err(|source| PrivilegeError::Switch {
        account: account.to_string(),
        source,
    })?;

    tracing::info!(
        account,
        uid = user.uid.as_raw(),
        gid = user.gid.as_raw(),
        "dropped privileges"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_account_is_rejected() {
        // No identity switch is attempted for an unknown account, so this is
        // safe to run under any user.
        let err = drop_privileges("gantry-no-such-account").unwrap_err();
        assert!(matches!(err, PrivilegeError::UnknownUser(_)));
    }
}
