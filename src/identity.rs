//! Identity resolution against the system user and group databases.
//!
//! A name that is omitted means "do not change that dimension". A name that
//! is given but cannot be found is a hard error; the two cases are kept
//! apart in the types so an unresolvable name can never degrade into running
//! with the caller's (possibly root) identity.

use std::path::PathBuf;

use nix::unistd::{Gid, Group, Uid, User};
use tracing::{debug, error};

use crate::error::ScriptError;

/// A user resolved from the passwd database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// The name that was looked up.
    pub name: String,
    /// Numeric user id.
    pub uid: Uid,
    /// Home directory, exported as `HOME` to the script.
    pub home: PathBuf,
}

/// Looks up a user by name.
///
/// # Errors
///
/// Returns `ScriptError::UnknownUser` if no such user exists, or
/// `ScriptError::IdentityLookup` if the database could not be queried.
pub fn resolve_user(name: &str) -> Result<ResolvedUser, ScriptError> {
    match User::from_name(name) {
        Ok(Some(user)) => {
            debug!(user = name, uid = %user.uid, "resolved user");
            Ok(ResolvedUser {
                name: name.to_string(),
                uid: user.uid,
                home: user.dir,
            })
        }
        Ok(None) => {
            error!("unknown uid for user '{}'", name);
            Err(ScriptError::UnknownUser(name.to_string()))
        }
        Err(source) => Err(ScriptError::IdentityLookup {
            kind: "user",
            name: name.to_string(),
            source,
        }),
    }
}

/// Looks up a group by name.
///
/// # Errors
///
/// Returns `ScriptError::UnknownGroup` if no such group exists, or
/// `ScriptError::IdentityLookup` if the database could not be queried.
pub fn resolve_group(name: &str) -> Result<Gid, ScriptError> {
    match Group::from_name(name) {
        Ok(Some(group)) => {
            debug!(group = name, gid = %group.gid, "resolved group");
            Ok(group.gid)
        }
        Ok(None) => {
            error!("unknown gid for group '{}'", name);
            Err(ScriptError::UnknownGroup(name.to_string()))
        }
        Err(source) => Err(ScriptError::IdentityLookup {
            kind: "group",
            name: name.to_string(),
            source,
        }),
    }
}

/// Target identity for one invocation.
///
/// `None` in either dimension means "no restriction": files keep their
/// default ownership and the child keeps the caller's id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    user: Option<ResolvedUser>,
    gid: Option<Gid>,
}

impl ResolvedIdentity {
    /// An identity that restricts nothing.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Builds an identity from already-resolved parts.
    pub fn new(user: Option<ResolvedUser>, gid: Option<Gid>) -> Self {
        Self { user, gid }
    }

    /// Resolves optional user and group names.
    ///
    /// Empty names are treated the same as absent ones and are not looked up.
    ///
    /// # Errors
    ///
    /// Fails on the first name that cannot be resolved; the user is looked
    /// up before the group.
    pub fn resolve(user: Option<&str>, group: Option<&str>) -> Result<Self, ScriptError> {
        let user = match user.filter(|name| !name.is_empty()) {
            Some(name) => Some(resolve_user(name)?),
            None => None,
        };
        let gid = match group.filter(|name| !name.is_empty()) {
            Some(name) => Some(resolve_group(name)?),
            None => None,
        };
        Ok(Self { user, gid })
    }

    pub fn user(&self) -> Option<&ResolvedUser> {
        self.user.as_ref()
    }

    pub fn uid(&self) -> Option<Uid> {
        self.user.as_ref().map(|u| u.uid)
    }

    pub fn gid(&self) -> Option<Gid> {
        self.gid
    }

    /// Raw ids in the form `chown(2)` expects, `None` leaving a dimension unchanged.
    pub fn raw_ids(&self) -> (Option<u32>, Option<u32>) {
        (self.uid().map(Uid::as_raw), self.gid.map(Gid::as_raw))
    }

    /// Returns true if neither dimension is restricted.
    pub fn is_unrestricted(&self) -> bool {
        self.user.is_none() && self.gid.is_none()
    }
}
