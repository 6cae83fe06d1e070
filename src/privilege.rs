//! Privilege drop plan.
//!
//! A [`DropPlan`] is the ordered list of credential changes a child process
//! performs between `fork` and `exec`. The plan is plain data built in the
//! parent; the child only walks it. Group changes always precede the user
//! change: once the uid is dropped the process no longer has the privilege
//! to change its groups.

use std::fmt;
use std::io;

use nix::unistd::{Gid, Uid, setgid, setgroups, setuid};

use crate::identity::ResolvedIdentity;

/// A single credential change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStep {
    /// Replace the supplementary group list with exactly this group.
    SetGroups(Gid),
    /// Set the real and effective group id.
    SetGid(Gid),
    /// Set the real and effective user id.
    SetUid(Uid),
}

impl DropStep {
    /// Performs the change in the current process.
    ///
    /// Must stay async-signal-safe: it runs in the forked child.
    fn apply(&self) -> nix::Result<()> {
        match *self {
            Self::SetGroups(gid) => setgroups(&[gid]),
            Self::SetGid(gid) => setgid(gid),
            Self::SetUid(uid) => setuid(uid),
        }
    }
}

impl fmt::Display for DropStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetGroups(gid) => write!(f, "setgroups([{}])", gid),
            Self::SetGid(gid) => write!(f, "setgid({})", gid),
            Self::SetUid(uid) => write!(f, "setuid({})", uid),
        }
    }
}

/// Ordered credential changes applied in the child before exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropPlan {
    steps: Vec<DropStep>,
}

impl DropPlan {
    /// Builds the plan for an identity: groups first, then the user.
    pub fn for_identity(identity: &ResolvedIdentity) -> Self {
        let mut steps = Vec::with_capacity(3);
        if let Some(gid) = identity.gid() {
            steps.push(DropStep::SetGroups(gid));
            steps.push(DropStep::SetGid(gid));
        }
        if let Some(uid) = identity.uid() {
            steps.push(DropStep::SetUid(uid));
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[DropStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if the plan changes the user id.
    pub fn changes_user(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, DropStep::SetUid(_)))
    }

    /// Applies every step in order, stopping at the first failure.
    ///
    /// Intended for `pre_exec`: it neither allocates nor logs. An error
    /// aborts the spawn, so the script never runs with partial credentials.
    pub fn apply(&self) -> io::Result<()> {
        for step in &self.steps {
            step.apply().map_err(io::Error::from)?;
        }
        Ok(())
    }
}

impl fmt::Display for DropPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("none");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
