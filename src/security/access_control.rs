//! Per-controller action access levels.
//!
//! Every declared action starts at level 1. Level 0 means open: the action
//! is reachable without authentication. A controller adjusts its table in
//! its startup hook; afterwards the table is only read.
//!
//! # Check Order
//! ```text
//! open_all            → reachable
//! action in open set  → reachable
//! authenticated && caller level >= required level → reachable
//! otherwise           → denied
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::route::is_alphanumeric;

/// Level assigned to actions nobody configured.
pub const DEFAULT_LEVEL: u32 = 1;

/// Misuse of an access table. These are programming errors, not denials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessControlError {
    #[error("invalid action name {0:?}")]
    InvalidName(String),

    #[error("action {0:?} is not declared by this controller")]
    UnknownAction(String),

    #[error("access level {level} for {target} is out of range")]
    InvalidLevel { target: String, level: i64 },
}

/// Action name → required level, plus open overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTable {
    levels: BTreeMap<String, u32>,
    open: BTreeSet<String>,
    open_all: bool,
    /// Declared actions. Re-derived from the controller descriptor, never persisted.
    #[serde(skip)]
    actions: BTreeSet<String>,
}

impl AccessTable {
    /// Build a table where every action requires [`DEFAULT_LEVEL`].
    pub fn for_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: BTreeSet<String> = actions.into_iter().map(Into::into).collect();
        let levels = actions.iter().map(|a| (a.clone(), DEFAULT_LEVEL)).collect();
        Self {
            levels,
            open: BTreeSet::new(),
            open_all: false,
            actions,
        }
    }

    /// Re-attach the declared action set after a restore.
    ///
    /// Actions that gained no entry get the default level (0 when the table is
    /// fully open); entries for actions that are no longer declared are
    /// dropped. Configured levels are left untouched, so running this twice
    /// changes nothing.
    pub fn reconcile<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self.levels.retain(|action, _| self.actions.contains(action));

        let fallback = if self.open_all { 0 } else { DEFAULT_LEVEL };
        for action in &self.actions {
            if !self.open.contains(action) && !self.levels.contains_key(action) {
                self.levels.insert(action.clone(), fallback);
            }
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    pub fn is_open_all(&self) -> bool {
        self.open_all
    }

    pub fn is_open(&self, action: &str) -> bool {
        self.open_all || self.open.contains(action)
    }

    /// Whether a caller may reach `action`.
    pub fn is_reachable(
        &self,
        action: &str,
        level: u32,
        authenticated: bool,
    ) -> Result<bool, AccessControlError> {
        self.check_declared(action)?;

        if self.is_open(action) {
            return Ok(true);
        }
        Ok(authenticated && level >= self.level_of(action))
    }

    /// Level required to reach `action`. Open actions report 0.
    pub fn required_level(&self, action: &str) -> Result<u32, AccessControlError> {
        self.check_declared(action)?;

        if self.is_open(action) {
            return Ok(0);
        }
        Ok(self.level_of(action))
    }

    /// Overwrite every declared action's level and clear the open set.
    pub fn set_level_for_all(&mut self, level: i64) -> Result<(), AccessControlError> {
        let level = to_level("all actions", level)?;
        for action in &self.actions {
            self.levels.insert(action.clone(), level);
        }
        self.open.clear();
        Ok(())
    }

    /// Set the level for one action. Level 0 opens it.
    pub fn set_level_for_action(&mut self, action: &str, level: i64) -> Result<(), AccessControlError> {
        self.check_declared(action)?;
        let level = to_level(action, level)?;

        if level == 0 {
            self.open_action(action)?;
        } else {
            self.open.remove(action);
            self.levels.insert(action.to_string(), level);
        }
        Ok(())
    }

    /// Open one action. Returns `false` if it was already open.
    pub fn open_action(&mut self, action: &str) -> Result<bool, AccessControlError> {
        check_name(action)?;
        Ok(self.insert_open(action))
    }

    /// Open several actions. Nothing is applied unless every name is valid.
    pub fn open_actions<I, S>(&mut self, actions: I) -> Result<(), AccessControlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let actions: Vec<S> = actions.into_iter().collect();
        for action in &actions {
            check_name(action.as_ref())?;
        }
        for action in &actions {
            self.insert_open(action.as_ref());
        }
        Ok(())
    }

    /// Open every declared action and mark the table fully open.
    pub fn open_all(&mut self) {
        for action in &self.actions {
            self.levels.insert(action.clone(), 0);
        }
        self.open_all = true;
    }

    fn insert_open(&mut self, action: &str) -> bool {
        self.levels.remove(action);
        self.open.insert(action.to_string())
    }

    fn level_of(&self, action: &str) -> u32 {
        self.levels.get(action).copied().unwrap_or(DEFAULT_LEVEL)
    }

    fn check_declared(&self, action: &str) -> Result<(), AccessControlError> {
        check_name(action)?;
        if self.actions.contains(action) {
            Ok(())
        } else {
            Err(AccessControlError::UnknownAction(action.to_string()))
        }
    }
}

fn check_name(action: &str) -> Result<(), AccessControlError> {
    if is_alphanumeric(action) {
        Ok(())
    } else {
        Err(AccessControlError::InvalidName(action.to_string()))
    }
}

fn to_level(target: &str, level: i64) -> Result<u32, AccessControlError> {
    u32::try_from(level).map_err(|_| AccessControlError::InvalidLevel {
        target: target.to_string(),
        level,
    })
}
