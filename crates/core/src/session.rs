// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use rowtrail_audit::Actor;

/// The actor bound to one unit of work.
///
/// A context is created when a unit of work begins and dropped when it
/// commits or rolls back. It is never stored on a connection, so a reused
/// connection always starts the next unit of work unattributed unless the
/// caller binds an actor again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    actor: Option<Actor>,
}

impl SessionContext {
    /// Creates an unattributed context.
    #[must_use]
    pub const fn new() -> Self {
        Self { actor: None }
    }

    /// Creates a context with an optional actor already bound.
    #[must_use]
    pub const fn with_actor(actor: Option<Actor>) -> Self {
        Self { actor }
    }

    /// Binds an actor, replacing any previous binding.
    ///
    /// Binding `None` is valid and marks subsequent changes as anonymous.
    pub fn set_actor(&mut self, actor: Option<Actor>) {
        self.actor = actor;
    }

    /// Returns the bound actor, or `None` if none was bound.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Removes any binding.
    pub fn clear(&mut self) {
        self.actor = None;
    }
}
