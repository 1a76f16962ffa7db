//! Stage descriptors.

use serde::Serialize;
use std::fmt;

/// The identity of a stage type.
///
/// A `StageKind` is both the lookup key of the stage's factory and the
/// label of the Stage Scope opened for it. Applications declare their
/// kinds as constants:
///
/// ```
/// use scopechain::stages::StageKind;
///
/// const AUTH: StageKind = StageKind::new("auth");
/// assert_eq!(AUTH.name(), "auth");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StageKind(&'static str);

impl StageKind {
    /// Creates a stage kind from a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
