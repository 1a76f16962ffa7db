//! Scope tags.

use crate::stages::StageKind;
use std::fmt;

/// Labels a scope by the role it plays in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    /// The process-wide root container.
    Root,
    /// One incoming request.
    Request,
    /// One pipeline stage.
    Stage(StageKind),
    /// Any other application-defined scope.
    Named(&'static str),
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Request => f.write_str("request"),
            Self::Stage(kind) => write!(f, "stage:{kind}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
