use std::fmt;
use std::str::FromStr;

/// How the engine persists a freshly built instance.
///
/// "No persistence" is represented as `Option::<PersistenceMode>::None` on the
/// resolved options rather than as a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceMode {
    /// Commit the session after building.
    Commit,
    /// Flush the session after building.
    Flush,
    /// Merge the instance into the session, then commit.
    Merge,
    /// Reuse a row matching a unique constraint, otherwise merge and flush.
    CheckAndMerge,
    /// Reuse a row matching a unique constraint, otherwise add and commit.
    GetOrAdd,
    /// Add the instance to the session without writing it.
    Add,
}

impl PersistenceMode {
    pub const ALL: [PersistenceMode; 6] = [
        Self::Commit,
        Self::Flush,
        Self::Merge,
        Self::CheckAndMerge,
        Self::GetOrAdd,
        Self::Add,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Flush => "flush",
            Self::Merge => "merge",
            Self::CheckAndMerge => "check",
            Self::GetOrAdd => "get",
            Self::Add => "add",
        }
    }

    /// The legal configuration values, `none` first. `none` is resolved by
    /// the options layer, not by `FromStr`.
    pub fn allowed_values() -> String {
        std::iter::once(super::NO_PERSISTENCE)
            .chain(Self::ALL.iter().map(|mode| mode.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no persistence mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl FromStr for PersistenceMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Self::Commit),
            "flush" => Ok(Self::Flush),
            "merge" => Ok(Self::Merge),
            "check" => Ok(Self::CheckAndMerge),
            "get" => Ok(Self::GetOrAdd),
            "add" => Ok(Self::Add),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
