//! Per-factory persistence options.
//!
//! A factory's options are built by layering an [`OptionsLayer`] of overrides
//! over an already-resolved base [`FactoryOptions`]. Resolution validates the
//! persistence mode once and reports deprecations as data instead of
//! printing them.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::core::{FactoryError, Result};
use crate::session::SessionHandle;

mod mode;

pub use mode::{PersistenceMode, UnknownMode};

/// Configuration spelling of "no persistence"; JSON `null` means the same.
pub const NO_PERSISTENCE: &str = "none";

/// Overrides contributed by one factory definition. Unset fields inherit.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsLayer {
    #[serde(skip)]
    session: Option<SessionHandle>,
    /// `None`: inherit. `Some(None)`: explicitly no persistence.
    #[serde(
        default,
        deserialize_with = "explicit_value",
        alias = "sqlalchemy_session_persistence"
    )]
    session_persistence: Option<Option<String>>,
    #[serde(default, alias = "sqlalchemy_update_existing")]
    update_existing: Option<bool>,
    #[serde(default)]
    force_flush: Option<bool>,
}

fn explicit_value<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl OptionsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a layer from JSON, e.g. `{"session_persistence": "get"}`.
    ///
    /// The mode string is kept raw until resolution so that an invalid value
    /// is reported against the factory it belongs to.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn persistence(mut self, mode: PersistenceMode) -> Self {
        self.session_persistence = Some(Some(mode.as_str().to_string()));
        self
    }

    /// Sets the mode from its configuration string; validated on resolve.
    /// `"none"` explicitly disables persistence.
    pub fn persistence_str(mut self, mode: impl Into<String>) -> Self {
        self.session_persistence = Some(Some(mode.into()));
        self
    }

    /// Explicitly disables persistence, overriding any inherited mode.
    pub fn no_persistence(mut self) -> Self {
        self.session_persistence = Some(None);
        self
    }

    pub fn update_existing(mut self, update_existing: bool) -> Self {
        self.update_existing = Some(update_existing);
        self
    }

    /// Deprecated: prefer `persistence(PersistenceMode::Flush)`.
    pub fn force_flush(mut self, force_flush: bool) -> Self {
        self.force_flush = Some(force_flush);
        self
    }

    /// Resolves this layer on top of the built-in defaults.
    pub fn resolve(&self, factory: &str) -> Result<Resolution> {
        self.resolve_over(factory, &FactoryOptions::default())
    }

    /// Resolves this layer on top of a parent factory's options.
    pub fn resolve_over(&self, factory: &str, base: &FactoryOptions) -> Result<Resolution> {
        let persistence = match &self.session_persistence {
            Some(Some(raw)) if raw == NO_PERSISTENCE => None,
            Some(Some(raw)) => Some(raw.parse::<PersistenceMode>().map_err(
                |UnknownMode(value)| FactoryError::InvalidPersistenceMode {
                    factory: factory.to_string(),
                    value,
                    allowed: PersistenceMode::allowed_values(),
                },
            )?),
            Some(None) => None,
            None => base.persistence,
        };

        let options = FactoryOptions {
            factory_name: factory.to_string(),
            session: self.session.clone().or_else(|| base.session.clone()),
            persistence,
            update_existing: self.update_existing.unwrap_or(base.update_existing),
            force_flush: self.force_flush.unwrap_or(base.force_flush),
        };

        let mut diagnostics = Vec::new();
        if options.force_flush {
            diagnostics.push(ConfigDiagnostic::DeprecatedForceFlush {
                factory: factory.to_string(),
            });
        }

        Ok(Resolution {
            options,
            diagnostics,
        })
    }
}

impl fmt::Debug for OptionsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsLayer")
            .field("session", &self.session.as_ref().map(|_| "<session>"))
            .field("session_persistence", &self.session_persistence)
            .field("update_existing", &self.update_existing)
            .field("force_flush", &self.force_flush)
            .finish()
    }
}

/// Fully resolved options for one factory.
#[derive(Clone, Default)]
pub struct FactoryOptions {
    factory_name: String,
    session: Option<SessionHandle>,
    persistence: Option<PersistenceMode>,
    update_existing: bool,
    force_flush: bool,
}

impl FactoryOptions {
    pub fn factory_name(&self) -> &str {
        &self.factory_name
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// The configured mode, ignoring `force_flush`.
    pub fn persistence(&self) -> Option<PersistenceMode> {
        self.persistence
    }

    pub fn update_existing(&self) -> bool {
        self.update_existing
    }

    pub fn force_flush(&self) -> bool {
        self.force_flush
    }

    /// The mode the engine dispatches on: `force_flush` wins over any
    /// configured mode.
    pub fn effective_mode(&self) -> Option<PersistenceMode> {
        if self.force_flush {
            Some(PersistenceMode::Flush)
        } else {
            self.persistence
        }
    }
}

impl fmt::Debug for FactoryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("factory_name", &self.factory_name)
            .field("session", &self.session.as_ref().map(|_| "<session>"))
            .field("persistence", &self.persistence)
            .field("update_existing", &self.update_existing)
            .field("force_flush", &self.force_flush)
            .finish()
    }
}

/// A non-fatal finding produced while resolving options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDiagnostic {
    DeprecatedForceFlush { factory: String },
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeprecatedForceFlush { factory } => write!(
                f,
                "{factory}.force_flush is deprecated; set {factory}.session_persistence = \"flush\" instead"
            ),
        }
    }
}

/// Resolved options plus whatever the host should be told about them.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub options: FactoryOptions,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl Resolution {
    /// Forwards every diagnostic to `log::warn!`.
    pub fn log_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            log::warn!("{}", diagnostic);
        }
    }

    pub fn into_options(self) -> FactoryOptions {
        self.options
    }
}
