//! Explicit registry of stage constructors.
//!
//! The process entry point builds a `StageRegistry<C>` (where `C` is its own
//! options type), registers every input/filter/output it knows about, and then
//! instantiates stages by name. Nothing is registered implicitly.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::PipelineError;
use crate::stage::Stage;

/// Role a stage plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Input,
    Filter,
    Output,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Filter => write!(f, "filter"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Builds a stage from the entry point's options.
pub type StageFactory<C> =
    Box<dyn Fn(&C) -> Result<Box<dyn Stage>, PipelineError> + Send + Sync>;

/// A registered stage constructor.
pub struct RegistryEntry<C> {
    pub kind: StageKind,
    pub name: String,
    pub description: String,
    factory: StageFactory<C>,
}

impl<C> fmt::Debug for RegistryEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Name → constructor table, keyed by `(kind, name)`.
pub struct StageRegistry<C> {
    entries: BTreeMap<(StageKind, String), RegistryEntry<C>>,
}

impl<C> StageRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a constructor. A later registration under the same
    /// `(kind, name)` replaces the earlier one.
    pub fn register<F>(
        &mut self,
        kind: StageKind,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) where
        F: Fn(&C) -> Result<Box<dyn Stage>, PipelineError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.entries.insert(
            (kind, name.clone()),
            RegistryEntry {
                kind,
                name,
                description: description.into(),
                factory: Box::new(factory),
            },
        );
    }

    /// Instantiate the stage registered as `(kind, name)`.
    pub fn build(
        &self,
        kind: StageKind,
        name: &str,
        options: &C,
    ) -> Result<Box<dyn Stage>, PipelineError> {
        let entry = self
            .entries
            .get(&(kind, name.to_string()))
            .ok_or_else(|| PipelineError::UnknownPlugin {
                kind,
                name: name.to_string(),
            })?;
        (entry.factory)(options)
    }

    pub fn contains(&self, kind: StageKind, name: &str) -> bool {
        self.entries.contains_key(&(kind, name.to_string()))
    }

    /// Registered entries of one kind, sorted by name.
    pub fn entries(&self, kind: StageKind) -> impl Iterator<Item = &RegistryEntry<C>> {
        self.entries.values().filter(move |e| e.kind == kind)
    }
}

impl<C> Default for StageRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
