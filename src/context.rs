use crate::document::Document;
use crate::inline::InlineRegistry;
use crate::naming::ConflictRegistry;
use crate::polymorphism::{self, PolymorphicConfig};
use indexmap::IndexMap;
use log::debug;

/// State scoped to a single generation pass over one document.
///
/// A fresh context is created per run (and per segment in per-segment mode), so names and
/// hoisted inline declarations never leak between runs.
#[derive(Debug)]
pub struct PassContext {
    pub names: ConflictRegistry,
    pub inline: InlineRegistry,
    /// Raw component name -> polymorphic configuration
    pub polymorphic: IndexMap<String, PolymorphicConfig>,
}

impl PassContext {
    pub fn new(document: &Document, models_namespace: &str) -> Self {
        let mut names = ConflictRegistry::new(models_namespace);
        names.register_components(document.components.schemas.keys());

        let polymorphic = polymorphism::analyze(document, &mut names);
        debug!(
            "Pass context: {} components, {} polymorphic",
            document.components.schemas.len(),
            polymorphic.len()
        );

        Self {
            names,
            inline: InlineRegistry::default(),
            polymorphic,
        }
    }
}
