use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::{describe, Converter};

/// Handle returned by [`ConverterRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConverterId(u64);

#[derive(Default)]
struct Entries {
    next_id: u64,
    contributed: Vec<(ConverterId, Arc<dyn Converter>)>,
    builtins: Vec<Arc<dyn Converter>>,
}

/// The active converter set.
///
/// Contributed converters are enumerated in registration order, followed by
/// the builtins, which therefore only win when nothing contributed fits.
#[derive(Default)]
pub struct ConverterRegistry {
    entries: RwLock<Entries>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, converter: Arc<dyn Converter>) -> ConverterId {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let id = ConverterId(entries.next_id);
        entries.next_id += 1;
        debug!("Registered converter {:?}: {}", id, describe(converter.as_ref()));
        entries.contributed.push((id, converter));
        id
    }

    pub fn unregister(&self, id: ConverterId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.contributed.len();
        entries.contributed.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.contributed.len() != before;
        if removed {
            debug!("Unregistered converter {:?}", id);
        }
        removed
    }

    pub fn add_builtin(&self, converter: Arc<dyn Converter>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        debug!("Added builtin converter: {}", describe(converter.as_ref()));
        entries.builtins.push(converter);
    }

    /// Copy of the current set, taken under a single lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn Converter>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .contributed
            .iter()
            .map(|(_, converter)| converter.clone())
            .chain(entries.builtins.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contributed.len() + entries.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::FnConverter;
    use crate::mime::MimeType;

    fn passthrough(name: &str, from: &str, to: &str) -> Arc<dyn Converter> {
        Arc::new(FnConverter::new(
            name,
            MimeType::parse(from).unwrap(),
            MimeType::parse(to).unwrap(),
            |data, _| Ok(data),
        ))
    }

    fn names(registry: &ConverterRegistry) -> Vec<String> {
        registry
            .snapshot()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    #[test]
    fn test_builtins_enumerated_last() {
        let registry = ConverterRegistry::new();
        registry.add_builtin(passthrough("builtin", "a/a", "b/b"));
        registry.register(passthrough("first", "a/a", "b/b"));
        registry.register(passthrough("second", "a/a", "b/b"));

        assert_eq!(names(&registry), vec!["first", "second", "builtin"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unregister() {
        let registry = ConverterRegistry::new();
        assert!(registry.is_empty());
        let id = registry.register(passthrough("gone", "a/a", "b/b"));
        let kept = registry.register(passthrough("kept", "a/a", "b/b"));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(names(&registry), vec!["kept"]);

        assert!(registry.unregister(kept));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let registry = ConverterRegistry::new();
        registry.register(passthrough("one", "a/a", "b/b"));
        let snapshot = registry.snapshot();
        registry.register(passthrough("two", "b/b", "c/c"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
