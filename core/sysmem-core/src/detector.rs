//! Decides whether a project needs re-collection.
//!
//! Ties the generator, classifier and fingerprint store together:
//! scan now, compare against the stored snapshot, report.

use std::path::Path;

use tracing::info;

use crate::classifier::{ChangeClassifier, ChangeReport};
use crate::fingerprint::{Fingerprint, FingerprintGenerator, FingerprintStore};

pub struct ChangeDetector {
    generator: FingerprintGenerator,
    classifier: ChangeClassifier,
    store: FingerprintStore,
}

impl ChangeDetector {
    pub fn new(
        generator: FingerprintGenerator,
        classifier: ChangeClassifier,
        store: FingerprintStore,
    ) -> Self {
        Self {
            generator,
            classifier,
            store,
        }
    }

    pub fn generator(&self) -> &FingerprintGenerator {
        &self.generator
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Scans `root` and classifies against the stored fingerprint.
    ///
    /// Returns the fresh fingerprint as well so the caller can persist it
    /// once collection succeeds. Nothing is written here.
    pub fn should_collect(&self, root: &Path) -> (ChangeReport, Fingerprint) {
        let previous = self.store.load();
        let current = self.generator.generate(root);
        let report = self.classifier.classify(previous.as_ref(), &current);
        info!(
            root = %current.root_path,
            should_collect = report.should_collect,
            level = %report.level,
            "Change check complete"
        );
        (report, current)
    }

    /// Persists `fingerprint` as the new baseline.
    pub fn commit(&self, fingerprint: &Fingerprint) -> bool {
        self.store.save(fingerprint)
    }

    /// Scans `root` and stores the result as the new baseline.
    pub fn refresh(&self, root: &Path) -> bool {
        let current = self.generator.generate(root);
        self.commit(&current)
    }
}
