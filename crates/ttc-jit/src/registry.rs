use std::collections::HashMap;
use std::sync::Arc;

use crate::param::Signature;

/// Anything the registry can key by signature.
pub trait Signed {
    fn signature(&self) -> Signature<'_>;
}

/// Unbounded find-or-create cache of built plans.
///
/// Entries are kept in insertion order. `index` maps a signature fingerprint
/// to the positions sharing it, so lookups compare only colliding entries.
pub struct PlanRegistry<P> {
    entries: Vec<Arc<P>>,
    index: HashMap<u64, Vec<usize>>,
}

impl<P: Signed> PlanRegistry<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First stored entry whose signature equals `signature`.
    pub fn find(&self, signature: &Signature<'_>) -> Option<Arc<P>> {
        let bucket = self.index.get(&signature.fingerprint())?;
        bucket
            .iter()
            .map(|&position| &self.entries[position])
            .find(|entry| entry.signature() == *signature)
            .cloned()
    }

    /// Returns the matching entry, or builds and appends one.
    ///
    /// The bool is `true` when an existing entry was reused. A failed build
    /// leaves the registry untouched.
    pub fn find_or_try_insert_with<E, F>(
        &mut self,
        signature: &Signature<'_>,
        build: F,
    ) -> Result<(Arc<P>, bool), E>
    where
        F: FnOnce() -> Result<P, E>,
    {
        if let Some(existing) = self.find(signature) {
            return Ok((existing, true));
        }
        let built = Arc::new(build()?);
        self.push(Arc::clone(&built));
        Ok((built, false))
    }

    fn push(&mut self, entry: Arc<P>) {
        let fingerprint = entry.signature().fingerprint();
        let position = self.entries.len();
        self.entries.push(entry);
        self.index.entry(fingerprint).or_default().push(position);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<P>> {
        self.entries.iter()
    }
}

impl<P: Signed> Default for PlanRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::param::TransposeParam;

    struct Entry {
        param: TransposeParam,
        id: usize,
    }

    impl Signed for Entry {
        fn signature(&self) -> Signature<'_> {
            self.param.signature()
        }
    }

    fn insert(
        registry: &mut PlanRegistry<Entry>,
        param: &TransposeParam,
        builds: &Cell<usize>,
    ) -> (Arc<Entry>, bool) {
        registry
            .find_or_try_insert_with::<(), _>(&param.signature(), || {
                builds.set(builds.get() + 1);
                Ok(Entry {
                    param: param.clone(),
                    id: builds.get(),
                })
            })
            .expect("build succeeds")
    }

    #[test]
    fn equivalent_signatures_reuse_the_first_entry() {
        let mut registry = PlanRegistry::new();
        let builds = Cell::new(0);
        let param = TransposeParam::new(&[0, 2, 1], &[8, 4, 2]);
        let (first, reused) = insert(&mut registry, &param, &builds);
        assert!(!reused);

        let variant = param
            .clone()
            .with_alpha(3.0)
            .with_beta(1.5)
            .with_strides(&[8, 4, 2], &[8, 2, 4]);
        let (second, reused) = insert(&mut registry, &variant, &builds);
        assert!(reused);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn each_signature_member_distinguishes_entries() {
        let mut registry = PlanRegistry::new();
        let builds = Cell::new(0);
        let base = TransposeParam::new(&[0, 2, 1], &[8, 4, 2]);
        let variants = [
            base.clone(),
            TransposeParam::new(&[1, 0], &[8, 4]),
            TransposeParam::new(&[2, 0, 1], &[8, 4, 2]),
            TransposeParam::new(&[0, 2, 1], &[8, 4, 3]),
            base.clone().with_loop_perm(&[0, 1, 2]),
            base.clone().with_loop_perm(&[2, 1, 0]),
        ];
        for param in &variants {
            let (_, reused) = insert(&mut registry, param, &builds);
            assert!(!reused, "unexpected reuse for {param:?}");
        }
        assert_eq!(builds.get(), variants.len());
        let ids: Vec<usize> = registry.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, (1..=variants.len()).collect::<Vec<_>>());
    }

    #[test]
    fn failed_build_is_not_cached() {
        let mut registry: PlanRegistry<Entry> = PlanRegistry::new();
        let param = TransposeParam::new(&[1, 0], &[3, 3]);
        let attempts = Cell::new(0);
        for _ in 0..2 {
            let result = registry.find_or_try_insert_with(&param.signature(), || {
                attempts.set(attempts.get() + 1);
                Err("generator exited with status 1")
            });
            assert!(result.is_err());
        }
        assert_eq!(attempts.get(), 2);
        assert!(registry.is_empty());
    }
}
