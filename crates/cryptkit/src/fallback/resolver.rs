//! Fallback search: the first usable candidate of an ordered list.

use std::{fmt, sync::Arc};

use common::CryptError;
use tracing::{debug, trace, warn};

use super::{Category, ProbeCache};
use crate::crypto::{block::BLOCK_LEN, ModeKind, Registry};

/// Answers whether a candidate primitive can be used.
///
/// `Ok(false)` means "not available" and lets the search continue. Any `Err` aborts the
/// search and is not cached.
#[cfg_attr(test, mockall::automock)]
pub trait Probe: Send + Sync {
    fn probe(&self, category: Category, candidate: &str) -> Result<bool, CryptError>;
}

/// How far down a candidate list the search may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Try every candidate in order.
    #[default]
    FirstUsable,
    /// Try only the first candidate.
    FirstOnly,
}

/// Probes candidates against a [`Registry`], running a short self-test on each hit.
#[derive(Debug, Clone)]
pub struct RegistryProbe {
    registry: Arc<Registry>,
}

impl RegistryProbe {
    /// Probe against `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn self_test(&self, category: Category, candidate: &str) -> Result<(), String> {
        let reg = &self.registry;
        match category {
            Category::Cipher => {
                let Some(spec) = reg.cipher(candidate) else {
                    return Ok(());
                };
                let len = spec.key_len.unwrap_or(spec.fallback_key_len);
                let handle = (spec.build_mode)(ModeKind::Ctr, &vec![0u8; len], None)
                    .map_err(|e| e.to_string())?;
                let block = [0x5au8; BLOCK_LEN];
                let ct = handle.encrypt(&block).map_err(|e| e.to_string())?;
                let pt = handle.decrypt(&ct).map_err(|e| e.to_string())?;
                if pt != block {
                    return Err("CTR round trip mismatch".into());
                }
            }
            Category::Digest => {
                if let Some(spec) = reg.digest(candidate) {
                    let out = (spec.digest)(b"");
                    if out.len() != spec.output_len {
                        return Err(format!(
                            "produced {} bytes, declared {}",
                            out.len(),
                            spec.output_len
                        ));
                    }
                }
            }
            c if c.is_encoding() => {
                if let Some(spec) = reg.codec(candidate) {
                    let sample = b"\x00\xffprobe";
                    let text = (spec.encode)(sample);
                    let back = (spec.decode)(&text).map_err(|e| e.to_string())?;
                    if back != sample {
                        return Err("codec round trip mismatch".into());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Probe for RegistryProbe {
    fn probe(&self, category: Category, candidate: &str) -> Result<bool, CryptError> {
        if !self.registry.is_registered(category, candidate) {
            return Ok(false);
        }
        self.self_test(category, candidate)
            .map_err(|reason| CryptError::PrimitiveLoadFailure {
                name: candidate.to_owned(),
                reason,
            })?;
        Ok(true)
    }
}

/// Walks candidate lists through a [`Probe`], memoising outcomes in a [`ProbeCache`].
#[derive(Clone)]
pub struct FallbackResolver {
    probe: Arc<dyn Probe>,
    cache: ProbeCache,
}

impl FallbackResolver {
    /// Search with `probe`, recording outcomes in `cache`.
    pub fn new(probe: Arc<dyn Probe>, cache: ProbeCache) -> Self {
        Self { probe, cache }
    }

    /// The built-in registry with the process-wide cache.
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(RegistryProbe::new(Registry::builtin())),
            ProbeCache::global(),
        )
    }

    /// A custom registry. Gets a private cache so its answers never leak into the global one.
    pub fn for_registry(registry: Arc<Registry>) -> Self {
        Self::new(Arc::new(RegistryProbe::new(registry)), ProbeCache::new())
    }

    /// The cache this resolver records into.
    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    /// Return the first usable candidate.
    ///
    /// # Errors
    ///
    /// - [`CryptError::NoUsableCandidate`] once the permitted candidates are exhausted.
    /// - Any probe error, immediately.
    pub fn resolve(
        &self,
        category: Category,
        candidates: &[String],
        strategy: Strategy,
    ) -> Result<String, CryptError> {
        let permitted = match strategy {
            Strategy::FirstUsable => candidates,
            Strategy::FirstOnly => &candidates[..candidates.len().min(1)],
        };

        let mut tried = Vec::with_capacity(permitted.len());
        for candidate in permitted {
            tried.push(candidate.clone());
            let usable = match self.cache.get(category, candidate) {
                Some(hit) => {
                    trace!(%category, candidate = %candidate, usable = hit, "probe cache hit");
                    hit
                }
                None => {
                    let usable = self.probe.probe(category, candidate).inspect_err(|e| {
                        warn!(%category, candidate = %candidate, error = %e, "probe failed");
                    })?;
                    self.cache.record(category, candidate, usable);
                    usable
                }
            };
            if usable {
                debug!(%category, candidate = %candidate, "fallback resolved");
                return Ok(candidate.clone());
            }
        }

        if strategy == Strategy::FirstOnly && candidates.len() > 1 {
            warn!(
                %category,
                first = ?candidates.first(),
                "fallback disabled and first candidate unusable"
            );
        }
        Err(CryptError::NoUsableCandidate {
            category: category.to_string(),
            tried,
        })
    }
}

impl fmt::Debug for FallbackResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn resolver(probe: MockProbe) -> FallbackResolver {
        FallbackResolver::new(Arc::new(probe), ProbeCache::new())
    }

    #[test]
    fn first_usable_wins() {
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .with(eq(Category::Cipher), eq("A"))
            .times(1)
            .returning(|_, _| Ok(false));
        probe
            .expect_probe()
            .with(eq(Category::Cipher), eq("B"))
            .times(1)
            .returning(|_, _| Ok(true));
        let r = resolver(probe);
        let got = r
            .resolve(Category::Cipher, &names(&["A", "B", "C"]), Strategy::FirstUsable)
            .unwrap();
        assert_eq!(got, "B");
    }

    #[test]
    fn outcomes_are_cached() {
        let mut probe = MockProbe::new();
        probe.expect_probe().times(2).returning(|_, c| Ok(c == "B"));
        let r = resolver(probe);
        let list = names(&["A", "B"]);
        for _ in 0..3 {
            assert_eq!(
                r.resolve(Category::Digest, &list, Strategy::FirstUsable).unwrap(),
                "B"
            );
        }
        assert_eq!(r.cache().get(Category::Digest, "A"), Some(false));
    }

    #[test]
    fn exhaustion_reports_tried_candidates() {
        let mut probe = MockProbe::new();
        probe.expect_probe().returning(|_, _| Ok(false));
        let err = resolver(probe)
            .resolve(Category::Mac, &names(&["X", "Y"]), Strategy::FirstUsable)
            .unwrap_err();
        match err {
            CryptError::NoUsableCandidate { category, tried } => {
                assert_eq!(category, "mac");
                assert_eq!(tried, ["X", "Y"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn first_only_stops_after_one() {
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .with(eq(Category::Cipher), eq("A"))
            .times(1)
            .returning(|_, _| Ok(false));
        let err = resolver(probe)
            .resolve(Category::Cipher, &names(&["A", "B"]), Strategy::FirstOnly)
            .unwrap_err();
        assert!(matches!(err, CryptError::NoUsableCandidate { ref tried, .. } if tried == &["A"]));
    }

    #[test]
    fn probe_errors_propagate_uncached() {
        let mut probe = MockProbe::new();
        probe.expect_probe().times(2).returning(|_, c| {
            Err(CryptError::PrimitiveLoadFailure {
                name: c.to_owned(),
                reason: "broken".into(),
            })
        });
        let r = resolver(probe);
        let list = names(&["A", "B"]);
        for _ in 0..2 {
            assert!(matches!(
                r.resolve(Category::Cipher, &list, Strategy::FirstUsable),
                Err(CryptError::PrimitiveLoadFailure { .. })
            ));
        }
        assert!(r.cache().is_empty());
    }

    #[test]
    fn empty_list_is_exhausted() {
        let r = resolver(MockProbe::new());
        assert!(matches!(
            r.resolve(Category::Encoding, &[], Strategy::FirstUsable),
            Err(CryptError::NoUsableCandidate { .. })
        ));
    }

    #[test]
    fn registry_probe_over_builtins() {
        let probe = RegistryProbe::new(Registry::builtin());
        assert!(probe.probe(Category::Cipher, "AES").unwrap());
        assert!(probe.probe(Category::Digest, "SHA-384").unwrap());
        assert!(probe.probe(Category::UriEncoding, "uri_base64").unwrap());
        assert!(probe.probe(Category::AuthenticatedMode, "ChaCha20-Poly1305").unwrap());
        assert!(!probe.probe(Category::BlockMode, "CTR").unwrap());
        assert!(!probe.probe(Category::Cipher, "Serpent").unwrap());
        assert_eq!(
            probe.probe(Category::Cipher, "Twofish").unwrap(),
            cfg!(feature = "twofish")
        );
    }

    #[test]
    fn builtin_lists_resolve_to_their_head() {
        let r = FallbackResolver::for_registry(Registry::builtin());
        let lists = crate::fallback::FallbackLists::new();
        for category in Category::ALL {
            let got = r
                .resolve(category, lists.get(category), Strategy::FirstUsable)
                .unwrap();
            assert_eq!(got, category.default_candidates()[0], "{category}");
        }
    }

    #[test]
    fn broken_self_test_is_load_failure() {
        fn short_digest(_: &[u8]) -> Vec<u8> {
            vec![0u8; 3]
        }
        let mut reg = Registry::with_builtins();
        let mut spec = reg.digest("SHA-256").unwrap().clone();
        spec.name = "Broken".into();
        spec.digest = short_digest;
        reg.register_digest(spec).unwrap();

        let r = FallbackResolver::for_registry(Arc::new(reg));
        let err = r
            .resolve(Category::Digest, &names(&["Broken", "SHA-256"]), Strategy::FirstUsable)
            .unwrap_err();
        assert_eq!(err.code(), "primitive_load_failure");
    }
}
