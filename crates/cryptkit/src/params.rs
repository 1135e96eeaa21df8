//! Per-call parameters and their three-tier resolution.
//!
//! A value comes from the call ([`Tier::Explicit`]), else the instance defaults
//! ([`Tier::Default`]), else the category's fallback list ([`Tier::Fallback`]). Fallback
//! results are never written back into the defaults.

use std::collections::BTreeMap;

use common::CryptError;
use tracing::debug;

use crate::config::Defaults;
use crate::crypto::Registry;
use crate::fallback::{Category, FallbackLists, FallbackResolver, Strategy};
use crate::key::SecretBytes;

/// Optional per-call overrides. Anything left unset is resolved from the instance.
///
/// ```
/// use cryptkit::Params;
///
/// let params = Params::new().cipher("AES").mode("GCM").key("passphrase").nonce(b"n-1");
/// # let _ = params;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub(crate) algorithms: BTreeMap<Category, String>,
    pub(crate) key: Option<SecretBytes>,
    pub(crate) nonce: Option<Vec<u8>>,
    pub(crate) key_size: Option<usize>,
    pub(crate) literal_key: Option<bool>,
    pub(crate) encrypt: Option<bool>,
    pub(crate) encode: Option<bool>,
    pub(crate) fatal: Option<bool>,
}

macro_rules! algorithm_setters {
    ($($method:ident => $category:ident),* $(,)?) => {
        $(
            #[doc = concat!("Name the `", stringify!($method), "` algorithm for this call.")]
            #[must_use]
            pub fn $method(self, name: impl Into<String>) -> Self {
                self.with_algorithm(Category::$category, name)
            }
        )*
    };
}

impl Params {
    /// Parameters that name nothing; every value comes from the defaults or fallbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The explicit algorithm for `category`, if the call names one.
    pub fn algorithm(&self, category: Category) -> Option<&str> {
        self.algorithms.get(&category).map(String::as_str)
    }

    /// Name the algorithm for `category` on this call.
    #[must_use]
    pub fn with_algorithm(mut self, category: Category, name: impl Into<String>) -> Self {
        self.algorithms.insert(category, name.into());
        self
    }

    algorithm_setters! {
        cipher => Cipher,
        mode => Mode,
        stream_mode => StreamMode,
        block_mode => BlockMode,
        authenticated_mode => AuthenticatedMode,
        digest => Digest,
        mac => Mac,
        encoding => Encoding,
        printable_encoding => PrintableEncoding,
        alphanumerical_encoding => AlphanumericalEncoding,
        uri_encoding => UriEncoding,
    }

    /// Key for this call.
    #[must_use]
    pub fn key(mut self, key: impl Into<SecretBytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Nonce for this call. An empty nonce counts as unset.
    #[must_use]
    pub fn nonce(mut self, nonce: impl AsRef<[u8]>) -> Self {
        self.nonce = Some(nonce.as_ref().to_vec());
        self
    }

    /// Derived key length in bytes.
    #[must_use]
    pub fn key_size(mut self, size: usize) -> Self {
        self.key_size = Some(size);
        self
    }

    /// Use the key as given instead of stretching it.
    #[must_use]
    pub fn literal_key(mut self, on: bool) -> Self {
        self.literal_key = Some(on);
        self
    }

    /// Encrypt when tamper-proofing (`true`) or only MAC (`false`).
    #[must_use]
    pub fn encrypt(mut self, on: bool) -> Self {
        self.encrypt = Some(on);
        self
    }

    /// Text-encode outputs and decode inputs.
    #[must_use]
    pub fn encode(mut self, on: bool) -> Self {
        self.encode = Some(on);
        self
    }

    /// Whether integrity failures are errors or verdicts.
    #[must_use]
    pub fn fatal(mut self, on: bool) -> Self {
        self.fatal = Some(on);
        self
    }
}

/// Which tier supplied a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Named by the call.
    Explicit,
    /// Taken from the instance defaults.
    Default,
    /// Found by searching the fallback list.
    Fallback,
}

/// A resolved value and the tier it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub tier: Tier,
}

/// Everything needed to resolve and dispatch one call, borrowed from a [`crate::CryptKit`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pub(crate) defaults: &'a Defaults,
    pub(crate) lists: &'a FallbackLists,
    pub(crate) fallback: &'a FallbackResolver,
    pub(crate) registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    /// Borrow the pieces of an instance for one call.
    pub fn new(
        defaults: &'a Defaults,
        lists: &'a FallbackLists,
        fallback: &'a FallbackResolver,
        registry: &'a Registry,
    ) -> Self {
        Self {
            defaults,
            lists,
            fallback,
            registry,
        }
    }

    /// First-only when the defaults disable fallback, else first-usable.
    pub fn strategy(&self) -> Strategy {
        if self.defaults.disable_fallback().unwrap_or(false) {
            Strategy::FirstOnly
        } else {
            Strategy::FirstUsable
        }
    }

    /// Resolve `category` from `explicit`, then the defaults, then the fallback list.
    ///
    /// # Errors
    ///
    /// - [`CryptError::MissingParameter`] if no tier supplies a value (empty fallback list).
    /// - Any fallback search error.
    pub fn resolve(
        &self,
        category: Category,
        explicit: Option<&str>,
    ) -> Result<Resolved<String>, CryptError> {
        let resolved = if let Some(value) = explicit {
            Resolved {
                value: value.to_owned(),
                tier: Tier::Explicit,
            }
        } else if let Some(value) = self.defaults.algorithm(category) {
            Resolved {
                value: value.to_owned(),
                tier: Tier::Default,
            }
        } else {
            Resolved {
                value: self.fallback(category)?,
                tier: Tier::Fallback,
            }
        };
        debug!(%category, value = %resolved.value, tier = ?resolved.tier, "parameter resolved");
        Ok(resolved)
    }

    /// Resolve `category` with the call's explicit value taken from `params`.
    pub fn resolve_param(
        &self,
        category: Category,
        params: &Params,
    ) -> Result<Resolved<String>, CryptError> {
        self.resolve(category, params.algorithm(category))
    }

    /// Search the instance's fallback list for `category`, ignoring explicit and default tiers.
    pub fn fallback(&self, category: Category) -> Result<String, CryptError> {
        let candidates = self.lists.get(category);
        if candidates.is_empty() {
            return Err(CryptError::MissingParameter(category.name().to_owned()));
        }
        self.fallback.resolve(category, candidates, self.strategy())
    }

    /// The key supplied by the call, else the default key.
    pub fn key<'p>(&self, params: &'p Params) -> Option<&'p SecretBytes>
    where
        'a: 'p,
    {
        params.key.as_ref().or(self.defaults.key())
    }

    /// Explicit key size, from the call then the defaults.
    pub fn key_size(&self, params: &Params) -> Option<usize> {
        params.key_size.or(self.defaults.key_size())
    }

    /// Whether keys skip stretching: the call, then the defaults, else off.
    pub fn literal_key(&self, params: &Params) -> bool {
        flag(params.literal_key, self.defaults.use_literal_key(), false)
    }

    /// Whether to text-encode: the call, then the defaults, else off.
    pub fn encode(&self, params: &Params) -> bool {
        flag(params.encode, self.defaults.encode(), false)
    }

    /// Whether integrity failures are errors: the call, then the defaults, else on.
    pub fn fatal(&self, params: &Params) -> bool {
        flag(params.fatal, self.defaults.fatal(), true)
    }

    /// Whether tamper-proofing encrypts: the call, else `!tamper_proof_unencrypted`, else on.
    pub fn encrypt(&self, params: &Params) -> bool {
        flag(
            params.encrypt,
            self.defaults.tamper_proof_unencrypted().map(|off| !off),
            true,
        )
    }
}

/// Boolean flags resolve explicit → instance default → built-in default.
fn flag(explicit: Option<bool>, default: Option<bool>, builtin: bool) -> bool {
    explicit.or(default).unwrap_or(builtin)
}
