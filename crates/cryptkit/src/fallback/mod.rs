//! Algorithm categories, their ordered fallback lists, and the fallback search.
//!
//! Each [`Category`] carries a compiled-in candidate list whose order encodes preference.
//! A [`FallbackLists`] value holds one list per category and can be overridden per
//! [`crate::CryptKit`] instance. The search itself lives in [`resolver`]; probe outcomes are
//! memoised in [`cache`].

pub mod cache;
pub mod resolver;

use std::collections::HashMap;
use std::fmt;

use crate::crypto::ModeClass;

pub use cache::ProbeCache;
pub use resolver::{FallbackResolver, Probe, RegistryProbe, Strategy};
#[cfg(test)]
pub use resolver::MockProbe;

/// A named parameter category that can be resolved through a fallback list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Block cipher (`AES`, `Twofish`).
    Cipher,
    /// Concrete mode or one of the symbolic classes `stream`, `block`, `authenticated`.
    Mode,
    /// Concrete mode used when `mode` resolves to `stream`.
    StreamMode,
    /// Concrete mode used when `mode` resolves to `block`.
    BlockMode,
    /// Concrete AEAD mode.
    AuthenticatedMode,
    /// Message digest.
    Digest,
    /// MAC family (`HMAC`, `CMAC`).
    Mac,
    /// General text encoding.
    Encoding,
    /// Encoding restricted to printable ASCII.
    PrintableEncoding,
    /// Encoding restricted to letters and digits.
    AlphanumericalEncoding,
    /// Encoding safe inside a URI component.
    UriEncoding,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 11] = [
        Category::Cipher,
        Category::Mode,
        Category::StreamMode,
        Category::BlockMode,
        Category::AuthenticatedMode,
        Category::Digest,
        Category::Mac,
        Category::Encoding,
        Category::PrintableEncoding,
        Category::AlphanumericalEncoding,
        Category::UriEncoding,
    ];

    /// Parameter name of this category, as used in configuration keys.
    pub fn name(self) -> &'static str {
        match self {
            Category::Cipher => "cipher",
            Category::Mode => "mode",
            Category::StreamMode => "stream_mode",
            Category::BlockMode => "block_mode",
            Category::AuthenticatedMode => "authenticated_mode",
            Category::Digest => "digest",
            Category::Mac => "mac",
            Category::Encoding => "encoding",
            Category::PrintableEncoding => "printable_encoding",
            Category::AlphanumericalEncoding => "alphanumerical_encoding",
            Category::UriEncoding => "uri_encoding",
        }
    }

    /// The compiled-in candidate list, most preferred first.
    pub fn default_candidates(self) -> &'static [&'static str] {
        match self {
            Category::Cipher => &["AES", "Twofish"],
            Category::Mode => &["CFB", "CBC", "CTR", "OFB"],
            Category::StreamMode => &["CFB", "CTR", "OFB"],
            Category::BlockMode => &["CBC"],
            Category::AuthenticatedMode => &["EAX", "GCM", "CCM", "GCM-SIV", "ChaCha20-Poly1305"],
            Category::Digest => &["SHA-256", "SHA-512", "SHA-384", "SHA-224", "SHA-512/256"],
            Category::Mac => &["HMAC", "CMAC"],
            Category::Encoding => &["hex"],
            Category::PrintableEncoding => &["base64", "hex"],
            Category::AlphanumericalEncoding => &["base32", "hex"],
            Category::UriEncoding => &["uri_base64", "base32", "hex"],
        }
    }

    /// For the per-class mode categories, the class whose modes they accept.
    pub fn mode_class(self) -> Option<ModeClass> {
        match self {
            Category::StreamMode => Some(ModeClass::Stream),
            Category::BlockMode => Some(ModeClass::Block),
            Category::AuthenticatedMode => Some(ModeClass::Authenticated),
            _ => None,
        }
    }

    /// Returns `true` for the text-encoding categories.
    pub fn is_encoding(self) -> bool {
        matches!(
            self,
            Category::Encoding
                | Category::PrintableEncoding
                | Category::AlphanumericalEncoding
                | Category::UriEncoding
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-instance candidate lists, one per [`Category`].
///
/// Starts from [`Category::default_candidates`]; lists can be replaced or reset at runtime
/// and the change is visible to the next resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackLists {
    lists: HashMap<Category, Vec<String>>,
}

impl FallbackLists {
    /// Lists initialised from the compiled-in defaults.
    pub fn new() -> Self {
        let lists = Category::ALL
            .iter()
            .map(|&c| (c, compiled(c)))
            .collect();
        Self { lists }
    }

    /// The current candidates for `category`.
    pub fn get(&self, category: Category) -> &[String] {
        self.lists.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the candidates for `category`. An empty list disables fallback for it.
    pub fn set(&mut self, category: Category, candidates: Vec<String>) {
        self.lists.insert(category, candidates);
    }

    /// Restore the compiled-in list for `category`.
    pub fn reset(&mut self, category: Category) {
        self.lists.insert(category, compiled(category));
    }
}

impl Default for FallbackLists {
    fn default() -> Self {
        Self::new()
    }
}

fn compiled(category: Category) -> Vec<String> {
    category
        .default_candidates()
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_candidates() {
        for category in Category::ALL {
            assert!(
                !category.default_candidates().is_empty(),
                "{category} has no compiled candidates"
            );
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Category::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Category::ALL.len());
    }

    #[test]
    fn lists_start_from_compiled_defaults() {
        let lists = FallbackLists::new();
        assert_eq!(lists.get(Category::Mac), ["HMAC", "CMAC"]);
        assert_eq!(lists.get(Category::AuthenticatedMode)[0], "EAX");
    }

    #[test]
    fn set_and_reset() {
        let mut lists = FallbackLists::new();
        lists.set(Category::Digest, vec!["SHA-512".into()]);
        assert_eq!(lists.get(Category::Digest), ["SHA-512"]);
        lists.set(Category::Digest, Vec::new());
        assert!(lists.get(Category::Digest).is_empty());
        lists.reset(Category::Digest);
        assert_eq!(lists.get(Category::Digest)[0], "SHA-256");
    }

    #[test]
    fn mode_classes() {
        assert_eq!(
            Category::AuthenticatedMode.mode_class(),
            Some(ModeClass::Authenticated)
        );
        assert_eq!(Category::Cipher.mode_class(), None);
        assert!(Category::UriEncoding.is_encoding());
        assert!(!Category::Mac.is_encoding());
    }
}
