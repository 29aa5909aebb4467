//! Filter registry.
//!
//! Two phases. At startup a [`RegistryBuilder`] collects filters; `build()`
//! freezes it into a [`Registry`] that is shared read-only by every request.
//!
//! ```rust
//! use strata::{Registry, middleware::{SetHeader, Trace}};
//!
//! # fn main() -> Result<(), strata::RegistryError> {
//! let registry = Registry::builder()
//!     .strict(true)
//!     .register_global(Trace::layer())
//!     .register_keyed("nosniff", SetHeader::new("x-content-type-options", "nosniff"))?
//!     .register_group("web", ["nosniff"])?
//!     .build();
//!
//! let chain = registry.chain(["web"])?;
//! assert_eq!(chain.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::filter::Layer;
use crate::pipeline::Chain;

// ── RegistryBuilder ───────────────────────────────────────────────────────────

/// Mutable bootstrap phase of the registry.
#[derive(Default)]
pub struct RegistryBuilder {
    strict: bool,
    global: Vec<Layer>,
    entries: HashMap<String, Entry>,
}

#[derive(Clone)]
enum Entry {
    Filter(Layer),
    Group(Vec<String>),
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// In strict mode registering a key twice is an error instead of a
    /// silent replacement. Off by default.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Appends a layer that runs on every request. The first global layer is
    /// the outermost. Registering the same filter twice runs it twice.
    pub fn register_global(mut self, layer: impl Into<Layer>) -> Self {
        let layer = layer.into();
        debug!(filter = layer.name(), position = self.global.len(), "registered global filter");
        self.global.push(layer);
        self
    }

    /// Binds `key` to a layer that routes opt into by name. The layer is
    /// renamed to `key`.
    pub fn register_keyed(
        self,
        key: impl Into<String>,
        layer: impl Into<Layer>,
    ) -> Result<Self, RegistryError> {
        let key = key.into();
        let layer = layer.into().named(&key);
        self.insert(key, Entry::Filter(layer))
    }

    /// Binds `name` to an ordered list of keys (filters or other groups).
    /// Members are checked when a chain is resolved, not here.
    pub fn register_group<I, S>(self, name: impl Into<String>, keys: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.insert(name.into(), Entry::Group(keys))
    }

    fn insert(mut self, key: String, entry: Entry) -> Result<Self, RegistryError> {
        if self.entries.contains_key(&key) {
            if self.strict {
                return Err(RegistryError::DuplicateKey(key));
            }
            warn!(key = %key, "filter key registered twice; replacing the earlier binding");
        }
        self.entries.insert(key, entry);
        Ok(self)
    }

    /// Freezes the registry.
    pub fn build(self) -> Registry {
        Registry {
            inner: Arc::new(Inner { global: self.global, entries: self.entries }),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Immutable, shareable snapshot of the registered filters.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

struct Inner {
    global: Vec<Layer>,
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn global(&self) -> &[Layer] {
        &self.inner.global
    }

    /// The layer bound to `key`, if `key` names a filter (not a group).
    pub fn get(&self, key: &str) -> Option<&Layer> {
        match self.inner.entries.get(key)? {
            Entry::Filter(layer) => Some(layer),
            Entry::Group(_) => None,
        }
    }

    /// Looks up each key in order, expanding groups in place.
    ///
    /// Fails on the first unbound key; nothing is returned partially.
    pub fn resolve<I, S>(&self, keys: I) -> Result<Vec<Layer>, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        for key in keys {
            self.expand(key.as_ref(), &mut stack, &mut out)?;
        }
        Ok(out)
    }

    /// Global layers followed by the resolved `keys`.
    pub fn chain<I, S>(&self, keys: I) -> Result<Chain, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.chain_excluding(keys, std::iter::empty::<&str>())
    }

    /// Like [`chain`](Registry::chain), then drops every layer named by
    /// `excluded` (groups expand to their members). Global layers can be
    /// excluded by their name.
    ///
    /// An excluded name that matches no key, group or global layer is an
    /// [`UnknownFilterKey`](RegistryError::UnknownFilterKey), same as in `keys`.
    pub fn chain_excluding<I, S, X, T>(&self, keys: I, excluded: X) -> Result<Chain, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        X: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let routed = self.resolve(keys)?;

        let mut skip = Vec::new();
        for key in excluded {
            let key = key.as_ref();
            match self.inner.entries.get(key) {
                Some(Entry::Group(_)) => {
                    skip.extend(self.resolve([key])?.iter().map(|l| l.name().to_owned()));
                }
                Some(Entry::Filter(_)) => skip.push(key.to_owned()),
                None if self.inner.global.iter().any(|l| l.name() == key) => skip.push(key.to_owned()),
                None => return Err(RegistryError::UnknownFilterKey(key.to_owned())),
            }
        }

        Ok(self.inner.global.iter()
            .chain(routed.iter())
            .filter(|layer| !skip.iter().any(|s| s == layer.name()))
            .cloned()
            .collect())
    }

    fn expand(&self, key: &str, stack: &mut Vec<String>, out: &mut Vec<Layer>) -> Result<(), RegistryError> {
        match self.inner.entries.get(key) {
            None => Err(RegistryError::UnknownFilterKey(key.to_owned())),
            Some(Entry::Filter(layer)) => {
                out.push(layer.clone());
                Ok(())
            }
            Some(Entry::Group(members)) => {
                if stack.iter().any(|k| k == key) {
                    return Err(RegistryError::GroupCycle(key.to_owned()));
                }
                stack.push(key.to_owned());
                for member in members {
                    self.expand(member, stack, out)?;
                }
                stack.pop();
                Ok(())
            }
        }
    }
}
