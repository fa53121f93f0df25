//! Named request parameters.
//!
//! Parameters carry custom data to fetchers and decoders. Each entry may
//! declare a cache key; entries without one do not affect the computed cache
//! key. Entries keep their insertion order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A single parameter value with its optional cache key.
#[derive(Clone)]
pub struct Parameter {
    value: Arc<dyn Any + Send + Sync>,
    cache_key: Option<String>,
}

impl Parameter {
    pub fn new<T: Any + Send + Sync>(value: T, cache_key: Option<String>) -> Self {
        Self {
            value: Arc::new(value),
            cache_key,
        }
    }

    /// Downcast the value.
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered map of parameters.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: Vec<(String, Parameter)>,
}

impl Parameters {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, parameter)| parameter)
    }

    /// Typed value lookup.
    pub fn value<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|p| p.value::<T>())
    }

    pub fn cache_key(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|p| p.cache_key())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combine two parameter sets. Names keep their first-seen position;
    /// values from `other` override values in `self`.
    pub fn merge(&self, other: &Parameters) -> Parameters {
        let mut builder = ParametersBuilder {
            entries: self.entries.clone(),
        };
        for (name, parameter) in &other.entries {
            builder.insert(name.clone(), parameter.clone());
        }
        builder.build()
    }

    pub fn to_builder(&self) -> ParametersBuilder {
        ParametersBuilder {
            entries: self.entries.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ParametersBuilder {
    entries: Vec<(String, Parameter)>,
}

impl ParametersBuilder {
    /// Set a parameter that does not contribute to the cache key.
    pub fn set<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name.into(), Parameter::new(value, None));
        self
    }

    /// Set a parameter whose `cache_key` is appended to the memory cache key.
    pub fn set_cached<T: Any + Send + Sync>(
        mut self,
        name: impl Into<String>,
        value: T,
        cache_key: impl Into<String>,
    ) -> Self {
        self.insert(name.into(), Parameter::new(value, Some(cache_key.into())));
        self
    }

    pub fn remove(mut self, name: &str) -> Self {
        self.entries.retain(|(key, _)| key != name);
        self
    }

    pub fn build(self) -> Parameters {
        Parameters {
            entries: self.entries,
        }
    }

    fn insert(&mut self, name: String, parameter: Parameter) {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = parameter,
            None => self.entries.push((name, parameter)),
        }
    }
}
