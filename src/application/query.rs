//! Query values handed to document engines.
//!
//! A [`Query`] is an owned, immutable description of one read: which model
//! (and therefore which collection), which filter, whether one or many
//! documents are wanted, and whether the result may be served from cache.
//! Engines only ever receive `&Query<M>`.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::cache::{CacheOptions, GroupKey};

/// A persisted document type bound to one collection.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
}

/// Field to value predicate. A document matches when it contains every
/// listed field with a containing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to match `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The filter as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Ordered sequence of every matching document.
    Find,
    /// First matching document, if any.
    FindOne,
}

/// A read against the collection of `M`.
pub struct Query<M> {
    filter: Filter,
    kind: QueryKind,
    cache: Option<CacheOptions>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Query<M> {
    pub fn find(filter: Filter) -> Self {
        Self::new(filter, QueryKind::Find)
    }

    pub fn find_one(filter: Filter) -> Self {
        Self::new(filter, QueryKind::FindOne)
    }

    fn new(filter: Filter, kind: QueryKind) -> Self {
        Self {
            filter,
            kind,
            cache: None,
            _model: PhantomData,
        }
    }

    /// Opt this query into the read-through cache.
    ///
    /// The group is `options.key` when set and `"default"` otherwise. No I/O
    /// happens here; the returned query is what gets executed.
    pub fn cache(mut self, options: CacheOptions) -> Self {
        self.cache = Some(options);
        self
    }

    pub fn collection(&self) -> &'static str {
        M::COLLECTION
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Cache group for this query, or `None` when caching is not enabled.
    pub fn group(&self) -> Option<&GroupKey> {
        self.cache.as_ref().map(CacheOptions::group)
    }
}

impl<M> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            kind: self.kind,
            cache: self.cache.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("collection", &M::COLLECTION)
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Result of executing a [`Query`].
///
/// The serialized form carries its shape so a cached sequence and a cached
/// single document can never be confused on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum QueryOutput<M> {
    One(Option<M>),
    Many(Vec<M>),
}

impl<M> QueryOutput<M> {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryOutput::One(_) => QueryKind::FindOne,
            QueryOutput::Many(_) => QueryKind::Find,
        }
    }

    pub fn into_many(self) -> Vec<M> {
        match self {
            QueryOutput::One(document) => document.into_iter().collect(),
            QueryOutput::Many(documents) => documents,
        }
    }

    pub fn into_one(self) -> Option<M> {
        match self {
            QueryOutput::One(document) => document,
            QueryOutput::Many(documents) => documents.into_iter().next(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryOutput::One(document) => usize::from(document.is_some()),
            QueryOutput::Many(documents) => documents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
