use std::fmt::{Debug, Display};

pub use flipadelphia_types::{
    FeatureName, FeatureNameBuf, ParseFeatureNameError, ParseScopeError, Scope, ScopeBuf,
};

pub use crate::{
    config::{Config, StoreKind},
    error::Error,
    feature::{Feature, QueryResult},
};

pub mod client;
pub mod config;
mod error;
mod feature;
mod implementations;
pub mod server;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Read operations of a persistence store.
///
/// Enumerations never contain duplicates. A missing assignment is not an
/// error: [`ReadStore::get`] reports it as the empty-value record.
pub trait ReadStore {
    fn get(&self, scope: &Scope, feature: &FeatureName) -> Result<Feature>;
    fn scope_features(&self, scope: &Scope) -> Result<Vec<FeatureNameBuf>>;
    fn scope_features_with_value(&self, scope: &Scope, value: &str) -> Result<Vec<FeatureNameBuf>>;
    fn scope_features_full(&self, scope: &Scope) -> Result<Vec<Feature>>;
    fn scopes(&self) -> Result<Vec<ScopeBuf>>;
    fn scopes_with_prefix(&self, prefix: &str) -> Result<Vec<ScopeBuf>>;
    fn scopes_with_feature(&self, feature: &FeatureName) -> Result<Vec<ScopeBuf>>;
    fn features(&self) -> Result<Vec<FeatureNameBuf>>;
    fn scopes_paginated(&self, offset: usize, count: usize) -> Result<Vec<ScopeBuf>>;
    fn features_paginated(&self, offset: usize, count: usize) -> Result<Vec<FeatureNameBuf>>;
    fn has_scope(&self, scope: &Scope) -> Result<bool>;
    fn has_feature(&self, feature: &FeatureName) -> Result<bool>;
    fn scope_has_feature(&self, scope: &Scope, feature: &FeatureName) -> Result<bool>;
    fn feature_has_scope(&self, feature: &FeatureName, scope: &Scope) -> Result<bool>;
}

/// Write operations of a persistence store.
pub trait WriteStore {
    /// Idempotent upsert of one assignment. All index updates are atomic
    /// with respect to concurrent readers.
    fn set(&self, scope: &Scope, feature: &FeatureName, value: &str) -> Result<Feature>;
}

/// Read, write and lifecycle operations of a persistence store.
pub trait PersistenceStore: ReadStore + WriteStore {
    /// Release backend resources. Idempotent.
    fn close(&self) -> Result<()>;
}

pub trait PubPersistenceStore: PersistenceStore + Debug + Send + Sync + Display {}

impl<T> PubPersistenceStore for T where T: PersistenceStore + Debug + Send + Sync + Display {}

/// Represents a feature store, wraps a persistence backend.
///
/// # Example
/// ```no_run
/// use flipadelphia::{Config, FeatureStore, StoreKind};
///
/// # fn main() -> Result<(), flipadelphia::Error> {
/// let config = Config {
///     environment_name: "development".into(),
///     persistence_store_type: StoreKind::Bolt,
///     db_file: "/tmp/flipadelphia.db".into(),
///     redis_host: String::new(),
///     redis_password: String::new(),
///     redis_db: 0,
///     log_file: None,
///     listen_on_port: 3006,
///     auth_url: String::new(),
///     auth_method: String::new(),
///     auth_header: String::new(),
///     auth_success_status: String::new(),
/// };
/// let store = FeatureStore::open(&config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeatureStore {
    inner: Box<dyn PubPersistenceStore>,
}

impl FeatureStore {
    pub fn open(config: &Config) -> Result<FeatureStore> {
        let inner: Box<dyn PubPersistenceStore> = match config.persistence_store_type {
            StoreKind::Bolt => Box::new(implementations::redb::Redb::open(&config.db_file)?),
            StoreKind::Redis => Box::new(implementations::redis::Redis::connect(
                &config.redis_host,
                &config.redis_password,
                config.redis_db,
            )?),
        };

        Ok(FeatureStore { inner })
    }
}

impl Display for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl ReadStore for FeatureStore {
    fn get(&self, scope: &Scope, feature: &FeatureName) -> Result<Feature> {
        self.inner.get(scope, feature)
    }

    fn scope_features(&self, scope: &Scope) -> Result<Vec<FeatureNameBuf>> {
        self.inner.scope_features(scope)
    }

    fn scope_features_with_value(&self, scope: &Scope, value: &str) -> Result<Vec<FeatureNameBuf>> {
        self.inner.scope_features_with_value(scope, value)
    }

    fn scope_features_full(&self, scope: &Scope) -> Result<Vec<Feature>> {
        self.inner.scope_features_full(scope)
    }

    fn scopes(&self) -> Result<Vec<ScopeBuf>> {
        self.inner.scopes()
    }

    fn scopes_with_prefix(&self, prefix: &str) -> Result<Vec<ScopeBuf>> {
        self.inner.scopes_with_prefix(prefix)
    }

    fn scopes_with_feature(&self, feature: &FeatureName) -> Result<Vec<ScopeBuf>> {
        self.inner.scopes_with_feature(feature)
    }

    fn features(&self) -> Result<Vec<FeatureNameBuf>> {
        self.inner.features()
    }

    fn scopes_paginated(&self, offset: usize, count: usize) -> Result<Vec<ScopeBuf>> {
        self.inner.scopes_paginated(offset, count)
    }

    fn features_paginated(&self, offset: usize, count: usize) -> Result<Vec<FeatureNameBuf>> {
        self.inner.features_paginated(offset, count)
    }

    fn has_scope(&self, scope: &Scope) -> Result<bool> {
        self.inner.has_scope(scope)
    }

    fn has_feature(&self, feature: &FeatureName) -> Result<bool> {
        self.inner.has_feature(feature)
    }

    fn scope_has_feature(&self, scope: &Scope, feature: &FeatureName) -> Result<bool> {
        self.inner.scope_has_feature(scope, feature)
    }

    fn feature_has_scope(&self, feature: &FeatureName, scope: &Scope) -> Result<bool> {
        self.inner.feature_has_scope(feature, scope)
    }
}

impl WriteStore for FeatureStore {
    fn set(&self, scope: &Scope, feature: &FeatureName, value: &str) -> Result<Feature> {
        self.inner.set(scope, feature, value)
    }
}

impl PersistenceStore for FeatureStore {
    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
