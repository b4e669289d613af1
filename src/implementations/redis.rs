use std::{
    collections::{HashMap, HashSet},
    sync::mpsc,
    thread,
};

use r2d2::{Pool, PooledConnection};
use redis::{Client, Commands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::{
    Error, Feature, FeatureName, FeatureNameBuf, PersistenceStore, ReadStore, Result, Scope,
    ScopeBuf, WriteStore,
};

/// Number of connections kept by the pool. Borrowed connections are
/// liveness-checked (PING) before they are handed out.
const POOL_SIZE: u32 = 8;

/// Upper bound on connections used concurrently by [`Redis::features`].
/// Must stay below [`POOL_SIZE`] so other requests are not starved.
const FANOUT_WORKERS: usize = 4;

/// External persistence store on a Redis server: one hash per scope, mapping
/// feature names to values.
///
/// There is no inverse index; feature-to-scope queries walk the keyspace
/// with incremental `SCAN`s. Existence oracles report `true` unconditionally
/// because a missing hash is indistinguishable from an empty one.
#[derive(Debug)]
pub(crate) struct Redis {
    host: String,
    pool: Pool<Client>,
}

impl Redis {
    pub(crate) fn connect(host: &str, password: &str, db: i64) -> Result<Self> {
        let info = ConnectionInfo {
            addr: connection_addr(host),
            redis: RedisConnectionInfo {
                db,
                password: (!password.is_empty()).then(|| password.to_owned()),
                ..Default::default()
            },
        };
        let client = Client::open(info)?;
        let pool = Pool::builder().max_size(POOL_SIZE).build(client)?;

        Ok(Redis {
            host: host.to_owned(),
            pool,
        })
    }

    fn conn(&self) -> Result<PooledConnection<Client>> {
        Ok(self.pool.get()?)
    }

    /// Walk the keyspace with an incremental SCAN, keeping only keys that
    /// are valid scope names, deduplicated.
    fn scan_scopes(&self, pattern: Option<&str>) -> Result<Vec<ScopeBuf>> {
        let mut conn = self.conn()?;
        let keys: Vec<String> = match pattern {
            Some(pattern) => conn.scan_match::<_, String>(pattern)?.collect(),
            None => conn.scan::<String>()?.collect(),
        };

        let mut seen = HashSet::new();
        let mut scopes = Vec::new();
        for key in keys {
            if let Ok(scope) = Scope::parse(&key) {
                if seen.insert(key.clone()) {
                    scopes.push(scope.to_owned());
                }
            }
        }
        Ok(scopes)
    }
}

fn connection_addr(host: &str) -> ConnectionAddr {
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => ConnectionAddr::Tcp(name.to_owned(), port),
            Err(_) => ConnectionAddr::Tcp(host.to_owned(), 6379),
        },
        None => ConnectionAddr::Tcp(host.to_owned(), 6379),
    }
}

/// Keep the hash fields that are valid feature names, in hash order.
fn parse_feature_names(fields: impl IntoIterator<Item = String>) -> Vec<FeatureNameBuf> {
    fields
        .into_iter()
        .filter_map(|field| FeatureName::parse(&field).ok().map(ToOwned::to_owned))
        .collect()
}

impl std::fmt::Display for Redis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeatureStore::Redis({})", self.host)
    }
}

impl ReadStore for Redis {
    fn get(&self, scope: &Scope, feature: &FeatureName) -> Result<Feature> {
        let mut conn = self.conn()?;
        let value: Option<String> = conn.hget(scope.as_str(), feature.as_str())?;
        Ok(Feature::new(feature, value.as_deref().unwrap_or("")))
    }

    fn scope_features(&self, scope: &Scope) -> Result<Vec<FeatureNameBuf>> {
        let mut conn = self.conn()?;
        let fields: Vec<String> = conn.hkeys(scope.as_str())?;
        Ok(parse_feature_names(fields))
    }

    fn scope_features_with_value(&self, scope: &Scope, value: &str) -> Result<Vec<FeatureNameBuf>> {
        let mut conn = self.conn()?;
        let entries: HashMap<String, String> = conn.hgetall(scope.as_str())?;
        Ok(parse_feature_names(
            entries
                .into_iter()
                .filter(|(_, stored)| stored == value)
                .map(|(field, _)| field),
        ))
    }

    fn scope_features_full(&self, scope: &Scope) -> Result<Vec<Feature>> {
        let mut conn = self.conn()?;
        let entries: HashMap<String, String> = conn.hgetall(scope.as_str())?;
        Ok(entries
            .into_iter()
            .filter_map(|(field, value)| {
                FeatureName::parse(&field)
                    .ok()
                    .map(|name| Feature::new(name, &value))
            })
            .collect())
    }

    fn scopes(&self) -> Result<Vec<ScopeBuf>> {
        self.scan_scopes(None)
    }

    fn scopes_with_prefix(&self, prefix: &str) -> Result<Vec<ScopeBuf>> {
        self.scan_scopes(Some(&format!("{prefix}*")))
    }

    fn scopes_with_feature(&self, feature: &FeatureName) -> Result<Vec<ScopeBuf>> {
        let scopes = self.scopes()?;
        let mut conn = self.conn()?;

        let mut matches = Vec::new();
        for scope in scopes {
            // A scope is included only when the membership check succeeded
            // and reported true.
            if conn.hexists::<_, _, bool>(scope.as_str(), feature.as_str())? {
                matches.push(scope);
            }
        }
        Ok(matches)
    }

    fn features(&self) -> Result<Vec<FeatureNameBuf>> {
        let scopes = self.scopes()?;
        let (tx, rx) = mpsc::channel::<Result<Vec<String>>>();

        let batch_size = scopes.len().div_ceil(FANOUT_WORKERS).max(1);
        thread::scope(|workers| {
            for batch in scopes.chunks(batch_size) {
                let tx = tx.clone();
                let pool = &self.pool;
                workers.spawn(move || {
                    let mut conn = match pool.get() {
                        Ok(conn) => conn,
                        Err(err) => {
                            let _ = tx.send(Err(Error::RedisPool(err)));
                            return;
                        }
                    };
                    for scope in batch {
                        let fields: Result<Vec<String>> =
                            conn.hkeys(scope.as_str()).map_err(Error::Redis);
                        if tx.send(fields).is_err() {
                            return;
                        }
                    }
                });
            }
        });
        // Every worker has exited; dropping the last sender ends the drain.
        drop(tx);

        let mut seen = HashSet::new();
        let mut features = Vec::new();
        for fields in rx {
            for field in fields? {
                if seen.insert(field.clone()) {
                    if let Ok(name) = FeatureName::parse(&field) {
                        features.push(name.to_owned());
                    }
                }
            }
        }
        Ok(features)
    }

    fn scopes_paginated(&self, _offset: usize, _count: usize) -> Result<Vec<ScopeBuf>> {
        Err(Error::Unsupported("paginated scope listing"))
    }

    fn features_paginated(&self, _offset: usize, _count: usize) -> Result<Vec<FeatureNameBuf>> {
        Err(Error::Unsupported("paginated feature listing"))
    }

    fn has_scope(&self, _scope: &Scope) -> Result<bool> {
        Ok(true)
    }

    fn has_feature(&self, _feature: &FeatureName) -> Result<bool> {
        Ok(true)
    }

    fn scope_has_feature(&self, _scope: &Scope, _feature: &FeatureName) -> Result<bool> {
        Ok(true)
    }

    fn feature_has_scope(&self, _feature: &FeatureName, _scope: &Scope) -> Result<bool> {
        Ok(true)
    }
}

impl WriteStore for Redis {
    fn set(&self, scope: &Scope, feature: &FeatureName, value: &str) -> Result<Feature> {
        let mut conn = self.conn()?;
        conn.hset::<_, _, _, ()>(scope.as_str(), feature.as_str(), value)?;
        Ok(Feature::new(feature, value))
    }
}

impl PersistenceStore for Redis {
    fn close(&self) -> Result<()> {
        // Pooled connections are torn down when the store is dropped.
        Ok(())
    }
}

/// Tests against a live Redis at 127.0.0.1:6379 (override with
/// `FLIPADELPHIA_REDIS_HOST`). Run with:
///
/// ```bash
/// cargo test --features redis-tests
/// ```
#[cfg(all(test, feature = "redis-tests"))]
mod integration_tests {
    use redis::Commands;
    use serial_test::serial;

    use super::Redis;
    use crate::{FeatureName, ReadStore, Scope, WriteStore};

    fn test_store() -> Redis {
        let host = std::env::var("FLIPADELPHIA_REDIS_HOST")
            .unwrap_or_else(|_| "127.0.0.1:6379".to_owned());
        Redis::connect(&host, "", 0).expect("redis connection failed, is redis running?")
    }

    fn unique_scope(label: &str) -> String {
        format!("{label}-{}", uuid::Uuid::new_v4().simple())
    }

    fn cleanup(store: &Redis, scope: &str) {
        let mut conn = store.conn().unwrap();
        let _: () = conn.del(scope).unwrap();
    }

    #[test]
    #[serial]
    fn redis_set_then_get_round_trips() {
        let store = test_store();
        let scope = unique_scope("user");

        store
            .set(
                Scope::parse(&scope).unwrap(),
                FeatureName::parse("feature1").unwrap(),
                "on",
            )
            .unwrap();
        let feature = store
            .get(
                Scope::parse(&scope).unwrap(),
                FeatureName::parse("feature1").unwrap(),
            )
            .unwrap();
        assert_eq!(feature.value, "on");
        assert_eq!(feature.data, "true");

        cleanup(&store, &scope);
    }

    #[test]
    #[serial]
    fn redis_get_missing_returns_empty_record() {
        let store = test_store();
        let scope = unique_scope("user");

        let feature = store
            .get(
                Scope::parse(&scope).unwrap(),
                FeatureName::parse("feature1").unwrap(),
            )
            .unwrap();
        assert_eq!(feature.value, "");
        assert_eq!(feature.data, "false");
    }

    #[test]
    #[serial]
    fn redis_scope_features_lists_hash_fields() {
        let store = test_store();
        let scope = unique_scope("scope");

        for feature in ["feature1", "feature2", "feature3"] {
            store
                .set(
                    Scope::parse(&scope).unwrap(),
                    FeatureName::parse(feature).unwrap(),
                    "on",
                )
                .unwrap();
        }
        let mut names: Vec<String> = store
            .scope_features(Scope::parse(&scope).unwrap())
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        names.sort();
        assert_eq!(names, vec!["feature1", "feature2", "feature3"]);

        cleanup(&store, &scope);
    }

    #[test]
    #[serial]
    fn redis_filter_by_value() {
        let store = test_store();
        let scope = unique_scope("scope");

        for (feature, value) in [
            ("feature1", "on"),
            ("feature2", "on"),
            ("feature3", "off"),
            ("feature4", "on"),
        ] {
            store
                .set(
                    Scope::parse(&scope).unwrap(),
                    FeatureName::parse(feature).unwrap(),
                    value,
                )
                .unwrap();
        }
        let mut names: Vec<String> = store
            .scope_features_with_value(Scope::parse(&scope).unwrap(), "on")
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        names.sort();
        assert_eq!(names, vec!["feature1", "feature2", "feature4"]);

        cleanup(&store, &scope);
    }

    #[test]
    #[serial]
    fn redis_scopes_with_feature_requires_membership() {
        let store = test_store();
        let with = unique_scope("with");
        let without = unique_scope("without");

        store
            .set(
                Scope::parse(&with).unwrap(),
                FeatureName::parse("wanted").unwrap(),
                "on",
            )
            .unwrap();
        store
            .set(
                Scope::parse(&without).unwrap(),
                FeatureName::parse("other").unwrap(),
                "on",
            )
            .unwrap();

        let scopes = store
            .scopes_with_feature(FeatureName::parse("wanted").unwrap())
            .unwrap();
        let names: Vec<String> = scopes.into_iter().map(String::from).collect();
        assert!(names.contains(&with));
        assert!(!names.contains(&without));

        cleanup(&store, &with);
        cleanup(&store, &without);
    }

    #[test]
    #[serial]
    fn redis_features_unions_across_scopes() {
        let store = test_store();
        let first = unique_scope("scope");
        let second = unique_scope("scope");

        store
            .set(
                Scope::parse(&first).unwrap(),
                FeatureName::parse("shared").unwrap(),
                "on",
            )
            .unwrap();
        store
            .set(
                Scope::parse(&second).unwrap(),
                FeatureName::parse("shared").unwrap(),
                "on",
            )
            .unwrap();

        let features = store.features().unwrap();
        let shared = features.iter().filter(|f| f.as_str() == "shared").count();
        assert_eq!(shared, 1);

        cleanup(&store, &first);
        cleanup(&store, &second);
    }

    #[test]
    #[serial]
    fn redis_pagination_is_unsupported() {
        let store = test_store();
        assert!(store.scopes_paginated(0, 10).is_err());
        assert!(store.features_paginated(0, 10).is_err());
    }
}
