use flipadelphia::{
    Config, FeatureName, FeatureStore, PersistenceStore, ReadStore, Scope, StoreKind, WriteStore,
};

fn open_store() -> (FeatureStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        environment_name: "test".into(),
        persistence_store_type: StoreKind::Bolt,
        db_file: dir.path().join("flipadelphia.db"),
        redis_host: String::new(),
        redis_password: String::new(),
        redis_db: 0,
        log_file: None,
        listen_on_port: 0,
        auth_url: String::new(),
        auth_method: String::new(),
        auth_header: String::new(),
        auth_success_status: String::new(),
    };
    (FeatureStore::open(&config).unwrap(), dir)
}

fn set(store: &FeatureStore, scope: &str, feature: &str, value: &str) {
    store
        .set(
            Scope::parse(scope).unwrap(),
            FeatureName::parse(feature).unwrap(),
            value,
        )
        .unwrap();
}

#[test]
fn set_is_visible_through_every_index() {
    let (store, _dir) = open_store();
    set(&store, "user-1", "feature1", "on");

    let record = store
        .get(
            Scope::parse("user-1").unwrap(),
            FeatureName::parse("feature1").unwrap(),
        )
        .unwrap();
    assert_eq!(record.value, "on");

    let features: Vec<String> = store
        .scope_features(Scope::parse("user-1").unwrap())
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert!(features.contains(&"feature1".to_owned()));

    let scopes: Vec<String> = store
        .scopes_with_feature(FeatureName::parse("feature1").unwrap())
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert!(scopes.contains(&"user-1".to_owned()));
}

#[test]
fn enumerations_contain_no_duplicates() {
    let (store, _dir) = open_store();
    for (scope, feature) in [
        ("scope1", "feature1"),
        ("scope1", "feature2"),
        ("scope2", "feature1"),
        ("scope2", "feature1"),
    ] {
        set(&store, scope, feature, "on");
    }

    let scopes = store.scopes().unwrap();
    let mut deduped = scopes.clone();
    deduped.dedup();
    assert_eq!(scopes, deduped);

    let features = store.features().unwrap();
    let mut deduped = features.clone();
    deduped.dedup();
    assert_eq!(features, deduped);
    assert_eq!(features.len(), 2);
}

#[test]
fn every_prefixed_scope_starts_with_the_prefix() {
    let (store, _dir) = open_store();
    for scope in ["alpha-1", "alpha-2", "beta-1", "alphabet"] {
        set(&store, scope, "feature1", "on");
    }

    let scopes = store.scopes_with_prefix("alpha").unwrap();
    assert_eq!(scopes.len(), 3);
    for scope in &scopes {
        assert!(scope.as_str().starts_with("alpha"));
    }
}

#[test]
fn pagination_windows_compose() {
    let (store, _dir) = open_store();
    for index in 0..12 {
        set(&store, &format!("scope-{index:02}"), "feature1", "on");
    }

    let mut combined = store.scopes_paginated(0, 7).unwrap();
    combined.extend(store.scopes_paginated(7, 5).unwrap());
    assert_eq!(combined, store.scopes_paginated(0, 12).unwrap());
}

#[test]
fn data_field_tracks_value_emptiness() {
    let (store, _dir) = open_store();
    set(&store, "user-1", "enabled", "on");
    set(&store, "user-1", "disabled", "");

    let enabled = store
        .get(
            Scope::parse("user-1").unwrap(),
            FeatureName::parse("enabled").unwrap(),
        )
        .unwrap();
    assert_eq!(enabled.data, "true");

    let disabled = store
        .get(
            Scope::parse("user-1").unwrap(),
            FeatureName::parse("disabled").unwrap(),
        )
        .unwrap();
    assert_eq!(disabled.data, "false");
}

#[test]
fn invalid_identifiers_never_reach_the_store() {
    assert!(Scope::parse("user:1").is_err());
    assert!(FeatureName::parse("feature,1").is_err());
    assert!(FeatureName::parse("feature_1").is_err());

    // Nothing was written: a fresh store stays empty.
    let (store, _dir) = open_store();
    assert!(store.scopes().unwrap().is_empty());
}

#[test]
fn close_is_idempotent() {
    let (store, _dir) = open_store();
    store.close().unwrap();
    store.close().unwrap();
}

#[test]
fn display_names_the_backend() {
    let (store, _dir) = open_store();
    assert!(store.to_string().starts_with("FeatureStore::Bolt("));
}
