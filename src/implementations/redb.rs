use std::{
    fs,
    path::{Path, PathBuf},
};

use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::{
    Feature, FeatureName, FeatureNameBuf, PersistenceStore, ReadStore, Result, Scope, ScopeBuf,
    WriteStore,
};

/// Forward index: `(scope, feature) -> assignment id`.
///
/// Tuple keys sort element-wise, so a range scan from `(scope, "")` walks one
/// scope's features, and the distinct first components of a full scan are the
/// known scopes in ascending lexicographic order.
const SCOPE_FEATURES: TableDefinition<(&str, &str), u128> = TableDefinition::new("scope_features");

/// Inverse index: `(feature, scope) -> assignment id`.
const FEATURE_SCOPES: TableDefinition<(&str, &str), u128> = TableDefinition::new("feature_scopes");

/// Assignment id -> value bytes. The id is the join key binding both indexes
/// to a single value cell.
const ASSIGNMENT_VALUES: TableDefinition<u128, &[u8]> =
    TableDefinition::new("assignment_values");

/// Embedded persistence store on a single-file transactional B-tree engine.
///
/// Every `set` touches all three tables inside one write transaction, so
/// concurrent readers observe either none or all of an assignment's index
/// entries.
#[derive(Debug)]
pub(crate) struct Redb {
    path: PathBuf,
    db: Database,
}

impl Redb {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path)?;
        let tx = db.begin_write()?;
        {
            tx.open_table(SCOPE_FEATURES)?;
            tx.open_table(FEATURE_SCOPES)?;
            tx.open_table(ASSIGNMENT_VALUES)?;
        }
        tx.commit()?;

        Ok(Redb { path, db })
    }

    /// Walk the entries of one scope, applying `visit` to each feature name
    /// and assignment id until the scan leaves the scope.
    fn for_each_scope_entry(
        &self,
        scope: &Scope,
        mut visit: impl FnMut(&FeatureName, u128, &redb::ReadOnlyTable<u128, &'static [u8]>) -> Result<()>,
    ) -> Result<()> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;
        let values = tx.open_table(ASSIGNMENT_VALUES)?;

        for entry in forward.range((scope.as_str(), "")..)? {
            let (key, id) = entry?;
            let (entry_scope, feature) = key.value();
            if entry_scope != scope.as_str() {
                break;
            }
            visit(FeatureName::parse(feature)?, id.value(), &values)?;
        }
        Ok(())
    }

    /// Collect the distinct first components of a composite-key table,
    /// starting at `offset` distinct names and stopping after `count`.
    fn distinct_first<T: ReadableTable<(&'static str, &'static str), u128>>(
        table: &T,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        let mut seen = 0usize;
        let mut last: Option<String> = None;

        for entry in table.iter()? {
            let (key, _) = entry?;
            let (name, _) = key.value();
            if last.as_deref() == Some(name) {
                continue;
            }
            last = Some(name.to_owned());
            if seen >= offset {
                if names.len() == count {
                    break;
                }
                names.push(name.to_owned());
            }
            seen += 1;
        }
        Ok(names)
    }
}

impl std::fmt::Display for Redb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeatureStore::Bolt({})", self.path.display())
    }
}

impl ReadStore for Redb {
    fn get(&self, scope: &Scope, feature: &FeatureName) -> Result<Feature> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;

        let id = match forward.get((scope.as_str(), feature.as_str()))? {
            Some(id) => id.value(),
            None => return Ok(Feature::unset(feature)),
        };

        let values = tx.open_table(ASSIGNMENT_VALUES)?;
        match values.get(id)? {
            Some(value) => Ok(Feature::new(
                feature,
                &String::from_utf8_lossy(value.value()),
            )),
            None => Ok(Feature::unset(feature)),
        }
    }

    fn scope_features(&self, scope: &Scope) -> Result<Vec<FeatureNameBuf>> {
        let mut features = Vec::new();
        self.for_each_scope_entry(scope, |feature, _, _| {
            features.push(feature.to_owned());
            Ok(())
        })?;
        Ok(features)
    }

    fn scope_features_with_value(&self, scope: &Scope, value: &str) -> Result<Vec<FeatureNameBuf>> {
        let mut features = Vec::new();
        self.for_each_scope_entry(scope, |feature, id, values| {
            if let Some(stored) = values.get(id)? {
                if stored.value() == value.as_bytes() {
                    features.push(feature.to_owned());
                }
            }
            Ok(())
        })?;
        Ok(features)
    }

    fn scope_features_full(&self, scope: &Scope) -> Result<Vec<Feature>> {
        let mut features = Vec::new();
        self.for_each_scope_entry(scope, |feature, id, values| {
            match values.get(id)? {
                Some(stored) => features.push(Feature::new(
                    feature,
                    &String::from_utf8_lossy(stored.value()),
                )),
                None => features.push(Feature::unset(feature)),
            }
            Ok(())
        })?;
        Ok(features)
    }

    fn scopes(&self) -> Result<Vec<ScopeBuf>> {
        self.scopes_paginated(0, usize::MAX)
    }

    fn scopes_with_prefix(&self, prefix: &str) -> Result<Vec<ScopeBuf>> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;

        let mut scopes: Vec<ScopeBuf> = Vec::new();
        for entry in forward.range((prefix, "")..)? {
            let (key, _) = entry?;
            let (scope, _) = key.value();
            if !scope.starts_with(prefix) {
                break;
            }
            if scopes.last().map(|s| s.as_str()) != Some(scope) {
                scopes.push(Scope::parse(scope)?.to_owned());
            }
        }
        Ok(scopes)
    }

    fn scopes_with_feature(&self, feature: &FeatureName) -> Result<Vec<ScopeBuf>> {
        let tx = self.db.begin_read()?;
        let inverse = tx.open_table(FEATURE_SCOPES)?;

        let mut scopes = Vec::new();
        for entry in inverse.range((feature.as_str(), "")..)? {
            let (key, _) = entry?;
            let (entry_feature, scope) = key.value();
            if entry_feature != feature.as_str() {
                break;
            }
            scopes.push(Scope::parse(scope)?.to_owned());
        }
        Ok(scopes)
    }

    fn features(&self) -> Result<Vec<FeatureNameBuf>> {
        self.features_paginated(0, usize::MAX)
    }

    fn scopes_paginated(&self, offset: usize, count: usize) -> Result<Vec<ScopeBuf>> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;
        Self::distinct_first(&forward, offset, count)?
            .iter()
            .map(|name| Ok(Scope::parse(name)?.to_owned()))
            .collect()
    }

    fn features_paginated(&self, offset: usize, count: usize) -> Result<Vec<FeatureNameBuf>> {
        let tx = self.db.begin_read()?;
        let inverse = tx.open_table(FEATURE_SCOPES)?;
        Self::distinct_first(&inverse, offset, count)?
            .iter()
            .map(|name| Ok(FeatureName::parse(name)?.to_owned()))
            .collect()
    }

    fn has_scope(&self, scope: &Scope) -> Result<bool> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;
        match forward.range((scope.as_str(), "")..)?.next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(key.value().0 == scope.as_str())
            }
            None => Ok(false),
        }
    }

    fn has_feature(&self, feature: &FeatureName) -> Result<bool> {
        let tx = self.db.begin_read()?;
        let inverse = tx.open_table(FEATURE_SCOPES)?;
        match inverse.range((feature.as_str(), "")..)?.next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(key.value().0 == feature.as_str())
            }
            None => Ok(false),
        }
    }

    fn scope_has_feature(&self, scope: &Scope, feature: &FeatureName) -> Result<bool> {
        let tx = self.db.begin_read()?;
        let forward = tx.open_table(SCOPE_FEATURES)?;
        Ok(forward.get((scope.as_str(), feature.as_str()))?.is_some())
    }

    fn feature_has_scope(&self, feature: &FeatureName, scope: &Scope) -> Result<bool> {
        let tx = self.db.begin_read()?;
        let inverse = tx.open_table(FEATURE_SCOPES)?;
        Ok(inverse.get((feature.as_str(), scope.as_str()))?.is_some())
    }
}

impl WriteStore for Redb {
    fn set(&self, scope: &Scope, feature: &FeatureName, value: &str) -> Result<Feature> {
        let tx = self.db.begin_write()?;
        {
            let id = Uuid::new_v4().as_u128();
            let mut forward = tx.open_table(SCOPE_FEATURES)?;
            let mut inverse = tx.open_table(FEATURE_SCOPES)?;
            let mut values = tx.open_table(ASSIGNMENT_VALUES)?;

            let prior = forward
                .insert((scope.as_str(), feature.as_str()), id)?
                .map(|prior| prior.value());
            inverse.insert((feature.as_str(), scope.as_str()), id)?;

            // An update mints a fresh id; drop the superseded value cell in
            // the same transaction so it cannot leak.
            if let Some(prior) = prior {
                values.remove(prior)?;
            }
            values.insert(id, value.as_bytes())?;
        }
        tx.commit()?;

        Ok(Feature::new(feature, value))
    }
}

impl PersistenceStore for Redb {
    fn close(&self) -> Result<()> {
        // The database file is released when the store is dropped.
        Ok(())
    }
}
