use flipadelphia_types::{FeatureName, FeatureNameBuf, ScopeBuf};
use serde::{Deserialize, Serialize};

/// A feature assignment as presented to clients.
///
/// `data` is the stringified non-emptiness of the value: `"true"` when the
/// stored value is nonempty, `"false"` otherwise. An assignment that was
/// never written is reported as `value: "", data: "false"`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: String,
    pub data: String,
}

impl Feature {
    pub fn new(name: &FeatureName, value: &str) -> Feature {
        Feature {
            name: name.as_str().to_owned(),
            value: value.to_owned(),
            data: (!value.is_empty()).to_string(),
        }
    }

    /// The record returned for an assignment that does not exist.
    pub fn unset(name: &FeatureName) -> Feature {
        Feature::new(name, "")
    }
}

/// The wire form of a successful read: a single record, a list of scope or
/// feature names, or a list of full records.
///
/// Empty lists serialize as `[]`, never `null`.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Record(Feature),
    Names(Vec<String>),
    Records(Vec<Feature>),
}

impl From<Feature> for QueryResult {
    fn from(record: Feature) -> Self {
        QueryResult::Record(record)
    }
}

impl From<Vec<Feature>> for QueryResult {
    fn from(records: Vec<Feature>) -> Self {
        QueryResult::Records(records)
    }
}

impl From<Vec<ScopeBuf>> for QueryResult {
    fn from(scopes: Vec<ScopeBuf>) -> Self {
        QueryResult::Names(scopes.into_iter().map(String::from).collect())
    }
}

impl From<Vec<FeatureNameBuf>> for QueryResult {
    fn from(features: Vec<FeatureNameBuf>) -> Self {
        QueryResult::Names(features.into_iter().map(String::from).collect())
    }
}
