pub use feature_name::{FeatureName, FeatureNameBuf, ParseFeatureNameError};
pub use scope::{ParseScopeError, Scope, ScopeBuf};

mod feature_name;
mod scope;
