pub(crate) mod redb;
pub(crate) mod redis;
