pub mod core;
pub mod error;
pub mod local;
pub mod model;
pub mod settings;
pub mod value;

pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use settings::LocalCacheSettings;
