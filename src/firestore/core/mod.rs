pub mod query_listener;
pub mod view;
pub mod view_snapshot;

#[doc(inline)]
pub use query_listener::{ListenOptions, QueryListener};
#[doc(inline)]
pub use view::{diff_document_sets, View, ViewChange, ViewDocumentChanges};
#[doc(inline)]
pub use view_snapshot::{ChangeType, DocumentViewChange, DocumentViewChangeSet, ViewSnapshot};
