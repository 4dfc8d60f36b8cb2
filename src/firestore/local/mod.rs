pub mod local_documents_view;
pub mod local_view_changes;
pub mod mutation_applier;
pub mod reference_set;
pub mod view_engine;

#[doc(inline)]
pub use local_documents_view::{LocalDocumentsView, MutationQueue, RemoteDocumentCache};
#[doc(inline)]
pub use local_view_changes::LocalViewChanges;
#[doc(inline)]
pub use mutation_applier::{apply_mutations, MutationApplication};
#[doc(inline)]
pub use reference_set::ReferenceSet;
#[doc(inline)]
pub use view_engine::{
    AppliedEvaluation, ListenerRegistration, LocalStorePersistence, LocalViewEngine,
    ViewSnapshotCallback,
};
