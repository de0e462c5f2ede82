pub mod auth;
pub mod blob;
pub mod firestore;
pub mod memory;
pub mod repository;

pub use auth::TokenSource;
pub use blob::{BlobStore, GcsBlobStore, LocalBlobStore, DEFAULT_BUCKET};
pub use firestore::FirestoreRepository;
pub use memory::InMemoryRepository;
pub use repository::{StatementRepository, STATEMENTS_COLLECTION, TRAINING_COLLECTION};
