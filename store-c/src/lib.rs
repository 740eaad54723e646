pub mod rows;
pub mod store;

pub use rows::TypeRef;
pub use store::GraphStore;
pub use store::PersistError;
