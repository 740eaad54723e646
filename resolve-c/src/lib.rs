pub mod bag;
pub mod dll;

pub use bag::BagError;
pub use bag::SymbolBag;
pub use dll::DllResolver;
pub use dll::NoDlls;
