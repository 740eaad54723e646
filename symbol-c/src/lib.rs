pub mod arena;
pub mod diag;
pub mod expr;
pub mod iter;
pub mod kind;
pub mod lookup;
pub mod name;
pub mod sym;
