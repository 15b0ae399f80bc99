pub mod reference;
pub mod validate;
