pub mod intake;
pub mod replacement;
