pub mod count;
pub mod eval;
pub mod make;
pub mod reembed;
