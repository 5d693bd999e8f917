pub mod compare;
pub mod evaluate;
