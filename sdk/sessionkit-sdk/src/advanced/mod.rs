pub mod builders;
pub mod calls;
