pub mod identity;
pub mod recommendations;
pub mod session;
