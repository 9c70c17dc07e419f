pub mod invitation;
pub mod notification;
pub mod session;
pub mod ttr;
pub mod user;
