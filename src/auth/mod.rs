mod session;

pub use session::{Identity, SessionAuth, StoreSessionAuth, open_session, roles_for_session};
