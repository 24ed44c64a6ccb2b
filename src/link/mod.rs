pub(crate) mod connection;
pub(crate) mod die;
pub(crate) mod dispatch;
/// In-process die simulator for tests and dry runs.
pub mod sim;
pub(crate) mod transport;
