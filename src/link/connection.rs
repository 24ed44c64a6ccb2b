/// Connection lifecycle of one die.
///
/// The happy path is linear: `Invalid → Available → Connecting → Identifying → Ready →
/// Disconnecting → Available`. A failed connection or a dropped link falls back from
/// `Connecting`, `Identifying` or `Ready` straight to `Available`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// Not yet discovered.
    Invalid,
    /// Advertising, not connected.
    Available,
    /// Link being established.
    Connecting,
    /// Linked, identity not yet confirmed.
    Identifying,
    /// Fully usable.
    Ready,
    /// Link being torn down.
    Disconnecting,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Invalid, Available)
                | (Available, Connecting)
                | (Connecting, Identifying)
                | (Identifying, Ready)
                | (Ready, Disconnecting)
                | (Disconnecting, Available)
                | (Connecting | Identifying | Ready, Available)
        )
    }

    /// Whether operations may be issued in this state.
    pub fn accepts_operations(self) -> bool {
        matches!(self, ConnectionState::Identifying | ConnectionState::Ready)
    }
}

/// Why the die last left the connected states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LastError {
    /// Nothing went wrong.
    #[default]
    None,
    /// The connection could not be established.
    ConnectionError,
    /// The link dropped while connected.
    Disconnected,
}

#[cfg(test)]
#[path = "../../tests/unit/link/connection.rs"]
mod tests;
