use std::fmt;

/// `(peer, message type)` pair keying continuations and waits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub peer: String,
    pub msg_type: String,
}

impl PeerKey {
    pub fn new(peer: impl Into<String>, msg_type: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            msg_type: msg_type.into(),
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.peer, self.msg_type)
    }
}
