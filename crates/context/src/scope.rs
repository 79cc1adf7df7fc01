use std::fmt;

const CONTACT_PREFIX: &str = "contact";
const THREAD_PREFIX: &str = "thread";

/// Logical scope a [`crate::Context`] is bound to.
///
/// The storage namespace is derived deterministically from the scope, so any
/// two facades built from equal scopes address the same data, and unequal
/// scopes never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextScope {
    /// State about one peer, shared by every exchange with it.
    Contact { peer: String },
    /// State for one thread (`thid`) with one peer.
    Thread { peer: String, thid: String },
}

impl ContextScope {
    pub fn contact(peer: impl Into<String>) -> Self {
        Self::Contact { peer: peer.into() }
    }

    pub fn thread(peer: impl Into<String>, thid: impl Into<String>) -> Self {
        Self::Thread {
            peer: peer.into(),
            thid: thid.into(),
        }
    }

    /// Storage namespace, e.g. `contact:did:example:alice`.
    ///
    /// Thread namespaces are `thread:<peer>:<thid>` with `%` and `:` in the
    /// thid percent-encoded, so the last `:` always separates peer from thid.
    pub fn namespace(&self) -> String {
        match self {
            Self::Contact { peer } => format!("{CONTACT_PREFIX}:{peer}"),
            Self::Thread { peer, thid } => {
                format!("{THREAD_PREFIX}:{peer}:{}", escape_segment(thid))
            },
        }
    }

    /// The peer this scope belongs to.
    pub fn peer(&self) -> &str {
        match self {
            Self::Contact { peer } | Self::Thread { peer, .. } => peer,
        }
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace())
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_namespace() {
        let scope = ContextScope::contact("did:example:alice");
        assert_eq!(scope.namespace(), "contact:did:example:alice");
        assert_eq!(scope.peer(), "did:example:alice");
    }

    #[test]
    fn thread_namespace() {
        let scope = ContextScope::thread("did:example:alice", "t-42");
        assert_eq!(scope.namespace(), "thread:did:example:alice:t-42");
        assert_eq!(scope.to_string(), scope.namespace());
    }

    #[test]
    fn contact_and_thread_never_share_a_namespace() {
        let contact = ContextScope::contact("did:x");
        let thread = ContextScope::thread("did:x", "t");
        assert_ne!(contact.namespace(), thread.namespace());
    }

    #[test]
    fn colons_cannot_move_between_peer_and_thid() {
        let a = ContextScope::thread("did:example:alice", "t1");
        let b = ContextScope::thread("did:example", "alice:t1");
        assert_ne!(a.namespace(), b.namespace());
        assert_eq!(b.namespace(), "thread:did:example:alice%3At1");
    }

    #[test]
    fn percent_in_thid_is_escaped_too() {
        let literal = ContextScope::thread("did:x", "a%3Ab");
        let colon = ContextScope::thread("did:x", "a:b");
        assert_eq!(literal.namespace(), "thread:did:x:a%253Ab");
        assert_ne!(literal.namespace(), colon.namespace());
    }
}
