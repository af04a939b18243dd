//! Small `Arc<str>`-backed identifier newtypes.
//!
//! Cloned into every map key and every callback invocation, so these are
//! cheap-to-clone wrappers rather than owned `String`s, following the same
//! pattern as the teacher's `SessionId` in
//! `transport/streamable_http_server/session.rs`.

use std::{fmt, sync::Arc};

macro_rules! arc_str_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

arc_str_id!(SessionId);
arc_str_id!(StreamId);
arc_str_id!(EventId);

/// The fixed id reserved for the single standalone GET SSE stream
/// (spec §3, §4.5). Never produced by [`StreamId::new_request_stream`].
pub fn standalone_stream_id() -> StreamId {
    StreamId::from("_GET_stream")
}

impl StreamId {
    /// A fresh cryptographically random id for a POST-created or replay
    /// stream (spec §4.4: "choose a fresh `streamId` (cryptographic UUID)").
    pub fn new_random() -> Self {
        StreamId::from(uuid::Uuid::new_v4().to_string())
    }
}

impl SessionId {
    pub fn new_random() -> Self {
        SessionId::from(uuid::Uuid::new_v4().to_string())
    }
}
