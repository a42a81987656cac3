//! Strongly-typed resource identifiers.
//!
//! The remote API uses numeric IDs. Wrapping them keeps a `PlanId` from being
//! passed where a `PlayerId` is expected when building keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::KeySegment;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for KeySegment {
            fn from(id: $name) -> Self {
                KeySegment::Num(id.0)
            }
        }
    };
}

define_id!(
    /// A player on the coach's roster.
    PlayerId
);
define_id!(
    /// A training plan assigned to one player.
    PlanId
);
define_id!(
    /// A scheduled training session inside a plan.
    TrainingId
);
define_id!(ExerciseId);
define_id!(MatchId);
define_id!(
    /// A thread with the AI assistant.
    ConversationId
);
define_id!(UserId);
