//! Dev session state machine.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of a [`super::DevSession`].
///
/// ```text
/// unloaded  -> loading
/// loading   -> registered
/// registered -> applied
/// applied   -> reloading
/// loading   -> reloading   (recover from a failed load)
/// registered -> reloading  (recover from a failed apply)
/// reloading -> loading
/// *         -> disposed    (except from disposed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unloaded,
    Loading,
    Registered,
    Applied,
    Reloading,
    Disposed,
}

impl SessionState {
    /// Whether a transition from `self` to `to` is an edge in the graph.
    pub fn is_valid_transition(self, to: SessionState) -> bool {
        matches!(
            (self, to),
            (SessionState::Unloaded, SessionState::Loading)
                | (SessionState::Loading, SessionState::Registered)
                | (SessionState::Registered, SessionState::Applied)
                | (SessionState::Applied, SessionState::Reloading)
                | (SessionState::Loading, SessionState::Reloading)
                | (SessionState::Registered, SessionState::Reloading)
                | (SessionState::Reloading, SessionState::Loading)
        ) || (to == SessionState::Disposed && self != SessionState::Disposed)
    }

    /// States from which a reload may start.
    pub fn can_reload(self) -> bool {
        self.is_valid_transition(SessionState::Reloading)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Registered => "registered",
            Self::Applied => "applied",
            Self::Reloading => "reloading",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionState; 6] = [
        SessionState::Unloaded,
        SessionState::Loading,
        SessionState::Registered,
        SessionState::Applied,
        SessionState::Reloading,
        SessionState::Disposed,
    ];

    #[test]
    fn forward_path_is_valid() {
        use SessionState::*;
        assert!(Unloaded.is_valid_transition(Loading));
        assert!(Loading.is_valid_transition(Registered));
        assert!(Registered.is_valid_transition(Applied));
        assert!(Applied.is_valid_transition(Reloading));
        assert!(Reloading.is_valid_transition(Loading));
    }

    #[test]
    fn recovery_reloads_are_valid() {
        use SessionState::*;
        assert!(Loading.can_reload());
        assert!(Registered.can_reload());
        assert!(!Unloaded.can_reload());
        assert!(!Reloading.can_reload());
        assert!(!Disposed.can_reload());
    }

    #[test]
    fn skipping_states_is_invalid() {
        use SessionState::*;
        assert!(!Unloaded.is_valid_transition(Applied));
        assert!(!Loading.is_valid_transition(Applied));
        assert!(!Applied.is_valid_transition(Loading));
        assert!(!Reloading.is_valid_transition(Applied));
    }

    #[test]
    fn disposed_is_terminal() {
        for state in ALL {
            assert!(!SessionState::Disposed.is_valid_transition(state));
            if state != SessionState::Disposed {
                assert!(state.is_valid_transition(SessionState::Disposed));
            }
        }
    }

    #[test]
    fn display_matches_serde() {
        for state in ALL {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, serde_json::Value::String(state.to_string()));
        }
    }
}
