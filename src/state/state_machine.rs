use thiserror::Error;

/// Round lifecycle phases of a single lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Players are gathering; no round has been played yet.
    Waiting,
    /// A question is pending and answers are being collected.
    RoundActive {
        /// One-based number of the running round.
        round: u32,
    },
    /// Every player answered; results are out and the next round is scheduled.
    RoundResolved {
        /// Number of the round that just resolved.
        round: u32,
    },
    /// The round limit was reached and final standings were sent.
    GameOver {
        /// Last round played.
        round: u32,
    },
}

impl LobbyPhase {
    /// Round counter carried by the phase, `0` before the first round.
    pub fn round(&self) -> u32 {
        match *self {
            LobbyPhase::Waiting => 0,
            LobbyPhase::RoundActive { round }
            | LobbyPhase::RoundResolved { round }
            | LobbyPhase::GameOver { round } => round,
        }
    }
}

/// Events that can be applied to the lobby state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyEvent {
    /// Start the first round or the one following a resolved round.
    StartRound,
    /// The last expected answer arrived for the running round.
    AllAnswered,
    /// The round limit was reached after a resolved round.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the lobby was in when the invalid event was received.
    pub from: LobbyPhase,
    /// The event that cannot be applied from this phase.
    pub event: LobbyEvent,
}

/// Per-lobby state machine; the round counter only moves forward through it.
#[derive(Debug, Clone)]
pub struct LobbyStateMachine {
    phase: LobbyPhase,
}

impl Default for LobbyStateMachine {
    fn default() -> Self {
        Self {
            phase: LobbyPhase::Waiting,
        }
    }
}

impl LobbyStateMachine {
    /// Create a new state machine in the waiting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase or leaving the machine untouched on error.
    pub fn apply(&mut self, event: LobbyEvent) -> Result<LobbyPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: LobbyEvent) -> Result<LobbyPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (LobbyPhase::Waiting, LobbyEvent::StartRound) => LobbyPhase::RoundActive { round: 1 },
            (LobbyPhase::RoundResolved { round }, LobbyEvent::StartRound) => {
                LobbyPhase::RoundActive { round: round + 1 }
            }
            (LobbyPhase::RoundActive { round }, LobbyEvent::AllAnswered) => {
                LobbyPhase::RoundResolved { round }
            }
            (LobbyPhase::RoundResolved { round }, LobbyEvent::Finish) => {
                LobbyPhase::GameOver { round }
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting() {
        let sm = LobbyStateMachine::new();
        assert_eq!(sm.phase(), LobbyPhase::Waiting);
        assert_eq!(sm.phase().round(), 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = LobbyStateMachine::new();

        assert_eq!(
            sm.apply(LobbyEvent::StartRound).unwrap(),
            LobbyPhase::RoundActive { round: 1 }
        );
        assert_eq!(
            sm.apply(LobbyEvent::AllAnswered).unwrap(),
            LobbyPhase::RoundResolved { round: 1 }
        );
        assert_eq!(
            sm.apply(LobbyEvent::StartRound).unwrap(),
            LobbyPhase::RoundActive { round: 2 }
        );
        assert_eq!(
            sm.apply(LobbyEvent::AllAnswered).unwrap(),
            LobbyPhase::RoundResolved { round: 2 }
        );
        assert_eq!(
            sm.apply(LobbyEvent::Finish).unwrap(),
            LobbyPhase::GameOver { round: 2 }
        );
    }

    #[test]
    fn cannot_start_while_round_is_running() {
        let mut sm = LobbyStateMachine::new();
        sm.apply(LobbyEvent::StartRound).unwrap();

        let err = sm.apply(LobbyEvent::StartRound).unwrap_err();
        assert_eq!(err.from, LobbyPhase::RoundActive { round: 1 });
        assert_eq!(err.event, LobbyEvent::StartRound);
        assert_eq!(sm.phase(), LobbyPhase::RoundActive { round: 1 });
    }

    #[test]
    fn game_over_is_terminal() {
        let mut sm = LobbyStateMachine::new();
        sm.apply(LobbyEvent::StartRound).unwrap();
        sm.apply(LobbyEvent::AllAnswered).unwrap();
        sm.apply(LobbyEvent::Finish).unwrap();

        for event in [
            LobbyEvent::StartRound,
            LobbyEvent::AllAnswered,
            LobbyEvent::Finish,
        ] {
            assert!(sm.apply(event).is_err());
        }
        assert_eq!(sm.phase().round(), 1);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = LobbyStateMachine::new();
        let err = sm.apply(LobbyEvent::AllAnswered).unwrap_err();
        assert_eq!(err.from, LobbyPhase::Waiting);
        assert_eq!(err.event, LobbyEvent::AllAnswered);

        assert!(sm.apply(LobbyEvent::Finish).is_err());
    }
}
