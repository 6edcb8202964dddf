//! States and the transition table of the traversal machine.
//!
//! Container states (document, sections, blocks, environments) may move to
//! any state except `Start`. Content states may return to any container
//! state, repeat themselves, or move to one of their refinements.

use fxhash::{FxHashMap, FxHashSet};
use lazy_static::lazy_static;
use serde::Serialize;
use tracing::debug;

use crate::utils::error::TraversalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FsmState {
    Start,
    InDocument,
    InTitle,
    InAuthor,
    InAffiliation,
    InDate,
    InAbstract,
    InKeywords,
    InSection,
    InSubsection,
    InParagraph,
    InMath,
    InInlineMath,
    InEquation,
    InAlignedEquation,
    InFigure,
    InTable,
    InAlgorithm,
    InListing,
    InCitation,
    InBibliography,
    InTheorem,
    InProof,
    InDefinition,
    InLemma,
    InCorollary,
    InCommand,
    InText,
    InEnvironment,
    InLabel,
    InRef,
    InCrossRef,
}

use FsmState::*;

impl FsmState {
    pub const ALL: [FsmState; 32] = [
        Start,
        InDocument,
        InTitle,
        InAuthor,
        InAffiliation,
        InDate,
        InAbstract,
        InKeywords,
        InSection,
        InSubsection,
        InParagraph,
        InMath,
        InInlineMath,
        InEquation,
        InAlignedEquation,
        InFigure,
        InTable,
        InAlgorithm,
        InListing,
        InCitation,
        InBibliography,
        InTheorem,
        InProof,
        InDefinition,
        InLemma,
        InCorollary,
        InCommand,
        InText,
        InEnvironment,
        InLabel,
        InRef,
        InCrossRef,
    ];

    /// States that hold other nodes.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            InDocument
                | InAuthor
                | InAffiliation
                | InAbstract
                | InSection
                | InSubsection
                | InParagraph
                | InFigure
                | InTable
                | InAlgorithm
                | InListing
                | InCitation
                | InBibliography
                | InTheorem
                | InProof
                | InDefinition
                | InLemma
                | InCorollary
                | InEnvironment
        )
    }

    /// Content states a content state may move to directly.
    fn refinements(self) -> &'static [FsmState] {
        match self {
            InCommand => &[
                InTitle, InDate, InKeywords, InCitation, InRef, InCrossRef, InLabel, InMath,
            ],
            InText => &[InInlineMath, InMath],
            InMath => &[InInlineMath, InEquation, InAlignedEquation],
            InEquation => &[InAlignedEquation],
            InRef => &[InCrossRef],
            _ => &[],
        }
    }
}

lazy_static! {
    static ref TRANSITIONS: FxHashMap<FsmState, FxHashSet<FsmState>> = {
        let mut table: FxHashMap<FsmState, FxHashSet<FsmState>> = FxHashMap::default();
        table.entry(Start).or_default().insert(InDocument);
        for from in FsmState::ALL.iter().copied().filter(|s| *s != Start) {
            let targets = table.entry(from).or_default();
            if from.is_container() {
                targets.extend(FsmState::ALL.iter().copied().filter(|s| *s != Start));
            } else {
                targets.extend(FsmState::ALL.iter().copied().filter(|s| s.is_container()));
                targets.insert(from);
                targets.extend(from.refinements().iter().copied());
            }
        }
        table
    };
}

pub fn is_valid_transition(from: FsmState, to: FsmState) -> bool {
    TRANSITIONS.get(&from).map_or(false, |targets| targets.contains(&to))
}

/// Current state plus validated moves.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: FsmState,
    transitions: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            current: Start,
            transitions: 0,
        }
    }

    pub fn current(&self) -> FsmState {
        self.current
    }

    /// Number of successful transitions so far.
    pub fn transitions(&self) -> usize {
        self.transitions
    }

    /// Move to `to`, leaving the state unchanged when the table has no
    /// such edge.
    pub fn set_state(&mut self, to: FsmState) -> Result<(), TraversalError> {
        if !is_valid_transition(self.current, to) {
            return Err(TraversalError::InvalidTransition { from: self.current, to });
        }
        debug!(from = ?self.current, ?to, "state transition");
        self.current = to;
        self.transitions += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_only_enters_document() {
        let mut fsm = StateMachine::new();
        assert_eq!(
            fsm.set_state(InSection),
            Err(TraversalError::InvalidTransition { from: Start, to: InSection })
        );
        assert_eq!(fsm.current(), Start);
        fsm.set_state(InDocument).unwrap();
        assert_eq!(fsm.current(), InDocument);
    }

    #[test]
    fn test_content_states() {
        assert!(is_valid_transition(InCommand, InCitation));
        assert!(is_valid_transition(InText, InText));
        assert!(is_valid_transition(InText, InSection));
        assert!(!is_valid_transition(InText, InCommand));
        assert!(!is_valid_transition(InCommand, InText));
        assert!(!is_valid_transition(InDocument, Start));
    }

    #[test]
    fn test_containers_reach_everything_but_start() {
        for from in FsmState::ALL.iter().filter(|s| s.is_container()) {
            for to in FsmState::ALL {
                assert_eq!(is_valid_transition(*from, to), to != Start, "{:?} -> {:?}", from, to);
            }
        }
    }
}
