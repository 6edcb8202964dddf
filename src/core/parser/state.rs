//! Parser mode stack.

/// Lexical mode the parser is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ParserState {
    Default,
    MathMode,
    Environment,
    CommandArgument,
    Verbatim,
}

/// Stack of parser states. Never holds fewer than one state.
#[derive(Debug, Clone)]
pub struct StateStack {
    states: Vec<ParserState>,
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStack {
    pub fn new() -> Self {
        StateStack {
            states: vec![ParserState::Default],
        }
    }

    pub fn current(&self) -> ParserState {
        // The bottom element is never popped
        self.states.last().copied().unwrap_or(ParserState::Default)
    }

    pub fn push(&mut self, state: ParserState) {
        self.states.push(state);
    }

    /// Pop the innermost state; the bottom state stays in place.
    pub fn pop(&mut self) -> ParserState {
        if self.states.len() > 1 {
            self.states.pop().unwrap_or(ParserState::Default)
        } else {
            self.current()
        }
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }

    /// Number of open states equal to `state`.
    pub fn count(&self, state: ParserState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_never_empties() {
        let mut stack = StateStack::new();
        stack.push(ParserState::MathMode);
        assert_eq!(stack.pop(), ParserState::MathMode);
        assert_eq!(stack.pop(), ParserState::Default);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current(), ParserState::Default);
    }

    #[test]
    fn test_count_nested_environments() {
        let mut stack = StateStack::new();
        stack.push(ParserState::Environment);
        stack.push(ParserState::Environment);
        stack.push(ParserState::CommandArgument);
        assert_eq!(stack.count(ParserState::Environment), 2);
    }
}
