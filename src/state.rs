use std::fmt;
use std::iter::Iterator;
use std::ops::RangeInclusive;

/// Cars on each lot at the start of a day.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct State {
    pub n1: u8,  // Number of cars at site #1 at start of day
    pub n2: u8,  // Number of cars at site #2 at start of day
}

impl State {
    pub fn new(n1: u8, n2: u8) -> State {
        State { n1, n2 }
    }

    /// Array index for grids shaped `(max_cars + 1, max_cars + 1)`.
    pub fn index(&self) -> [usize; 2] {
        [self.n1 as usize, self.n2 as usize]
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(n1: {}, n2: {})", self.n1, self.n2)
    }
}

/// Iterates every state in row-major order: n1 outer, n2 inner.
///
/// This is the canonical state order. It matches the standard layout of the
/// ndarray grids used for policies and value functions.
pub struct StateIterator {
    n1: u16,
    n2: u16,
    max_n1: u8,
    max_n2: u8,
}

impl StateIterator {
    pub fn new(max_n1: u8, max_n2: u8) -> StateIterator {
        StateIterator { n1: 0, n2: 0, max_n1, max_n2 }
    }
}

impl Iterator for StateIterator {
    type Item = State;

    fn next(&mut self) -> Option<Self::Item> {
        if self.n1 > self.max_n1 as u16 {
            return None;
        }
        let state = State { n1: self.n1 as u8, n2: self.n2 as u8 };
        if self.n2 < self.max_n2 as u16 {
            self.n2 += 1;
        } else {
            self.n2 = 0;
            self.n1 += 1;
        }
        Some(state)
    }
}

/// Actions in canonical order, from `-max_move` to `+max_move`.
///
/// A positive action moves cars from site #1 to site #2, a negative one
/// moves cars from site #2 to site #1.
pub fn actions(max_move: u8) -> RangeInclusive<i8> {
    -(max_move as i8)..=(max_move as i8)
}

/// Position of `a` within [`actions`].
pub fn action_index(a: i8, max_move: u8) -> usize {
    (a as i16 + max_move as i16) as usize
}

/// True if moving `a` cars overnight keeps both lots within `[0, max_cars]`.
pub fn is_feasible(s: State, a: i8, max_cars: u8, max_move: u8) -> bool {
    if a.unsigned_abs() > max_move {
        return false;
    }
    let n1 = s.n1 as i16 - a as i16;
    let n2 = s.n2 as i16 + a as i16;
    (0..=max_cars as i16).contains(&n1) && (0..=max_cars as i16).contains(&n2)
}

/// One consequence of a (state, action) pair: the next state, the reward
/// earned on the way there and its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub next: State,
    pub reward: f64,
    pub prob: f64,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(next: {}, reward: {:.2}, prob: {:.6})",
               self.next, self.reward, self.prob)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use test_case::test_case;

    #[test]
    fn iterate_states() {
        // Arrange
        let state_iter = StateIterator::new(2, 2);
        let mut states: HashSet<State> = HashSet::new();
        // Act
        for s in state_iter {
            assert!(s.n1 <= 2);
            assert!(s.n2 <= 2);
            states.insert(s);
        }
        // Assert
        assert_eq!(states.len(), 9);
    }

    #[test]
    fn iterate_states_row_major() {
        let states: Vec<State> = StateIterator::new(1, 2).collect();
        assert_eq!(states, vec![
            State::new(0, 0), State::new(0, 1), State::new(0, 2),
            State::new(1, 0), State::new(1, 1), State::new(1, 2),
        ]);
    }

    #[test]
    fn iterate_states_at_u8_limit() {
        assert_eq!(StateIterator::new(u8::MAX, 0).count(), 256);
    }

    #[test]
    fn canonical_action_order() {
        let acts: Vec<i8> = actions(2).collect();
        assert_eq!(acts, vec![-2, -1, 0, 1, 2]);
        for (i, a) in acts.iter().enumerate() {
            assert_eq!(action_index(*a, 2), i);
        }
    }

    #[test_case(0, 0, 0, true; "No cars and no action")]
    #[test_case(0, 0, 1, false; "No cars to move from site 1")]
    #[test_case(0, 0, -1, false; "No cars to move from site 2")]
    #[test_case(5, 0, 5, true; "Move everything to site 2")]
    #[test_case(20, 20, 1, false; "Site 2 is full")]
    #[test_case(20, 20, -1, false; "Site 1 is full")]
    #[test_case(10, 10, 6, false; "Exceeds move limit")]
    #[test_case(3, 18, -3, true; "Move to site 1")]
    fn feasibility(n1: u8, n2: u8, a: i8, expected: bool) {
        assert_eq!(is_feasible(State::new(n1, n2), a, 20, 5), expected);
    }
}
