//! Optimistic voting.
//!
//! A click is applied locally at once with [`VoteState::apply`]; the server's
//! answer later overwrites the tallies with [`VoteState::confirm`]. Both are
//! pure. [`VoteTracker`] counts votes still in flight per item so that a rapid
//! double click settles on the last confirmation instead of flickering.

use std::collections::HashMap;

use agora_proto::{CommentView, PostView, UserMentionView};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MyVote {
    Down,
    #[default]
    None,
    Up,
}

impl MyVote {
    pub fn score(self) -> i16 {
        match self {
            MyVote::Down => -1,
            MyVote::None => 0,
            MyVote::Up => 1,
        }
    }

    /// Maps the wire value; anything other than ±1 means no vote.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => MyVote::Up,
            -1 => MyVote::Down,
            _ => MyVote::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Upvote,
    Downvote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteState {
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub my_vote: MyVote,
}

impl VoteState {
    pub fn new(upvotes: i64, downvotes: i64, my_vote: MyVote) -> Self {
        Self {
            score: upvotes - downvotes,
            upvotes,
            downvotes,
            my_vote,
        }
    }

    /// Clicking the active direction clears the vote; clicking the other
    /// direction switches it.
    pub fn apply(self, action: VoteAction) -> VoteState {
        let (my_vote, d_up, d_down) = match (self.my_vote, action) {
            (MyVote::None, VoteAction::Upvote) => (MyVote::Up, 1, 0),
            (MyVote::Up, VoteAction::Upvote) => (MyVote::None, -1, 0),
            (MyVote::Down, VoteAction::Upvote) => (MyVote::Up, 1, -1),
            (MyVote::None, VoteAction::Downvote) => (MyVote::Down, 0, 1),
            (MyVote::Down, VoteAction::Downvote) => (MyVote::None, 0, -1),
            (MyVote::Up, VoteAction::Downvote) => (MyVote::Down, -1, 1),
        };
        VoteState {
            score: self.score + d_up - d_down,
            upvotes: self.upvotes + d_up,
            downvotes: self.downvotes + d_down,
            my_vote,
        }
    }

    /// Takes the confirmed tallies. `my_vote` only changes when the
    /// confirmation carries one, i.e. when it was addressed to this user.
    pub fn confirm(self, confirmed: &VoteState, my_vote: Option<MyVote>) -> VoteState {
        let score = confirmed.upvotes - confirmed.downvotes;
        if score != confirmed.score {
            warn!(
                target = "agora::vote",
                reported = confirmed.score,
                upvotes = confirmed.upvotes,
                downvotes = confirmed.downvotes,
                "confirmed score disagrees with its tallies; using the tallies"
            );
        }
        VoteState {
            score,
            upvotes: confirmed.upvotes,
            downvotes: confirmed.downvotes,
            my_vote: my_vote.unwrap_or(self.my_vote),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(i32),
    Comment(i32),
}

/// A record carrying vote tallies.
pub trait Votable {
    fn vote_target(&self) -> VoteTarget;
    fn vote_state(&self) -> VoteState;
    /// Raw `my_vote` field; `None` when the record was not built for the
    /// current user.
    fn wire_vote(&self) -> Option<i32>;
    fn set_vote_state(&mut self, state: VoteState);
}

macro_rules! impl_votable {
    ($ty:ty, $target:ident) => {
        impl Votable for $ty {
            fn vote_target(&self) -> VoteTarget {
                VoteTarget::$target(self.id)
            }

            fn vote_state(&self) -> VoteState {
                VoteState {
                    score: self.score,
                    upvotes: self.upvotes,
                    downvotes: self.downvotes,
                    my_vote: self.my_vote.map(MyVote::from_wire).unwrap_or_default(),
                }
            }

            fn wire_vote(&self) -> Option<i32> {
                self.my_vote
            }

            fn set_vote_state(&mut self, state: VoteState) {
                self.score = state.score;
                self.upvotes = state.upvotes;
                self.downvotes = state.downvotes;
                self.my_vote = Some(i32::from(state.my_vote.score()));
            }
        }
    };
}

impl_votable!(CommentView, Comment);
impl_votable!(PostView, Post);
impl_votable!(UserMentionView, Comment);

#[derive(Debug, Default, Clone)]
pub struct VoteTracker {
    in_flight: HashMap<VoteTarget, u32>,
}

impl VoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `action` to `record` and returns the vote to send.
    pub fn cast<V: Votable>(&mut self, record: &mut V, action: VoteAction) -> MyVote {
        let next = record.vote_state().apply(action);
        record.set_vote_state(next);
        *self.in_flight.entry(record.vote_target()).or_default() += 1;
        next.my_vote
    }

    /// Folds a server confirmation into `local`.
    pub fn reconcile<V: Votable>(&mut self, local: &mut V, confirmed: &V) {
        let target = confirmed.vote_target();
        let adopt = match confirmed.wire_vote() {
            Some(vote) => {
                let remaining = self.settle(target);
                (remaining == 0).then_some(MyVote::from_wire(vote))
            }
            None => None,
        };
        let next = local.vote_state().confirm(&confirmed.vote_state(), adopt);
        local.set_vote_state(next);
    }

    pub fn in_flight(&self, target: VoteTarget) -> u32 {
        self.in_flight.get(&target).copied().unwrap_or(0)
    }

    /// Forgets every pending vote. Called whenever a view's records are
    /// replaced wholesale.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }

    fn settle(&mut self, target: VoteTarget) -> u32 {
        match self.in_flight.get_mut(&target) {
            Some(pending) if *pending > 1 => {
                *pending -= 1;
                *pending
            }
            Some(_) => {
                self.in_flight.remove(&target);
                0
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::comment;
    use proptest::prelude::*;

    #[test]
    fn upvote_then_downvote_follows_the_table() {
        let start = VoteState::new(5, 0, MyVote::None);
        let up = start.apply(VoteAction::Upvote);
        assert_eq!(up, VoteState { score: 6, upvotes: 6, downvotes: 0, my_vote: MyVote::Up });
        let down = up.apply(VoteAction::Downvote);
        assert_eq!(down, VoteState { score: 4, upvotes: 5, downvotes: 1, my_vote: MyVote::Down });
    }

    #[test]
    fn every_table_row() {
        let base = VoteState::new(10, 4, MyVote::None);
        let rows = [
            (MyVote::None, VoteAction::Upvote, MyVote::Up, 1, 0),
            (MyVote::Up, VoteAction::Upvote, MyVote::None, -1, 0),
            (MyVote::Down, VoteAction::Upvote, MyVote::Up, 1, -1),
            (MyVote::None, VoteAction::Downvote, MyVote::Down, 0, 1),
            (MyVote::Down, VoteAction::Downvote, MyVote::None, 0, -1),
            (MyVote::Up, VoteAction::Downvote, MyVote::Down, -1, 1),
        ];
        for (current, action, expected, d_up, d_down) in rows {
            let from = VoteState { my_vote: current, ..base };
            let to = from.apply(action);
            assert_eq!(to.my_vote, expected, "{current:?} {action:?}");
            assert_eq!(to.upvotes - from.upvotes, d_up);
            assert_eq!(to.downvotes - from.downvotes, d_down);
            assert_eq!(to.score - from.score, d_up - d_down);
        }
    }

    #[test]
    fn confirm_recomputes_score_and_keeps_vote_without_one() {
        let local = VoteState::new(6, 0, MyVote::Up);
        let confirmed = VoteState { score: 99, upvotes: 7, downvotes: 2, my_vote: MyVote::None };
        let merged = local.confirm(&confirmed, None);
        assert_eq!(merged, VoteState { score: 5, upvotes: 7, downvotes: 2, my_vote: MyVote::Up });
        assert_eq!(local.confirm(&confirmed, Some(MyVote::Down)).my_vote, MyVote::Down);
    }

    #[test]
    fn double_click_converges_after_both_confirmations() {
        let mut tracker = VoteTracker::new();
        let mut local = comment(1, None);
        local.score = 5;
        local.upvotes = 5;
        local.my_vote = Some(0);

        assert_eq!(tracker.cast(&mut local, VoteAction::Upvote), MyVote::Up);
        assert_eq!(tracker.cast(&mut local, VoteAction::Upvote), MyVote::None);
        assert_eq!(tracker.in_flight(VoteTarget::Comment(1)), 2);

        let mut first = local.clone();
        first.score = 6;
        first.upvotes = 6;
        first.my_vote = Some(1);
        tracker.reconcile(&mut local, &first);
        assert_eq!(local.my_vote, Some(0), "stale confirmation must not flip the vote");
        assert_eq!(local.upvotes, 6);

        let mut second = local.clone();
        second.score = 5;
        second.upvotes = 5;
        second.my_vote = Some(0);
        tracker.reconcile(&mut local, &second);
        assert_eq!(local.my_vote, Some(0));
        assert_eq!((local.score, local.upvotes, local.downvotes), (5, 5, 0));
        assert_eq!(tracker.in_flight(VoteTarget::Comment(1)), 0);
    }

    #[test]
    fn broadcast_confirmation_updates_tallies_only() {
        let mut tracker = VoteTracker::new();
        let mut local = comment(3, None);
        tracker.cast(&mut local, VoteAction::Downvote);

        let mut broadcast = local.clone();
        broadcast.my_vote = None;
        broadcast.upvotes = 2;
        broadcast.downvotes = 1;
        broadcast.score = 1;
        tracker.reconcile(&mut local, &broadcast);
        assert_eq!(local.my_vote, Some(-1));
        assert_eq!(local.score, 1);
        assert_eq!(tracker.in_flight(VoteTarget::Comment(3)), 1);
    }

    fn any_vote() -> impl Strategy<Value = MyVote> {
        prop_oneof![Just(MyVote::Down), Just(MyVote::None), Just(MyVote::Up)]
    }

    fn any_action() -> impl Strategy<Value = VoteAction> {
        prop_oneof![Just(VoteAction::Upvote), Just(VoteAction::Downvote)]
    }

    proptest! {
        #[test]
        fn score_always_equals_tallies(
            upvotes in 0i64..10_000,
            downvotes in 0i64..10_000,
            my_vote in any_vote(),
            actions in prop::collection::vec(any_action(), 0..64),
        ) {
            let mut state = VoteState::new(upvotes, downvotes, my_vote);
            for action in actions {
                state = state.apply(action);
                prop_assert_eq!(state.score, state.upvotes - state.downvotes);
            }
        }

        #[test]
        fn clicking_twice_restores_the_start(
            upvotes in 0i64..10_000,
            downvotes in 0i64..10_000,
            action in any_action(),
        ) {
            let start = VoteState::new(upvotes, downvotes, MyVote::None);
            prop_assert_eq!(start.apply(action).apply(action), start);
        }
    }
}
