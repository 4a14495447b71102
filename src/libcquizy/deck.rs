//! Navigation cursor over the loaded questions.
//!
//! The deck keeps the full unfiltered set next to the list currently being
//! studied. Search and bookmark review always filter the full set, shuffle
//! permutes the current list. Every list replacement puts the cursor back on
//! the first card.
use log::debug;
use rand::seq::SliceRandom;
use rand::{rng, Rng};

use crate::libcquizy::bookmarks::BookmarkSet;
use crate::libcquizy::question::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub is_first: bool,
    pub is_last: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Deck {
    full: Vec<Question>,
    cards: Vec<Question>,
    index: usize,
}

impl Deck {
    pub fn new(questions: Vec<Question>) -> Self {
        let mut deck = Self::default();
        deck.replace(questions);
        deck
    }

    pub fn replace(&mut self, questions: Vec<Question>) {
        debug!("[Deck] Loaded {} questions", questions.len());
        self.cards = questions.clone();
        self.full = questions;
        self.index = 0;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn cards(&self) -> &[Question] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Question> {
        self.cards.get(self.index)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            is_first: self.index == 0,
            is_last: self.index + 1 >= self.cards.len(),
        }
    }

    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.cards.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.index > 0 && !self.cards.is_empty() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.cards.len() {
            self.index = index;
            true
        } else {
            false
        }
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rng());
    }

    /// Fisher–Yates permutation of the current list.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        self.index = 0;
        debug!("[Deck] Shuffled {} cards", self.cards.len());
    }

    pub fn search(&mut self, term: &str) {
        if term.is_empty() {
            self.cards = self.full.clone();
        } else {
            let term = term.to_lowercase();
            self.cards = self
                .full
                .iter()
                .filter(|question| question.matches(&term))
                .cloned()
                .collect();
        }
        self.index = 0;
        debug!("[Deck] Search {:?} matched {} cards", term, self.cards.len());
    }

    pub fn only_bookmarked(&mut self, bookmarks: &BookmarkSet) {
        self.cards = self
            .full
            .iter()
            .filter(|question| bookmarks.contains(question.id))
            .cloned()
            .collect();
        self.index = 0;
    }

    pub fn show_all(&mut self) {
        self.cards = self.full.clone();
        self.index = 0;
    }

    /// Fraction of the list seen so far, counting the current card.
    pub fn progress(&self) -> f64 {
        if self.cards.is_empty() {
            0.0
        } else {
            (self.index + 1) as f64 / self.cards.len() as f64
        }
    }

    pub fn position_label(&self) -> String {
        if self.cards.is_empty() {
            String::new()
        } else {
            format!("{} of {}", self.index + 1, self.cards.len())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn question(id: i64, question: &str, answer: &str, category: &str) -> Question {
        Question {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.to_string(),
            context: format!("context {id}"),
            question_number: id as f64,
        }
    }

    pub(crate) fn three() -> Vec<Question> {
        vec![
            question(1, "Minimum battery voltage?", "21.0", "Ground"),
            question(2, "APU start limit?", "Three attempts", "Systems"),
            question(3, "Fuel imbalance limit?", "1500 lbs", "Fuel"),
        ]
    }

    #[test]
    fn test_next_previous_scenario() {
        let mut deck = Deck::new(three());

        assert!(!deck.previous());
        assert_eq!(deck.index(), 0);

        assert!(deck.next());
        assert!(deck.next());
        assert_eq!(deck.index(), 2);

        assert!(!deck.next());
        assert_eq!(deck.index(), 2);
        assert_eq!(deck.current().map(|q| q.id), Some(3));
    }

    #[test]
    fn test_cursor_stays_in_range() {
        let mut deck = Deck::new(three());
        let moves = [true, true, true, false, true, false, false, false, true, true, true];

        for forward in moves {
            if forward {
                deck.next();
            } else {
                deck.previous();
            }
            assert!(deck.index() < deck.len());
        }
    }

    #[test]
    fn test_empty_deck_is_inert() {
        let mut deck = Deck::new(Vec::new());

        assert!(!deck.next());
        assert!(!deck.previous());
        assert!(deck.current().is_none());
        assert_eq!(deck.progress(), 0.0);
        assert_eq!(deck.position_label(), "");
    }

    #[test]
    fn test_search_filters_full_set() {
        let mut deck = Deck::new(three());
        deck.next();

        deck.search("LIMIT");
        assert_eq!(deck.index(), 0);
        assert_eq!(deck.len(), 2);
        assert!(deck.cards().iter().all(|q| q.matches("limit")));

        deck.search("ground");
        assert_eq!(deck.cards().iter().map(|q| q.id).collect::<Vec<_>>(), vec![1]);

        deck.search("no such thing");
        assert!(deck.is_empty());
    }

    #[test]
    fn test_empty_search_restores_loaded_order() {
        let mut deck = Deck::new(three());
        deck.shuffle_with(&mut StdRng::seed_from_u64(7));
        deck.search("fuel");

        deck.search("");
        assert_eq!(deck.cards(), three().as_slice());
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut deck = Deck::new(three());
        deck.next();
        deck.shuffle_with(&mut StdRng::seed_from_u64(42));

        assert_eq!(deck.index(), 0);
        let mut ids: Vec<i64> = deck.cards().iter().map(|q| q.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_bookmark_review_filter() {
        let mut deck = Deck::new(three());
        let mut bookmarks = BookmarkSet::default();
        bookmarks.toggle(3);
        bookmarks.toggle(1);

        deck.only_bookmarked(&bookmarks);
        assert_eq!(deck.cards().iter().map(|q| q.id).collect::<Vec<_>>(), vec![1, 3]);

        deck.show_all();
        assert_eq!(deck.len(), 3);
    }

    #[test]
    fn test_progress_and_label() {
        let mut deck = Deck::new(three());
        deck.next();

        assert_eq!(deck.position_label(), "2 of 3");
        assert!((deck.progress() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(deck.bounds(), Bounds { is_first: false, is_last: false });
    }
}
