//! The study session: every piece of client state in one place.
//!
//! Front-ends never touch the deck, bookmarks or timer directly; they feed
//! input events and button actions into [`StudySession`] and render what it
//! exposes. Everything worth keeping across runs is written to
//! [`LocalStorage`] as it changes.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::{Duration, Instant};

use crate::libcquizy::bookmarks::BookmarkSet;
use crate::libcquizy::card::{CardAction, CardMachine, DeviceClass, Direction, InputEvent};
use crate::libcquizy::deck::Deck;
use crate::libcquizy::question::Question;
use crate::libcquizy::storage::{keys, LocalStorage};
use crate::libcquizy::theme::Theme;
use crate::libcquizy::timer::StudyTimer;

pub const NO_QUESTIONS: &str = "No questions available";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPosition {
    pub index: usize,
    pub reviewing_bookmarks: bool,
}

/// Counters for the current run only. They are written to storage as they
/// change but never read back: every session starts from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub cards_viewed: u64,
    pub flips: u64,
    /// Whole seconds since the session started, as of the last update.
    pub session_duration: u64,
}

/// Identifies one question fetch. Only the most recently issued ticket may
/// deliver its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug)]
pub struct StudySession {
    deck: Deck,
    bookmarks: BookmarkSet,
    card: CardMachine,
    timer: StudyTimer,
    theme: Theme,
    stats: SessionStats,
    started: Instant,
    storage: LocalStorage,
    reviewing_bookmarks: bool,
    generation: u64,
    loading: bool,
    error: Option<String>,
    notice: Option<String>,
}

macro_rules! persist {
    ($storage:expr, $key:expr, $value:expr) => {
        if let Err(err) = $storage.set($key, $value) {
            warn!("[Session] Failed to save {}: {}", $key, err);
        }
    };
}

impl StudySession {
    pub fn new(mut storage: LocalStorage, device: DeviceClass) -> Self {
        let bookmarks: BookmarkSet = storage.get(keys::BOOKMARKS);
        let timer = StudyTimer::restore(
            storage.get_or(keys::STUDY_TIMER, 0),
            storage.get_or(keys::TIMER_ACTIVE, false),
        );
        let theme = Theme::from_str(&storage.get_or(keys::THEME, Theme::default().as_str().to_string()));
        debug!(
            "[Session] Restored {} bookmarks, {}s studied, {} theme",
            bookmarks.len(),
            timer.seconds(),
            theme.as_str()
        );

        Self {
            deck: Deck::default(),
            bookmarks,
            card: CardMachine::new(device),
            timer,
            theme,
            stats: SessionStats::default(),
            started: Instant::now(),
            storage,
            reviewing_bookmarks: false,
            generation: 0,
            loading: false,
            error: None,
            notice: None,
        }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn card(&self) -> &CardMachine {
        &self.card
    }

    pub fn bookmarks(&self) -> &BookmarkSet {
        &self.bookmarks
    }

    pub fn timer(&self) -> &StudyTimer {
        &self.timer
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_reviewing_bookmarks(&self) -> bool {
        self.reviewing_bookmarks
    }

    /// One-shot message for the front-end, cleared when read.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn current(&self) -> Option<&Question> {
        self.deck.current()
    }

    pub fn current_is_bookmarked(&self) -> bool {
        self.deck
            .current()
            .is_some_and(|question| self.bookmarks.contains(question.id))
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.deck.clear();
        self.card.reset();
        debug!("[Session] Loading questions (generation {})", self.generation);
        LoadTicket(self.generation)
    }

    /// Applies a fetch result. Returns `false` when the ticket has been
    /// superseded and the result was dropped.
    pub fn finish_load<E: Display>(&mut self, ticket: LoadTicket, result: Result<Vec<Question>, E>) -> bool {
        if ticket.0 != self.generation {
            debug!(
                "[Session] Dropping stale response (generation {}, latest {})",
                ticket.0, self.generation
            );
            return false;
        }
        self.loading = false;

        match result {
            Ok(questions) if questions.is_empty() => {
                self.error = Some(NO_QUESTIONS.to_string());
            }
            Ok(questions) => {
                info!("[Session] Loaded {} questions", questions.len());
                self.deck.replace(questions);
                self.restore_position();
                if self.deck.current().is_some() {
                    self.card_viewed();
                }
            }
            Err(err) => {
                warn!("[Session] Failed to load questions: {}", err);
                self.error = Some(format!("Failed to load questions: {err}"));
            }
        }
        true
    }

    fn restore_position(&mut self) {
        let position: LastPosition = self.storage.get(keys::LAST_POSITION);
        self.reviewing_bookmarks = false;
        if position.reviewing_bookmarks && !self.bookmarks.is_empty() {
            self.deck.only_bookmarked(&self.bookmarks);
            if self.deck.is_empty() {
                debug!("[Session] No saved bookmark is in this set, showing everything");
                self.deck.show_all();
            } else {
                self.reviewing_bookmarks = true;
            }
        }
        if !self.deck.jump_to(position.index) {
            debug!("[Session] Saved position {} out of range", position.index);
        }
    }

    fn save_position(&mut self) {
        let position = LastPosition {
            index: self.deck.index(),
            reviewing_bookmarks: self.reviewing_bookmarks,
        };
        persist!(self.storage, keys::LAST_POSITION, &position);
    }

    fn card_viewed(&mut self) {
        self.stats.cards_viewed += 1;
        self.save_stats();
    }

    fn save_stats(&mut self) {
        self.stats.session_duration = self.started.elapsed().as_secs();
        persist!(self.storage, keys::STATS, &self.stats);
    }

    /// Runs after anything that may have changed the current card.
    fn card_changed(&mut self) {
        self.card.reset();
        self.save_position();
        if !self.deck.is_empty() {
            self.card_viewed();
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Option<CardAction> {
        if self.loading || self.deck.is_empty() {
            return None;
        }
        let action = self.card.handle(event, self.deck.bounds())?;

        match action {
            CardAction::Navigate(Direction::Next) => {
                self.next();
            }
            CardAction::Navigate(Direction::Previous) => {
                self.previous();
            }
            CardAction::ToggleBookmark => {
                self.toggle_bookmark();
            }
            CardAction::Shuffle => {
                self.shuffle();
            }
            CardAction::Flipped { .. } => {
                self.stats.flips += 1;
                self.save_stats();
            }
        }
        Some(action)
    }

    pub fn next(&mut self) -> bool {
        let moved = self.deck.next();
        if moved {
            self.card_changed();
        }
        moved
    }

    pub fn previous(&mut self) -> bool {
        let moved = self.deck.previous();
        if moved {
            self.card_changed();
        }
        moved
    }

    pub fn shuffle(&mut self) {
        if self.deck.is_empty() {
            return;
        }
        self.deck.shuffle();
        self.card_changed();
    }

    pub fn search(&mut self, term: &str) {
        self.reviewing_bookmarks = false;
        self.deck.search(term);
        if self.deck.is_empty() {
            self.notice = Some("No questions found".to_string());
        }
        self.card_changed();
    }

    /// Returns whether the current question is bookmarked afterwards, or
    /// `None` when there is no current question.
    pub fn toggle_bookmark(&mut self) -> Option<bool> {
        let id = self.deck.current()?.id;
        let bookmarked = self.bookmarks.toggle(id);
        persist!(self.storage, keys::BOOKMARKS, &self.bookmarks);
        debug!("[Session] Question {} bookmarked: {}", id, bookmarked);
        Some(bookmarked)
    }

    /// Switches between the bookmarked subset and the full set. Returns
    /// whether review mode is on afterwards.
    pub fn toggle_review_mode(&mut self) -> bool {
        if self.reviewing_bookmarks {
            self.reviewing_bookmarks = false;
            self.deck.show_all();
        } else if self.bookmarks.is_empty() {
            self.notice = Some("No bookmarked questions yet".to_string());
            return false;
        } else {
            self.reviewing_bookmarks = true;
            self.deck.only_bookmarked(&self.bookmarks);
        }
        self.card_changed();
        self.reviewing_bookmarks
    }

    pub fn toggle_timer(&mut self) -> bool {
        let active = self.timer.toggle();
        self.save_timer();
        active
    }

    pub fn reset_timer(&mut self) {
        self.timer.reset();
        self.save_timer();
    }

    /// Called when the front-end goes out of view.
    pub fn pause_timer(&mut self) {
        if self.timer.is_active() {
            self.timer.pause();
            self.save_timer();
        }
    }

    pub fn advance_timer(&mut self, elapsed: Duration) {
        if self.timer.advance(elapsed) {
            persist!(self.storage, keys::STUDY_TIMER, &self.timer.seconds());
        }
    }

    fn save_timer(&mut self) {
        persist!(self.storage, keys::STUDY_TIMER, &self.timer.seconds());
        persist!(self.storage, keys::TIMER_ACTIVE, &self.timer.is_active());
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggle();
        persist!(self.storage, keys::THEME, &self.theme.as_str());
        self.theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libcquizy::card::{Key, EXIT_DURATION_MS};
    use crate::libcquizy::deck::tests::three;

    fn loaded(storage: LocalStorage) -> StudySession {
        let mut session = StudySession::new(storage, DeviceClass::Touch);
        let ticket = session.begin_load();
        assert!(session.finish_load::<String>(ticket, Ok(three())));
        session
    }

    fn key(key: Key, at_ms: u64) -> InputEvent {
        InputEvent::Key {
            key,
            in_text_input: false,
            at_ms,
        }
    }

    #[test]
    fn test_stale_fetch_is_dropped() {
        let mut session = StudySession::new(LocalStorage::in_memory(), DeviceClass::Pointer);
        let first = session.begin_load();
        let second = session.begin_load();

        assert!(session.finish_load::<String>(second, Ok(three())));
        assert!(!session.finish_load::<String>(first, Ok(Vec::new())));
        assert_eq!(session.deck().len(), 3);
        assert!(session.error().is_none());
    }

    #[test]
    fn test_no_input_while_loading() {
        let mut session = loaded(LocalStorage::in_memory());
        session.begin_load();

        assert!(session.is_loading());
        assert_eq!(session.handle_input(key(Key::Space, 0)), None);
    }

    #[test]
    fn test_load_failure_sets_banner() {
        let mut session = StudySession::new(LocalStorage::in_memory(), DeviceClass::Pointer);
        let ticket = session.begin_load();
        session.finish_load(ticket, Err("connection refused"));

        assert_eq!(
            session.error(),
            Some("Failed to load questions: connection refused")
        );

        let ticket = session.begin_load();
        session.finish_load::<String>(ticket, Ok(Vec::new()));
        assert_eq!(session.error(), Some(NO_QUESTIONS));
    }

    #[test]
    fn test_swipe_navigates_after_exit() {
        let mut session = loaded(LocalStorage::in_memory());
        session.handle_input(InputEvent::TouchStart { x: 300.0, y: 0.0, at_ms: 0 });
        session.handle_input(InputEvent::TouchMove { x: 150.0, y: 5.0 });
        session.handle_input(InputEvent::TouchEnd { at_ms: 200 });
        assert_eq!(session.deck().index(), 0);

        let action = session.handle_input(InputEvent::Tick {
            now_ms: 200 + EXIT_DURATION_MS,
        });
        assert_eq!(action, Some(CardAction::Navigate(Direction::Next)));
        assert_eq!(session.deck().index(), 1);
        assert!(!session.card().is_flipped());
    }

    #[test]
    fn test_flip_resets_on_card_change() {
        let mut session = loaded(LocalStorage::in_memory());
        session.handle_input(InputEvent::Tap);
        assert!(session.card().is_flipped());

        session.next();
        assert!(!session.card().is_flipped());
        assert_eq!(session.stats().flips, 1);
    }

    #[test]
    fn test_bookmark_round_trip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut session = loaded(LocalStorage::open(&path));
        session.next();
        assert_eq!(session.handle_input(key(Key::Char('b'), 0)), Some(CardAction::ToggleBookmark));
        assert!(session.current_is_bookmarked());

        let session = loaded(LocalStorage::open(&path));
        assert!(session.bookmarks().contains(2));
        assert_eq!(session.deck().index(), 1);

        let mut session = session;
        session.toggle_bookmark();
        assert!(session.bookmarks().is_empty());
    }

    #[test]
    fn test_review_mode_restored_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut session = loaded(LocalStorage::open(&path));
        session.toggle_review_mode();
        assert!(session.take_notice().is_some());

        session.jump_and_bookmark(2);
        session.jump_and_bookmark(1);
        assert!(session.toggle_review_mode());
        assert_eq!(session.deck().len(), 2);
        session.next();

        let session = loaded(LocalStorage::open(&path));
        assert!(session.is_reviewing_bookmarks());
        assert_eq!(session.current().map(|q| q.id), Some(3));
    }

    #[test]
    fn test_review_mode_dropped_when_no_bookmark_is_loaded() {
        let mut storage = LocalStorage::in_memory();
        storage.set(keys::BOOKMARKS, &vec![99_i64]).unwrap();
        storage
            .set(
                keys::LAST_POSITION,
                &LastPosition {
                    index: 0,
                    reviewing_bookmarks: true,
                },
            )
            .unwrap();

        let session = loaded(storage);
        assert!(!session.is_reviewing_bookmarks());
        assert_eq!(session.deck().len(), 3);
        assert_eq!(session.current().map(|q| q.id), Some(1));
        assert_eq!(session.stats().cards_viewed, 1);
    }

    #[test]
    fn test_stats_start_fresh_each_session() {
        let mut storage = LocalStorage::in_memory();
        let earlier = SessionStats {
            cards_viewed: 40,
            flips: 12,
            session_duration: 600,
        };
        storage.set(keys::STATS, &earlier).unwrap();

        let mut session = loaded(storage);
        session.handle_input(InputEvent::Tap);
        assert_eq!(session.stats().cards_viewed, 1);
        assert_eq!(session.stats().flips, 1);
        assert!(session.stats().session_duration < 600);
    }

    #[test]
    fn test_r_key_shuffles() {
        let mut session = loaded(LocalStorage::in_memory());
        session.next();
        assert_eq!(session.handle_input(key(Key::Char('r'), 0)), Some(CardAction::Shuffle));

        assert_eq!(session.deck().index(), 0);
        assert_eq!(session.deck().len(), 3);
        assert_eq!(session.stats().cards_viewed, 3);
    }

    #[test]
    fn test_search_leaves_review_mode() {
        let mut session = loaded(LocalStorage::in_memory());
        session.toggle_bookmark();
        session.toggle_review_mode();

        session.search("limit");
        assert!(!session.is_reviewing_bookmarks());
        assert_eq!(session.deck().len(), 2);

        session.search("zzz");
        assert_eq!(session.take_notice().as_deref(), Some("No questions found"));
    }

    #[test]
    fn test_timer_and_theme_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut session = StudySession::new(LocalStorage::open(&path), DeviceClass::Pointer);
        assert_eq!(session.theme(), Theme::Dark);
        session.toggle_theme();
        session.toggle_timer();
        session.advance_timer(Duration::from_secs(75));
        session.pause_timer();

        let session = StudySession::new(LocalStorage::open(&path), DeviceClass::Pointer);
        assert_eq!(session.theme(), Theme::Light);
        assert_eq!(session.timer().seconds(), 75);
        assert!(!session.timer().is_active());
    }

    impl StudySession {
        fn jump_and_bookmark(&mut self, index: usize) {
            self.deck.jump_to(index);
            self.toggle_bookmark();
        }
    }
}
