//! Flip and swipe handling for the card on screen.
//!
//! One machine serves every device class. Touch devices feed it touch
//! events, pointer devices only taps and keys; both go through
//! [`CardMachine::handle`], which reports what the surrounding session has to
//! do (navigate, toggle a bookmark, shuffle) as a [`CardAction`].
//!
//! ```text
//!  FrontIdle --tap--> BackIdle --tap--> FrontIdle
//!  FrontIdle --touch start--> FrontSwiping --touch end--> Exiting(dir) | FrontIdle
//!  Exiting(dir) --tick after EXIT_DURATION_MS--> FrontIdle (+ Navigate(dir))
//! ```
use log::debug;

use crate::libcquizy::deck::Bounds;

/// Taps are ignored once a swipe has moved the card further than this.
pub const FLIP_DEAD_ZONE_PX: f64 = 20.0;
pub const RESISTANCE: f64 = 0.7;
pub const MAX_OFFSET_PX: f64 = 150.0;
pub const BOUNDARY_DAMPING: f64 = 0.2;
pub const VERTICAL_DOMINANCE: f64 = 1.5;
pub const COMMIT_DISTANCE_PX: f64 = 80.0;
/// px per ms
pub const COMMIT_VELOCITY: f64 = 0.3;
pub const EXIT_DURATION_MS: u64 = 350;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    FrontIdle,
    FrontSwiping,
    BackIdle,
    Exiting(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Space,
    Char(char),
    Other,
}

impl Key {
    /// Parses DOM-style key names (`"ArrowLeft"`, `" "`, `"b"`).
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            " " | "Space" => Key::Space,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Other,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Tap,
    TouchStart { x: f64, y: f64, at_ms: u64 },
    TouchMove { x: f64, y: f64 },
    TouchEnd { at_ms: u64 },
    Key { key: Key, in_text_input: bool, at_ms: u64 },
    Tick { now_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Flipped { showing_answer: bool },
    Navigate(Direction),
    ToggleBookmark,
    Shuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    Touch,
    #[default]
    Pointer,
}

impl DeviceClass {
    pub fn accepts(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (DeviceClass::Touch, _) => true,
            (
                DeviceClass::Pointer,
                InputEvent::TouchStart { .. } | InputEvent::TouchMove { .. } | InputEvent::TouchEnd { .. },
            ) => false,
            (DeviceClass::Pointer, _) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Touch {
    start_x: f64,
    start_y: f64,
    started_at_ms: u64,
    dx: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardMachine {
    device: DeviceClass,
    state: CardState,
    touch: Option<Touch>,
    offset: f64,
    exit_started_ms: u64,
}

impl CardMachine {
    pub fn new(device: DeviceClass) -> Self {
        Self {
            device,
            state: CardState::FrontIdle,
            touch: None,
            offset: 0.0,
            exit_started_ms: 0,
        }
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn device(&self) -> DeviceClass {
        self.device
    }

    pub fn is_flipped(&self) -> bool {
        self.state == CardState::BackIdle
    }

    pub fn is_swiping(&self) -> bool {
        self.state == CardState::FrontSwiping
    }

    pub fn swipe_offset(&self) -> f64 {
        self.offset
    }

    pub fn exit_direction(&self) -> Option<Direction> {
        match self.state {
            CardState::Exiting(direction) => Some(direction),
            _ => None,
        }
    }

    /// Clears all gesture state; called whenever a different card is shown.
    pub fn reset(&mut self) {
        self.state = CardState::FrontIdle;
        self.touch = None;
        self.offset = 0.0;
        self.exit_started_ms = 0;
    }

    pub fn handle(&mut self, event: InputEvent, bounds: Bounds) -> Option<CardAction> {
        if !self.device.accepts(&event) {
            return None;
        }

        match event {
            InputEvent::Tap => self.flip(),
            InputEvent::TouchStart { x, y, at_ms } => {
                self.touch_start(x, y, at_ms);
                None
            }
            InputEvent::TouchMove { x, y } => {
                self.touch_move(x, y, bounds);
                None
            }
            InputEvent::TouchEnd { at_ms } => {
                self.touch_end(at_ms, bounds);
                None
            }
            InputEvent::Key {
                key,
                in_text_input,
                at_ms,
            } => {
                if in_text_input {
                    return None;
                }
                match key {
                    Key::ArrowLeft => {
                        self.commit(Direction::Previous, at_ms, bounds);
                        None
                    }
                    Key::ArrowRight => {
                        self.commit(Direction::Next, at_ms, bounds);
                        None
                    }
                    Key::Space => self.flip(),
                    Key::Char('b') | Key::Char('B') => Some(CardAction::ToggleBookmark),
                    Key::Char('r') | Key::Char('R') => Some(CardAction::Shuffle),
                    _ => None,
                }
            }
            InputEvent::Tick { now_ms } => self.tick(now_ms),
        }
    }

    fn flip(&mut self) -> Option<CardAction> {
        match self.state {
            CardState::FrontIdle => {
                self.state = CardState::BackIdle;
            }
            CardState::FrontSwiping if self.offset.abs() <= FLIP_DEAD_ZONE_PX => {
                self.touch = None;
                self.offset = 0.0;
                self.state = CardState::BackIdle;
            }
            CardState::BackIdle => {
                self.state = CardState::FrontIdle;
            }
            CardState::FrontSwiping | CardState::Exiting(_) => return None,
        }

        Some(CardAction::Flipped {
            showing_answer: self.is_flipped(),
        })
    }

    fn touch_start(&mut self, x: f64, y: f64, at_ms: u64) {
        if self.state != CardState::FrontIdle {
            return;
        }
        self.touch = Some(Touch {
            start_x: x,
            start_y: y,
            started_at_ms: at_ms,
            dx: 0.0,
        });
        self.offset = 0.0;
        self.state = CardState::FrontSwiping;
    }

    fn touch_move(&mut self, x: f64, y: f64, bounds: Bounds) {
        if self.state != CardState::FrontSwiping {
            return;
        }
        let Some(touch) = self.touch.as_mut() else {
            return;
        };
        let dx = x - touch.start_x;
        let dy = y - touch.start_y;

        if dy.abs() > dx.abs() * VERTICAL_DOMINANCE {
            debug!("[Card] Vertical drag, leaving the touch to scrolling");
            self.snap_back();
            return;
        }

        touch.dx = dx;
        let mut offset = dx.signum() * (dx.abs() * RESISTANCE).min(MAX_OFFSET_PX);
        if dx != 0.0 && !Self::allowed(Self::direction_of(dx), bounds) {
            offset *= BOUNDARY_DAMPING;
        }
        self.offset = offset;
    }

    fn touch_end(&mut self, at_ms: u64, bounds: Bounds) {
        if self.state != CardState::FrontSwiping {
            return;
        }
        let Some(touch) = self.touch else {
            return;
        };
        let drag = touch.dx.abs();
        let elapsed = at_ms.saturating_sub(touch.started_at_ms).max(1) as f64;
        let velocity = drag / elapsed;

        if drag > 0.0 && (drag > COMMIT_DISTANCE_PX || velocity > COMMIT_VELOCITY) {
            let direction = Self::direction_of(touch.dx);
            if Self::allowed(direction, bounds) {
                debug!(
                    "[Card] Swipe committed {:?} (drag {:.1}px, {:.3}px/ms)",
                    direction, drag, velocity
                );
                self.start_exit(direction, at_ms);
                return;
            }
        }
        self.snap_back();
    }

    fn commit(&mut self, direction: Direction, at_ms: u64, bounds: Bounds) {
        if matches!(self.state, CardState::Exiting(_)) || !Self::allowed(direction, bounds) {
            return;
        }
        self.start_exit(direction, at_ms);
    }

    fn start_exit(&mut self, direction: Direction, at_ms: u64) {
        self.touch = None;
        self.exit_started_ms = at_ms;
        self.state = CardState::Exiting(direction);
    }

    fn tick(&mut self, now_ms: u64) -> Option<CardAction> {
        let CardState::Exiting(direction) = self.state else {
            return None;
        };
        if now_ms.saturating_sub(self.exit_started_ms) < EXIT_DURATION_MS {
            return None;
        }
        self.reset();
        Some(CardAction::Navigate(direction))
    }

    fn snap_back(&mut self) {
        self.touch = None;
        self.offset = 0.0;
        self.state = CardState::FrontIdle;
    }

    fn direction_of(dx: f64) -> Direction {
        if dx > 0.0 {
            Direction::Previous
        } else {
            Direction::Next
        }
    }

    fn allowed(direction: Direction, bounds: Bounds) -> bool {
        match direction {
            Direction::Next => !bounds.is_last,
            Direction::Previous => !bounds.is_first,
        }
    }
}

impl Default for CardMachine {
    fn default() -> Self {
        Self::new(DeviceClass::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIDDLE: Bounds = Bounds {
        is_first: false,
        is_last: false,
    };
    const FIRST: Bounds = Bounds {
        is_first: true,
        is_last: false,
    };
    const LAST: Bounds = Bounds {
        is_first: false,
        is_last: true,
    };

    fn drag(machine: &mut CardMachine, dx: f64, duration_ms: u64, bounds: Bounds) {
        machine.handle(InputEvent::TouchStart { x: 200.0, y: 300.0, at_ms: 1_000 }, bounds);
        machine.handle(InputEvent::TouchMove { x: 200.0 + dx, y: 300.0 }, bounds);
        machine.handle(InputEvent::TouchEnd { at_ms: 1_000 + duration_ms }, bounds);
    }

    fn key(key: Key, at_ms: u64) -> InputEvent {
        InputEvent::Key {
            key,
            in_text_input: false,
            at_ms,
        }
    }

    #[test]
    fn test_tap_flips_back_and_forth() {
        let mut machine = CardMachine::default();

        assert_eq!(
            machine.handle(InputEvent::Tap, MIDDLE),
            Some(CardAction::Flipped { showing_answer: true })
        );
        assert_eq!(machine.state(), CardState::BackIdle);
        assert_eq!(
            machine.handle(InputEvent::Tap, MIDDLE),
            Some(CardAction::Flipped { showing_answer: false })
        );
        assert_eq!(machine.state(), CardState::FrontIdle);
    }

    #[test]
    fn test_slow_drag_commit_boundary() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        drag(&mut machine, -81.0, 10_000, MIDDLE);
        assert_eq!(machine.state(), CardState::Exiting(Direction::Next));

        let mut machine = CardMachine::new(DeviceClass::Touch);
        drag(&mut machine, -79.0, 10_000, MIDDLE);
        assert_eq!(machine.state(), CardState::FrontIdle);
        assert_eq!(machine.swipe_offset(), 0.0);
    }

    #[test]
    fn test_fast_flick_commits() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        drag(&mut machine, 40.0, 100, MIDDLE);

        assert_eq!(machine.exit_direction(), Some(Direction::Previous));
    }

    #[test]
    fn test_resistance_curve() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        machine.handle(InputEvent::TouchStart { x: 0.0, y: 0.0, at_ms: 0 }, MIDDLE);

        machine.handle(InputEvent::TouchMove { x: 100.0, y: 0.0 }, MIDDLE);
        assert!((machine.swipe_offset() - 70.0).abs() < 1e-9);

        machine.handle(InputEvent::TouchMove { x: -400.0, y: 0.0 }, MIDDLE);
        assert_eq!(machine.swipe_offset(), -MAX_OFFSET_PX);
        assert!(machine.is_swiping());
    }

    #[test]
    fn test_boundary_damping_and_no_commit() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        machine.handle(InputEvent::TouchStart { x: 0.0, y: 0.0, at_ms: 0 }, LAST);
        machine.handle(InputEvent::TouchMove { x: -100.0, y: 0.0 }, LAST);
        assert!((machine.swipe_offset() + 14.0).abs() < 1e-9);

        machine.handle(InputEvent::TouchEnd { at_ms: 50 }, LAST);
        assert_eq!(machine.state(), CardState::FrontIdle);
        assert_eq!(machine.swipe_offset(), 0.0);
    }

    #[test]
    fn test_vertical_drag_abandons_tracking() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        machine.handle(InputEvent::TouchStart { x: 0.0, y: 0.0, at_ms: 0 }, MIDDLE);
        machine.handle(InputEvent::TouchMove { x: 10.0, y: 40.0 }, MIDDLE);
        assert_eq!(machine.state(), CardState::FrontIdle);

        machine.handle(InputEvent::TouchMove { x: -200.0, y: 40.0 }, MIDDLE);
        machine.handle(InputEvent::TouchEnd { at_ms: 10 }, MIDDLE);
        assert_eq!(machine.state(), CardState::FrontIdle);
    }

    #[test]
    fn test_tap_respects_dead_zone() {
        let mut machine = CardMachine::new(DeviceClass::Touch);
        machine.handle(InputEvent::TouchStart { x: 0.0, y: 0.0, at_ms: 0 }, MIDDLE);
        machine.handle(InputEvent::TouchMove { x: -50.0, y: 0.0 }, MIDDLE);
        assert_eq!(machine.handle(InputEvent::Tap, MIDDLE), None);

        machine.handle(InputEvent::TouchMove { x: -10.0, y: 0.0 }, MIDDLE);
        assert_eq!(
            machine.handle(InputEvent::Tap, MIDDLE),
            Some(CardAction::Flipped { showing_answer: true })
        );
    }

    #[test]
    fn test_exit_navigates_after_animation() {
        let mut machine = CardMachine::default();
        machine.handle(key(Key::ArrowRight, 500), MIDDLE);

        assert_eq!(machine.handle(InputEvent::Tick { now_ms: 600 }, MIDDLE), None);
        assert_eq!(
            machine.handle(InputEvent::Tick { now_ms: 500 + EXIT_DURATION_MS }, MIDDLE),
            Some(CardAction::Navigate(Direction::Next))
        );
        assert_eq!(machine.state(), CardState::FrontIdle);
    }

    #[test]
    fn test_arrows_are_guarded_at_bounds() {
        let mut machine = CardMachine::default();
        machine.handle(key(Key::ArrowLeft, 0), FIRST);
        assert_eq!(machine.state(), CardState::FrontIdle);

        machine.handle(key(Key::ArrowRight, 0), LAST);
        assert_eq!(machine.state(), CardState::FrontIdle);
    }

    #[test]
    fn test_arrow_from_back_face() {
        let mut machine = CardMachine::default();
        machine.handle(key(Key::Space, 0), MIDDLE);
        assert!(machine.is_flipped());

        machine.handle(key(Key::ArrowLeft, 10), MIDDLE);
        assert_eq!(machine.exit_direction(), Some(Direction::Previous));
    }

    #[test]
    fn test_keys_ignored_in_text_input() {
        let mut machine = CardMachine::default();
        let typed = InputEvent::Key {
            key: Key::Char('b'),
            in_text_input: true,
            at_ms: 0,
        };

        assert_eq!(machine.handle(typed, MIDDLE), None);
        assert_eq!(machine.handle(key(Key::Char('B'), 0), MIDDLE), Some(CardAction::ToggleBookmark));
        assert_eq!(machine.handle(key(Key::Char('r'), 0), MIDDLE), Some(CardAction::Shuffle));
        assert_eq!(machine.handle(key(Key::Char('R'), 0), MIDDLE), Some(CardAction::Shuffle));
    }

    #[test]
    fn test_pointer_devices_drop_touch_events() {
        let mut machine = CardMachine::new(DeviceClass::Pointer);
        assert_eq!(machine.device(), DeviceClass::Pointer);
        machine.handle(InputEvent::TouchStart { x: 0.0, y: 0.0, at_ms: 0 }, MIDDLE);

        assert_eq!(machine.state(), CardState::FrontIdle);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Key::from_name("ArrowLeft"), Key::ArrowLeft);
        assert_eq!(Key::from_name(" "), Key::Space);
        assert_eq!(Key::from_name("b"), Key::Char('b'));
        assert_eq!(Key::from_name("Escape"), Key::Other);
    }
}
