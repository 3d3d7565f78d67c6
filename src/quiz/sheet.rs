//! Sheet-note identification: one target note per hand, shown on a staff,
//! answered by pressing the matching key.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use super::keyboard::{keys_for_hand, KeyboardView};
use super::{Debouncer, InputOutcome, PlayCue, Rejection, Score, Verdict};
use crate::config::QuizConfig;
use crate::note::{Hand, KeyColor, Note};

pub const DEFAULT_AUTO_ADVANCE: Duration = Duration::from_millis(2000);

const TARGET_CUE: (f32, f32) = (1.2, 0.9);
const ANSWER_CUE: (f32, f32) = (1.2, 0.8);

/// Which keys questions are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    #[default]
    All,
    White,
    Black,
}

impl KeyMode {
    pub fn allows(&self, color: KeyColor) -> bool {
        match self {
            KeyMode::All => true,
            KeyMode::White => color == KeyColor::White,
            KeyMode::Black => color == KeyColor::Black,
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::All => write!(f, "all"),
            KeyMode::White => write!(f, "white"),
            KeyMode::Black => write!(f, "black"),
        }
    }
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(KeyMode::All),
            "white" => Ok(KeyMode::White),
            "black" => Ok(KeyMode::Black),
            other => Err(format!("unknown key mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    /// The hand decides when known; otherwise octave 3 and below read in
    /// bass clef.
    pub fn for_note(note: Note, hand: Option<Hand>) -> Self {
        match hand {
            Some(Hand::Left) => Clef::Bass,
            Some(Hand::Right) => Clef::Treble,
            None if note.octave() <= 3 => Clef::Bass,
            None => Clef::Treble,
        }
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clef::Treble => write!(f, "treble"),
            Clef::Bass => write!(f, "bass"),
        }
    }
}

/// What to show the player. `Display` is the text fallback used when no
/// notation renderer is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub note: Note,
    pub clef: Clef,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "♪ {} ({} clef)", self.note, self.clef)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandState {
    pub target: Option<Note>,
    pub answer: Option<Note>,
    pub verdict: Option<Verdict>,
    /// Keys answered wrongly for the current question.
    pub disabled: Vec<Note>,
    advance_at: Option<Instant>,
}

pub struct SheetQuiz<R: Rng = StdRng> {
    mode: KeyMode,
    active: Hand,
    left: HandState,
    right: HandState,
    score: Score,
    debounce: Debouncer,
    auto_advance: Duration,
    rng: R,
}

impl<R: Rng> SheetQuiz<R> {
    pub fn new(mode: KeyMode, rng: R) -> Self {
        Self {
            mode,
            active: Hand::Right,
            left: HandState::default(),
            right: HandState::default(),
            score: Score::default(),
            debounce: Debouncer::default(),
            auto_advance: DEFAULT_AUTO_ADVANCE,
            rng,
        }
    }

    pub fn from_config(config: &QuizConfig, rng: R) -> Self {
        let mut quiz = Self::new(config.sheet.key_mode, rng);
        quiz.debounce = Debouncer::new(Duration::from_millis(config.debounce_ms));
        quiz.auto_advance = Duration::from_millis(config.sheet.auto_advance_ms);
        quiz
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    pub fn active_hand(&self) -> Hand {
        self.active
    }

    pub fn set_active_hand(&mut self, hand: Hand) {
        self.active = hand;
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn hand(&self, hand: Hand) -> &HandState {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    fn hand_mut(&mut self, hand: Hand) -> &mut HandState {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    /// Questions for both hands. Each new target is returned to be played.
    pub fn start(&mut self) -> Vec<PlayCue> {
        [Hand::Left, Hand::Right]
            .into_iter()
            .filter_map(|hand| self.new_question(hand))
            .collect()
    }

    pub fn set_mode(&mut self, mode: KeyMode) -> Vec<PlayCue> {
        self.mode = mode;
        self.start()
    }

    /// Draw a fresh target for `hand` and reset its answer state.
    pub fn new_question(&mut self, hand: Hand) -> Option<PlayCue> {
        let pool: Vec<Note> = keys_for_hand(hand)
            .filter(|key| self.mode.allows(key.color))
            .map(|key| key.note)
            .collect();
        if pool.is_empty() {
            return None;
        }
        let target = pool[self.rng.random_range(0..pool.len())];

        *self.hand_mut(hand) = HandState {
            target: Some(target),
            ..HandState::default()
        };
        log::debug!("new {} hand question", hand);
        Some(PlayCue::new(target, TARGET_CUE.0, TARGET_CUE.1))
    }

    /// Answer for the active hand.
    pub fn handle_input(&mut self, note: Note, now: Instant) -> InputOutcome {
        if !self.debounce.accept(now) {
            return InputOutcome::Rejected(Rejection::Debounced);
        }

        let auto_advance = self.auto_advance;
        let state = self.hand_mut(self.active);
        let Some(target) = state.target else {
            return InputOutcome::Rejected(Rejection::NoQuestion);
        };
        if state.verdict == Some(Verdict::Correct) {
            return InputOutcome::Rejected(Rejection::ResultPending);
        }
        if state.disabled.contains(&note) {
            return InputOutcome::Rejected(Rejection::Disabled);
        }
        if state.verdict == Some(Verdict::Incorrect) {
            state.answer = None;
            state.disabled.clear();
            state.verdict = None;
        }

        state.answer = Some(note);
        let correct = note == target;
        let verdict = if correct {
            state.advance_at = Some(now + auto_advance);
            Verdict::Correct
        } else {
            state.disabled.push(note);
            Verdict::Incorrect
        };
        state.verdict = Some(verdict);
        self.score.record(correct);

        InputOutcome::Accepted {
            echo: PlayCue::new(note, ANSWER_CUE.0, ANSWER_CUE.1),
            verdict: Some(verdict),
        }
    }

    /// Advance any hand whose correct answer has been shown long enough.
    pub fn tick(&mut self, now: Instant) -> Vec<PlayCue> {
        let due: Vec<Hand> = [Hand::Left, Hand::Right]
            .into_iter()
            .filter(|&hand| self.hand(hand).advance_at.is_some_and(|at| now >= at))
            .collect();
        due.into_iter()
            .filter_map(|hand| self.new_question(hand))
            .collect()
    }

    pub fn prompt(&self) -> Option<Prompt> {
        let hand = self.active;
        self.hand(hand).target.map(|note| Prompt {
            note,
            clef: Clef::for_note(note, Some(hand)),
        })
    }

    /// The active hand's target, to be heard again.
    pub fn replay(&self) -> Option<PlayCue> {
        self.hand(self.active)
            .target
            .map(|note| PlayCue::new(note, TARGET_CUE.0, TARGET_CUE.1))
    }

    pub fn keyboard_view(&self) -> KeyboardView {
        let state = self.hand(self.active);
        KeyboardView {
            active: state.answer.into_iter().collect(),
            disabled: state.disabled.clone(),
            answer: state.answer.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn n(name: &str) -> Note {
        name.parse().unwrap()
    }

    fn quiz() -> SheetQuiz<StdRng> {
        SheetQuiz::new(KeyMode::All, StdRng::seed_from_u64(17))
    }

    fn wrong_note_for(target: Note) -> Note {
        if target == n("C4") {
            n("D4")
        } else {
            n("C4")
        }
    }

    #[test]
    fn start_gives_both_hands_a_question_in_their_region() {
        let mut quiz = quiz();
        let cues = quiz.start();
        assert_eq!(cues.len(), 2);
        assert!(cues.iter().all(|c| c.duration == 1.2 && c.velocity == 0.9));

        let left = quiz.hand(Hand::Left).target.unwrap();
        let right = quiz.hand(Hand::Right).target.unwrap();
        assert!(left <= n("E4"));
        assert!(right >= n("C4") && right <= n("F5"));
    }

    #[test]
    fn key_mode_filters_targets() {
        let mut quiz = SheetQuiz::new(KeyMode::Black, StdRng::seed_from_u64(1));
        for _ in 0..20 {
            quiz.start();
            assert_eq!(quiz.hand(Hand::Left).target.unwrap().color(), KeyColor::Black);
            assert_eq!(quiz.hand(Hand::Right).target.unwrap().color(), KeyColor::Black);
        }
        quiz.set_mode(KeyMode::White);
        assert_eq!(quiz.hand(Hand::Right).target.unwrap().color(), KeyColor::White);
    }

    #[test]
    fn correct_answer_locks_then_advances() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.start();
        let target = quiz.hand(Hand::Right).target.unwrap();

        let outcome = quiz.handle_input(target, t0);
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        match outcome {
            InputOutcome::Accepted { echo, .. } => {
                assert_eq!((echo.duration, echo.velocity), (1.2, 0.8))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            quiz.handle_input(target, t0 + Duration::from_millis(500)),
            InputOutcome::Rejected(Rejection::ResultPending)
        );

        assert!(quiz.tick(t0 + Duration::from_millis(1999)).is_empty());
        let cues = quiz.tick(t0 + Duration::from_millis(2000));
        assert_eq!(cues.len(), 1);
        let state = quiz.hand(Hand::Right);
        assert_eq!(state.verdict, None);
        assert_eq!(state.answer, None);
        assert_eq!(quiz.score(), Score { correct: 1, total: 1 });
    }

    #[test]
    fn wrong_key_is_disabled_until_the_next_try() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.start();
        let target = quiz.hand(Hand::Right).target.unwrap();
        let wrong = wrong_note_for(target);

        assert_eq!(quiz.handle_input(wrong, t0).verdict(), Some(Verdict::Incorrect));
        assert_eq!(quiz.hand(Hand::Right).disabled, vec![wrong]);
        assert_eq!(
            quiz.handle_input(wrong, t0 + Duration::from_millis(200)),
            InputOutcome::Rejected(Rejection::Disabled)
        );

        // a different key clears the previous miss before being judged
        let outcome = quiz.handle_input(target, t0 + Duration::from_millis(400));
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        assert!(quiz.hand(Hand::Right).disabled.is_empty());
        assert_eq!(quiz.score(), Score { correct: 1, total: 2 });
    }

    #[test]
    fn hands_keep_separate_state() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.start();
        let right_target = quiz.hand(Hand::Right).target.unwrap();
        quiz.handle_input(right_target, t0);

        quiz.set_active_hand(Hand::Left);
        let left_target = quiz.hand(Hand::Left).target.unwrap();
        let outcome = quiz.handle_input(left_target, t0 + Duration::from_millis(300));
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        assert_eq!(quiz.tick(t0 + Duration::from_millis(2300)).len(), 2);
    }

    #[test]
    fn debounce_applies() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.start();
        let target = quiz.hand(Hand::Right).target.unwrap();
        let wrong = wrong_note_for(target);
        quiz.handle_input(wrong, t0);
        assert_eq!(
            quiz.handle_input(target, t0 + Duration::from_millis(50)),
            InputOutcome::Rejected(Rejection::Debounced)
        );
    }

    #[test]
    fn prompt_and_clef() {
        let mut quiz = quiz();
        assert!(quiz.prompt().is_none());
        quiz.start();
        assert_eq!(quiz.prompt().unwrap().clef, Clef::Treble);
        quiz.set_active_hand(Hand::Left);
        assert_eq!(quiz.prompt().unwrap().clef, Clef::Bass);

        let prompt = Prompt {
            note: n("C#4"),
            clef: Clef::for_note(n("C#4"), None),
        };
        assert_eq!(prompt.to_string(), "♪ C#4 (treble clef)");
        assert_eq!(Clef::for_note(n("B3"), None), Clef::Bass);
    }

    #[test]
    fn no_question_before_start() {
        let mut quiz = quiz();
        assert_eq!(
            quiz.handle_input(n("C4"), Instant::now()),
            InputOutcome::Rejected(Rejection::NoQuestion)
        );
        assert_eq!(quiz.replay(), None);
    }

    #[test]
    fn replay_repeats_the_active_target() {
        let mut quiz = quiz();
        quiz.start();
        quiz.set_active_hand(Hand::Left);
        let target = quiz.hand(Hand::Left).target.unwrap();
        assert_eq!(quiz.replay(), Some(PlayCue::new(target, 1.2, 0.9)));
    }
}
