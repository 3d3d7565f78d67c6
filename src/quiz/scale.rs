//! Scale dictation: hear a short run of notes, play it back in order.

use rand::rngs::StdRng;
use rand::Rng;
use std::time::{Duration, Instant};

use super::keyboard::{keys_for_hand, piano_keys, KeyboardView};
use super::{Debouncer, InputOutcome, NoteRange, PlayCue, QuizSettings, Rejection, Score, Verdict};
use crate::config::{ConfigError, QuizConfig};
use crate::note::{Hand, KeyColor, Note};

pub const DEFAULT_BUTTON_LOCK: Duration = Duration::from_millis(300);
const ECHO_DURATION: f32 = 0.8;
const ECHO_VELOCITY: f32 = 0.8;

/// Notes a range offers for a hand, lowest first.
pub fn available_notes(range: NoteRange, hand: Hand) -> Vec<Note> {
    let octave = match hand {
        Hand::Left => 3,
        Hand::Right => 4,
    };
    let run = |names: &[(u8, i8)]| -> Vec<Note> {
        names
            .iter()
            .map(|&(pitch_class, shift)| Note::new(pitch_class, octave + shift))
            .collect()
    };

    match range {
        NoteRange::Basic4 => run(&[(0, 0), (2, 0), (4, 0), (5, 0)]),
        NoteRange::High4 => run(&[(7, 0), (9, 0), (11, 0), (0, 1)]),
        NoteRange::Diatonic8 => run(&[
            (0, 0),
            (2, 0),
            (4, 0),
            (5, 0),
            (7, 0),
            (9, 0),
            (11, 0),
            (0, 1),
        ]),
        NoteRange::White12 => keys_for_hand(hand)
            .filter(|key| key.color == KeyColor::White)
            .map(|key| key.note)
            .collect(),
        NoteRange::All18 => keys_for_hand(hand).map(|key| key.note).collect(),
    }
}

pub struct ScaleQuiz<R: Rng = StdRng> {
    settings: QuizSettings,
    rng: R,
    target: Option<Vec<Note>>,
    answer: Vec<Note>,
    result: Option<Verdict>,
    show_answer: bool,
    playing: bool,
    score: Score,
    debounce: Debouncer,
    button_lock: Duration,
    locked_until: Option<Instant>,
    auto_advance: Option<Duration>,
    advance_at: Option<Instant>,
}

impl<R: Rng> ScaleQuiz<R> {
    pub fn new(settings: QuizSettings, rng: R) -> Self {
        Self {
            settings,
            rng,
            target: None,
            answer: Vec::new(),
            result: None,
            show_answer: false,
            playing: false,
            score: Score::default(),
            debounce: Debouncer::default(),
            button_lock: DEFAULT_BUTTON_LOCK,
            locked_until: None,
            auto_advance: None,
            advance_at: None,
        }
    }

    pub fn from_config(config: &QuizConfig, rng: R) -> Self {
        let mut quiz = Self::new(config.scale.clone(), rng);
        quiz.debounce = Debouncer::new(Duration::from_millis(config.debounce_ms));
        quiz.button_lock = Duration::from_millis(config.button_lock_ms);
        quiz.auto_advance = config.scale_auto_advance_ms.map(Duration::from_millis);
        quiz
    }

    pub fn with_auto_advance(mut self, delay: Option<Duration>) -> Self {
        self.auto_advance = delay;
        self
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub fn target(&self) -> Option<&[Note]> {
        self.target.as_deref()
    }

    pub fn answer(&self) -> &[Note] {
        &self.answer
    }

    pub fn result(&self) -> Option<Verdict> {
        self.result
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Marks the target as being played back; input is refused meanwhile.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn available_notes(&self) -> Vec<Note> {
        available_notes(self.settings.note_range, self.settings.hand)
    }

    /// Start a new question. Returns `None` while the button lock from the
    /// previous call is still held.
    pub fn generate(&mut self, now: Instant) -> Option<&[Note]> {
        if self.locked_until.is_some_and(|until| now < until) {
            log::debug!("new question ignored, button locked");
            return None;
        }
        self.locked_until = Some(now + self.button_lock);
        self.new_target()
    }

    fn new_target(&mut self) -> Option<&[Note]> {
        let pool = self.available_notes();
        if pool.is_empty() {
            return None;
        }
        let count = self
            .rng
            .random_range(self.settings.min_notes()..=self.settings.max_notes());
        let target: Vec<Note> = (0..count)
            .map(|_| pool[self.rng.random_range(0..pool.len())])
            .collect();

        log::debug!("new scale question with {} notes", target.len());
        self.target = Some(target);
        self.answer.clear();
        self.result = None;
        self.show_answer = false;
        self.advance_at = None;
        self.target.as_deref()
    }

    pub fn handle_input(&mut self, note: Note, now: Instant) -> InputOutcome {
        if !self.debounce.accept(now) {
            return InputOutcome::Rejected(Rejection::Debounced);
        }
        let Some(target_len) = self.target.as_ref().map(Vec::len) else {
            return InputOutcome::Rejected(Rejection::NoQuestion);
        };
        if self.result.is_some() {
            return InputOutcome::Rejected(Rejection::ResultPending);
        }
        if self.playing {
            return InputOutcome::Rejected(Rejection::Playing);
        }
        if !self.available_notes().contains(&note) {
            return InputOutcome::Rejected(Rejection::OutOfRange);
        }

        self.answer.push(note);
        let echo = PlayCue::new(note, ECHO_DURATION, ECHO_VELOCITY);
        if self.answer.len() < target_len {
            return InputOutcome::Accepted { echo, verdict: None };
        }

        let correct = self.target.as_deref() == Some(self.answer.as_slice());
        let verdict = if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        };
        self.result = Some(verdict);
        self.score.record(correct);
        if correct {
            self.advance_at = self.auto_advance.map(|delay| now + delay);
        }

        InputOutcome::Accepted {
            echo,
            verdict: Some(verdict),
        }
    }

    /// Clear the answer so the same question can be tried again.
    pub fn reset_answer(&mut self) {
        self.answer.clear();
        self.result = None;
        self.advance_at = None;
    }

    pub fn toggle_show_answer(&mut self) -> bool {
        self.show_answer = !self.show_answer;
        self.show_answer
    }

    pub fn is_answer_shown(&self) -> bool {
        self.show_answer
    }

    /// Switch hands. An open question is replaced by one for the new hand,
    /// even while the new-question button is locked.
    pub fn set_hand(&mut self, hand: Hand, now: Instant) {
        if self.settings.hand == hand {
            return;
        }
        self.settings.hand = hand;
        if self.target.is_some() {
            self.locked_until = Some(now + self.button_lock);
            self.new_target();
        }
    }

    pub fn set_note_range(&mut self, range: NoteRange) {
        self.settings.note_range = range;
    }

    pub fn set_min_notes(&mut self, min_notes: u8) -> Result<(), ConfigError> {
        self.settings.set_min_notes(min_notes)
    }

    pub fn set_max_notes(&mut self, max_notes: u8) -> Result<(), ConfigError> {
        self.settings.set_max_notes(max_notes)
    }

    /// Keyboard keys outside the current note pool.
    pub fn disabled_notes(&self) -> Vec<Note> {
        let pool = self.available_notes();
        piano_keys()
            .iter()
            .map(|key| key.note)
            .filter(|note| !pool.contains(note))
            .collect()
    }

    /// Fires a pending auto-advance. Returns the new target if one started.
    pub fn tick(&mut self, now: Instant) -> Option<Vec<Note>> {
        match self.advance_at {
            Some(at) if now >= at => {
                self.advance_at = None;
                self.generate(now).map(<[Note]>::to_vec)
            }
            _ => None,
        }
    }

    pub fn keyboard_view(&self) -> KeyboardView {
        KeyboardView {
            active: self.answer.last().copied().into_iter().collect(),
            disabled: self.disabled_notes(),
            answer: self.answer.clone(),
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

    fn quiz() -> ScaleQuiz<StdRng> {
        ScaleQuiz::new(QuizSettings::default(), StdRng::seed_from_u64(5))
    }

    fn with_target(quiz: &mut ScaleQuiz<StdRng>, target: &[&str]) {
        quiz.target = Some(target.iter().map(|s| n(s)).collect());
    }

    fn step(start: Instant, i: u64) -> Instant {
        start + Duration::from_millis(200 * i)
    }

    #[test]
    fn available_notes_per_range_and_hand() {
        let names = |range, hand| -> Vec<String> {
            available_notes(range, hand)
                .iter()
                .map(|n| n.to_string())
                .collect()
        };
        assert_eq!(names(NoteRange::Basic4, Hand::Left), ["C3", "D3", "E3", "F3"]);
        assert_eq!(names(NoteRange::High4, Hand::Right), ["G4", "A4", "B4", "C5"]);
        assert_eq!(names(NoteRange::Diatonic8, Hand::Left).last().unwrap(), "C4");
        assert_eq!(available_notes(NoteRange::All18, Hand::Right).len(), 18);
        assert_eq!(available_notes(NoteRange::White12, Hand::Right).len(), 11);
        assert!(available_notes(NoteRange::White12, Hand::Left)
            .iter()
            .all(|n| n.color() == KeyColor::White));
    }

    #[test]
    fn correct_answer_scores_once() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        with_target(&mut quiz, &["C4", "E4"]);

        assert_eq!(quiz.handle_input(n("C4"), step(t0, 0)).verdict(), None);
        let outcome = quiz.handle_input(n("E4"), step(t0, 1));
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        assert_eq!(quiz.score(), Score { correct: 1, total: 1 });
    }

    #[test]
    fn any_mismatch_is_incorrect() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        with_target(&mut quiz, &["C4", "E4"]);

        quiz.handle_input(n("C4"), step(t0, 0));
        let outcome = quiz.handle_input(n("F4"), step(t0, 1));
        assert_eq!(outcome.verdict(), Some(Verdict::Incorrect));
        assert_eq!(quiz.score(), Score { correct: 0, total: 1 });

        // the round counts once; further input waits for a reset
        assert_eq!(
            quiz.handle_input(n("C4"), step(t0, 2)),
            InputOutcome::Rejected(Rejection::ResultPending)
        );
        quiz.reset_answer();
        quiz.handle_input(n("C4"), step(t0, 3));
        quiz.handle_input(n("E4"), step(t0, 4));
        assert_eq!(quiz.score(), Score { correct: 1, total: 2 });
    }

    #[test]
    fn rapid_duplicate_input_registers_once() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        with_target(&mut quiz, &["C4", "D4", "E4"]);

        assert!(quiz.handle_input(n("C4"), t0).is_accepted());
        assert_eq!(
            quiz.handle_input(n("C4"), t0 + Duration::from_millis(40)),
            InputOutcome::Rejected(Rejection::Debounced)
        );
        assert_eq!(quiz.answer(), &[n("C4")]);
    }

    #[test]
    fn input_gates() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        assert_eq!(
            quiz.handle_input(n("C4"), step(t0, 0)),
            InputOutcome::Rejected(Rejection::NoQuestion)
        );

        with_target(&mut quiz, &["C4"]);
        quiz.set_playing(true);
        assert_eq!(
            quiz.handle_input(n("C4"), step(t0, 1)),
            InputOutcome::Rejected(Rejection::Playing)
        );
        quiz.set_playing(false);

        // basic4 right hand is C4 D4 E4 F4
        assert_eq!(
            quiz.handle_input(n("G4"), step(t0, 2)),
            InputOutcome::Rejected(Rejection::OutOfRange)
        );
        let outcome = quiz.handle_input(n("C4"), step(t0, 3));
        match outcome {
            InputOutcome::Accepted { echo, verdict } => {
                assert_eq!(echo.note, n("C4"));
                assert_eq!(verdict, Some(Verdict::Correct));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn generate_respects_bounds_and_button_lock() {
        let mut quiz = ScaleQuiz::new(
            QuizSettings::new(2, 4, NoteRange::Diatonic8, Hand::Left).unwrap(),
            StdRng::seed_from_u64(9),
        );
        let t0 = Instant::now();
        let pool = quiz.available_notes();

        for i in 0..30 {
            let now = t0 + Duration::from_millis(400 * i);
            let target = quiz.generate(now).expect("lock released").to_vec();
            assert!((2..=4).contains(&target.len()));
            assert!(target.iter().all(|n| pool.contains(n)));
        }

        let last = t0 + Duration::from_millis(400 * 29);
        assert!(quiz.generate(last + Duration::from_millis(100)).is_none());
        assert!(quiz.generate(last + Duration::from_millis(300)).is_some());
    }

    #[test]
    fn generate_clears_previous_round() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.generate(t0);
        quiz.toggle_show_answer();
        let first = quiz.target().unwrap()[0];
        quiz.handle_input(first, t0);
        quiz.generate(t0 + Duration::from_secs(1));
        assert!(quiz.answer().is_empty());
        assert_eq!(quiz.result(), None);
        assert!(!quiz.is_answer_shown());
    }

    #[test]
    fn switching_hand_regenerates_for_the_new_hand() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.set_hand(Hand::Left, t0);
        assert!(quiz.target().is_none());

        quiz.generate(t0 + Duration::from_secs(1));
        quiz.set_hand(Hand::Right, t0 + Duration::from_secs(2));
        let pool = available_notes(NoteRange::Basic4, Hand::Right);
        assert!(quiz.target().unwrap().iter().all(|n| pool.contains(n)));
    }

    #[test]
    fn switching_hand_inside_the_button_lock_still_regenerates() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        quiz.generate(t0).unwrap();
        quiz.set_hand(Hand::Left, t0 + Duration::from_millis(100));

        let pool = available_notes(NoteRange::Basic4, Hand::Left);
        let target = quiz.target().unwrap().to_vec();
        assert!(target.iter().all(|n| pool.contains(n)), "{:?}", target);

        for (i, note) in target.iter().enumerate() {
            let at = t0 + Duration::from_millis(500 + 200 * i as u64);
            assert!(matches!(
                quiz.handle_input(*note, at),
                InputOutcome::Accepted { .. }
            ));
        }
        assert_eq!(quiz.result(), Some(Verdict::Correct));
    }

    #[test]
    fn disabled_notes_are_the_rest_of_the_keyboard() {
        let quiz = quiz();
        let disabled = quiz.disabled_notes();
        assert_eq!(disabled.len(), 42 - 4);
        assert!(!disabled.contains(&n("D4")));
        assert!(disabled.contains(&n("C2")));
    }

    #[test]
    fn auto_advance_after_correct_answer() {
        let mut quiz = quiz().with_auto_advance(Some(Duration::from_secs(2)));
        let t0 = Instant::now();
        with_target(&mut quiz, &["D4"]);
        quiz.handle_input(n("D4"), t0);
        assert_eq!(quiz.result(), Some(Verdict::Correct));

        assert!(quiz.tick(t0 + Duration::from_secs(1)).is_none());
        let next = quiz.tick(t0 + Duration::from_secs(2));
        assert!(next.is_some());
        assert_eq!(quiz.result(), None);
        assert!(quiz.tick(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn keyboard_view_reflects_answer() {
        let mut quiz = quiz();
        let t0 = Instant::now();
        with_target(&mut quiz, &["C4", "E4", "F4"]);
        quiz.handle_input(n("C4"), t0);
        quiz.handle_input(n("E4"), step(t0, 1));
        let view = quiz.keyboard_view();
        assert_eq!(view.active, vec![n("E4")]);
        assert_eq!(view.answer, vec![n("C4"), n("E4")]);
        assert_eq!(view.disabled.len(), 38);
    }
}
