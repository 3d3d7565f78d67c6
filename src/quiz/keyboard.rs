use serde::Serialize;
use std::sync::OnceLock;

use crate::note::{Hand, KeyColor, Note};

/// Which hand mode a key belongs to. `Both` keys sit in the middle and are
/// reachable from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandRegion {
    Left,
    Both,
    Right,
}

impl HandRegion {
    pub fn for_note(note: Note) -> Self {
        if note.octave() <= 3 {
            HandRegion::Left
        } else if note <= Note::new(4, 4) {
            // up to E4
            HandRegion::Both
        } else {
            HandRegion::Right
        }
    }

    pub fn includes(self, hand: Hand) -> bool {
        match self {
            HandRegion::Both => true,
            HandRegion::Left => hand == Hand::Left,
            HandRegion::Right => hand == Hand::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PianoKey {
    pub note: Note,
    pub color: KeyColor,
    pub region: HandRegion,
}

/// Lowest and highest key on the quiz keyboard.
pub fn key_range() -> (Note, Note) {
    (Note::new(0, 2), Note::new(5, 5))
}

/// Every key from C2 to F5, lowest first.
pub fn piano_keys() -> &'static [PianoKey] {
    static KEYS: OnceLock<Vec<PianoKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        let (low, high) = key_range();
        let mut keys = Vec::new();
        let mut note = low;
        while note <= high {
            keys.push(PianoKey {
                note,
                color: note.color(),
                region: HandRegion::for_note(note),
            });
            note = note.transpose(1);
        }
        keys
    })
}

/// Keys a hand mode can use: its own region plus the shared middle.
pub fn keys_for_hand(hand: Hand) -> impl Iterator<Item = &'static PianoKey> {
    piano_keys().iter().filter(move |key| key.region.includes(hand))
}

pub fn is_on_keyboard(note: Note) -> bool {
    let (low, high) = key_range();
    (low..=high).contains(&note)
}

/// What a keyboard renderer needs to draw the current quiz state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyboardView {
    pub active: Vec<Note>,
    pub disabled: Vec<Note>,
    pub answer: Vec<Note>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn layout_spans_c2_to_f5() {
        let keys = piano_keys();
        assert_eq!(keys.len(), 42);
        assert_eq!(keys[0].note, n("C2"));
        assert_eq!(keys[41].note, n("F5"));
        assert_eq!(keys.iter().filter(|k| k.color == KeyColor::Black).count(), 17);
    }

    #[test]
    fn regions_split_at_the_middle() {
        assert_eq!(HandRegion::for_note(n("B3")), HandRegion::Left);
        assert_eq!(HandRegion::for_note(n("C4")), HandRegion::Both);
        assert_eq!(HandRegion::for_note(n("E4")), HandRegion::Both);
        assert_eq!(HandRegion::for_note(n("F4")), HandRegion::Right);

        assert_eq!(keys_for_hand(Hand::Right).count(), 18);
        assert_eq!(keys_for_hand(Hand::Left).count(), 29);
        assert!(keys_for_hand(Hand::Left).any(|k| k.note == n("D#4")));
        assert!(!keys_for_hand(Hand::Left).any(|k| k.note == n("F4")));
    }

    #[test]
    fn keyboard_bounds() {
        assert!(is_on_keyboard(n("C2")));
        assert!(is_on_keyboard(n("F5")));
        assert!(!is_on_keyboard(n("F#5")));
        assert!(!is_on_keyboard(n("B1")));
    }
}
