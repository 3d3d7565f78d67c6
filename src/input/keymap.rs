use std::collections::HashSet;

use crate::note::{Hand, Note};

/// Computer keyboard to note table. Bottom two letter rows and the number
/// row cover the low register, the home row and the keys right of it the
/// middle and top.
#[rustfmt::skip]
pub const KEY_MAP: [(char, &str); 42] = [
    ('z', "C2"), ('x', "D2"), ('c', "E2"), ('v', "F2"), ('b', "G2"), ('n', "A2"), ('m', "B2"),
    ('q', "C3"), ('w', "D3"), ('e', "E3"), ('r', "F3"), ('t', "G3"), ('y', "A3"), ('u', "B3"),
    ('1', "C#2"), ('2', "D#2"), ('3', "F#2"), ('4', "G#2"), ('5', "A#2"),
    ('6', "C#3"), ('7', "D#3"), ('8', "F#3"), ('9', "G#3"), ('0', "A#3"),
    ('a', "C4"), ('s', "D4"), ('d', "E4"),
    ('-', "C#4"), ('=', "D#4"),
    ('f', "F4"), ('g', "G4"), ('h', "A4"), ('j', "B4"),
    ('k', "C5"), ('l', "D5"), (';', "E5"), ('\'', "F5"),
    ('[', "F#4"), (']', "G#4"), ('\\', "A#4"), (',', "C#5"), ('.', "D#5"),
];

/// Note for a key regardless of hand.
pub fn note_for_key(key: char) -> Option<Note> {
    let key = key.to_ascii_lowercase();
    KEY_MAP
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, name)| name.parse().ok())
}

/// Note for a key in a hand's subset: octave 4 and below for the left hand,
/// octave 4 and above for the right.
pub fn note_for_key_in_hand(key: char, hand: Hand) -> Option<Note> {
    note_for_key(key).filter(|note| match hand {
        Hand::Left => note.octave() <= 4,
        Hand::Right => note.octave() >= 4,
    })
}

/// Keys a hand can use, in table order.
pub fn keys_for_hand(hand: Hand) -> Vec<(char, Note)> {
    KEY_MAP
        .iter()
        .filter_map(|(key, _)| note_for_key_in_hand(*key, hand).map(|note| (*key, note)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.alt || self.meta || self.shift
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down { key: char, modifiers: Modifiers },
    Up { key: char },
}

impl KeyEvent {
    pub fn down(key: char) -> Self {
        KeyEvent::Down {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn up(key: char) -> Self {
        KeyEvent::Up { key }
    }
}

/// Turns key events into notes for the active hand. A held key produces
/// one note until it is released.
#[derive(Debug, Clone)]
pub struct KeyMapper {
    hand: Hand,
    enabled: bool,
    ignore_modifiers: bool,
    pressed: HashSet<char>,
}

impl KeyMapper {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            enabled: true,
            ignore_modifiers: true,
            pressed: HashSet::new(),
        }
    }

    pub fn with_ignore_modifiers(mut self, ignore: bool) -> Self {
        self.ignore_modifiers = ignore;
        self
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn set_hand(&mut self, hand: Hand) {
        self.hand = hand;
        self.pressed.clear();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pressed.clear();
        }
    }

    pub fn handle(&mut self, event: KeyEvent) -> Option<Note> {
        match event {
            KeyEvent::Up { key } => {
                self.pressed.remove(&key.to_ascii_lowercase());
                None
            }
            KeyEvent::Down { key, modifiers } => {
                if !self.enabled {
                    return None;
                }
                let key = key.to_ascii_lowercase();
                // auto-repeat
                if !self.pressed.insert(key) {
                    return None;
                }
                if self.ignore_modifiers && modifiers.any() {
                    return None;
                }
                note_for_key_in_hand(key, self.hand)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn table_covers_the_whole_layout_once() {
        let mut notes: Vec<Note> = KEY_MAP.iter().map(|(k, _)| note_for_key(*k).unwrap()).collect();
        notes.sort();
        notes.dedup();
        assert_eq!(notes.len(), 42);
        assert_eq!(notes[0], n("C2"));
        assert_eq!(notes[41], n("F5"));
    }

    #[test]
    fn hand_subsets_share_octave_four() {
        assert_eq!(note_for_key_in_hand('z', Hand::Left), Some(n("C2")));
        assert_eq!(note_for_key_in_hand('z', Hand::Right), None);
        assert_eq!(note_for_key_in_hand('a', Hand::Left), Some(n("C4")));
        assert_eq!(note_for_key_in_hand('a', Hand::Right), Some(n("C4")));
        assert_eq!(note_for_key_in_hand('k', Hand::Left), None);
        assert_eq!(note_for_key_in_hand('\'', Hand::Right), Some(n("F5")));
        assert_eq!(note_for_key('A'), Some(n("C4")));
        assert_eq!(note_for_key('p'), None);
    }

    #[test]
    fn held_key_fires_once() {
        let mut mapper = KeyMapper::new(Hand::Right);
        assert_eq!(mapper.handle(KeyEvent::down('g')), Some(n("G4")));
        assert_eq!(mapper.handle(KeyEvent::down('g')), None);
        mapper.handle(KeyEvent::up('g'));
        assert_eq!(mapper.handle(KeyEvent::down('g')), Some(n("G4")));
    }

    #[test]
    fn modifier_chords_are_ignored() {
        let mut mapper = KeyMapper::new(Hand::Left);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        assert_eq!(mapper.handle(KeyEvent::Down { key: 'q', modifiers: ctrl }), None);
        mapper.handle(KeyEvent::up('q'));
        assert_eq!(mapper.handle(KeyEvent::down('q')), Some(n("C3")));

        let mut permissive = KeyMapper::new(Hand::Left).with_ignore_modifiers(false);
        assert_eq!(
            permissive.handle(KeyEvent::Down { key: 'q', modifiers: ctrl }),
            Some(n("C3"))
        );
    }

    #[test]
    fn disabled_mapper_ignores_keys() {
        let mut mapper = KeyMapper::new(Hand::Right);
        mapper.set_enabled(false);
        assert_eq!(mapper.handle(KeyEvent::down('f')), None);
        mapper.set_enabled(true);
        assert_eq!(mapper.handle(KeyEvent::down('f')), Some(n("F4")));
    }
}
