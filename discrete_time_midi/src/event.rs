// Absolute-time note events.
//
// `NoteEvent` is the common currency between the extractor, the codec, and
// the container writer. Times are seconds from the start of the piece. Only
// note-on/note-off survive extraction; velocity is not modeled.

use serde::{Deserialize, Serialize};

/// Highest MIDI note number.
pub const MAX_PITCH: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// A note-on or note-off at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub kind: NoteKind,
    /// MIDI note number, 0..=127.
    pub pitch: u8,
    /// Seconds from the start of the piece.
    pub time: f64,
}

/// Constructors do not check `pitch`. Events above `MAX_PITCH` are rejected
/// with `InvalidPitch` by `DiscreteTimeCodec::encode` and by the container
/// writer; they are never masked into range.
impl NoteEvent {
    pub fn on(pitch: u8, time: f64) -> Self {
        NoteEvent {
            kind: NoteKind::NoteOn,
            pitch,
            time,
        }
    }

    pub fn off(pitch: u8, time: f64) -> Self {
        NoteEvent {
            kind: NoteKind::NoteOff,
            pitch,
            time,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::NoteOn
    }

    pub fn has_valid_pitch(&self) -> bool {
        self.pitch <= MAX_PITCH
    }
}

/// True if event times never decrease.
pub fn is_time_ordered(events: &[NoteEvent]) -> bool {
    events.windows(2).all(|w| w[0].time <= w[1].time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert!(NoteEvent::on(60, 0.0).is_on());
        assert!(!NoteEvent::off(60, 0.5).is_on());
        assert_eq!(NoteEvent::off(61, 0.5).kind, NoteKind::NoteOff);
    }

    #[test]
    fn pitch_range() {
        assert!(NoteEvent::on(0, 0.0).has_valid_pitch());
        assert!(NoteEvent::off(MAX_PITCH, 0.0).has_valid_pitch());
        assert!(!NoteEvent::on(128, 0.0).has_valid_pitch());
        assert!(!NoteEvent::off(200, 0.0).has_valid_pitch());
    }

    #[test]
    fn time_ordering() {
        let ordered = [
            NoteEvent::on(60, 0.0),
            NoteEvent::on(64, 0.0),
            NoteEvent::off(60, 1.0),
        ];
        assert!(is_time_ordered(&ordered));
        assert!(is_time_ordered(&[]));

        let unordered = [NoteEvent::on(60, 1.0), NoteEvent::off(60, 0.5)];
        assert!(!is_time_ordered(&unordered));
    }
}
