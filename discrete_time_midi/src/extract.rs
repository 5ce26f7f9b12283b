// Event extraction from Standard MIDI Files.
//
// Turns a multi-track SMF into one time-ordered list of `NoteEvent`s with
// absolute times in seconds. The pipeline:
//
// 1. Parse with `midly`. Format 2 (independent sequences) is rejected since
//    its tracks do not share a timeline.
// 2. Per track, accumulate delta ticks into absolute ticks and keep only
//    note-on/note-off messages (velocity-0 note-on counts as note-off).
//    Tempo meta events are collected separately for the tempo map.
// 3. `merge_tracks` k-way merges the per-track streams by absolute tick.
//    Ties keep track order first, then in-track order.
// 4. `pair_notes` enforces the vocabulary invariant that a pitch is never
//    switched on twice without a note-off in between: overlapping note-ons of
//    the same pitch (e.g. on different channels) are folded into a single
//    sounding note that ends when the last overlapping note ends, and
//    note-offs for silent pitches are dropped.
// 5. `TickClock` converts ticks to seconds, either through the tempo map
//    (metrical division) or a fixed SMPTE rate (timecode division).
//
// Merging happens on integer ticks, before any conversion to seconds, so
// event order never depends on floating-point rounding.

use crate::error::{CodecError, Result};
use crate::event::{NoteEvent, NoteKind};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use tracing::{debug, warn};

/// Tempo assumed before the first tempo event (120 BPM).
pub const DEFAULT_TEMPO_US_PER_QUARTER: u32 = 500_000;

/// An item at an absolute tick position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticked<T> {
    pub tick: u64,
    pub item: T,
}

/// A note message stripped of channel and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub kind: NoteKind,
    pub pitch: u8,
}

/// Counts reported by the pairing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingStats {
    /// Note-ons (and their matching note-offs) absorbed into an already
    /// sounding note of the same pitch.
    pub folded: usize,
    /// Note-offs for pitches that were not sounding.
    pub dropped: usize,
}

/// Read a MIDI file and extract its merged note timeline.
pub fn extract(path: &Path) -> Result<Vec<NoteEvent>> {
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes).map_err(|e| e.with_path(path))
}

/// Extract the merged note timeline from an in-memory MIDI file.
pub fn extract_bytes(bytes: &[u8]) -> Result<Vec<NoteEvent>> {
    let smf = Smf::parse(bytes).map_err(|e| malformed(e.to_string()))?;
    if smf.header.format == Format::Sequential {
        warn!(tracks = smf.tracks.len(), "rejecting format 2 MIDI file");
        return Err(malformed(
            "format 2 (sequential) files cannot be merged into one timeline".into(),
        ));
    }

    let clock = TickClock::from_smf(&smf)?;
    let streams: Vec<Vec<Ticked<Note>>> = smf.tracks.iter().map(track_notes).collect();
    let merged = merge_tracks(streams);
    let (paired, stats) = pair_notes(merged);

    let events: Vec<NoteEvent> = paired
        .into_iter()
        .map(|n| NoteEvent {
            kind: n.item.kind,
            pitch: n.item.pitch,
            time: clock.seconds(n.tick),
        })
        .collect();

    debug!(
        format = ?smf.header.format,
        tracks = smf.tracks.len(),
        events = events.len(),
        folded = stats.folded,
        dropped = stats.dropped,
        "extracted note events"
    );
    Ok(events)
}

fn malformed(reason: String) -> CodecError {
    CodecError::MalformedInput { path: None, reason }
}

/// Absolute-tick note messages of one track, in track order.
fn track_notes(track: &Track<'_>) -> Vec<Ticked<Note>> {
    let mut tick: u64 = 0;
    let mut notes = Vec::new();
    for event in track {
        tick += u64::from(event.delta.as_int());
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        let note = match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Note {
                kind: NoteKind::NoteOff,
                pitch: key.as_int(),
            },
            MidiMessage::NoteOn { key, .. } => Note {
                kind: NoteKind::NoteOn,
                pitch: key.as_int(),
            },
            MidiMessage::NoteOff { key, .. } => Note {
                kind: NoteKind::NoteOff,
                pitch: key.as_int(),
            },
            _ => continue,
        };
        notes.push(Ticked { tick, item: note });
    }
    notes
}

/// Absolute-tick tempo changes (µs per quarter) of one track.
fn track_tempos(track: &Track<'_>) -> Vec<Ticked<u32>> {
    let mut tick: u64 = 0;
    let mut tempos = Vec::new();
    for event in track {
        tick += u64::from(event.delta.as_int());
        if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
            tempos.push(Ticked {
                tick,
                item: us.as_int(),
            });
        }
    }
    tempos
}

/// K-way merge of per-track streams, each already sorted by tick.
///
/// The result is sorted by tick. Items at the same tick come out in stream
/// order (lower index first), and items from the same stream keep their
/// relative order.
pub fn merge_tracks<T>(streams: Vec<Vec<Ticked<T>>>) -> Vec<Ticked<T>> {
    let total = streams.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);

    let mut cursors: Vec<std::vec::IntoIter<Ticked<T>>> =
        streams.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<Ticked<T>>> = cursors.iter_mut().map(Iterator::next).collect();

    let mut heap = BinaryHeap::with_capacity(heads.len());
    for (index, head) in heads.iter().enumerate() {
        if let Some(head) = head {
            heap.push(Reverse((head.tick, index)));
        }
    }

    while let Some(Reverse((_, index))) = heap.pop() {
        let Some(item) = heads[index].take() else {
            continue;
        };
        if let Some(next) = cursors[index].next() {
            debug_assert!(next.tick >= item.tick, "track stream not sorted by tick");
            heap.push(Reverse((next.tick, index)));
            heads[index] = Some(next);
        }
        merged.push(item);
    }
    merged
}

/// Enforce on/off pairing per pitch over a time-ordered note stream.
pub fn pair_notes(notes: Vec<Ticked<Note>>) -> (Vec<Ticked<Note>>, PairingStats) {
    let mut depth = [0u32; 128];
    let mut stats = PairingStats::default();
    let mut paired = Vec::with_capacity(notes.len());

    for note in notes {
        let slot = &mut depth[usize::from(note.item.pitch & 0x7F)];
        match note.item.kind {
            NoteKind::NoteOn => {
                *slot += 1;
                if *slot == 1 {
                    paired.push(note);
                } else {
                    stats.folded += 1;
                }
            }
            NoteKind::NoteOff => match *slot {
                0 => stats.dropped += 1,
                1 => {
                    *slot = 0;
                    paired.push(note);
                }
                _ => *slot -= 1,
            },
        }
    }
    (paired, stats)
}

/// One constant-tempo stretch of the tempo map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSegment {
    pub tick: u64,
    /// Seconds elapsed at `tick`.
    pub seconds: f64,
    pub us_per_quarter: u32,
}

/// Tick to seconds conversion for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum TickClock {
    Metrical {
        ticks_per_quarter: u16,
        segments: Vec<TempoSegment>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl TickClock {
    pub fn from_smf(smf: &Smf<'_>) -> Result<Self> {
        match smf.header.timing {
            Timing::Metrical(tpq) => {
                let tempos = merge_tracks(smf.tracks.iter().map(track_tempos).collect());
                Self::metrical(tpq.as_int(), &tempos)
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframes);
                if ticks_per_second <= 0.0 {
                    return Err(malformed("timecode division with zero subframes".into()));
                }
                Ok(TickClock::Timecode { ticks_per_second })
            }
        }
    }

    /// Build a metrical clock from tick-ordered tempo changes.
    pub fn metrical(ticks_per_quarter: u16, tempos: &[Ticked<u32>]) -> Result<Self> {
        if ticks_per_quarter == 0 {
            return Err(malformed("zero ticks per quarter note".into()));
        }
        let tpq = f64::from(ticks_per_quarter);
        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            us_per_quarter: DEFAULT_TEMPO_US_PER_QUARTER,
        }];
        for tempo in tempos {
            let last = segments[segments.len() - 1];
            let seconds = last.seconds
                + (tempo.tick - last.tick) as f64 * f64::from(last.us_per_quarter)
                    / (tpq * 1_000_000.0);
            segments.push(TempoSegment {
                tick: tempo.tick,
                seconds,
                us_per_quarter: tempo.item,
            });
        }
        Ok(TickClock::Metrical {
            ticks_per_quarter,
            segments,
        })
    }

    /// Seconds from the start of the file at an absolute tick.
    pub fn seconds(&self, tick: u64) -> f64 {
        match self {
            TickClock::Metrical {
                ticks_per_quarter,
                segments,
            } => {
                // The last segment starting at or before `tick`. Segments at
                // the same tick resolve to the later tempo event.
                let index = segments.partition_point(|s| s.tick <= tick).saturating_sub(1);
                let segment = segments[index];
                segment.seconds
                    + (tick - segment.tick) as f64 * f64::from(segment.us_per_quarter)
                        / (f64::from(*ticks_per_quarter) * 1_000_000.0)
            }
            TickClock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u24, u28};
    use midly::{Fps, Header, TrackEvent};

    fn ticked<T>(tick: u64, item: T) -> Ticked<T> {
        Ticked { tick, item }
    }

    fn on(pitch: u8) -> Note {
        Note {
            kind: NoteKind::NoteOn,
            pitch,
        }
    }

    fn off(pitch: u8) -> Note {
        Note {
            kind: NoteKind::NoteOff,
            pitch,
        }
    }

    fn midi(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        )
    }

    fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn to_bytes(smf: &Smf<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        smf.write_std(&mut buf).unwrap();
        buf
    }

    #[test]
    fn merge_orders_by_tick_then_track() {
        let streams = vec![
            vec![ticked(0, "a0"), ticked(10, "a1"), ticked(10, "a2")],
            vec![ticked(5, "b0"), ticked(10, "b1")],
            vec![],
            vec![ticked(0, "d0"), ticked(20, "d1")],
        ];
        let merged: Vec<&str> = merge_tracks(streams).into_iter().map(|t| t.item).collect();
        assert_eq!(merged, ["a0", "d0", "b0", "a1", "a2", "b1", "d1"]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge_tracks::<u8>(vec![]).is_empty());
        assert!(merge_tracks::<u8>(vec![vec![], vec![]]).is_empty());
    }

    #[test]
    fn pairing_folds_overlapping_notes() {
        let notes = vec![
            ticked(0, on(60)),
            ticked(5, on(60)),
            ticked(10, off(60)),
            ticked(15, off(60)),
        ];
        let (paired, stats) = pair_notes(notes);
        assert_eq!(paired, vec![ticked(0, on(60)), ticked(15, off(60))]);
        assert_eq!(stats.folded, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn pairing_drops_orphan_note_offs() {
        let notes = vec![ticked(0, off(40)), ticked(1, on(40)), ticked(2, off(40))];
        let (paired, stats) = pair_notes(notes);
        assert_eq!(paired, vec![ticked(1, on(40)), ticked(2, off(40))]);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn pairing_keeps_dangling_note_on() {
        let (paired, _) = pair_notes(vec![ticked(0, on(72))]);
        assert_eq!(paired.len(), 1);
    }

    #[test]
    fn tempo_map_is_piecewise() {
        // 480 tpq: 120 BPM for the first quarter, then 60 BPM.
        let clock = TickClock::metrical(480, &[ticked(480, 1_000_000)]).unwrap();
        assert_eq!(clock.seconds(0), 0.0);
        assert!((clock.seconds(240) - 0.25).abs() < 1e-12);
        assert!((clock.seconds(480) - 0.5).abs() < 1e-12);
        assert!((clock.seconds(960) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn later_tempo_at_same_tick_wins() {
        let clock =
            TickClock::metrical(100, &[ticked(0, 250_000), ticked(0, 1_000_000)]).unwrap();
        assert!((clock.seconds(100) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_ticks_per_quarter_is_malformed() {
        assert!(matches!(
            TickClock::metrical(0, &[]),
            Err(CodecError::MalformedInput { .. })
        ));
    }

    #[test]
    fn extracts_and_merges_parallel_tracks() {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(480)),
        ));
        smf.tracks.push(vec![
            meta(0, MetaMessage::Tempo(u24::new(500_000))),
            meta(0, MetaMessage::EndOfTrack),
        ]);
        smf.tracks.push(vec![
            note_on(0, 60, 100),
            note_off(960, 60),
            meta(0, MetaMessage::EndOfTrack),
        ]);
        smf.tracks.push(vec![
            midi(
                0,
                MidiMessage::ProgramChange {
                    program: u7::new(52),
                },
            ),
            note_on(480, 64, 90),
            // Velocity-0 note-on is a note-off.
            note_on(480, 64, 0),
            meta(0, MetaMessage::EndOfTrack),
        ]);

        let events = extract_bytes(&to_bytes(&smf)).unwrap();
        assert_eq!(
            events,
            vec![
                NoteEvent::on(60, 0.0),
                NoteEvent::on(64, 0.5),
                NoteEvent::off(60, 1.0),
                NoteEvent::off(64, 1.0),
            ]
        );
    }

    #[test]
    fn tempo_in_one_track_applies_to_all() {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(100)),
        ));
        smf.tracks.push(vec![meta(
            0,
            MetaMessage::Tempo(u24::new(1_000_000)),
        )]);
        smf.tracks.push(vec![note_on(200, 50, 64), note_off(100, 50)]);

        let events = extract_bytes(&to_bytes(&smf)).unwrap();
        assert_eq!(events, vec![NoteEvent::on(50, 2.0), NoteEvent::off(50, 3.0)]);
    }

    #[test]
    fn timecode_division_uses_fixed_rate() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Timecode(Fps::Fps25, 40),
        ));
        smf.tracks.push(vec![note_on(1000, 70, 64), note_off(500, 70)]);

        let events = extract_bytes(&to_bytes(&smf)).unwrap();
        assert_eq!(events, vec![NoteEvent::on(70, 1.0), NoteEvent::off(70, 1.5)]);
    }

    #[test]
    fn rejects_sequential_format() {
        let mut smf = Smf::new(Header::new(
            Format::Sequential,
            Timing::Metrical(u15::new(480)),
        ));
        smf.tracks.push(vec![note_on(0, 60, 64)]);
        smf.tracks.push(vec![note_on(0, 62, 64)]);

        assert!(matches!(
            extract_bytes(&to_bytes(&smf)),
            Err(CodecError::MalformedInput { .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        let err = extract_bytes(b"definitely not a midi file").unwrap_err();
        assert!(matches!(err, CodecError::MalformedInput { path: None, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = extract(Path::new("/nonexistent/dir/missing.mid")).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }
}
