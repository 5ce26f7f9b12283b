// MIDI output from decoded note events.
//
// Converts an absolute-time `NoteEvent` list into a single-track Standard
// MIDI File (Format 0): one tempo meta event, the note messages on one
// channel, and an end-of-track marker. Absolute seconds are mapped to the
// nearest output tick, and per-event delta times are re-derived from those
// ticks. A gap wider than one 28-bit delta is bridged with empty marker
// meta events, each carrying the largest delta; readers that skip meta
// events still see the notes at their absolute ticks.
//
// Uses the `midly` crate for MIDI writing. The whole file is assembled in
// memory and written with one `fs::write`, so a failure never leaves a
// partial file behind. Missing output directories are not created.

use crate::config::MidiOutputConfig;
use crate::error::{CodecError, Result};
use crate::event::{NoteEvent, NoteKind};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;
use tracing::{debug, info};

/// Largest delta time a track event can carry (28-bit variable-length).
pub const MAX_DELTA_TICKS: u64 = (1 << 28) - 1;

/// Filler events allowed per file. Bounds the writable range to
/// `MAX_DELTA_TICKS * MAX_FILLER_EVENTS` ticks (about 9 million years at
/// 960 ticks/s).
pub const MAX_FILLER_EVENTS: u64 = 1 << 20;

/// Convert events to MIDI and write to a file.
pub fn write_midi(events: &[NoteEvent], output: &MidiOutputConfig, path: &Path) -> Result<()> {
    let bytes = midi_bytes(events, output)?;
    std::fs::write(path, &bytes)?;
    info!(
        path = %path.display(),
        events = events.len(),
        ticks_per_second = output.ticks_per_second(),
        "wrote MIDI file"
    );
    Ok(())
}

/// Serialize events to the bytes of a Standard MIDI File.
pub fn midi_bytes(events: &[NoteEvent], output: &MidiOutputConfig) -> Result<Vec<u8>> {
    let smf = events_to_smf(events, output)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Output tick nearest to an absolute time. Negative times map to tick 0.
pub fn seconds_to_tick(seconds: f64, ticks_per_second: f64) -> u64 {
    (seconds.max(0.0) * ticks_per_second).round() as u64
}

/// Build an in-memory single-track SMF.
pub fn events_to_smf(events: &[NoteEvent], output: &MidiOutputConfig) -> Result<Smf<'static>> {
    output.validate()?;
    let ticks_per_second = output.ticks_per_second();
    let channel = u4::new(output.channel);
    let velocity = u7::new(output.velocity);

    let mut track: Track<'static> = Vec::with_capacity(events.len() + 2);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(output.tempo_us_per_quarter))),
    });

    let tick_limit = MAX_DELTA_TICKS * MAX_FILLER_EVENTS;
    let mut last_tick: u64 = 0;
    let mut fillers: u64 = 0;
    for (position, event) in events.iter().enumerate() {
        if !event.has_valid_pitch() {
            return Err(CodecError::InvalidPitch {
                pitch: event.pitch,
                position,
            });
        }
        let tick = seconds_to_tick(event.time, ticks_per_second);
        if tick > tick_limit {
            return Err(CodecError::TimeOverflow {
                seconds: event.time,
                tick,
                limit: tick_limit,
            });
        }
        // Out-of-order input is written at the previous event's tick.
        let mut delta = tick.saturating_sub(last_tick);
        while delta > MAX_DELTA_TICKS {
            track.push(TrackEvent {
                delta: u28::new(MAX_DELTA_TICKS as u32),
                kind: TrackEventKind::Meta(MetaMessage::Marker(b"")),
            });
            delta -= MAX_DELTA_TICKS;
            fillers += 1;
        }
        last_tick = last_tick.max(tick);

        let key = u7::new(event.pitch);
        let message = match event.kind {
            NoteKind::NoteOn => MidiMessage::NoteOn { key, vel: velocity },
            NoteKind::NoteOff => MidiMessage::NoteOff {
                key,
                vel: u7::new(0),
            },
        };
        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind: TrackEventKind::Midi { channel, message },
        });
    }
    if fillers > 0 {
        debug!(fillers, "bridged long rests with marker events");
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(output.ticks_per_quarter)),
    ));
    smf.tracks.push(track);
    Ok(smf)
}
