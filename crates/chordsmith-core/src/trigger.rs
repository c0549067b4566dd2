//! Live chord triggering from incoming note-ons
//!
//! Runs alongside the progression queue without sharing any of its state.
//! A degree cursor steps through the progression once per chord length of
//! elapsed block time; every incoming note-on is replaced by the chord of the
//! current degree. Everything else passes through untouched.

use fastrand::Rng;
use tracing::trace;

use crate::humanize::{Humanizer, ms_to_samples};
use crate::midi::{LIVE_CHANNEL, MidiEvent, MidiMessage};
use crate::scheduler::TimedEvent;
use crate::settings::GeneratorSettings;

/// Degree-stepping phase and not-yet-delivered chord notes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerState {
    /// Index into the resolved degree sequence
    pub degree_index: usize,
    /// Samples left before stepping to the next degree; unset until the
    /// first block arrives
    pub samples_until_advance: Option<i64>,
    /// Samples processed so far
    pub elapsed: i64,
    /// Generated events that fall in later blocks, on the `elapsed` clock
    pub pending: Vec<TimedEvent>,
}

/// Result of one processed block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerOutput {
    /// Pass-through and generated events, ordered by position
    pub events: Vec<MidiEvent>,
    /// Most recent chord triggered in this block, if any
    pub last_chord: Option<Vec<u8>>,
}

/// Replaces incoming note-ons with diatonic chords
#[derive(Debug, Clone)]
pub struct ChordTrigger {
    sample_rate: f64,
    state: TriggerState,
}

impl ChordTrigger {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            state: TriggerState::default(),
        }
    }

    /// Resume from an existing state.
    pub fn with_state(sample_rate: f64, state: TriggerState) -> Self {
        Self { sample_rate, state }
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    pub fn into_state(self) -> TriggerState {
        self.state
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.state = TriggerState::default();
    }

    /// Process one block of `num_samples` with the host's `incoming` events.
    pub fn process(
        &mut self,
        settings: &GeneratorSettings,
        incoming: &[MidiEvent],
        num_samples: u32,
        rng: &mut Rng,
    ) -> TriggerOutput {
        let degrees = settings.degrees();
        let chord_len = ms_to_samples(self.sample_rate, settings.note_length_ms as f64);
        let humanizer = Humanizer::new(self.sample_rate, settings.humanize_ms, settings.humanize_velocity);
        let block = num_samples as i64;

        let state = &mut self.state;
        state.degree_index %= degrees.len();

        let remaining = state.samples_until_advance.unwrap_or(chord_len) - block;
        if remaining <= 0 {
            state.degree_index = (state.degree_index + 1) % degrees.len();
            state.samples_until_advance = Some(chord_len);
        } else {
            state.samples_until_advance = Some(remaining);
        }

        let mut output = TriggerOutput::default();

        for event in incoming {
            if !event.is_note_on() {
                output.events.push(*event);
                continue;
            }

            let degree = degrees[state.degree_index];
            let chord = settings.chord_for_degree(degree);
            let position = event.sample_offset as i64;

            for &pitch in &chord {
                let velocity = humanizer.velocity(settings.velocity, rng);
                // Note length runs from the jittered start, before clamping
                let on_raw = position + humanizer.timing(rng);
                let on_at = on_raw.max(0);
                let off_at = (on_raw + chord_len + humanizer.timing(rng)).max(0);

                state.pending.push(TimedEvent {
                    offset: state.elapsed + on_at,
                    channel: LIVE_CHANNEL,
                    message: MidiMessage::NoteOn { pitch, velocity },
                });
                state.pending.push(TimedEvent {
                    offset: state.elapsed + off_at,
                    channel: LIVE_CHANNEL,
                    message: MidiMessage::NoteOff { pitch },
                });
            }

            trace!(degree, position, notes = chord.len(), "Triggered chord");
            output.last_chord = Some(chord);
        }

        let block_end = state.elapsed + block;
        let elapsed = state.elapsed;
        state.pending.retain(|event| {
            if event.offset >= block_end {
                return true;
            }
            let position = (event.offset - elapsed).max(0) as u32;
            output.events.push(MidiEvent::new(event.channel, position, event.message));
            false
        });

        output.events.sort_by_key(|e| e.sample_offset);
        state.elapsed = block_end;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ProgressionPreset;

    const SR: f64 = 1000.0;

    fn settings() -> GeneratorSettings {
        // 1 sample per ms keeps the arithmetic readable
        GeneratorSettings {
            preset: ProgressionPreset::TwoFiveOne,
            note_length_ms: 100,
            ..Default::default()
        }
    }

    fn note_ons(events: &[MidiEvent]) -> Vec<u8> {
        events
            .iter()
            .filter(|e| e.is_note_on())
            .filter_map(|e| e.pitch())
            .collect()
    }

    #[test]
    fn test_note_on_becomes_chord() {
        let s = settings();
        let mut trigger = ChordTrigger::new(SR);
        let incoming = [MidiEvent::note_on(1, 30, 100, 7)];
        let out = trigger.process(&s, &incoming, 64, &mut Rng::with_seed(1));

        // First degree of ii-V-I
        let expected = s.chord_for_degree(2);
        assert_eq!(note_ons(&out.events), expected);
        assert!(out.events.iter().filter(|e| e.is_note_on()).all(|e| e.sample_offset == 7));
        assert!(out.events.iter().all(|e| e.channel == LIVE_CHANNEL));
        assert_eq!(out.last_chord, Some(expected));
        // Note-offs land in a later block
        assert_eq!(trigger.state().pending.len(), 3);
    }

    #[test]
    fn test_other_events_pass_through() {
        let mut trigger = ChordTrigger::new(SR);
        let incoming = [
            MidiEvent::new(1, 3, MidiMessage::ControlChange { controller: 1, value: 64 }),
            MidiEvent::note_off(1, 30, 10),
            MidiEvent::new(1, 12, MidiMessage::Clock),
        ];
        let out = trigger.process(&settings(), &incoming, 64, &mut Rng::with_seed(1));
        assert_eq!(out.events, incoming.to_vec());
        assert_eq!(out.last_chord, None);
    }

    #[test]
    fn test_note_offs_delivered_in_later_block() {
        let s = settings();
        let mut trigger = ChordTrigger::new(SR);
        let mut rng = Rng::with_seed(1);
        trigger.process(&s, &[MidiEvent::note_on(1, 30, 100, 10)], 64, &mut rng);

        // Chord started at 10, lasts 100: off at 110 = block [64, 128) pos 46
        let out = trigger.process(&s, &[], 64, &mut rng);
        assert_eq!(out.events.len(), 3);
        assert!(out.events.iter().all(|e| !e.is_note_on() && e.sample_offset == 46));
        assert!(trigger.state().pending.is_empty());
    }

    #[test]
    fn test_degree_advances_with_elapsed_time() {
        let s = settings();
        let mut trigger = ChordTrigger::new(SR);
        let mut rng = Rng::with_seed(1);

        // 50 samples per block, 100 per chord: steps every second block
        assert_eq!(trigger.process(&s, &[], 50, &mut rng).events.len(), 0);
        assert_eq!(trigger.state().degree_index, 0);
        trigger.process(&s, &[], 50, &mut rng);
        assert_eq!(trigger.state().degree_index, 1);
        trigger.process(&s, &[], 50, &mut rng);
        assert_eq!(trigger.state().degree_index, 1);
        trigger.process(&s, &[], 50, &mut rng);
        assert_eq!(trigger.state().degree_index, 2);
        trigger.process(&s, &[], 100, &mut rng);
        assert_eq!(trigger.state().degree_index, 0);

        let out = trigger.process(&s, &[MidiEvent::note_on(1, 60, 90, 0)], 50, &mut rng);
        assert_eq!(out.last_chord, Some(s.chord_for_degree(2)));
    }

    #[test]
    fn test_shrinking_progression_keeps_index_valid() {
        let long = GeneratorSettings {
            preset: ProgressionPreset::Custom,
            custom_progression: "1-2-3-4-5-6-7".to_string(),
            note_length_ms: 10,
            ..Default::default()
        };
        let mut rng = Rng::with_seed(4);
        let mut trigger = ChordTrigger::with_state(
            SR,
            TriggerState { degree_index: 6, ..Default::default() },
        );
        let short = GeneratorSettings { custom_progression: "5".to_string(), ..long.clone() };
        let out = trigger.process(&short, &[MidiEvent::note_on(1, 60, 90, 0)], 4, &mut rng);
        assert_eq!(out.last_chord, Some(short.chord_for_degree(5)));
        assert_eq!(trigger.into_state().degree_index, 0);
    }

    #[test]
    fn test_humanized_offsets_never_negative() {
        let s = GeneratorSettings { humanize_ms: 25, humanize_velocity: 15, ..settings() };
        let mut trigger = ChordTrigger::new(SR);
        let mut rng = Rng::with_seed(8);
        let mut total = 0;
        for _ in 0..10 {
            let out = trigger.process(&s, &[MidiEvent::note_on(1, 60, 90, 0)], 32, &mut rng);
            assert!(out.events.windows(2).all(|w| w[0].sample_offset <= w[1].sample_offset));
            assert!(out.events.iter().all(|e| e.sample_offset < 32));
            total += out.events.len();
        }
        for _ in 0..10 {
            total += trigger.process(&s, &[], 32, &mut rng).events.len();
        }
        assert_eq!(total, 10 * 2 * s.chord_for_degree(2).len());
    }

    #[test]
    fn test_note_off_measured_from_unclamped_start() {
        // Timing jitter only, so each note draws exactly (on, off)
        let s = GeneratorSettings { humanize_ms: 25, ..settings() };
        for seed in 0..32 {
            let mut trigger = ChordTrigger::new(SR);
            let out = trigger.process(&s, &[MidiEvent::note_on(1, 60, 90, 0)], 200, &mut Rng::with_seed(seed));

            let mut mirror = Rng::with_seed(seed);
            for pitch in s.chord_for_degree(2) {
                let on = mirror.i64(-25..=25);
                let off = mirror.i64(-25..=25);
                let on_at = out.events.iter().find(|e| e.is_note_on() && e.pitch() == Some(pitch)).unwrap();
                let off_at = out.events.iter().find(|e| !e.is_note_on() && e.pitch() == Some(pitch)).unwrap();
                assert_eq!(on_at.sample_offset as i64, on.max(0));
                assert_eq!(off_at.sample_offset as i64, (on + 100 + off).max(0), "seed {seed}");
            }
        }
    }
}
