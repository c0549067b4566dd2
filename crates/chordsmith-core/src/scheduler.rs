//! Progression queue: timed note events delivered block by block

use std::cmp::Ordering;

use fastrand::Rng;
use tracing::{debug, trace};

use crate::humanize::{Humanizer, ms_to_samples};
use crate::midi::{MidiEvent, MidiMessage, QUEUE_CHANNEL};
use crate::settings::GeneratorSettings;

/// Lifecycle of the progression queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing built yet
    Idle,
    /// Built (or paused) with events left to deliver
    Built,
    Playing,
    /// Every event has been delivered
    Exhausted,
}

/// A note event positioned on the queue's own timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedEvent {
    /// Samples from the start of the queue
    pub offset: i64,
    pub channel: u8,
    pub message: MidiMessage,
}

impl TimedEvent {
    /// Note-offs sort ahead of note-ons that share an offset, so a repeated
    /// pitch is released before it is struck again.
    fn order(&self, other: &Self) -> Ordering {
        fn rank(m: &MidiMessage) -> (u8, u8) {
            match *m {
                MidiMessage::NoteOff { pitch } => (0, pitch),
                MidiMessage::NoteOn { pitch, .. } => (1, pitch),
                _ => (2, 0),
            }
        }
        self.offset
            .cmp(&other.offset)
            .then_with(|| rank(&self.message).cmp(&rank(&other.message)))
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Sorted events plus the delivery cursor.
///
/// Delivery only moves forward: `next_index` and `sample_cursor` never
/// rewind until the queue is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<TimedEvent>,
    next_index: usize,
    sample_cursor: i64,
    playing: bool,
    built: bool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue wholesale. Events are sorted by offset; the cursor
    /// is rewound and playback is left stopped.
    pub fn load(&mut self, mut events: Vec<TimedEvent>) {
        events.sort_by(TimedEvent::order);
        self.events = events;
        self.next_index = 0;
        self.sample_cursor = 0;
        self.playing = false;
        self.built = true;
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn sample_cursor(&self) -> i64 {
        self.sample_cursor
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Rewind the cursor and stop without dropping the events.
    pub fn rewind(&mut self) {
        self.next_index = 0;
        self.sample_cursor = 0;
        self.playing = false;
    }

    pub fn state(&self) -> PlaybackState {
        if self.playing {
            PlaybackState::Playing
        } else if !self.built {
            PlaybackState::Idle
        } else if self.next_index >= self.events.len() {
            PlaybackState::Exhausted
        } else {
            PlaybackState::Built
        }
    }

    /// Deliver every event in `[cursor, cursor + num_samples)` into `out`,
    /// positioned relative to the block start.
    ///
    /// When stopped or empty the cursor still advances. An event behind the
    /// cursor is delivered at position 0 only on the very first block, and
    /// dropped otherwise.
    pub fn dispatch(&mut self, num_samples: u32, out: &mut Vec<MidiEvent>) {
        let block_start = self.sample_cursor;
        let block_end = block_start + num_samples as i64;
        self.sample_cursor = block_end;

        if !self.playing || self.events.is_empty() {
            return;
        }

        let first = self.next_index;
        while let Some(event) = self.events.get(self.next_index) {
            if event.offset >= block_end {
                break;
            }
            if event.offset >= block_start {
                let position = (event.offset - block_start) as u32;
                out.push(MidiEvent::new(event.channel, position, event.message));
            } else if block_start == 0 {
                out.push(MidiEvent::new(event.channel, 0, event.message));
            }
            self.next_index += 1;
        }

        trace!(block_start, block_end, delivered = self.next_index - first, "Queue dispatch");

        if self.next_index >= self.events.len() {
            self.playing = false;
            debug!(cursor = self.sample_cursor, "Progression queue exhausted");
        }
    }
}

// ============================================================================
// Progression Engine
// ============================================================================

/// Builds a humanized progression into an [`EventQueue`] and plays it out.
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    sample_rate: f64,
    queue: EventQueue,
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl ProgressionEngine {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            queue: EventQueue::new(),
        }
    }

    /// Adopt a new sample rate and stop playback.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.queue.rewind();
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Length of one chord in samples.
    pub fn chord_length_samples(&self, settings: &GeneratorSettings) -> i64 {
        ms_to_samples(self.sample_rate, settings.note_length_ms as f64)
    }

    /// Rebuild the queue from `settings`, discarding anything not yet
    /// delivered. Returns the chords that were queued, in order.
    pub fn build(&mut self, settings: &GeneratorSettings, rng: &mut Rng) -> Vec<Vec<u8>> {
        let chord_len = self.chord_length_samples(settings);
        let humanizer = Humanizer::new(self.sample_rate, settings.humanize_ms, settings.humanize_velocity);

        let chords = settings.chords();
        let mut events = Vec::with_capacity(chords.iter().map(|c| c.len() * 2).sum());
        let mut cursor = 0i64;

        for chord in &chords {
            for &pitch in chord {
                let velocity = humanizer.velocity(settings.velocity, rng);
                let on_jitter = humanizer.timing(rng);
                let off_jitter = humanizer.timing(rng);

                events.push(TimedEvent {
                    offset: (cursor + on_jitter).max(0),
                    channel: QUEUE_CHANNEL,
                    message: MidiMessage::NoteOn { pitch, velocity },
                });
                events.push(TimedEvent {
                    offset: (cursor + chord_len + off_jitter).max(0),
                    channel: QUEUE_CHANNEL,
                    message: MidiMessage::NoteOff { pitch },
                });
            }
            cursor += chord_len;
        }

        debug!(
            chords = chords.len(),
            events = events.len(),
            chord_len,
            "Built progression queue"
        );
        self.queue.load(events);
        chords
    }

    pub fn start_playback(&mut self) {
        self.queue.start();
    }

    pub fn stop_playback(&mut self) {
        self.queue.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.queue.is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.queue.state()
    }

    pub fn dispatch(&mut self, num_samples: u32, out: &mut Vec<MidiEvent>) {
        self.queue.dispatch(num_samples, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ProgressionPreset;

    fn settings() -> GeneratorSettings {
        GeneratorSettings {
            preset: ProgressionPreset::OneFiveSixFour,
            note_length_ms: 600,
            ..Default::default()
        }
    }

    fn note_on_at(offset: i64, pitch: u8) -> TimedEvent {
        TimedEvent { offset, channel: QUEUE_CHANNEL, message: MidiMessage::NoteOn { pitch, velocity: 100 } }
    }

    /// (absolute offset, channel, message) seen when delivering in blocks of `sizes`.
    fn collect(
        engine: &mut ProgressionEngine,
        sizes: impl Iterator<Item = u32>,
    ) -> Vec<(i64, u8, MidiMessage)> {
        let mut seen = Vec::new();
        for size in sizes {
            let start = engine.queue().sample_cursor();
            let mut out = Vec::new();
            engine.dispatch(size, &mut out);
            seen.extend(out.into_iter().map(|e| (start + e.sample_offset as i64, e.channel, e.message)));
            if !engine.is_playing() {
                break;
            }
        }
        seen
    }

    #[test]
    fn test_build_without_humanize() {
        let mut engine = ProgressionEngine::new(44100.0);
        let mut rng = Rng::with_seed(1);
        let chords = engine.build(&settings(), &mut rng);
        let notes_per_chord = chords[0].len();

        let events = engine.queue().events();
        assert_eq!(events.len(), 2 * notes_per_chord * 4);
        assert_eq!(events[0].offset, 0);
        assert!(matches!(events[0].message, MidiMessage::NoteOn { .. }));
        assert!(events.windows(2).all(|w| w[0].offset <= w[1].offset));
        assert!(events.iter().all(|e| e.channel == QUEUE_CHANNEL));

        for (i, chord) in chords.iter().enumerate() {
            let on = 26460 * i as i64;
            for &pitch in chord {
                assert!(events.contains(&TimedEvent {
                    offset: on,
                    channel: QUEUE_CHANNEL,
                    message: MidiMessage::NoteOn { pitch, velocity: 96 },
                }));
                assert!(events.contains(&TimedEvent {
                    offset: on + 26460,
                    channel: QUEUE_CHANNEL,
                    message: MidiMessage::NoteOff { pitch },
                }));
            }
        }
        assert_eq!(engine.state(), PlaybackState::Built);
    }

    #[test]
    fn test_note_off_sorts_before_note_on() {
        let mut engine = ProgressionEngine::new(44100.0);
        engine.build(&settings(), &mut Rng::with_seed(1));
        let at_boundary: Vec<_> = engine.queue().events().iter().filter(|e| e.offset == 26460).collect();
        let first_on = at_boundary.iter().position(|e| matches!(e.message, MidiMessage::NoteOn { .. })).unwrap();
        assert!(at_boundary[..first_on].iter().all(|e| matches!(e.message, MidiMessage::NoteOff { .. })));
        assert!(at_boundary[first_on..].iter().all(|e| matches!(e.message, MidiMessage::NoteOn { .. })));
    }

    #[test]
    fn test_humanized_build_stays_non_negative_and_sorted() {
        let humanized = GeneratorSettings { humanize_ms: 25, humanize_velocity: 15, ..settings() };
        let mut engine = ProgressionEngine::new(48000.0);
        engine.build(&humanized, &mut Rng::with_seed(5));
        let events = engine.queue().events();
        assert!(events.iter().all(|e| e.offset >= 0));
        assert!(events.windows(2).all(|w| w[0].offset <= w[1].offset));
    }

    #[test]
    fn test_block_split_matches_single_call() {
        let humanized = GeneratorSettings { humanize_ms: 20, humanize_velocity: 10, ..settings() };

        let mut split = ProgressionEngine::new(44100.0);
        split.build(&humanized, &mut Rng::with_seed(11));
        let total = split.queue().events().last().unwrap().offset as u32 + 1;
        split.start_playback();

        let mut whole = split.clone();

        let by_blocks = collect(&mut split, std::iter::repeat(512));
        let at_once = collect(&mut whole, std::iter::once(total));

        assert_eq!(by_blocks.len(), split.queue().len());
        assert_eq!(by_blocks, at_once);
    }

    #[test]
    fn test_uneven_blocks_deliver_everything_once() {
        let mut engine = ProgressionEngine::new(44100.0);
        engine.build(&settings(), &mut Rng::with_seed(3));
        engine.start_playback();
        let sizes = [64u32, 1, 4096, 333, 26460, 7].into_iter().cycle();
        let seen = collect(&mut engine, sizes);
        let expected: Vec<i64> = engine.queue().events().iter().map(|e| e.offset).collect();
        let delivered: Vec<i64> = seen.iter().map(|(abs, _, _)| *abs).collect();
        assert_eq!(delivered, expected);
    }

    #[test]
    fn test_exhaustion_stops_and_cursor_keeps_moving() {
        let mut engine = ProgressionEngine::new(44100.0);
        engine.build(&settings(), &mut Rng::with_seed(3));
        engine.start_playback();
        assert_eq!(engine.state(), PlaybackState::Playing);

        let mut out = Vec::new();
        engine.dispatch(200_000, &mut out);
        assert_eq!(out.len(), engine.queue().len());
        assert!(!engine.is_playing());
        assert_eq!(engine.state(), PlaybackState::Exhausted);

        out.clear();
        engine.dispatch(512, &mut out);
        assert!(out.is_empty());
        assert_eq!(engine.queue().sample_cursor(), 200_512);
    }

    #[test]
    fn test_idle_dispatch_advances_cursor() {
        let mut engine = ProgressionEngine::new(44100.0);
        assert_eq!(engine.state(), PlaybackState::Idle);
        let mut out = Vec::new();
        engine.dispatch(512, &mut out);
        engine.dispatch(512, &mut out);
        assert!(out.is_empty());
        assert_eq!(engine.queue().sample_cursor(), 1024);
    }

    #[test]
    fn test_stop_pauses_without_touching_queue() {
        let mut engine = ProgressionEngine::new(44100.0);
        engine.build(&settings(), &mut Rng::with_seed(3));
        engine.start_playback();
        let mut out = Vec::new();
        engine.dispatch(512, &mut out);
        let delivered = engine.queue().next_index();
        assert!(delivered > 0);

        engine.stop_playback();
        engine.dispatch(512, &mut out);
        assert_eq!(engine.queue().next_index(), delivered);
        assert_eq!(engine.state(), PlaybackState::Built);
    }

    #[test]
    fn test_rebuild_discards_tail() {
        let mut engine = ProgressionEngine::new(44100.0);
        let mut rng = Rng::with_seed(3);
        engine.build(&settings(), &mut rng);
        engine.start_playback();
        engine.dispatch(30_000, &mut Vec::new());

        engine.build(&settings(), &mut rng);
        assert_eq!(engine.queue().next_index(), 0);
        assert_eq!(engine.queue().sample_cursor(), 0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_events_behind_cursor_only_clamped_on_first_block() {
        let mut queue = EventQueue::new();
        queue.load(vec![note_on_at(-10, 60), note_on_at(5, 64)]);
        queue.start();
        let mut out = Vec::new();
        queue.dispatch(8, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sample_offset, 0);
        assert_eq!(out[1].sample_offset, 5);

        // Same situation once the cursor has moved on: the late event is skipped
        let mut late = EventQueue::new();
        late.load(vec![note_on_at(-10, 60), note_on_at(20, 64)]);
        late.dispatch(16, &mut Vec::new());
        late.start();
        let mut out = Vec::new();
        late.dispatch(16, &mut out);
        assert_eq!(out, vec![MidiEvent::note_on(QUEUE_CHANNEL, 64, 100, 4)]);
    }
}
