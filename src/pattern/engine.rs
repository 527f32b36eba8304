// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Per-tick step advance for a single pattern (spec section 4.5): swing,
//! probability, ratchet and lookahead scheduling into the sync timer.

use rand::Rng;

use crate::event::MidiEvent;
use crate::pattern::{NoteDestination, Pattern, RatchetStyle, SubnoteMetadata};
use crate::timer::{SyncTimer, Target};

/// Steps of lookahead the engine schedules ahead of the current tick, per
/// spec section 4.5 step 2.
pub const LOOKAHEAD_AMOUNT: i64 = 2;

/// Everything `advance_tick` needs about where a pattern's output goes that
/// isn't itself part of the pattern data.
pub struct AdvanceContext<'a> {
    pub clip_offset: i64,
    pub song_mode_start_offset: i64,
    pub multiplier: u32,
    pub track_index: usize,
    pub target: Target,
    pub channel_candidates: &'a [u8],
}

/// Advances `pattern` for `tick`, scheduling MIDI buffers or clip commands
/// into `timer` for every step boundary within the lookahead window. Returns
/// the number of subnotes actually scheduled (ratchets counted individually),
/// useful for tests and telemetry.
pub fn advance_tick(
    pattern: &Pattern,
    tick: u64,
    ctx: &AdvanceContext,
    timer: &mut SyncTimer,
    rng: &mut impl Rng,
) -> usize {
    if !pattern.enabled {
        return 0;
    }

    let ticks_per_step = pattern.ticks_per_step(ctx.multiplier) as i64;
    if ticks_per_step <= 0 {
        return 0;
    }
    let total_steps = pattern.total_steps().max(1) as i64;

    let next_position = tick as i64 - ctx.clip_offset + ctx.song_mode_start_offset;
    let mut scheduled = 0;

    for lookahead in 0..=LOOKAHEAD_AMOUNT {
        let candidate = next_position + lookahead;
        if candidate < 0 || candidate % ticks_per_step != 0 {
            continue;
        }

        let step_index = candidate / ticks_per_step;
        let normalized_step = step_index.rem_euclid(total_steps) as usize;
        let scheduling_increment = lookahead * ticks_per_step;
        let swing_offset = swing_offset_for_step(normalized_step, ticks_per_step, pattern.swing);

        let step = pattern.step(normalized_step);
        for subnote in &step.subnotes {
            scheduled += schedule_subnote(
                pattern,
                subnote.note,
                &subnote.metadata,
                scheduling_increment,
                swing_offset,
                ticks_per_step,
                ctx,
                timer,
                rng,
            );
        }
    }

    scheduled
}

/// `swing=50` is neutral (spec testable property 2); odd-indexed steps are
/// pushed back by `noteDuration * swing / 100 - noteDuration / 2`.
fn swing_offset_for_step(normalized_step: usize, ticks_per_step: i64, swing: u8) -> i64 {
    if normalized_step % 2 == 0 {
        0
    } else {
        ticks_per_step * swing as i64 / 100 - ticks_per_step / 2
    }
}

fn schedule_subnote(
    pattern: &Pattern,
    note: u8,
    metadata: &SubnoteMetadata,
    scheduling_increment: i64,
    swing_offset: i64,
    ticks_per_step: i64,
    ctx: &AdvanceContext,
    timer: &mut SyncTimer,
    rng: &mut impl Rng,
) -> usize {
    if metadata.probability < 100 && rng.gen_range(0..100u32) >= metadata.probability as u32 {
        return 0;
    }

    let duration = if metadata.duration == 0 {
        ticks_per_step as u32
    } else {
        metadata.duration
    };
    let base_delay = scheduling_increment + metadata.delay as i64 + swing_offset;

    if metadata.ratchet_count == 0 {
        emit_note(pattern, note, metadata.velocity, base_delay, duration, ctx, timer);
        return 1;
    }

    let count = metadata.ratchet_count as i64;
    let (ratchet_delay, ratchet_duration) = ratchet_timing(metadata.ratchet_style, ticks_per_step, duration as i64, count);
    let shares_channel = matches!(
        metadata.ratchet_style,
        RatchetStyle::SplitStepChoke | RatchetStyle::SplitLengthChoke
    );

    let mut emitted = 0;
    for i in 0..count {
        if metadata.ratchet_probability < 100
            && rng.gen_range(0..100u32) >= metadata.ratchet_probability as u32
        {
            continue;
        }
        let delay = base_delay + i * ratchet_delay;
        let channel_delay_key = if shares_channel { base_delay } else { delay };
        emit_note_with_key(
            pattern,
            note,
            metadata.velocity,
            delay,
            ratchet_duration as u32,
            channel_delay_key,
            ctx,
            timer,
        );
        emitted += 1;
    }
    emitted
}

/// Per-style ratchet delay/duration, grounded on `PatternModel.cpp`'s ratchet
/// switch: Overlap styles keep the full note duration per hit (each gets its
/// own channel); Choke styles shrink the duration to the delay so hits share
/// one channel and the previous hit's note-off lands before the next note-on.
fn ratchet_timing(style: RatchetStyle, ticks_per_step: i64, duration: i64, count: i64) -> (i64, i64) {
    let count = count.max(1);
    match style {
        RatchetStyle::SplitStepOverlap => ((ticks_per_step / count).max(1), duration),
        RatchetStyle::SplitStepChoke => {
            let delay = (ticks_per_step / count).max(1);
            (delay, delay)
        }
        RatchetStyle::SplitLengthOverlap => ((duration / count).max(1), duration),
        RatchetStyle::SplitLengthChoke => {
            let delay = (duration / count).max(1);
            (delay, delay)
        }
    }
}

fn emit_note(
    pattern: &Pattern,
    note: u8,
    velocity: u8,
    delay: i64,
    duration: u32,
    ctx: &AdvanceContext,
    timer: &mut SyncTimer,
) {
    emit_note_with_key(pattern, note, velocity, delay, duration, delay, ctx, timer);
}

fn emit_note_with_key(
    pattern: &Pattern,
    note: u8,
    velocity: u8,
    delay: i64,
    duration: u32,
    channel_delay_key: i64,
    ctx: &AdvanceContext,
    timer: &mut SyncTimer,
) {
    let delay = delay.max(0) as u64;
    let channel = timer
        .next_available_channel(ctx.track_index, channel_delay_key, ctx.channel_candidates)
        .unwrap_or(pattern.midi_channel);

    match pattern.destination {
        NoteDestination::SampleTrigger | NoteDestination::SampleSliced => {
            let clip_reference = ctx.track_index as u32;
            timer.schedule_clip_command(
                crate::timer::ClipCommand::start(clip_reference, channel, note),
                delay,
            );
            timer.schedule_clip_command(
                crate::timer::ClipCommand::stop(clip_reference, channel, note),
                delay + duration as u64,
            );
        }
        NoteDestination::Synth | NoteDestination::External => {
            let note_on = MidiEvent::short(&[0x90 | channel, note, velocity.max(1)], 0).unwrap();
            let note_off = MidiEvent::short(&[0x80 | channel, note, 0], 0).unwrap();
            timer.schedule_midi_buffer(vec![note_on], delay, ctx.target);
            timer.schedule_midi_buffer(vec![note_off], delay + duration as u64, ctx.target);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::{NoteLength, RatchetStyle};
    use crate::telemetry::Counters;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn timer() -> SyncTimer {
        SyncTimer::new(128, 48000, 120.0, Arc::new(Counters::new()))
    }

    fn ctx(track_index: usize) -> AdvanceContext<'static> {
        AdvanceContext {
            clip_offset: 0,
            song_mode_start_offset: 0,
            multiplier: 128,
            track_index,
            target: Target::Track(track_index),
            channel_candidates: &[0],
        }
    }

    #[test]
    fn swing_fifty_is_neutral() {
        let ticks_per_step = 8;
        assert_eq!(swing_offset_for_step(1, ticks_per_step, 50), 0);
        assert_eq!(swing_offset_for_step(0, ticks_per_step, 66), 0);
    }

    #[test]
    fn swing_fifty_produces_identical_buffers_to_no_swing() {
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Quarter;
        pattern.swing = 50;
        pattern.step_mut(0).upsert(60, SubnoteMetadata::default());
        pattern.step_mut(1).upsert(61, SubnoteMetadata::default());

        let mut timer_a = timer();
        let mut rng_a = StdRng::seed_from_u64(1);
        advance_tick(&pattern, 8, &ctx(0), &mut timer_a, &mut rng_a);

        let mut no_swing = pattern.clone();
        no_swing.swing = 50;
        let mut timer_b = timer();
        let mut rng_b = StdRng::seed_from_u64(1);
        advance_tick(&no_swing, 8, &ctx(0), &mut timer_b, &mut rng_b);

        let events_a = timer_a.process_cycle(48000);
        let events_b = timer_b.process_cycle(48000);
        assert_eq!(events_a.len(), events_b.len());
    }

    #[test]
    fn ratchet_split_step_choke_produces_n_note_on_off_pairs_on_one_channel() {
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Quarter; // 8 ticks/step at multiplier=128
        let mut meta = SubnoteMetadata::default();
        meta.duration = 96;
        meta.ratchet_count = 4;
        meta.ratchet_style = RatchetStyle::SplitStepChoke;
        pattern.step_mut(0).upsert(60, meta);

        let mut t = timer();
        let mut rng = StdRng::seed_from_u64(7);
        let scheduled = advance_tick(&pattern, 0, &ctx(0), &mut t, &mut rng);
        assert_eq!(scheduled, 4);

        let events = t.process_cycle(48000);
        let mut note_ons = 0;
        let mut note_offs = 0;
        for tick_events in &events {
            for buf in &tick_events.midi_buffers {
                for e in &buf.events {
                    if e.is_note_on() {
                        note_ons += 1;
                    } else if e.is_note_off() {
                        note_offs += 1;
                    }
                }
            }
        }
        assert_eq!(note_ons, 4);
        assert_eq!(note_offs, 4);
    }

    #[test]
    fn ratchet_timing_choke_shares_delay_and_duration() {
        let (delay, duration) = ratchet_timing(RatchetStyle::SplitStepChoke, 8, 96, 4);
        assert_eq!(delay, duration);
    }

    #[test]
    fn ratchet_timing_overlap_keeps_full_duration() {
        let (_delay, duration) = ratchet_timing(RatchetStyle::SplitStepOverlap, 8, 96, 4);
        assert_eq!(duration, 96);
    }

    #[test]
    fn zero_duration_subnote_defaults_to_one_step() {
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Quarter;
        pattern.step_mut(0).upsert(60, SubnoteMetadata::default());

        let mut t = timer();
        let mut rng = StdRng::seed_from_u64(1);
        advance_tick(&pattern, 0, &ctx(0), &mut t, &mut rng);
        let events = t.process_cycle(48000);
        let note_off_tick = events
            .iter()
            .find(|te| te.midi_buffers.iter().any(|b| b.events.iter().any(|e| e.is_note_off())))
            .map(|te| te.tick);
        assert_eq!(note_off_tick, Some(8));
    }
}
