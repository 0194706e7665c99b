//! Session playback
//!
//! Loads a whole session into memory and replays it against a logical
//! clock. Each advance yields the entry in effect at the current logical
//! time (last-known-value), so playback rate and tick rate are independent
//! of the rate the session was recorded at.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{SessionEntry, SessionError, SessionHeader};

/// Minimum playback speed; requests at or below zero clamp here.
const MIN_SPEED: f64 = 0.01;

/// Current playback position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    /// Index of the entry currently in effect
    pub position: usize,

    /// Logical session time in seconds
    pub logical_time_s: f64,

    /// Playback speed multiplier
    pub speed: f64,

    /// False once the final entry has been delivered
    pub playing: bool,
}

/// Result of advancing the playback clock.
#[derive(Debug, PartialEq)]
pub enum PlaybackStep<'a> {
    /// The entry in effect at the current logical time
    Entry(&'a SessionEntry),

    /// Playback has passed the final entry
    End,
}

pub struct SessionPlayer {
    header: SessionHeader,
    entries: Vec<SessionEntry>,
    logical_time_s: f64,
    speed: f64,
    finished: bool,
}

impl SessionPlayer {
    /// Load a session file. A missing or unparseable header is fatal;
    /// malformed entry lines are skipped with a warning so one corrupt
    /// line does not lose the rest of a recording.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = match lines.next() {
            Some(line) => line?,
            None => return Err(SessionError::CorruptHeader("empty file".to_string())),
        };
        let header: SessionHeader = serde_json::from_str(&header_line)
            .map_err(|e| SessionError::CorruptHeader(e.to_string()))?;

        let mut entries: Vec<SessionEntry> = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionEntry>(&line) {
                Ok(entry) => {
                    // Ordering is enforced at load so advance can binary-search
                    if entries
                        .last()
                        .is_some_and(|prev| entry.timestamp_s < prev.timestamp_s)
                    {
                        log::warn!(
                            "{}: entry {} goes backwards in time, skipping",
                            path.display(),
                            index + 2
                        );
                        skipped += 1;
                        continue;
                    }
                    entries.push(entry);
                }
                Err(e) => {
                    log::warn!("{}: skipping malformed line {}: {e}", path.display(), index + 2);
                    skipped += 1;
                }
            }
        }

        log::info!(
            "loaded session {} ({} entries, {} skipped)",
            path.display(),
            entries.len(),
            skipped
        );

        Ok(Self {
            header,
            entries,
            logical_time_s: 0.0,
            speed: 1.0,
            finished: false,
        })
    }

    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamp of the final entry, or 0 for an empty session.
    pub fn duration_s(&self) -> f64 {
        self.entries.last().map_or(0.0, |e| e.timestamp_s)
    }

    pub fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            position: self.position(),
            logical_time_s: self.logical_time_s,
            speed: self.speed,
            playing: !self.finished && !self.entries.is_empty(),
        }
    }

    /// Set the playback speed. Non-finite or non-positive requests clamp
    /// to a small positive minimum.
    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() || speed <= 0.0 {
            log::warn!("invalid playback speed {speed}, clamping to {MIN_SPEED}");
            self.speed = MIN_SPEED;
        } else {
            self.speed = speed;
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Jump the logical clock to `time_s`, clamped to the session's span.
    /// Seeking un-finishes a finished player.
    pub fn seek(&mut self, time_s: f64) {
        let target = if time_s.is_finite() { time_s } else { 0.0 };
        self.logical_time_s = target.clamp(0.0, self.duration_s());
        self.finished = false;
    }

    /// Advance the logical clock by `wall_dt` seconds of wall time and
    /// return the entry in effect. Past the final entry the player yields
    /// that entry one last time, then [`PlaybackStep::End`] until a seek.
    pub fn advance(&mut self, wall_dt: f64) -> PlaybackStep<'_> {
        if self.entries.is_empty() || self.finished {
            return PlaybackStep::End;
        }

        self.logical_time_s += wall_dt.max(0.0) * self.speed;

        if self.logical_time_s > self.duration_s() {
            // Deliver the final entry once before reporting the end
            self.finished = true;
            return PlaybackStep::Entry(&self.entries[self.entries.len() - 1]);
        }

        PlaybackStep::Entry(&self.entries[self.position()])
    }

    /// Index of the latest entry at or before the logical clock.
    fn position(&self) -> usize {
        let upcoming = self
            .entries
            .partition_point(|e| e.timestamp_s <= self.logical_time_s);
        upcoming.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::VisualParameters;
    use crate::metrics::MetricsSnapshot;
    use crate::session::SessionRecorder;
    use std::path::PathBuf;

    fn temp_session_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pulseviz-play-{tag}-{}.jsonl", std::process::id()))
    }

    fn write_session(tag: &str, timestamps: &[f64]) -> PathBuf {
        let path = temp_session_path(tag);
        let header = SessionHeader {
            user: "tester".to_string(),
            title: "unit".to_string(),
            start_time: 0.0,
            tick_rate_hz: 60.0,
            sample_rate_hz: None,
        };
        let mut recorder = SessionRecorder::create(&path, &header).unwrap();
        for &t in timestamps {
            let mut params = VisualParameters::default();
            params.hue = t; // marker to identify entries
            recorder
                .append(&SessionEntry {
                    timestamp_s: t,
                    metrics: MetricsSnapshot::silent(t),
                    params,
                })
                .unwrap();
        }
        recorder.close().unwrap();
        path
    }

    fn entry_marker(step: PlaybackStep<'_>) -> f64 {
        match step {
            PlaybackStep::Entry(e) => e.params.hue,
            PlaybackStep::End => panic!("unexpected end of playback"),
        }
    }

    #[test]
    fn advance_holds_the_last_known_entry() {
        let path = write_session("hold", &[0.0, 1.0, 2.0]);
        let mut player = SessionPlayer::load(&path).unwrap();

        assert_eq!(entry_marker(player.advance(0.5)), 0.0);
        assert_eq!(entry_marker(player.advance(0.6)), 1.0);
        assert_eq!(entry_marker(player.advance(0.1)), 1.0);
        assert_eq!(entry_marker(player.advance(0.9)), 2.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn final_entry_is_delivered_once_then_end() {
        let path = write_session("end", &[0.0, 1.0]);
        let mut player = SessionPlayer::load(&path).unwrap();

        assert_eq!(entry_marker(player.advance(5.0)), 1.0);
        assert_eq!(player.advance(0.1), PlaybackStep::End);
        assert_eq!(player.advance(0.1), PlaybackStep::End);
        assert!(!player.cursor().playing);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn speed_scales_logical_time() {
        let path = write_session("speed", &[0.0, 1.0, 2.0]);
        let mut player = SessionPlayer::load(&path).unwrap();
        player.set_speed(2.0);

        // 0.6 s of wall time covers 1.2 s of session time
        assert_eq!(entry_marker(player.advance(0.6)), 1.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn invalid_speed_clamps_to_the_minimum() {
        let path = write_session("badspeed", &[0.0]);
        let mut player = SessionPlayer::load(&path).unwrap();

        player.set_speed(0.0);
        assert_eq!(player.speed(), MIN_SPEED);
        player.set_speed(f64::NAN);
        assert_eq!(player.speed(), MIN_SPEED);
        player.set_speed(1.5);
        assert_eq!(player.speed(), 1.5);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn seek_clamps_to_the_session_span_and_resumes() {
        let path = write_session("seek", &[0.0, 100.0, 200.0]);
        let mut player = SessionPlayer::load(&path).unwrap();

        // Exhaust the session, then seek back into it
        player.advance(500.0);
        assert_eq!(player.advance(0.1), PlaybackStep::End);

        player.seek(150.0);
        assert_eq!(entry_marker(player.advance(0.0)), 100.0);

        player.seek(9999.0);
        assert_eq!(player.cursor().logical_time_s, 200.0);
        player.seek(-5.0);
        assert_eq!(player.cursor().logical_time_s, 0.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_entry_lines_are_skipped() {
        let path = temp_session_path("corrupt");
        let header = serde_json::to_string(&SessionHeader {
            user: "tester".to_string(),
            title: "unit".to_string(),
            start_time: 0.0,
            tick_rate_hz: 60.0,
            sample_rate_hz: None,
        })
        .unwrap();
        let good = serde_json::to_string(&SessionEntry {
            timestamp_s: 1.0,
            metrics: MetricsSnapshot::silent(1.0),
            params: VisualParameters::default(),
        })
        .unwrap();
        std::fs::write(&path, format!("{header}\n{{not json\n{good}\n")).unwrap();

        let player = SessionPlayer::load(&path).unwrap();
        assert_eq!(player.len(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_header_is_fatal() {
        let path = temp_session_path("noheader");
        std::fs::write(&path, "{not json at all\n").unwrap();

        assert!(matches!(
            SessionPlayer::load(&path),
            Err(SessionError::CorruptHeader(_))
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_session_plays_as_immediately_ended() {
        let path = write_session("empty", &[]);
        let mut player = SessionPlayer::load(&path).unwrap();

        assert!(player.is_empty());
        assert_eq!(player.advance(1.0), PlaybackStep::End);

        std::fs::remove_file(&path).ok();
    }
}
