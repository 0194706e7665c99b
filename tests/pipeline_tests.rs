//! End-to-end pipeline tests: samples in, draw records out, and the
//! record/replay path in between.

use std::path::PathBuf;

use pulseviz::audio::{AudioConfig, FeatureExtractor, SampleChunk};
use pulseviz::driver::{DriverCommand, DriverConfig, SnapshotSource, TickDriver};
use pulseviz::field::{FieldConfig, ParticleField};
use pulseviz::mapper::map_parameters;
use pulseviz::session::{PlaybackStep, SessionPlayer};
use pulseviz::style::StyleConfig;

const DT: f64 = 1.0 / 60.0;

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pulseviz-pipe-{tag}-{}.jsonl", std::process::id()))
}

fn sine(freq: f64, amplitude: f64, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            (amplitude * (std::f64::consts::TAU * freq * i as f64 / f64::from(sample_rate)).sin())
                as f32
        })
        .collect()
}

#[test]
fn sine_tone_flows_from_samples_to_particles() {
    let config = AudioConfig::default();
    let sample_rate = config.sample_rate;
    let chunk_size = config.chunk_size;
    let mut extractor = FeatureExtractor::new(config);

    let samples = sine(440.0, 0.8, sample_rate, chunk_size);
    let snapshot = extractor
        .extract(0.0, SampleChunk::F32(&samples))
        .expect("non-empty chunk");

    // Dominant frequency lands within one FFT bin of the tone
    let bin_width = f64::from(sample_rate) / chunk_size as f64;
    assert!(
        (snapshot.dominant_frequency_hz - 440.0).abs() <= bin_width,
        "expected ~440 Hz, got {}",
        snapshot.dominant_frequency_hz
    );
    assert!(snapshot.rms > 0.3);

    let style = StyleConfig::default();
    let params = map_parameters(&snapshot, &style);
    assert!(params.spawn_rate > 0, "audible tone should spawn particles");
    assert!(params.alpha_scale > 0.5);

    let mut field = ParticleField::new(FieldConfig::default());
    let records = field.tick(&params, DT);
    assert_eq!(records.len(), params.spawn_rate as usize);
    for record in records {
        assert!((0.0..=1.0).contains(&record.x));
        assert!((0.0..=1.0).contains(&record.y));
        assert!(record.alpha > 0.0);
    }
}

#[test]
fn recorded_session_replays_the_same_parameters() {
    let path = temp_path("roundtrip");

    let mut driver = TickDriver::new(
        DriverConfig::default(),
        StyleConfig::default(),
        SnapshotSource::Idle,
    );
    driver.apply(DriverCommand::StartRecording {
        path: path.clone(),
        user: "tester".to_string(),
        title: "pipeline".to_string(),
    });
    let mut recorded_params = Vec::new();
    for _ in 0..20 {
        driver.step(DT);
        recorded_params.push(*driver.last_parameters());
    }
    driver.apply(DriverCommand::StopRecording);

    let mut player = SessionPlayer::load(&path).unwrap();
    assert_eq!(player.len(), 20);

    let mut replayed = Vec::new();
    loop {
        match player.advance(DT) {
            PlaybackStep::Entry(entry) => replayed.push(entry.params),
            PlaybackStep::End => break,
        }
    }

    // Every replayed tick uses a parameter set that was recorded, and the
    // first recorded parameters appear first
    assert!(!replayed.is_empty());
    assert_eq!(replayed[0], recorded_params[0]);
    for params in &replayed {
        assert!(recorded_params.contains(params));
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn double_speed_playback_visits_the_same_entries() {
    let path = temp_path("speed");

    let mut driver = TickDriver::new(
        DriverConfig::default(),
        StyleConfig::default(),
        SnapshotSource::Idle,
    );
    driver.apply(DriverCommand::StartRecording {
        path: path.clone(),
        user: "tester".to_string(),
        title: "speed".to_string(),
    });
    for _ in 0..10 {
        driver.step(0.05);
    }
    driver.apply(DriverCommand::StopRecording);

    let collect = |speed: f64, wall_dt: f64| -> Vec<f64> {
        let mut player = SessionPlayer::load(&path).unwrap();
        player.set_speed(speed);
        let mut timestamps = Vec::new();
        loop {
            match player.advance(wall_dt) {
                PlaybackStep::Entry(entry) => timestamps.push(entry.timestamp_s),
                PlaybackStep::End => break,
            }
        }
        timestamps
    };

    // 2x speed with half the wall step advances the logical clock
    // identically, so the visited entry sequence matches exactly
    let normal = collect(1.0, 0.05);
    let doubled = collect(2.0, 0.025);
    assert_eq!(normal, doubled);

    std::fs::remove_file(&path).ok();
}

#[test]
fn replay_through_the_driver_reproduces_the_field_population() {
    let path = temp_path("population");

    // Record a session whose entries actually spawn particles
    let mut driver = TickDriver::new(
        DriverConfig::default(),
        StyleConfig::default(),
        SnapshotSource::Idle,
    );
    driver.apply(DriverCommand::StartRecording {
        path: path.clone(),
        user: "tester".to_string(),
        title: "population".to_string(),
    });
    for _ in 0..5 {
        driver.step(DT);
    }
    driver.apply(DriverCommand::StopRecording);

    // Splice non-trivial spawn rates into the recorded entries
    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
    for (i, line) in lines.iter_mut().enumerate().skip(1) {
        let mut entry: pulseviz::session::SessionEntry = serde_json::from_str(line).unwrap();
        entry.params.spawn_rate = 4 * i as u32;
        entry.params.alpha_scale = 1.0;
        *line = serde_json::to_string(&entry).unwrap();
    }
    std::fs::write(&path, lines.join("\n")).unwrap();

    let run_replay = || -> Vec<usize> {
        let player = SessionPlayer::load(&path).unwrap();
        let mut driver = TickDriver::new(
            DriverConfig::default(),
            StyleConfig::default(),
            SnapshotSource::Playback(player),
        );
        let mut counts = Vec::new();
        while !driver.finished() {
            counts.push(driver.step(DT).len());
        }
        counts
    };

    let first = run_replay();
    let second = run_replay();

    assert!(first.iter().sum::<usize>() > 0, "replay should populate the field");
    // The field is seeded, so two replays of the same session agree exactly
    assert_eq!(first, second);

    std::fs::remove_file(&path).ok();
}
