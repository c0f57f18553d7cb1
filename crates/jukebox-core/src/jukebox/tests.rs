//! Tests for the track store

use super::*;
use crate::method::available_methods;
use std::f32::consts::PI;

const RATE: u32 = 22050;
const SECONDS: f32 = 6.0;

const A: TrackId = TrackId(1);
const B: TrackId = TrackId(2);
const C: TrackId = TrackId(3);
const D: TrackId = TrackId(4);

/// Deterministic noise in [-1, 1)
fn noise(seed: u32, len: usize) -> Vec<f32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0
        })
        .collect()
}

fn tones(freqs: &[f32], noise_seed: u32, noise_level: f32) -> Vec<f32> {
    let len = (SECONDS * RATE as f32) as usize;
    let noise = noise(noise_seed, len);
    (0..len)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            let tonal: f32 = freqs
                .iter()
                .enumerate()
                .map(|(n, f)| 0.3 / (n + 1) as f32 * (2.0 * PI * f * t).sin())
                .sum();
            tonal + noise_level * noise[i]
        })
        .collect()
}

fn track_a() -> Vec<f32> {
    tones(&[220.0, 660.0, 1100.0], 7, 0.05)
}

/// A at a slightly lower level with its own faint noise
fn track_b() -> Vec<f32> {
    let extra = noise(99, (SECONDS * RATE as f32) as usize);
    track_a()
        .iter()
        .zip(extra)
        .map(|(s, n)| 0.97 * s + 0.002 * n)
        .collect()
}

fn track_c() -> Vec<f32> {
    vec![0.0; (SECONDS * RATE as f32) as usize]
}

fn track_d() -> Vec<f32> {
    tones(&[1500.0, 3100.0], 21, 0.2)
}

fn empty(method: &str) -> Jukebox {
    Jukebox::power_on(Some(method), None).unwrap()
}

/// A, B, C and D added and trained
fn loaded(method: &str) -> Jukebox {
    let mut jukebox = empty(method);
    jukebox.add_track(A, &track_a()).unwrap();
    jukebox.add_track(B, &track_b()).unwrap();
    jukebox.add_track(C, &track_c()).unwrap();
    jukebox.add_track(D, &track_d()).unwrap();
    jukebox.train(None).unwrap();
    jukebox
}

#[test]
fn test_power_on() {
    for method in available_methods() {
        let jukebox = empty(method);
        assert_eq!(jukebox.method_name(), method);
        assert!(jukebox.method_info().starts_with(method));
        assert_eq!(jukebox.track_count(), 0);
        assert_eq!(jukebox.highest_track_id(), None);
        assert_eq!(jukebox.track_size(), jukebox.dimension() * 4);
        assert!(!jukebox.is_trained());
    }

    assert!(matches!(
        Jukebox::power_on(Some("nonexistent"), None),
        Err(JukeboxError::UnknownMethod(_))
    ));
    assert!(matches!(
        Jukebox::power_on(None, Some("nonexistent")),
        Err(JukeboxError::UnknownDecoder(_))
    ));
}

#[test]
fn test_default_method_and_decoder() {
    let jukebox = Jukebox::power_on(None, None).unwrap();
    assert_eq!(Some(jukebox.method_name()), crate::method::default_method());
    assert_eq!(
        jukebox.decoder_name(),
        crate::audio::available_decoders().first().copied()
    );
}

#[test]
fn test_train_empty_store() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        assert!(matches!(jukebox.train(None), Err(JukeboxError::EmptyStore)));
        assert!(!jukebox.is_trained());
    }
}

#[test]
fn test_duplicate_id_is_rejected() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        jukebox.add_track(A, &track_a()).unwrap();
        let original = jukebox.vector(A).cloned();

        match jukebox.add_track(A, &track_d()) {
            Err(JukeboxError::DuplicateId(id)) => assert_eq!(id, A),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(jukebox.track_count(), 1);
        assert_eq!(jukebox.vector(A).cloned(), original);
    }
}

#[test]
fn test_failed_add_stores_nothing() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        assert!(matches!(
            jukebox.add_track(A, &track_a()[..RATE as usize]),
            Err(JukeboxError::InsufficientAudio { .. })
        ));
        assert!(!jukebox.contains(A));

        let wrong = FeatureVector::new(vec![0.0; 3]);
        assert!(matches!(
            jukebox.add_vector(A, wrong),
            Err(JukeboxError::DimensionMismatch { .. })
        ));
        assert_eq!(jukebox.track_count(), 0);
    }
}

#[test]
fn test_add_vectors_is_all_or_nothing() {
    for method in available_methods() {
        let mut source = empty(method);
        let a = source.analyze_pcm(&track_a(), RATE).unwrap();
        let b = source.analyze_pcm(&track_b(), RATE).unwrap();
        source.add_vector(C, a.clone()).unwrap();

        let wrong = FeatureVector::new(vec![0.0; 3]);
        assert!(matches!(
            source.add_vectors(vec![(A, a.clone()), (B, wrong)]),
            Err(JukeboxError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            source.add_vectors(vec![(A, a.clone()), (C, b.clone())]),
            Err(JukeboxError::DuplicateId(id)) if id == C
        ));
        assert!(matches!(
            source.add_vectors(vec![(A, a.clone()), (B, b.clone()), (A, b.clone())]),
            Err(JukeboxError::DuplicateId(id)) if id == A
        ));
        assert_eq!(source.track_ids(), vec![C]);

        source.add_vectors(vec![(B, b.clone()), (A, a.clone())]).unwrap();
        assert_eq!(source.track_ids(), vec![A, B, C]);
        assert_eq!(source.vector(A), Some(&a));
        assert_eq!(source.vector(B), Some(&b));

        source.add_vectors(Vec::new()).unwrap();
        assert_eq!(source.track_count(), 3);
    }
}

#[test]
fn test_nearest_neighbor_of_near_copy() {
    for method in available_methods() {
        let jukebox = loaded(method);
        let neighbors = jukebox.nearest_neighbors(A, 1).unwrap();
        assert_eq!(neighbors.len(), 1, "{}", method);
        assert_eq!(neighbors[0].id, B, "{}", method);

        let neighbors = jukebox.nearest_neighbors(B, 1).unwrap();
        assert_eq!(neighbors[0].id, A, "{}", method);
    }
}

#[test]
fn test_nearest_neighbors_ranking() {
    for method in available_methods() {
        let jukebox = loaded(method);
        for id in jukebox.track_ids() {
            for k in [0, 1, 2, 3, 10] {
                let neighbors = jukebox.nearest_neighbors(id, k).unwrap();
                assert_eq!(neighbors.len(), k.min(jukebox.track_count() - 1));
                assert!(neighbors.iter().all(|n| n.id != id));
                assert!(neighbors.windows(2).all(|w| w[0].score <= w[1].score));

                let mut ids: Vec<TrackId> = neighbors.iter().map(|n| n.id).collect();
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), neighbors.len());

                for n in &neighbors {
                    assert_eq!(n.score, jukebox.similarity(id, n.id).unwrap());
                }
            }
        }
    }
}

#[test]
fn test_ties_broken_by_id() {
    for method in available_methods() {
        let mut jukebox = loaded(method);
        let copy = jukebox.vector(D).cloned().unwrap();
        jukebox.add_vector(TrackId(10), copy.clone()).unwrap();
        jukebox.add_vector(TrackId(5), copy).unwrap();

        let neighbors = jukebox.nearest_neighbors(D, 2).unwrap();
        assert_eq!(neighbors[0].id, TrackId(5));
        assert_eq!(neighbors[1].id, TrackId(10));
        assert_eq!(neighbors[0].score, 0.0);
        assert_eq!(neighbors[1].score, 0.0);
    }
}

#[test]
fn test_similarity_symmetry_and_identity() {
    for method in available_methods() {
        let jukebox = loaded(method);
        let ids = jukebox.track_ids();
        for &a in &ids {
            assert_eq!(jukebox.similarity(a, a).unwrap(), 0.0);
            for &b in &ids {
                let ab = jukebox.similarity(a, b).unwrap();
                let ba = jukebox.similarity(b, a).unwrap();
                assert_eq!(ab.to_bits(), ba.to_bits(), "{} {} {}", method, a, b);
                assert!(ab >= 0.0);
            }
        }
        assert!(jukebox.similarity(A, B).unwrap() < jukebox.similarity(A, C).unwrap());
    }
}

#[test]
fn test_queries_before_training() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        jukebox.add_track(A, &track_a()).unwrap();
        jukebox.add_track(B, &track_b()).unwrap();

        assert!(matches!(jukebox.similarity(A, B), Err(JukeboxError::NotTrained)));
        assert!(matches!(
            jukebox.nearest_neighbors(A, 1),
            Err(JukeboxError::NotTrained)
        ));
    }
}

#[test]
fn test_unknown_tracks() {
    for method in available_methods() {
        let mut jukebox = loaded(method);
        let missing = TrackId(42);

        assert!(matches!(
            jukebox.similarity(A, missing),
            Err(JukeboxError::UnknownTrack(id)) if id == missing
        ));
        assert!(matches!(
            jukebox.nearest_neighbors(missing, 3),
            Err(JukeboxError::UnknownTrack(_))
        ));
        assert!(matches!(
            jukebox.remove_track(missing),
            Err(JukeboxError::UnknownTrack(_))
        ));
        assert!(matches!(
            jukebox.replace_track(missing, FeatureVector::new(vec![0.0; jukebox.dimension()])),
            Err(JukeboxError::UnknownTrack(_))
        ));
        assert!(matches!(
            jukebox.train(Some(&[A, missing][..])),
            Err(JukeboxError::UnknownTrack(_))
        ));
    }
}

#[test]
fn test_failed_training_keeps_state() {
    for method in available_methods() {
        let mut jukebox = loaded(method);
        let before = jukebox.fitted_state().cloned();
        let score = jukebox.similarity(A, D).unwrap();

        assert!(matches!(
            jukebox.train(Some(&[A][..])),
            Err(JukeboxError::Training(_))
        ));
        assert_eq!(jukebox.fitted_state().cloned(), before);
        assert_eq!(jukebox.similarity(A, D).unwrap(), score);
    }
}

#[test]
fn test_train_on_subset() {
    for method in available_methods() {
        let mut jukebox = loaded(method);
        let full = jukebox.fitted_state().cloned();
        jukebox.train(Some(&[A, D][..])).unwrap();
        assert!(jukebox.is_trained());
        assert_ne!(jukebox.fitted_state().cloned(), full);

        // Retraining on everything restores the same state
        jukebox.train(None).unwrap();
        assert_eq!(jukebox.fitted_state().cloned(), full);
    }
}

#[test]
fn test_remove_tracks() {
    for method in available_methods() {
        let mut jukebox = loaded(method);

        let removed = jukebox.remove_track(B).unwrap();
        assert_eq!(removed.len(), jukebox.dimension());
        assert!(!jukebox.contains(B));
        assert!(jukebox.is_trained());

        // B is gone from rankings
        let neighbors = jukebox.nearest_neighbors(A, 10).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.iter().all(|n| n.id != B));

        // Batch removal is all or nothing
        assert!(matches!(
            jukebox.remove_tracks(&[C, B]),
            Err(JukeboxError::UnknownTrack(id)) if id == B
        ));
        assert!(jukebox.contains(C));

        jukebox.remove_tracks(&[C, D]).unwrap();
        assert_eq!(jukebox.track_ids(), vec![A]);
        assert_eq!(jukebox.highest_track_id(), Some(A));
        assert!(jukebox.nearest_neighbors(A, 5).unwrap().is_empty());
    }
}

#[test]
fn test_replace_track() {
    for method in available_methods() {
        let mut jukebox = loaded(method);
        let d = jukebox.vector(D).cloned().unwrap();
        jukebox.replace_track(C, d).unwrap();
        assert_eq!(jukebox.similarity(C, D).unwrap(), 0.0);
        assert_eq!(jukebox.track_count(), 4);
    }
}

#[test]
fn test_external_vector_queries() {
    for method in available_methods() {
        let jukebox = loaded(method);
        let seed = jukebox.analyze_pcm(&track_a(), RATE).unwrap();
        assert_eq!(Some(&seed), jukebox.vector(A));

        let neighbors = jukebox.nearest_to_vector(&seed, 2).unwrap();
        assert_eq!(neighbors[0].id, A);
        assert_eq!(neighbors[0].score, 0.0);
        assert_eq!(neighbors[1].id, B);

        let scores = jukebox.similarity_to(&seed, &[A, B, C]).unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0], 0.0);
        assert_eq!(scores[1], jukebox.similarity(A, B).unwrap());

        assert!(matches!(
            jukebox.similarity_to(&FeatureVector::new(vec![1.0]), &[A]),
            Err(JukeboxError::DimensionMismatch { .. })
        ));
    }
}

#[test]
fn test_parallel_analysis_matches_store() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        let signals = vec![track_a(), track_b(), track_d()];

        let analyzer = jukebox.analyzer().clone();
        let vectors: Vec<FeatureVector> = signals
            .par_iter()
            .map(|pcm| analyzer.analyze_pcm(pcm, RATE).unwrap())
            .collect();

        for (i, vector) in vectors.into_iter().enumerate() {
            jukebox.add_vector(TrackId(i as u32), vector).unwrap();
        }
        assert_eq!(
            jukebox.vector(TrackId(0)),
            Some(&jukebox.analyze_pcm(&signals[0], RATE).unwrap())
        );
    }
}

#[test]
fn test_track_bytes() {
    for method in available_methods() {
        let jukebox = loaded(method);
        let bytes = jukebox.track_to_bytes(A).unwrap();
        assert_eq!(bytes.len(), jukebox.track_size());
        assert_eq!(jukebox.track_from_bytes(&bytes).unwrap(), *jukebox.vector(A).unwrap());

        assert!(matches!(
            jukebox.track_from_bytes(&bytes[..bytes.len() - 4]),
            Err(JukeboxError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            jukebox.track_to_bytes(TrackId(42)),
            Err(JukeboxError::UnknownTrack(_))
        ));
    }
}

#[test]
fn test_snapshot_round_trip() {
    for method in available_methods() {
        let jukebox = loaded(method);
        for compress in [false, true] {
            let bytes = jukebox.to_bytes(compress).unwrap();
            let restored = Jukebox::from_bytes(&bytes).unwrap();

            assert_eq!(restored.method_name(), jukebox.method_name());
            assert_eq!(restored.decoder_name(), jukebox.decoder_name());
            assert_eq!(restored.config(), jukebox.config());
            assert_eq!(restored.track_ids(), jukebox.track_ids());
            assert_eq!(restored.fitted_state(), jukebox.fitted_state());

            for id in jukebox.track_ids() {
                assert_eq!(restored.vector(id), jukebox.vector(id));
                assert_eq!(
                    restored.nearest_neighbors(id, 10).unwrap(),
                    jukebox.nearest_neighbors(id, 10).unwrap()
                );
                for other in jukebox.track_ids() {
                    assert_eq!(
                        restored.similarity(id, other).unwrap(),
                        jukebox.similarity(id, other).unwrap()
                    );
                }
            }
        }
    }
}

#[test]
fn test_snapshot_of_untrained_jukebox() {
    for method in available_methods() {
        let mut jukebox = empty(method);
        jukebox.add_track(A, &track_a()).unwrap();
        let restored = Jukebox::from_bytes(&jukebox.to_bytes(false).unwrap()).unwrap();
        assert!(!restored.is_trained());
        assert_eq!(restored.track_ids(), vec![A]);
    }
}

#[test]
fn test_snapshot_file() {
    let method = available_methods()[0];
    let jukebox = loaded(method);
    let path = std::env::temp_dir().join(format!("jukebox-store-{}.jbx", std::process::id()));

    jukebox.save(&path, true).unwrap();
    let restored = Jukebox::load(&path).unwrap();
    assert_eq!(restored.track_count(), 4);
    assert_eq!(
        restored.nearest_neighbors(A, 1).unwrap(),
        jukebox.nearest_neighbors(A, 1).unwrap()
    );

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_snapshot_version_mismatch() {
    let method = available_methods()[0];
    let mut bytes = loaded(method).to_bytes(false).unwrap();
    bytes[4..6].copy_from_slice(&99u16.to_le_bytes());

    match Jukebox::from_bytes(&bytes) {
        Err(JukeboxError::IncompatibleVersion { found, expected }) => {
            assert_eq!(found, 99);
            assert_eq!(expected, jukebox_snapshot::VERSION);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_snapshot_corruption() {
    let method = available_methods()[0];
    let bytes = loaded(method).to_bytes(false).unwrap();

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    assert!(matches!(
        Jukebox::from_bytes(&bad_magic),
        Err(JukeboxError::Snapshot(_))
    ));

    let mut flipped = bytes.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0xFF;
    assert!(matches!(
        Jukebox::from_bytes(&flipped),
        Err(JukeboxError::Snapshot(_))
    ));

    assert!(matches!(
        Jukebox::from_bytes(&bytes[..bytes.len() / 2]),
        Err(JukeboxError::Snapshot(_))
    ));
}

#[test]
fn test_snapshot_size_fields_corrupted() {
    let method = available_methods()[0];
    let bytes = loaded(method).to_bytes(false).unwrap();

    let mut huge = bytes.clone();
    huge[32..36].copy_from_slice(&u32::MAX.to_le_bytes());
    huge[36..40].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        Jukebox::from_bytes(&huge),
        Err(JukeboxError::Snapshot(_))
    ));

    let mut compressed = bytes;
    compressed[6] |= 0x1;
    compressed[24..32].copy_from_slice(&(1u64 << 60).to_le_bytes());
    assert!(matches!(
        Jukebox::from_bytes(&compressed),
        Err(JukeboxError::Snapshot(_))
    ));
}

#[test]
fn test_snapshot_with_foreign_state() {
    let foreign = [
        FittedState::KlScale { scale: -1.0 },
        FittedState::Standardization {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        },
    ];
    for method in available_methods() {
        let jukebox = loaded(method);
        for state in &foreign {
            let mut snapshot = jukebox.to_snapshot().unwrap();
            snapshot.metadata.fitted_state = Some(bincode::serialize(state).unwrap());
            assert!(
                matches!(Jukebox::from_snapshot(snapshot), Err(JukeboxError::Snapshot(_))),
                "{} accepted {:?}",
                method,
                state
            );
        }
    }
}

#[test]
fn test_missing_decoder() {
    let mut jukebox = empty(available_methods()[0]);
    jukebox.analyzer.decoder = None;
    assert!(matches!(
        jukebox.add_file(A, Path::new("/nonexistent/track.wav"), 0.0, 30.0),
        Err(JukeboxError::NoDecoder)
    ));
    assert!(!jukebox.contains(A));
}

#[cfg(feature = "builtin-decoder")]
#[test]
fn test_add_file() {
    let path = std::env::temp_dir().join(format!("jukebox-track-{}.wav", std::process::id()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in track_a() {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    for method in available_methods() {
        let mut jukebox = Jukebox::power_on(Some(method), Some(crate::audio::BUILTIN_DECODER)).unwrap();
        jukebox.add_file(A, &path, 0.0, 0.0).unwrap();
        jukebox.add_track(B, &track_a()).unwrap();
        jukebox.add_track(C, &track_c()).unwrap();
        jukebox.add_track(D, &track_d()).unwrap();
        jukebox.train(None).unwrap();

        assert_eq!(jukebox.nearest_neighbors(A, 1).unwrap()[0].id, B);
        assert!(matches!(
            jukebox.add_file(A, &path, 0.0, 0.0),
            Err(JukeboxError::DuplicateId(_))
        ));
        assert!(matches!(
            jukebox.add_file(TrackId(9), Path::new("/nonexistent/track.wav"), 0.0, 0.0),
            Err(JukeboxError::Decoder(_))
        ));
    }

    std::fs::remove_file(&path).ok();
}
