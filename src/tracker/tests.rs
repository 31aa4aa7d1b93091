use super::*;
use crate::note::Note;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const RANGE: NoteRange = NoteRange::new(21, 109);

fn onset(notes: &[i32], start: f64) -> Onset {
    Onset::new(
        notes.iter().filter_map(|&n| Note::from_number(n)).collect(),
        start,
        start,
    )
}

fn one_hot(notes: &[(i32, f32)]) -> Vec<f32> {
    let mut activations = vec![0.0; RANGE.count()];
    for &(note, value) in notes {
        activations[(note - RANGE.start) as usize] = value;
    }
    activations
}

fn tracker(onsets: Vec<Onset>) -> (Tracker, Arc<Mutex<Vec<usize>>>) {
    let moves = Arc::new(Mutex::new(Vec::new()));
    let mut tracker = Tracker::new(onsets, RANGE, TrackerConfig::default());
    let recorded = Arc::clone(&moves);
    tracker.set_cursor_moved_callback(move |index| recorded.lock().unwrap().push(index));
    (tracker, moves)
}

#[test]
fn test_matching_onset_keeps_cursor() {
    let (mut tracker, moves) = tracker(vec![onset(&[72], 0.0), onset(&[74], 1.0)]);
    tracker.start(0);

    let notes = one_hot(&[(72, 1.0)]);
    assert_eq!(tracker.update(1.0, &notes), None);
    let detection = tracker.update(0.0, &notes).unwrap();

    assert_eq!(detection.offset, 0);
    assert_eq!(tracker.index(), 0);
    assert!(moves.lock().unwrap().is_empty());
}

#[test]
fn test_jump_to_next_onset() {
    let (mut tracker, moves) = tracker(vec![onset(&[72], 0.0), onset(&[74], 1.0)]);
    tracker.start(0);

    let mut notes = one_hot(&[(72, 1.0)]);
    tracker.update(1.0, &notes);
    assert_eq!(tracker.index(), 0);

    // Decaying 72 with a silent onset score
    for _ in 0..20 {
        tracker.update(0.0, &notes);
        notes[(72 - RANGE.start) as usize] *= 0.9;
    }
    assert_eq!(tracker.index(), 0);

    // A clean 74 spike followed by the falling edge
    let spike = one_hot(&[(74, 1.0)]);
    tracker.update(1.0, &spike);
    assert_eq!(tracker.index(), 0);
    tracker.update(0.0, &spike);

    assert_eq!(tracker.index(), 1);
    assert_eq!(*moves.lock().unwrap(), vec![1]);

    // Further silence does not move again
    for _ in 0..5 {
        tracker.update(0.0, &spike);
    }
    assert_eq!(*moves.lock().unwrap(), vec![1]);
}

#[test]
fn test_hysteresis_needs_falling_edge() {
    let (mut tracker, _) = tracker(vec![onset(&[60], 0.0), onset(&[62], 1.0)]);
    let spike = one_hot(&[(62, 1.0)]);

    // Scores between the thresholds neither arm nor fire
    assert_eq!(tracker.update(0.4, &spike), None);
    assert_eq!(tracker.update(0.3, &spike), None);
    assert_eq!(tracker.index(), 0);

    // Armed, then hovering above the trigger keeps waiting
    tracker.update(0.9, &spike);
    assert_eq!(tracker.update(0.3, &spike), None);
    assert!(tracker.update(0.25, &spike).is_some());
    assert_eq!(tracker.index(), 1);
}

#[test]
fn test_activations_taken_at_running_max() {
    let (mut tracker, _) = tracker(vec![onset(&[60], 0.0), onset(&[64], 1.0)]);
    let at_peak = one_hot(&[(64, 1.0)]);
    let later = one_hot(&[(60, 1.0)]);

    tracker.update(0.7, &later);
    tracker.update(0.95, &at_peak);
    tracker.update(0.8, &later);
    let detection = tracker.update(0.1, &later).unwrap();

    assert_eq!(detection.offset, 1);
    assert_eq!(tracker.index(), 1);
}

#[test]
fn test_lookahead_limits_jump() {
    let onsets: Vec<Onset> = (0..8).map(|i| onset(&[60 + i], i as f64)).collect();
    let (mut tracker, moves) = tracker(onsets);

    // Note 67 is 7 onsets ahead, beyond the lookahead of 3
    let far = one_hot(&[(67, 1.0)]);
    tracker.update(1.0, &far);
    let detection = tracker.update(0.0, &far).unwrap();
    assert!(detection.offset <= 3);

    // Note 63 is exactly at the lookahead
    tracker.start(0);
    moves.lock().unwrap().clear();
    let edge = one_hot(&[(63, 1.0)]);
    tracker.update(1.0, &edge);
    tracker.update(0.0, &edge);
    assert_eq!(tracker.index(), 3);
    assert_eq!(*moves.lock().unwrap(), vec![3]);
}

#[test]
fn test_weights_prefer_nearer_onsets() {
    // Same notes twice: equal raw distances, the nearer one wins
    let (mut tracker, moves) = tracker(vec![
        onset(&[60], 0.0),
        onset(&[65], 1.0),
        onset(&[65], 2.0),
    ]);
    let notes = one_hot(&[(65, 1.0)]);
    tracker.update(1.0, &notes);
    let detection = tracker.update(0.0, &notes).unwrap();
    assert_eq!(detection.offset, 1);
    assert_eq!(*moves.lock().unwrap(), vec![1]);
}

#[test]
fn test_never_passes_last_onset() {
    let (mut tracker, _) = tracker(vec![onset(&[60], 0.0), onset(&[62], 1.0)]);
    tracker.start(1);
    let notes = one_hot(&[(70, 1.0)]);
    tracker.update(1.0, &notes);
    tracker.update(0.0, &notes);
    assert_eq!(tracker.index(), 1);

    tracker.start(10);
    assert_eq!(tracker.index(), 1);
}

#[test]
fn test_empty_onset_list() {
    let (mut tracker, moves) = tracker(Vec::new());
    let notes = vec![0.0; RANGE.count()];
    tracker.update(1.0, &notes);
    assert_eq!(tracker.update(0.0, &notes), None);
    assert_eq!(tracker.index(), 0);
    assert!(moves.lock().unwrap().is_empty());
}

#[test]
#[should_panic(expected = "note range")]
fn test_wrong_activation_length_panics() {
    let (mut tracker, _) = tracker(vec![onset(&[60], 0.0)]);
    tracker.update(1.0, &[0.0; 3]);
}

#[test]
fn test_stream_preserves_order() {
    let (mut tracker, _) = tracker(vec![onset(&[72], 0.0), onset(&[74], 1.0)]);
    let moves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&moves);
    tracker.set_cursor_moved_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (mut sender, mut receiver) = prediction_queue(4);
    let producer = thread::spawn(move || {
        let mut notes = one_hot(&[(72, 1.0)]);
        assert!(sender.push(Prediction {
            onset: 1.0,
            notes: notes.clone(),
        }));
        for _ in 0..20 {
            assert!(sender.push(Prediction {
                onset: 0.0,
                notes: notes.clone(),
            }));
            notes[(72 - RANGE.start) as usize] *= 0.9;
        }
        let spike = one_hot(&[(74, 1.0)]);
        assert!(sender.push(Prediction {
            onset: 1.0,
            notes: spike.clone(),
        }));
        assert!(sender.push(Prediction {
            onset: 0.0,
            notes: spike,
        }));
    });

    let consumed = receiver.run(&mut tracker);
    producer.join().unwrap();

    assert_eq!(consumed, 23);
    assert_eq!(tracker.index(), 1);
    assert_eq!(moves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_try_push_full_queue() {
    let (mut sender, _receiver) = prediction_queue(1);
    let prediction = Prediction {
        onset: 0.5,
        notes: vec![],
    };
    assert!(sender.try_push(prediction.clone()).is_ok());
    assert_eq!(sender.try_push(prediction.clone()), Err(prediction));
}
