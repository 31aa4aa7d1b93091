// Temporal module - Time-domain window statistics

/// Root mean square of a window
///
/// # Returns
/// RMS amplitude, 0.0 for an empty window
pub fn rms(audio: &[f32]) -> f64 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = audio.iter().map(|&x| x as f64 * x as f64).sum();
    (sum_squares / audio.len() as f64).sqrt()
}
