/// Mean of the numeric minutes samples. Samples the provider never returned
/// a number for are excluded from the denominator rather than counted as
/// zero; an empty set averages to 0.
pub fn average_minutes<I>(samples: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for sample in samples.into_iter().flatten() {
        sum += sample;
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}
