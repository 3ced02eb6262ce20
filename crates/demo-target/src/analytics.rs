use std::collections::VecDeque;

/// Sliding window over one metric with rolling mean and z-score scoring.
///
/// Incoming values are scored against the window as it stood before they
/// are admitted, so the first reading of a new regime still registers as
/// an outlier. With fewer than two values, or a flat window, the score is
/// zero and nothing is anomalous.
pub struct MetricWindow {
    values: VecDeque<f64>,
    capacity: usize,
    threshold: f64,
}

impl MetricWindow {
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rolling mean, which doubles as the naive next-value prediction.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    fn stddev(&self, mean: f64) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let sum_squares: f64 = self.values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_squares / self.values.len() as f64).sqrt()
    }

    /// Scores `value` against the current window without admitting it.
    pub fn score(&self, value: f64) -> (bool, f64) {
        if self.values.len() < 2 {
            return (false, 0.0);
        }
        let mean = self.mean();
        let stddev = self.stddev(mean);
        if stddev == 0.0 {
            return (false, 0.0);
        }
        let zscore = (value - mean) / stddev;
        (zscore.abs() > self.threshold, zscore)
    }

    /// Scores `value`, then admits it, evicting the oldest entry once the
    /// window is full.
    pub fn observe(&mut self, value: f64) -> (bool, f64) {
        let result = self.score(value);
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(values: &[f64]) -> MetricWindow {
        let mut w = MetricWindow::new(50, 2.0);
        for &v in values {
            w.observe(v);
        }
        w
    }

    #[test]
    fn empty_window_has_zero_mean() {
        let w = MetricWindow::new(50, 2.0);
        assert!(w.is_empty());
        assert_eq!(w.mean(), 0.0);
    }

    #[test]
    fn mean_tracks_the_window_contents() {
        let w = window(&[10.0, 20.0, 30.0]);
        assert_eq!(w.len(), 3);
        assert_eq!(w.mean(), 20.0);
    }

    #[test]
    fn full_windows_evict_the_oldest_value() {
        let mut w = MetricWindow::new(3, 2.0);
        for v in [1.0, 2.0, 3.0, 10.0] {
            w.observe(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.mean(), 5.0); // 2, 3, 10
    }

    #[test]
    fn fewer_than_two_values_never_score() {
        let mut w = MetricWindow::new(50, 2.0);
        assert_eq!(w.score(1000.0), (false, 0.0));
        w.observe(10.0);
        assert_eq!(w.score(1000.0), (false, 0.0));
    }

    #[test]
    fn flat_windows_never_score() {
        let w = window(&[42.0, 42.0, 42.0, 42.0]);
        // stddev is zero, so even a wild value gets a zero score
        assert_eq!(w.score(99999.0), (false, 0.0));
    }

    #[test]
    fn zscore_matches_population_stddev() {
        // mean 12, population stddev 4
        let w = window(&[10.0, 10.0, 10.0, 10.0, 20.0]);
        assert_eq!(w.score(24.0), (true, 3.0));
        assert_eq!(w.score(0.0), (true, -3.0));
        // exactly at the threshold is not anomalous
        assert_eq!(w.score(20.0), (false, 2.0));
    }

    #[test]
    fn observe_scores_before_admitting() {
        let mut w = MetricWindow::new(50, 2.0);
        for _ in 0..5 {
            w.observe(100.0);
        }
        // scored against the flat window, so the first outlier passes
        assert_eq!(w.observe(0.0), (false, 0.0));
        // now the window has spread and a repeat of the outlier scores
        let (anomaly, zscore) = w.score(0.0);
        assert!(anomaly, "zscore {zscore}");
    }

    #[test]
    fn spikes_against_a_steady_window_are_anomalous() {
        let mut w = MetricWindow::new(50, 2.0);
        for i in 0..50 {
            w.observe(if i % 2 == 0 { 49.0 } else { 51.0 });
        }
        let (anomaly, zscore) = w.observe(60.0);
        assert!(anomaly, "zscore {zscore}");
        assert!(zscore > 2.0);
    }
}
