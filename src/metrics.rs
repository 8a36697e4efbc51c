//! Batch-processing performance counters.

#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub batches_run: u64,
    pub points_evaluated: u64,
    pub results_emitted: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub queue_sends: u64,
    pub queue_commits: u64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn print_report(&self) {
        println!("\n=== Pointflow Performance Metrics ===");
        println!("Batches Run:          {}", self.batches_run);
        println!("Points Evaluated:     {}", self.points_evaluated);
        println!("Results Emitted:      {}", self.results_emitted);
        println!(
            "Cache Hit Rate:       {:.2}%",
            self.cache_hit_rate() * 100.0
        );
        println!("Queue Sends:          {}", self.queue_sends);
        println!("Queue Commits:        {}", self.queue_commits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hit_rate_is_zero_with_no_samples() {
        assert_eq!(PerformanceMetrics::new().cache_hit_rate(), 0.0);
    }

    #[test]
    fn cache_hit_rate_divides_hits_by_total() {
        let metrics = PerformanceMetrics {
            cache_hits: 3,
            cache_misses: 1,
            ..Default::default()
        };
        assert_eq!(metrics.cache_hit_rate(), 0.75);
    }
}
