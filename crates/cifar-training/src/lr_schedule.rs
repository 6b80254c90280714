//! Learning rate schedules.

use cifar_core::LrScheduleConfig;

/// Learning rate scheduler driven by epoch and batch indices
#[derive(Debug, Clone)]
pub struct LrScheduler {
    config: LrScheduleConfig,
    max_lr: f64,
    total_epochs: usize,
}

impl LrScheduler {
    /// Creates a scheduler for a run of `total_epochs` epochs
    pub fn new(config: LrScheduleConfig, max_lr: f64, total_epochs: usize) -> Self {
        Self {
            config,
            max_lr,
            total_epochs,
        }
    }

    /// Learning rate at the start of an epoch (zero-based)
    pub fn get_lr(&self, epoch: usize) -> f64 {
        match self.config {
            LrScheduleConfig::Constant => self.max_lr,
            LrScheduleConfig::OneCycle { .. } => {
                // Epoch granularity is too coarse for one-cycle; callers
                // step it per batch via get_lr_at_step.
                self.get_lr_at_step(epoch, 0, 1)
            }
            LrScheduleConfig::Cosine { min_lr } => {
                let progress = if self.total_epochs > 1 {
                    epoch as f64 / (self.total_epochs - 1) as f64
                } else {
                    0.0
                };
                min_lr
                    + 0.5 * (self.max_lr - min_lr) * (1.0 + (std::f64::consts::PI * progress).cos())
            }
            LrScheduleConfig::Step { step_size, gamma } => {
                let decays = if step_size > 0 { epoch / step_size } else { 0 };
                self.max_lr * gamma.powi(decays as i32)
            }
        }
    }

    /// Learning rate for a specific batch within an epoch.
    ///
    /// For the one-cycle policy this warms up linearly from
    /// `max_lr / div_factor` over the first `pct_start` fraction of all
    /// steps, then anneals with a cosine down to
    /// `max_lr / final_div_factor`. Other schedules are constant within
    /// an epoch.
    pub fn get_lr_at_step(&self, epoch: usize, step: usize, steps_per_epoch: usize) -> f64 {
        match self.config {
            LrScheduleConfig::OneCycle {
                pct_start,
                div_factor,
                final_div_factor,
            } => {
                let total_steps = (self.total_epochs * steps_per_epoch).max(1) as f64;
                let global_step = (epoch * steps_per_epoch + step) as f64;

                let initial_lr = self.max_lr / div_factor;
                let final_lr = self.max_lr / final_div_factor;
                let warmup_steps = (pct_start * total_steps).max(1.0);

                if global_step < warmup_steps {
                    let progress = global_step / warmup_steps;
                    initial_lr + (self.max_lr - initial_lr) * progress
                } else {
                    let anneal_steps = (total_steps - warmup_steps).max(1.0);
                    let progress = ((global_step - warmup_steps) / anneal_steps).min(1.0);
                    final_lr
                        + 0.5
                            * (self.max_lr - final_lr)
                            * (1.0 + (std::f64::consts::PI * progress).cos())
                }
            }
            _ => self.get_lr(epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_cycle(max_lr: f64, epochs: usize) -> LrScheduler {
        LrScheduler::new(
            LrScheduleConfig::OneCycle {
                pct_start: 0.3,
                div_factor: 25.0,
                final_div_factor: 1e4,
            },
            max_lr,
            epochs,
        )
    }

    #[test]
    fn test_constant() {
        let sched = LrScheduler::new(LrScheduleConfig::Constant, 0.01, 10);
        assert_eq!(sched.get_lr(0), 0.01);
        assert_eq!(sched.get_lr(9), 0.01);
        assert_eq!(sched.get_lr_at_step(5, 17, 100), 0.01);
    }

    #[test]
    fn test_one_cycle_starts_low() {
        let sched = one_cycle(0.01, 8);
        let start = sched.get_lr_at_step(0, 0, 100);
        assert!((start - 0.01 / 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_cycle_peaks_at_warmup_end() {
        let sched = one_cycle(0.01, 10);
        // pct_start 0.3 over 10 epochs x 100 steps peaks at step 300
        let peak = sched.get_lr_at_step(3, 0, 100);
        assert!((peak - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_one_cycle_anneals_to_final() {
        let sched = one_cycle(0.01, 8);
        let last = sched.get_lr_at_step(7, 99, 100);
        assert!(last < 0.01 / 100.0);
        assert!(last >= 0.01 / 1e4 - 1e-12);
    }

    #[test]
    fn test_one_cycle_monotonic_warmup() {
        let sched = one_cycle(0.01, 8);
        let mut prev = 0.0;
        for step in 0..200 {
            let lr = sched.get_lr_at_step(0, step, 100);
            assert!(lr >= prev);
            prev = lr;
        }
    }

    #[test]
    fn test_step_decay() {
        let sched = LrScheduler::new(
            LrScheduleConfig::Step {
                step_size: 2,
                gamma: 0.1,
            },
            1.0,
            10,
        );
        assert!((sched.get_lr(0) - 1.0).abs() < 1e-12);
        assert!((sched.get_lr(1) - 1.0).abs() < 1e-12);
        assert!((sched.get_lr(2) - 0.1).abs() < 1e-12);
        assert!((sched.get_lr(4) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_endpoints() {
        let sched = LrScheduler::new(LrScheduleConfig::Cosine { min_lr: 1e-5 }, 0.01, 5);
        assert!((sched.get_lr(0) - 0.01).abs() < 1e-9);
        assert!((sched.get_lr(4) - 1e-5).abs() < 1e-9);
    }
}
