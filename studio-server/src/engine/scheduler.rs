//! Timestep scheduler configuration.

/// Number of timesteps the noise schedule is defined over.
pub const NUM_TRAIN_TIMESTEPS: u32 = 1000;

const BETA_START: f64 = 0.00085;
const BETA_END: f64 = 0.012;
const STEPS_OFFSET: u32 = 1;

/// Scaled-linear noise schedule with "leading" timestep spacing.
///
/// `set_timesteps` mutates the schedule in place, so a scheduler shared
/// between requests must only be touched under the engine lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    alphas_cumprod: Vec<f64>,
    timesteps: Vec<u32>,
}

impl Scheduler {
    pub fn new() -> Self {
        let n = NUM_TRAIN_TIMESTEPS as usize;
        let (start, end) = (BETA_START.sqrt(), BETA_END.sqrt());

        let mut alphas_cumprod = Vec::with_capacity(n);
        let mut product = 1.0;
        for i in 0..n {
            let beta = (start + (end - start) * i as f64 / (n - 1) as f64).powi(2);
            product *= 1.0 - beta;
            alphas_cumprod.push(product);
        }

        Self {
            alphas_cumprod,
            timesteps: Vec::new(),
        }
    }

    /// Schedule `steps` inference steps, highest timestep first.
    pub fn set_timesteps(&mut self, steps: u32) {
        let steps = steps.min(NUM_TRAIN_TIMESTEPS);
        if steps == 0 {
            self.timesteps.clear();
            return;
        }
        let ratio = NUM_TRAIN_TIMESTEPS / steps;
        self.timesteps = (0..steps).rev().map(|i| i * ratio + STEPS_OFFSET).collect();
    }

    /// A copy of this schedule configured for `steps`, leaving `self` untouched.
    pub fn with_timesteps(&self, steps: u32) -> Self {
        let mut scheduler = self.clone();
        scheduler.set_timesteps(steps);
        scheduler
    }

    pub fn timesteps(&self) -> &[u32] {
        &self.timesteps
    }

    pub fn num_inference_steps(&self) -> usize {
        self.timesteps.len()
    }

    /// Cumulative signal retention at timestep `t`.
    pub fn alpha_cumprod(&self, t: u32) -> f64 {
        let index = (t as usize).min(self.alphas_cumprod.len() - 1);
        self.alphas_cumprod[index]
    }

    /// Signal retention after the step at `t`, i.e. at the next scheduled
    /// timestep, or at timestep 0 after the final step.
    pub fn next_alpha_cumprod(&self, t: u32) -> f64 {
        let ratio = NUM_TRAIN_TIMESTEPS / self.num_inference_steps().max(1) as u32;
        match t.checked_sub(ratio) {
            Some(prev) => self.alpha_cumprod(prev),
            None => self.alphas_cumprod[0],
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
