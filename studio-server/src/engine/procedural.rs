//! In-process procedural diffusion engine.
//!
//! A small CPU pipeline with the same shape as a latent diffusion model:
//! seeded Gaussian noise, text conditioning, one DDIM-style update per
//! scheduled timestep, PNG output. Text is conditioned through a SHA-256
//! digest, so identical prompt, negative prompt and seed always give
//! byte-identical images.

use std::f64::consts::{SQRT_2, TAU};
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::{DiffusionEngine, EngineLoader, GenerationParams, Scheduler};
use crate::error::{Error, Result};

/// Share of the current latent folded back into each `x0` prediction.
const NOISE_MEMORY: f64 = 0.12;
/// How hard the negative prompt pushes the target away from its palette.
const NEGATIVE_GUIDANCE: f64 = 0.3;

/// Model-specific lookup table mapping digest bytes to colour channel values.
struct Weights {
    table: [f64; 256],
}

impl Weights {
    fn derive(model: &str) -> Self {
        let digest = Sha256::digest(model.as_bytes());
        let mut table = [0.0; 256];
        for (i, value) in table.iter_mut().enumerate() {
            let mixed = (i as u8) ^ digest[i % digest.len()];
            *value = mixed as f64 / 255.0 * 2.0 - 1.0;
        }
        Self { table }
    }
}

/// Text embedding: four palette colours plus a wave pattern.
struct Conditioning {
    colors: [[f64; 3]; 4],
    freq: [f64; 2],
    phase: [f64; 2],
}

impl Conditioning {
    fn encode(text: &str, weights: &Weights) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut colors = [[0.0; 3]; 4];
        for (k, color) in colors.iter_mut().enumerate() {
            for (c, channel) in color.iter_mut().enumerate() {
                *channel = weights.table[digest[k * 3 + c] as usize];
            }
        }
        Self {
            colors,
            freq: [1.0 + (digest[12] % 5) as f64, 1.0 + (digest[13] % 5) as f64],
            phase: [
                digest[14] as f64 / 255.0 * TAU,
                digest[15] as f64 / 255.0 * TAU,
            ],
        }
    }

    fn mean_color(&self) -> [f64; 3] {
        let mut mean = [0.0; 3];
        for color in &self.colors {
            for c in 0..3 {
                mean[c] += color[c] / 4.0;
            }
        }
        mean
    }

    /// Clean image the denoiser steers toward at normalised position `(u, v)`.
    fn target(&self, u: f64, v: f64) -> [f64; 3] {
        let wave = 0.5
            + 0.5
                * (TAU * self.freq[0] * u + self.phase[0]).sin()
                * (TAU * self.freq[1] * v + self.phase[1]).cos();
        let radial = (((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt() * SQRT_2).clamp(0.0, 1.0);

        let mut out = [0.0; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let inner = lerp(self.colors[0][c], self.colors[1][c], wave);
            let outer = lerp(self.colors[2][c], self.colors[3][c], wave);
            *value = lerp(inner, outer, radial);
        }
        out
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Loader for [`ProceduralEngine`].
pub struct ProceduralLoader {
    model: String,
    width: u32,
    height: u32,
}

impl ProceduralLoader {
    pub fn new(model: &str, width: u32, height: u32) -> Self {
        Self {
            model: model.to_string(),
            width,
            height,
        }
    }
}

#[async_trait]
impl EngineLoader for ProceduralLoader {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<Box<dyn DiffusionEngine>> {
        let model = self.model.clone();
        let weights = tokio::task::spawn_blocking(move || Weights::derive(&model))
            .await
            .map_err(|e| Error::Inference(format!("model load worker failed: {}", e)))?;

        Ok(Box::new(ProceduralEngine {
            weights: Arc::new(weights),
            scheduler: Scheduler::new(),
            width: self.width,
            height: self.height,
        }))
    }
}

/// Deterministic CPU diffusion engine.
pub struct ProceduralEngine {
    weights: Arc<Weights>,
    scheduler: Scheduler,
    width: u32,
    height: u32,
}

#[async_trait]
impl DiffusionEngine for ProceduralEngine {
    fn engine_type(&self) -> &'static str {
        "procedural"
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    async fn generate(&mut self, params: &GenerationParams) -> Result<Vec<u8>> {
        if self.scheduler.num_inference_steps() != params.steps as usize {
            return Err(Error::Inference(format!(
                "scheduler configured for {} steps, request wants {}",
                self.scheduler.num_inference_steps(),
                params.steps
            )));
        }

        let job = RenderJob {
            weights: self.weights.clone(),
            scheduler: self.scheduler.clone(),
            params: params.clone(),
            width: self.width,
            height: self.height,
        };

        // CPU-bound; keep it off the request executor.
        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| Error::Inference(format!("generation worker failed: {}", e)))?
    }
}

struct RenderJob {
    weights: Arc<Weights>,
    scheduler: Scheduler,
    params: GenerationParams,
    width: u32,
    height: u32,
}

impl RenderJob {
    fn run(self) -> Result<Vec<u8>> {
        let (w, h) = (self.width as usize, self.height as usize);

        let positive = Conditioning::encode(&self.params.prompt, &self.weights);
        let negative = self
            .params
            .negative_prompt
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| Conditioning::encode(n, &self.weights).mean_color());

        let mut targets = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let u = x as f64 / w.max(2).saturating_sub(1) as f64;
                let v = y as f64 / h.max(2).saturating_sub(1) as f64;
                let mut pixel = positive.target(u, v);
                if let Some(avoid) = negative {
                    for c in 0..3 {
                        pixel[c] = (pixel[c] + NEGATIVE_GUIDANCE * (pixel[c] - avoid[c]))
                            .clamp(-1.0, 1.0);
                    }
                }
                targets.extend_from_slice(&pixel);
            }
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut latent: Vec<f64> = (0..w * h * 3).map(|_| gaussian(&mut rng)).collect();

        for &t in self.scheduler.timesteps() {
            let alpha = self.scheduler.alpha_cumprod(t);
            let alpha_next = self.scheduler.next_alpha_cumprod(t);
            for (x, &clean) in latent.iter_mut().zip(&targets) {
                let x0 = (1.0 - NOISE_MEMORY) * clean + NOISE_MEMORY * x.clamp(-1.0, 1.0);
                let eps = (*x - alpha.sqrt() * x0) / (1.0 - alpha).sqrt();
                *x = alpha_next.sqrt() * x0 + (1.0 - alpha_next).sqrt() * eps;
            }
        }

        let image = RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * w + x as usize) * 3;
            Rgb([
                to_byte(latent[i]),
                to_byte(latent[i + 1]),
                to_byte(latent[i + 2]),
            ])
        });

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| Error::Inference(format!("PNG encoding failed: {}", e)))?;
        Ok(png)
    }
}

fn to_byte(value: f64) -> u8 {
    ((value.clamp(-1.0, 1.0) + 1.0) / 2.0 * 255.0).round() as u8
}
