//! Offline slot detection by brightness.
//!
//! The image is converted to grayscale, scaled to a fixed width and cut into a
//! `rows x cols` grid. A cell whose mean brightness reaches the threshold is reported as an
//! empty slot. Slots are numbered from 1 in row-major order.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, GrayImage};

use crate::{
    error::VisionError,
    normalizer::{CabinetAnalysisResult, DEFAULT_CONFIDENCE},
    providers::VisionProvider,
    types::VisionRequest,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    /// Mean brightness (0-255) at or above which a cell counts as empty.
    pub empty_threshold: f32,
    pub target_width: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 6,
            cols: 10,
            empty_threshold: 150.0,
            target_width: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridAnalyzer {
    config: GridConfig,
}

impl GridAnalyzer {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<CabinetAnalysisResult, VisionError> {
        let image = image::load_from_memory(bytes)
            .map_err(|error| VisionError::InvalidImage(error.to_string()))?;
        let gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(VisionError::InvalidImage("image has no pixels".to_string()));
        }

        Ok(CabinetAnalysisResult {
            empty_slots: self.empty_slots(&gray),
            total_slots_visible: i64::from(self.config.rows) * i64::from(self.config.cols),
            confidence: DEFAULT_CONFIDENCE.to_string(),
        })
    }

    pub fn empty_slots(&self, gray: &GrayImage) -> Vec<i64> {
        let GridConfig {
            rows,
            cols,
            empty_threshold,
            target_width,
        } = self.config;

        let scale = f64::from(target_width) / f64::from(gray.width());
        let height = ((f64::from(gray.height()) * scale) as u32).max(1);
        let resized = image::imageops::resize(gray, target_width, height, FilterType::CatmullRom);

        let cell_w = f64::from(resized.width()) / f64::from(cols);
        let cell_h = f64::from(resized.height()) / f64::from(rows);

        let mut empty = Vec::new();
        let mut slot = 1_i64;
        for r in 0..rows {
            for c in 0..cols {
                let x0 = (f64::from(c) * cell_w) as u32;
                let x1 = (f64::from(c + 1) * cell_w) as u32;
                let y0 = (f64::from(r) * cell_h) as u32;
                let y1 = (f64::from(r + 1) * cell_h) as u32;

                if let Some(mean) = cell_mean(&resized, x0..x1, y0..y1) {
                    if mean >= f64::from(empty_threshold) {
                        empty.push(slot);
                    }
                }
                slot += 1;
            }
        }

        empty
    }
}

// None for a zero-area cell.
fn cell_mean(image: &GrayImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> Option<f64> {
    let mut sum = 0_u64;
    let mut count = 0_u64;
    for y in ys.start..ys.end.min(image.height()) {
        for x in xs.start..xs.end.min(image.width()) {
            sum += u64::from(image.get_pixel(x, y).0[0]);
            count += 1;
        }
    }

    (count > 0).then(|| sum as f64 / count as f64)
}

#[async_trait]
impl VisionProvider for GridAnalyzer {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError> {
        let bytes = STANDARD
            .decode(request.image.data.trim())
            .map_err(|error| VisionError::InvalidImage(format!("invalid base64: {error}")))?;

        let analyzer = self.clone();
        let result = tokio::task::spawn_blocking(move || analyzer.analyze_bytes(&bytes))
            .await
            .map_err(|error| VisionError::Task(error.to_string()))??;

        tracing::debug!(empty = result.empty_slots.len(), "grid analysis finished");
        Ok(serde_json::to_string(&result)?)
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}
