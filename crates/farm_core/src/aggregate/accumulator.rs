//! Pixel-wise running average of same-sized images.

use image::RgbaImage;

use super::errors::{AggregateError, AggregateResult};

/// Per-channel sums over every image added so far.
///
/// Sums of 8-bit channel values are exact in `f64`, so the result does not
/// depend on the order samples arrive in.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageAccumulator {
    width: u32,
    height: u32,
    sums: Vec<f64>,
    count: u32,
}

impl AverageAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sums: vec![0.0; width as usize * height as usize * 4],
            count: 0,
        }
    }

    /// Start an accumulator sized to `image` and add it.
    pub fn from_image(image: &RgbaImage) -> Self {
        let mut acc = Self::new(image.width(), image.height());
        acc.add_unchecked(image);
        acc
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of images accumulated.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, image: &RgbaImage) -> AggregateResult<()> {
        self.check(image.dimensions())?;
        self.add_unchecked(image);
        Ok(())
    }

    fn add_unchecked(&mut self, image: &RgbaImage) {
        for (sum, &value) in self.sums.iter_mut().zip(image.as_raw().iter()) {
            *sum += f64::from(value);
        }
        self.count += 1;
    }

    /// Fold another accumulator's samples into this one.
    pub fn merge(&mut self, other: &AverageAccumulator) -> AggregateResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        self.check(other.dimensions())?;
        for (sum, value) in self.sums.iter_mut().zip(other.sums.iter()) {
            *sum += value;
        }
        self.count += other.count;
        Ok(())
    }

    /// The average image, each channel rounded to the nearest 8-bit value.
    pub fn finish(&self) -> AggregateResult<RgbaImage> {
        if self.count == 0 {
            return Err(AggregateError::NoSamples);
        }
        let n = f64::from(self.count);
        let pixels = self
            .sums
            .iter()
            .map(|sum| (sum / n).round().clamp(0.0, 255.0) as u8)
            .collect();
        RgbaImage::from_raw(self.width, self.height, pixels).ok_or(AggregateError::NoSamples)
    }

    fn check(&self, found: (u32, u32)) -> AggregateResult<()> {
        if found != self.dimensions() {
            return Err(AggregateError::dimension_mismatch(self.dimensions(), found));
        }
        Ok(())
    }
}
