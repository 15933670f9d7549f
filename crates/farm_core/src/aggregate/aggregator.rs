//! Merging fetched results in the local result directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::Serialize;

use super::accumulator::AverageAccumulator;
use super::errors::{AggregateError, AggregateResult};
use crate::frames::{self, average_file_name, is_sample_file, list_file_names, FrameSet};
use crate::models::{Job, JobKind};

/// What one aggregation pass found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    /// Sample files merged by this pass.
    pub new_samples: u32,
    /// Sample files merged over the job's lifetime.
    pub total_samples: u32,
    /// Finished frames (animation) or merged samples (image).
    pub completed: usize,
    /// Frames (animation) or samples (image) the job asked for.
    pub expected: usize,
    /// Expected frames with no file yet. Always empty for image jobs.
    pub missing: FrameSet,
    /// Averaged image, once one has been written.
    pub average_path: Option<PathBuf>,
}

/// Tracks one job's results across repeated fetches.
///
/// Sample files are merged into a running average exactly once each, so
/// polling again after a fetch that brought nothing is cheap.
pub struct ResultAggregator {
    kind: JobKind,
    result_dir: PathBuf,
    prefix: String,
    extension: String,
    frames: FrameSet,
    jobs_per_frame: u32,
    accumulator: Option<AverageAccumulator>,
    consumed: HashSet<String>,
    average_path: Option<PathBuf>,
}

impl ResultAggregator {
    pub fn new(job: &Job) -> Self {
        Self {
            kind: job.kind,
            result_dir: job.result_dir.clone(),
            prefix: job.output_prefix.clone(),
            extension: job.extension.clone(),
            frames: job.frames.clone(),
            jobs_per_frame: job.jobs_per_frame,
            accumulator: None,
            consumed: HashSet::new(),
            average_path: None,
        }
    }

    /// Samples merged so far.
    pub fn total_samples(&self) -> u32 {
        self.accumulator.as_ref().map_or(0, |acc| acc.count())
    }

    /// Count finished outputs currently in the result directory.
    ///
    /// For animations this is the number of expected frames with a file; for
    /// image jobs it is the number of sample files present.
    pub fn count_completed(&self) -> AggregateResult<usize> {
        let names = self.list()?;
        Ok(match self.kind {
            JobKind::Animation => {
                frames::present_frames(names.iter().map(String::as_str), &self.prefix)
                    .iter()
                    .filter(|f| self.frames.contains(*f))
                    .count()
            }
            JobKind::Image => names.iter().filter(|n| self.is_own_sample(n)).count(),
        })
    }

    /// Run one aggregation pass over the result directory.
    pub fn aggregate(&mut self) -> AggregateResult<AggregateReport> {
        match self.kind {
            JobKind::Animation => self.aggregate_frames(),
            JobKind::Image => self.aggregate_samples(),
        }
    }

    fn aggregate_frames(&mut self) -> AggregateResult<AggregateReport> {
        let names = self.list()?;
        let missing = frames::missing(&self.frames, names.iter().map(String::as_str), &self.prefix);
        let expected = self.frames.len();
        Ok(AggregateReport {
            new_samples: 0,
            total_samples: 0,
            completed: expected - missing.len(),
            expected,
            missing,
            average_path: None,
        })
    }

    fn aggregate_samples(&mut self) -> AggregateResult<AggregateReport> {
        let fresh: Vec<String> = self
            .list()?
            .into_iter()
            .filter(|n| self.is_own_sample(n) && !self.consumed.contains(n))
            .collect();

        let mut new_samples = 0;
        for name in fresh {
            let path = self.result_dir.join(&name);
            let image = load_rgba(&path)?;
            match self.accumulator.as_mut() {
                Some(acc) => acc.add(&image)?,
                None => self.accumulator = Some(AverageAccumulator::from_image(&image)),
            }
            self.consumed.insert(name);
            new_samples += 1;
        }

        if new_samples > 0 {
            if let Some(acc) = &self.accumulator {
                let out = self
                    .result_dir
                    .join(average_file_name(&self.prefix, &self.extension));
                write_image(&acc.finish()?, &out)?;
                tracing::debug!("Averaged {} samples into {}", acc.count(), out.display());
                self.average_path = Some(out);
            }
        }

        let total = self.total_samples();
        Ok(AggregateReport {
            new_samples,
            total_samples: total,
            completed: total as usize,
            expected: self.jobs_per_frame as usize,
            missing: FrameSet::new(),
            average_path: self.average_path.clone(),
        })
    }

    fn is_own_sample(&self, name: &str) -> bool {
        is_sample_file(name, &self.prefix)
    }

    fn list(&self) -> AggregateResult<Vec<String>> {
        list_file_names(&self.result_dir)
            .map_err(|e| AggregateError::io("listing result directory", e))
    }
}

/// Average `samples` and write the result to `output`.
pub fn average(samples: &[RgbaImage], output: &Path) -> AggregateResult<PathBuf> {
    let (first, rest) = samples.split_first().ok_or(AggregateError::NoSamples)?;
    let mut acc = AverageAccumulator::from_image(first);
    for image in rest {
        acc.add(image)?;
    }
    write_image(&acc.finish()?, output)?;
    Ok(output.to_path_buf())
}

/// Decode each file and average them into `output`.
pub fn average_files(paths: &[PathBuf], output: &Path) -> AggregateResult<PathBuf> {
    let samples = paths
        .iter()
        .map(|p| load_rgba(p))
        .collect::<AggregateResult<Vec<_>>>()?;
    average(&samples, output)
}

fn load_rgba(path: &Path) -> AggregateResult<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| AggregateError::image(path, e))
}

fn write_image(image: &RgbaImage, path: &Path) -> AggregateResult<()> {
    let result = match ImageFormat::from_path(path) {
        // JPEG has no alpha channel
        Ok(ImageFormat::Jpeg) => DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(path),
        _ => image.save(path),
    };
    result.map_err(|e| AggregateError::image(path, e))
}
