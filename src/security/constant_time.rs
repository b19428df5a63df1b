/*!
 * Timing Invariance Measurement
 *
 * A two-class timing harness in the style of dudect: an operation is run
 * alternately on two input classes (for key verification, a candidate that
 * differs from the expected key in its first byte versus its last byte) and
 * the two timing distributions are compared. An operation whose running
 * time leaks the mismatch position shows a shifted median and a large
 * Welch t statistic.
 */

use std::hint::black_box;
use std::sync::atomic::{compiler_fence, Ordering};
use std::time::{Duration, Instant};

use crate::error::{error_codes, CryptoError, CryptoResult};

/// Configuration for a timing measurement
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Measured runs per input class
    pub iterations: usize,
    /// Unmeasured runs per class before measuring
    pub warmup_iterations: usize,
    /// Largest accepted relative difference between the class medians
    pub max_median_ratio: f64,
    /// Largest accepted absolute Welch t statistic
    pub max_t_statistic: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            warmup_iterations: 1_000,
            max_median_ratio: 0.05,
            max_t_statistic: 4.5,
        }
    }
}

impl TimingConfig {
    /// Lenient settings for noisy shared machines; compares medians only
    pub fn robust(iterations: usize) -> Self {
        Self {
            iterations,
            warmup_iterations: iterations / 10,
            max_median_ratio: 0.25,
            max_t_statistic: f64::INFINITY,
        }
    }
}

/// Summary of one class's timings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassTiming {
    pub median: Duration,
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub samples: usize,
}

/// Comparison of the two classes
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    pub class_a: ClassTiming,
    pub class_b: ClassTiming,
    /// `|median_a - median_b| / max(median_a, median_b)`
    pub median_ratio: f64,
    /// Welch's t statistic between the two samples
    pub t_statistic: f64,
}

impl TimingReport {
    /// Whether both statistics are within the configured bounds
    pub fn is_constant_time(&self, config: &TimingConfig) -> bool {
        self.median_ratio <= config.max_median_ratio
            && self.t_statistic.abs() <= config.max_t_statistic
    }
}

/// Time `operation` on two input classes, interleaving the runs so that
/// drift in machine load affects both classes alike.
pub fn measure_classes<T, F>(
    mut operation: F,
    class_a: &T,
    class_b: &T,
    config: &TimingConfig,
) -> CryptoResult<TimingReport>
where
    F: FnMut(&T),
{
    if config.iterations < 2 {
        return Err(CryptoError::invalid_parameter(
            "iterations",
            "at least 2",
            &config.iterations.to_string(),
            error_codes::INVALID_CONFIGURATION,
        ));
    }

    for _ in 0..config.warmup_iterations {
        operation(black_box(class_a));
        operation(black_box(class_b));
    }

    let mut samples_a = Vec::with_capacity(config.iterations);
    let mut samples_b = Vec::with_capacity(config.iterations);
    for i in 0..config.iterations {
        // Alternate which class goes first.
        if i % 2 == 0 {
            samples_a.push(time_once(&mut operation, class_a));
            samples_b.push(time_once(&mut operation, class_b));
        } else {
            samples_b.push(time_once(&mut operation, class_b));
            samples_a.push(time_once(&mut operation, class_a));
        }
    }

    let class_a = summarize(&mut samples_a);
    let class_b = summarize(&mut samples_b);
    let slower = class_a.median.max(class_b.median).as_nanos() as f64;
    let median_ratio = if slower == 0.0 {
        0.0
    } else {
        (class_a.median.as_nanos() as f64 - class_b.median.as_nanos() as f64).abs() / slower
    };

    Ok(TimingReport {
        t_statistic: welch_t(&class_a, &class_b),
        class_a,
        class_b,
        median_ratio,
    })
}

/// Measure and fail with `InvalidParams` naming `label` when the operation
/// is not timing invariant under `config`
pub fn verify_constant_time<T, F>(
    label: &str,
    operation: F,
    class_a: &T,
    class_b: &T,
    config: &TimingConfig,
) -> CryptoResult<TimingReport>
where
    F: FnMut(&T),
{
    let report = measure_classes(operation, class_a, class_b, config)?;
    if !report.is_constant_time(config) {
        log::warn!(
            "timing check '{}' failed: median ratio {:.3}, t = {:.2}",
            label,
            report.median_ratio,
            report.t_statistic
        );
        return Err(CryptoError::invalid_parameter(
            label,
            &format!(
                "median ratio <= {} and |t| <= {}",
                config.max_median_ratio, config.max_t_statistic
            ),
            &format!(
                "median ratio {:.3}, t {:.2}",
                report.median_ratio, report.t_statistic
            ),
            error_codes::INVALID_CONFIGURATION,
        ));
    }
    Ok(report)
}

fn time_once<T, F: FnMut(&T)>(operation: &mut F, input: &T) -> Duration {
    compiler_fence(Ordering::SeqCst);
    let start = Instant::now();
    operation(black_box(input));
    let elapsed = start.elapsed();
    compiler_fence(Ordering::SeqCst);
    elapsed
}

fn summarize(samples: &mut [Duration]) -> ClassTiming {
    samples.sort_unstable();
    let n = samples.len() as f64;
    let mean_ns = samples.iter().map(|d| d.as_nanos() as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|d| {
            let diff = d.as_nanos() as f64 - mean_ns;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    ClassTiming {
        median: samples[samples.len() / 2],
        mean_ns,
        std_dev_ns: variance.sqrt(),
        samples: samples.len(),
    }
}

fn welch_t(a: &ClassTiming, b: &ClassTiming) -> f64 {
    let se = (a.std_dev_ns.powi(2) / a.samples as f64 + b.std_dev_ns.powi(2) / b.samples as f64).sqrt();
    if se == 0.0 {
        0.0
    } else {
        (a.mean_ns - b.mean_ns) / se
    }
}
