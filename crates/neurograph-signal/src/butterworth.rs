// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Zero-phase Butterworth band-pass filtering
//!
//! The filter is a cascade of second-order sections: `order` high-pass
//! poles at `high_pass` followed by `order` low-pass poles at `low_pass`.
//! Each analogue prototype is mapped with the bilinear transform using a
//! pre-warped cutoff, so the -3 dB point lands exactly on the requested
//! frequency. [`ButterworthBandpass::filtfilt`] runs the cascade forward and
//! backward over an odd-reflected signal, as `scipy.signal.sosfiltfilt` does.

use crate::error::{SignalError, SignalResult};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// One normalised section, `a0 == 1`
///
/// First-order sections carry `b[2] == 0` and `a[1] == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b: [f64; 3],
    a: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    LowPass,
    HighPass,
}

impl Section {
    fn second_order(response: Response, k: f64, q: f64) -> Self {
        let norm = 1.0 / (1.0 + k / q + k * k);
        let a = [2.0 * (k * k - 1.0) * norm, (1.0 - k / q + k * k) * norm];
        let b = match response {
            Response::LowPass => {
                let b0 = k * k * norm;
                [b0, 2.0 * b0, b0]
            }
            Response::HighPass => [norm, -2.0 * norm, norm],
        };
        Self { b, a }
    }

    fn first_order(response: Response, k: f64) -> Self {
        let a1 = (k - 1.0) / (k + 1.0);
        let b = match response {
            Response::LowPass => {
                let b0 = k / (1.0 + k);
                [b0, b0, 0.0]
            }
            Response::HighPass => {
                let b0 = 1.0 / (1.0 + k);
                [b0, -b0, 0.0]
            }
        };
        Self { b, a: [a1, 0.0] }
    }

    /// Gain at DC, `H(z = 1)`
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Direct form II transposed state for a constant input `x`
    fn steady_state(&self, x: f64) -> [f64; 2] {
        let y = self.dc_gain() * x;
        [y - self.b[0] * x, self.b[2] * x - self.a[1] * y]
    }

    fn run(&self, signal: &mut [f64], mut z: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;
        for v in signal.iter_mut() {
            let x = *v;
            let y = b0 * x + z[0];
            z[0] = b1 * x - a1 * y + z[1];
            z[1] = b2 * x - a2 * y;
            *v = y;
        }
    }

    /// `|H(e^{jω})|` at normalised angular frequency `omega`
    fn magnitude(&self, omega: f64) -> f64 {
        let (c1, s1) = (omega.cos(), -omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), -(2.0 * omega).sin());
        let num_re = self.b[0] + self.b[1] * c1 + self.b[2] * c2;
        let num_im = self.b[1] * s1 + self.b[2] * s2;
        let den_re = 1.0 + self.a[0] * c1 + self.a[1] * c2;
        let den_im = self.a[0] * s1 + self.a[1] * s2;
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

fn cascade(response: Response, order: usize, cutoff: f64, fs: f64) -> Vec<Section> {
    let k = (PI * cutoff / fs).tan();
    let mut sections = Vec::with_capacity(order / 2 + 1);
    for i in 0..order / 2 {
        let theta = PI * (2 * i + 1) as f64 / (2 * order) as f64;
        let q = 1.0 / (2.0 * theta.sin());
        sections.push(Section::second_order(response, k, q));
    }
    if order % 2 == 1 {
        sections.push(Section::first_order(response, k));
    }
    sections
}

/// Butterworth band-pass (or single-sided) filter designed for a fixed TR
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthBandpass {
    sections: Vec<Section>,
    sampling_rate: f64,
    low_pass: Option<f64>,
    high_pass: Option<f64>,
}

impl ButterworthBandpass {
    /// Design a filter for signals sampled every `t_r` seconds
    ///
    /// A cutoff at or above the Nyquist frequency is dropped with a warning,
    /// matching how the cleaning step treats it as "no filtering on that side".
    /// A high-pass of exactly 0 Hz is dropped the same way.
    pub fn new(
        order: usize,
        low_pass: Option<f64>,
        high_pass: Option<f64>,
        t_r: f64,
    ) -> SignalResult<Self> {
        if !(t_r.is_finite() && t_r > 0.0) {
            return Err(SignalError::InvalidParameter(format!(
                "repetition time must be positive, got {}",
                t_r
            )));
        }
        if order == 0 {
            return Err(SignalError::InvalidParameter(
                "filter order must be at least 1".to_string(),
            ));
        }
        let fs = 1.0 / t_r;
        let nyquist = fs / 2.0;

        let check = |name: &str, cutoff: Option<f64>| -> SignalResult<Option<f64>> {
            match cutoff {
                None => Ok(None),
                Some(f) if !(f.is_finite() && f > 0.0) => Err(SignalError::InvalidParameter(
                    format!("{} must be positive, got {}", name, f),
                )),
                Some(f) if f >= nyquist => {
                    warn!(
                        target: "neurograph-signal",
                        "{} {} Hz is at or above the Nyquist frequency {} Hz; skipping it",
                        name, f, nyquist
                    );
                    Ok(None)
                }
                Some(f) => Ok(Some(f)),
            }
        };
        let low_pass = check("low_pass", low_pass)?;
        // A 0 Hz high-pass keeps everything down to DC
        let high_pass = check("high_pass", high_pass.filter(|&f| f != 0.0))?;

        if let (Some(lp), Some(hp)) = (low_pass, high_pass) {
            if hp >= lp {
                return Err(SignalError::InvalidParameter(format!(
                    "high_pass ({} Hz) must be below low_pass ({} Hz)",
                    hp, lp
                )));
            }
        }

        let mut sections = Vec::new();
        if let Some(hp) = high_pass {
            sections.extend(cascade(Response::HighPass, order, hp, fs));
        }
        if let Some(lp) = low_pass {
            sections.extend(cascade(Response::LowPass, order, lp, fs));
        }
        debug!(
            target: "neurograph-signal",
            "Designed Butterworth filter: order {}, high_pass {:?}, low_pass {:?}, {} sections",
            order,
            high_pass,
            low_pass,
            sections.len()
        );

        Ok(Self {
            sections,
            sampling_rate: fs,
            low_pass,
            high_pass,
        })
    }

    /// True when both cutoffs were absent or dropped
    pub fn is_identity(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn low_pass(&self) -> Option<f64> {
        self.low_pass
    }

    pub fn high_pass(&self) -> Option<f64> {
        self.high_pass
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Samples of odd reflection added on each side before filtering
    pub fn pad_length(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Magnitude response at `freq` Hz
    pub fn gain_at(&self, freq: f64) -> f64 {
        let omega = 2.0 * PI * freq / self.sampling_rate;
        self.sections.iter().map(|s| s.magnitude(omega)).product()
    }

    /// Causal filtering starting from a zero state
    pub fn filter(&self, signal: &mut [f64]) {
        for section in &self.sections {
            section.run(signal, [0.0; 2]);
        }
    }

    /// Zero-phase forward-backward filtering in place
    pub fn filtfilt(&self, signal: &mut [f64]) {
        let n = signal.len();
        if self.is_identity() || n < 2 {
            return;
        }
        let pad = self.pad_length().min(n - 1);

        let first = signal[0];
        let last = signal[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.run_steady(&mut ext);
        ext.reverse();
        self.run_steady(&mut ext);
        ext.reverse();

        signal.copy_from_slice(&ext[pad..pad + n]);
    }

    /// Cascade pass whose state starts as if `ext[0]` had always been the input
    fn run_steady(&self, ext: &mut [f64]) {
        let mut level = ext[0];
        for section in &self.sections {
            let z = section.steady_state(level);
            section.run(ext, z);
            level *= section.dc_gain();
        }
    }
}
