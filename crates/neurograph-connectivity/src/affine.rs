// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! 4×4 voxel-to-world transforms with a `[0, 0, 0, 1]` bottom row

use crate::error::{ConnectivityError, ConnectivityResult};

const SINGULAR_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [[f64; 4]; 4]);

impl Affine {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Affine(m)
    }

    pub fn rows(&self) -> &[[f64; 4]; 4] {
        &self.0
    }

    /// `self · other`, i.e. apply `other` first
    pub fn compose(&self, other: &Affine) -> Affine {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[r][k] * other.0[k][c]).sum();
            }
        }
        Affine(out)
    }

    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        let mut out = [0.0; 3];
        for (r, v) in out.iter_mut().enumerate() {
            *v = m[r][0] * p[0] + m[r][1] * p[1] + m[r][2] * p[2] + m[r][3];
        }
        out
    }

    /// Inverse via the adjugate of the linear block
    pub fn inverse(&self) -> ConnectivityResult<Affine> {
        let m = &self.0;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];

        let adj = [
            [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
            [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
            [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
        ];
        let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0];
        if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
            return Err(ConnectivityError::SingularAffine(det));
        }

        let mut out = [[0.0; 4]; 4];
        for r in 0..3 {
            for c in 0..3 {
                out[r][c] = adj[r][c] / det;
            }
            out[r][3] = -(0..3).map(|k| out[r][k] * m[k][3]).sum::<f64>();
        }
        out[3][3] = 1.0;
        Ok(Affine(out))
    }

    pub fn approx_eq(&self, other: &Affine, tolerance: f64) -> bool {
        self.0
            .iter()
            .flatten()
            .zip(other.0.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl From<[[f64; 4]; 4]> for Affine {
    fn from(m: [[f64; 4]; 4]) -> Self {
        Affine(m)
    }
}
