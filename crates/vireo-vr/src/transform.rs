//! Rigid and affine transforms.
//!
//! [`Matrix4`] stores its elements in column-major order and assumes a
//! right-handed frame: +x right, +y up, +z backwards (so -z is forward).
//! This matches the tracking runtime, so no axis remapping happens here.

use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, MulAssign};

use serde::{Deserialize, Serialize};

/// A 4-component vector. `w = 0` for directions, `w = 1` for points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn dot(&self, v: &Vec4) -> f32 {
        self.x * v.x + self.y * v.y + self.z * v.z + self.w * v.w
    }

    /// First three components.
    pub fn xyz(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Index<usize> for Vec4 {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            3 => &self.w,
            _ => panic!("Vec4 index out of range: {i}"),
        }
    }
}

impl IndexMut<usize> for Vec4 {
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        match i {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            3 => &mut self.w,
            _ => panic!("Vec4 index out of range: {i}"),
        }
    }
}

impl AddAssign for Vec4 {
    fn add_assign(&mut self, v: Vec4) {
        self.x += v.x;
        self.y += v.y;
        self.z += v.z;
        self.w += v.w;
    }
}

impl Add for Vec4 {
    type Output = Vec4;

    fn add(mut self, v: Vec4) -> Vec4 {
        self += v;
        self
    }
}

impl MulAssign<f32> for Vec4 {
    fn mul_assign(&mut self, s: f32) {
        self.x *= s;
        self.y *= s;
        self.z *= s;
        self.w *= s;
    }
}

impl Mul<f32> for Vec4 {
    type Output = Vec4;

    fn mul(mut self, s: f32) -> Vec4 {
        self *= s;
        self
    }
}

/// Row vector times matrix: `vᵀ M`.
impl Mul<Matrix4> for Vec4 {
    type Output = Vec4;

    fn mul(self, m: Matrix4) -> Vec4 {
        Vec4::new(
            self.dot(&m.col(0)),
            self.dot(&m.col(1)),
            self.dot(&m.col(2)),
            self.dot(&m.col(3)),
        )
    }
}

impl From<glam::Vec4> for Vec4 {
    fn from(v: glam::Vec4) -> Self {
        Self::from_array(v.to_array())
    }
}

impl From<Vec4> for glam::Vec4 {
    fn from(v: Vec4) -> Self {
        glam::Vec4::from_array(v.to_array())
    }
}

/// A 4x4 affine transform in column-major order.
///
/// Poses are kept rigid (orthonormal rotation plus translation). Only under
/// that invariant is [`Matrix4::invert_rigid`] a true inverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4 {
    pub m: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    /// Convert a row-major 3x4 matrix (the runtime's device-to-tracking
    /// layout) into a full affine transform.
    pub fn from_rows_3x4(r: [[f32; 4]; 3]) -> Self {
        Self {
            m: [
                r[0][0], r[1][0], r[2][0], 0.0, //
                r[0][1], r[1][1], r[2][1], 0.0, //
                r[0][2], r[1][2], r[2][2], 0.0, //
                r[0][3], r[1][3], r[2][3], 1.0,
            ],
        }
    }

    /// Convert a row-major 4x4 matrix (the runtime's projection layout).
    pub fn from_rows_4x4(r: [[f32; 4]; 4]) -> Self {
        let mut m = [0.0; 16];
        for (row, values) in r.iter().enumerate() {
            for (col, v) in values.iter().enumerate() {
                m[col * 4 + row] = *v;
            }
        }
        Self { m }
    }

    /// Rigid transform from a translation only.
    pub fn from_translation(tx: f32, ty: f32, tz: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.translate(tx, ty, tz);
        out
    }

    pub fn data(&self) -> &[f32; 16] {
        &self.m
    }

    pub fn identity(&mut self) -> &mut Self {
        *self = Self::IDENTITY;
        self
    }

    /// Column `i`: 0..=2 are the local x/y/z axes, 3 is the position.
    pub fn col(&self, i: usize) -> Vec4 {
        let j = 4 * i;
        Vec4::new(self.m[j], self.m[j + 1], self.m[j + 2], self.m[j + 3])
    }

    pub fn set_col(&mut self, i: usize, v: Vec4) -> &mut Self {
        self.m[4 * i..4 * i + 4].copy_from_slice(&v.to_array());
        self
    }

    pub fn row(&self, i: usize) -> Vec4 {
        Vec4::new(self.m[i], self.m[i + 4], self.m[i + 8], self.m[i + 12])
    }

    /// Local direction along x.
    pub fn ux(&self) -> Vec4 {
        self.col(0)
    }

    /// Local direction along y.
    pub fn uy(&self) -> Vec4 {
        self.col(1)
    }

    /// Local direction along z.
    pub fn uz(&self) -> Vec4 {
        self.col(2)
    }

    /// Position / translation amount.
    pub fn pos(&self) -> Vec4 {
        self.col(3)
    }

    pub fn transpose(&mut self) -> &mut Self {
        for i in [1, 6, 11] {
            self.m.swap(i, i + 3);
        }
        for i in [2, 7] {
            self.m.swap(i, i + 6);
        }
        self.m.swap(3, 12);
        self
    }

    pub fn transposed(&self) -> Self {
        let mut out = *self;
        out.transpose();
        out
    }

    /// Invert in place assuming the upper 3x3 block is a pure rotation.
    ///
    /// For A = T R, A⁻¹ = Rᵗ T⁻¹. The result is silently wrong if the matrix
    /// carries scale or shear.
    pub fn invert_rigid(&mut self) -> &mut Self {
        let m = &mut self.m;
        m.swap(1, 4);
        m.swap(2, 8);
        m.swap(6, 9);

        let itx = m[0] * -m[12] + m[4] * -m[13] + m[8] * -m[14];
        let ity = m[1] * -m[12] + m[5] * -m[13] + m[9] * -m[14];
        let itz = m[2] * -m[12] + m[6] * -m[13] + m[10] * -m[14];

        m[12] = itx;
        m[13] = ity;
        m[14] = itz;
        self
    }

    pub fn inverse_rigid(&self) -> Self {
        let mut out = *self;
        out.invert_rigid();
        out
    }

    /// Invert in place assuming rotation with uniform scale.
    ///
    /// For A = T R S, A⁻¹ = S⁻¹ Rᵗ T⁻¹. The squared scale is read off the
    /// first column, so anisotropic scale gives a wrong result.
    pub fn invert_orthogonal(&mut self) -> &mut Self {
        let m = &mut self.m;
        let is = 1.0 / (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]);
        for i in [0, 1, 2, 4, 5, 6, 8, 9, 10] {
            m[i] *= is;
        }
        self.invert_rigid()
    }

    pub fn inverse_orthogonal(&self) -> Self {
        let mut out = *self;
        out.invert_orthogonal();
        out
    }

    /// Translate in world space.
    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) -> &mut Self {
        self.m[12] += tx;
        self.m[13] += ty;
        self.m[14] += tz;
        self
    }

    /// Translate in local space by `tx*ux + ty*uy + tz*uz`.
    pub fn shift(&mut self, tx: f32, ty: f32, tz: f32) -> &mut Self {
        let (ux, uy, uz) = (self.ux(), self.uy(), self.uz());
        self.translate(
            tx * ux.x + ty * uy.x + tz * uz.x,
            tx * ux.y + ty * uy.y + tz * uz.y,
            tx * ux.z + ty * uy.z + tz * uz.z,
        )
    }

    pub fn shifted(&self, tx: f32, ty: f32, tz: f32) -> Self {
        let mut out = *self;
        out.shift(tx, ty, tz);
        out
    }

    /// Element-wise comparison within `eps`.
    pub fn abs_diff_eq(&self, other: &Matrix4, eps: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Index<usize> for Matrix4 {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        &self.m[i]
    }
}

impl IndexMut<usize> for Matrix4 {
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        &mut self.m[i]
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, n: Matrix4) -> Matrix4 {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.m[k * 4 + row] * n.m[col * 4 + k]).sum();
            }
        }
        Matrix4 { m: out }
    }
}

impl Mul<Vec4> for Matrix4 {
    type Output = Vec4;

    fn mul(self, v: Vec4) -> Vec4 {
        Vec4::new(
            self.row(0).dot(&v),
            self.row(1).dot(&v),
            self.row(2).dot(&v),
            self.row(3).dot(&v),
        )
    }
}

impl From<glam::Mat4> for Matrix4 {
    fn from(m: glam::Mat4) -> Self {
        Self::from_cols_array(m.to_cols_array())
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(m: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&m.m)
    }
}

impl fmt::Display for Matrix4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            let row = self.row(r);
            writeln!(
                f,
                "{:7.3} {:7.3} {:7.3} {:7.3}",
                row.x, row.y, row.z, row.w
            )?;
        }
        Ok(())
    }
}
