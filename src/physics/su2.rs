//! SU(2) algebra in the quaternion parametrisation `U = u0 + i u·σ`.
//!
//! The same 4-vector type also carries the Higgs doublet, which is stored as
//! a (not necessarily unit) quaternion.

use crate::data::field::SiteValue;
use crate::update::rng::SiteRng;

/// Quaternion `u0 + i u·σ`; a group element when [`Su2::norm_sq`] is 1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Su2(pub [f64; 4]);

impl Su2 {
    pub const IDENTITY: Su2 = Su2([1.0, 0.0, 0.0, 0.0]);
    pub const ZERO: Su2 = Su2([0.0; 4]);

    #[inline]
    pub fn from_value(v: &SiteValue) -> Self {
        Su2(*v)
    }

    #[inline]
    pub fn from_slice(s: &[f64]) -> Self {
        Su2([s[0], s[1], s[2], s[3]])
    }

    #[inline]
    pub fn to_value(self) -> SiteValue {
        self.0
    }

    #[inline]
    pub fn norm_sq(self) -> f64 {
        self.dot(self)
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// Euclidean 4-product, equal to `(self† other)_0`.
    #[inline]
    pub fn dot(self, other: Su2) -> f64 {
        let (a, b) = (self.0, other.0);
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
    }

    /// Hermitian conjugate.
    #[inline]
    pub fn dagger(self) -> Su2 {
        let a = self.0;
        Su2([a[0], -a[1], -a[2], -a[3]])
    }

    /// Real part of the trace of the 2x2 matrix.
    #[inline]
    pub fn re_trace(self) -> f64 {
        2.0 * self.0[0]
    }

    #[inline]
    pub fn scale(self, s: f64) -> Su2 {
        let a = self.0;
        Su2([s * a[0], s * a[1], s * a[2], s * a[3]])
    }

    #[inline]
    pub fn add(self, o: Su2) -> Su2 {
        let (a, b) = (self.0, o.0);
        Su2([a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]])
    }

    #[inline]
    pub fn sub(self, o: Su2) -> Su2 {
        self.add(o.scale(-1.0))
    }

    /// Projection back onto the group. `None` for a vanishing quaternion.
    pub fn normalized(self) -> Option<Su2> {
        let n = self.norm();
        (n > 0.0 && n.is_finite()).then(|| self.scale(1.0 / n))
    }

    /// Matrix product `self * b`.
    #[inline]
    pub fn mul(self, b: Su2) -> Su2 {
        let (a, b) = (self.0, b.0);
        Su2([
            a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
            a[1] * b[0] + a[0] * b[1] + a[3] * b[2] - a[2] * b[3],
            a[2] * b[0] - a[3] * b[1] + a[0] * b[2] + a[1] * b[3],
            a[3] * b[0] + a[2] * b[1] - a[1] * b[2] + a[0] * b[3],
        ])
    }

    /// `self * b†`
    #[inline]
    pub fn mul_dag(self, b: Su2) -> Su2 {
        self.mul(b.dagger())
    }

    /// `self† * b`
    #[inline]
    pub fn dag_mul(self, b: Su2) -> Su2 {
        self.dagger().mul(b)
    }

    /// Adjoint representation `R_ab = ½ Tr(σ_a U σ_b U†)`.
    pub fn adjoint(self) -> [[f64; 3]; 3] {
        let [u0, u1, u2, u3] = self.0;
        let u = [u1, u2, u3];
        let diag = u0 * u0 - (u1 * u1 + u2 * u2 + u3 * u3);
        let mut r = [[0.0; 3]; 3];
        for a in 0..3 {
            for b in 0..3 {
                r[a][b] = 2.0 * u[a] * u[b];
            }
            r[a][a] += diag;
        }
        // 2 u0 ε_abc u_c
        r[0][1] += 2.0 * u0 * u3;
        r[1][0] -= 2.0 * u0 * u3;
        r[1][2] += 2.0 * u0 * u1;
        r[2][1] -= 2.0 * u0 * u1;
        r[2][0] += 2.0 * u0 * u2;
        r[0][2] -= 2.0 * u0 * u2;
        r
    }
}

/// Haar-distributed SU(2) element: a uniformly random point on S³.
pub fn haar_random(rng: &mut SiteRng) -> Su2 {
    loop {
        let q = Su2([rng.gaussian(), rng.gaussian(), rng.gaussian(), rng.gaussian()]);
        if let Some(u) = q.normalized() {
            return u;
        }
    }
}

/// `R v`
#[inline]
pub fn rotate(r: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (o, row) in out.iter_mut().zip(r) {
        *o = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    out
}

/// `Rᵀ v`
#[inline]
pub fn rotate_transposed(r: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (b, o) in out.iter_mut().enumerate() {
        *o = r[0][b] * v[0] + r[1][b] * v[1] + r[2][b] * v[2];
    }
    out
}

#[inline]
pub fn dot3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
