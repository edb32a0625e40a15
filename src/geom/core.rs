use std::ops::{Add, Mul, Neg, Sub};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    /// Affine blend `self * (1 - t) + rhs * t`.
    ///
    /// Written as a two-term blend rather than `self + (rhs - self) * t` so that
    /// `t == 0` and `t == 1` return the operands bit for bit.
    #[must_use]
    pub fn blend(self, rhs: Self, t: f64) -> Self {
        let s = 1.0 - t;
        Self::new(
            self.x * s + rhs.x * t,
            self.y * s + rhs.y * t,
            self.z * s + rhs.z * t,
        )
    }

    #[must_use]
    pub const fn mul_scalar(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    #[must_use]
    pub const fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    #[must_use]
    pub const fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Component of `self` orthogonal to the (non-normalized) direction `dir`.
    #[must_use]
    pub fn reject_from(self, dir: Self) -> Self {
        let len2 = dir.length_squared();
        if len2 <= 0.0 || !len2.is_finite() {
            return self;
        }
        self.sub(dir.mul_scalar(self.dot(dir) / len2))
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Vec3::add(self, rhs)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::sub(self, rhs)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        self.mul_scalar(rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        rhs.mul_scalar(self)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub const fn add_vec(self, v: Vec3) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }

    #[must_use]
    pub const fn sub_point(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub_point(other).length()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        self.add_vec(rhs)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        self.sub_point(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter plane
// ─────────────────────────────────────────────────────────────────────────────

/// A point in the parameter plane of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(self.u + (rhs.u - self.u) * t, self.v + (rhs.v - self.v) * t)
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.u - other.u).hypot(self.v - other.v)
    }

    #[must_use]
    pub const fn coordinate(self, axis: IsoAxis) -> f64 {
        match axis {
            IsoAxis::U => self.u,
            IsoAxis::V => self.v,
        }
    }
}

/// Parametric axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsoAxis {
    U,
    V,
}

impl IsoAxis {
    pub const BOTH: [Self; 2] = [Self::U, Self::V];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::U => 0,
            Self::V => 1,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::U => Self::V,
            Self::V => Self::U,
        }
    }
}

/// Axis-aligned rectangle of the parameter plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvDomain {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl UvDomain {
    #[must_use]
    pub const fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self { u_min, u_max, v_min, v_max }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = UvPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut domain = Self::new(first.u, first.u, first.v, first.v);
        for p in iter {
            domain.u_min = domain.u_min.min(p.u);
            domain.u_max = domain.u_max.max(p.u);
            domain.v_min = domain.v_min.min(p.v);
            domain.v_max = domain.v_max.max(p.v);
        }
        Some(domain)
    }

    #[must_use]
    pub const fn range(self, axis: IsoAxis) -> (f64, f64) {
        match axis {
            IsoAxis::U => (self.u_min, self.u_max),
            IsoAxis::V => (self.v_min, self.v_max),
        }
    }

    #[must_use]
    pub fn span(self, axis: IsoAxis) -> f64 {
        let (a, b) = self.range(axis);
        b - a
    }

    /// Intersection with `other`, or `None` when the rectangles are disjoint.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let out = Self::new(
            self.u_min.max(other.u_min),
            self.u_max.min(other.u_max),
            self.v_min.max(other.v_min),
            self.v_max.min(other.v_max),
        );
        (out.u_min <= out.u_max && out.v_min <= out.v_max).then_some(out)
    }

    #[must_use]
    pub fn clamp(self, p: UvPoint) -> UvPoint {
        UvPoint::new(p.u.clamp(self.u_min, self.u_max), p.v.clamp(self.v_min, self.v_max))
    }
}

/// Twice the signed area of triangle `abc`; positive for counter-clockwise order.
#[must_use]
pub fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

/// Positive when `d` lies inside the circumcircle of the counter-clockwise triangle `abc`.
#[must_use]
pub fn in_circle(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> f64 {
    let adx = a.u - d.u;
    let ady = a.v - d.v;
    let bdx = b.u - d.u;
    let bdy = b.v - d.v;
    let cdx = c.u - d.u;
    let cdy = c.v - d.v;

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

/// Signed area of a closed ring (shoelace formula).
#[must_use]
pub fn signed_area(points: &[UvPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        area += a.u * b.v - b.u * a.v;
    }
    0.5 * area
}

/// Closest point of segment `ab` to `p`, returned as `(distance, t)` with `t` in `[0, 1]`.
#[must_use]
pub fn project_on_segment(p: UvPoint, a: UvPoint, b: UvPoint) -> (f64, f64) {
    let du = b.u - a.u;
    let dv = b.v - a.v;
    let len2 = du * du + dv * dv;
    if !len2.is_finite() || len2 <= 0.0 {
        return (p.distance_to(a), 0.0);
    }
    let t = (((p.u - a.u) * du + (p.v - a.v) * dv) / len2).clamp(0.0, 1.0);
    (p.distance_to(a.lerp(b, t)), t)
}
