use crate::glam::DVec2;

/// An axis-aligned rectangle. Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb2 {
    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The smallest rectangle containing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::from_corners(first, first), Self::including))
    }

    pub fn including(self, p: DVec2) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn padded(self, pad: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(pad),
            max: self.max + DVec2::splat(pad),
        }
    }

    pub fn shape(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn contains(&self, p: DVec2) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// The `[min_x, max_x]` interval where the horizontal line at `y` overlaps this rectangle.
    pub fn row_span(&self, y: f64) -> Option<[f64; 2]> {
        (self.min.y <= y && y <= self.max.y).then(|| [self.min.x, self.max.x])
    }
}

/// All points within `radius` of the segment from `start` to `end`. A degenerate segment is a disc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capsule {
    pub start: DVec2,
    pub end: DVec2,
    pub radius: f64,
}

impl Capsule {
    pub fn new(start: DVec2, end: DVec2, radius: f64) -> Self {
        Self { start, end, radius }
    }

    pub fn disc(center: DVec2, radius: f64) -> Self {
        Self::new(center, center, radius)
    }

    pub fn aabb(&self) -> Aabb2 {
        Aabb2::from_corners(self.start, self.end).padded(self.radius)
    }

    /// Distance from `p` to the capsule's axis segment.
    pub fn axis_distance(&self, p: DVec2) -> f64 {
        let d = self.end - self.start;
        let len_sq = d.length_squared();
        if len_sq == 0.0 {
            return p.distance(self.start);
        }
        let t = ((p - self.start).dot(d) / len_sq).clamp(0.0, 1.0);
        p.distance(self.start + t * d)
    }

    pub fn contains(&self, p: DVec2) -> bool {
        self.axis_distance(p) <= self.radius
    }

    /// The `[min_x, max_x]` interval where the horizontal line at `y` passes through the capsule.
    ///
    /// The capsule is the union of its two end discs and the rectangular body between them. Since the capsule is convex,
    /// the union of the three row intervals is itself one interval.
    pub fn row_span(&self, y: f64) -> Option<[f64; 2]> {
        [
            disc_row_span(self.start, self.radius, y),
            disc_row_span(self.end, self.radius, y),
            self.body_row_span(y),
        ]
        .into_iter()
        .flatten()
        .reduce(|a, b| [a[0].min(b[0]), a[1].max(b[1])])
    }

    fn body_row_span(&self, y: f64) -> Option<[f64; 2]> {
        let d = self.end - self.start;
        let len_sq = d.length_squared();
        if len_sq == 0.0 || self.radius < 0.0 {
            return None;
        }
        let half_width = self.radius * len_sq.sqrt();
        let dy = y - self.start.y;

        let mut interval = [f64::NEG_INFINITY, f64::INFINITY];
        // Projection onto the axis stays between the end points.
        clip_linear(
            &mut interval,
            d.x,
            dy * d.y - self.start.x * d.x,
            0.0,
            len_sq,
        )?;
        // Perpendicular offset from the axis stays within the radius.
        clip_linear(
            &mut interval,
            d.y,
            -dy * d.x - self.start.x * d.y,
            -half_width,
            half_width,
        )?;
        Some(interval)
    }
}

fn disc_row_span(center: DVec2, radius: f64, y: f64) -> Option<[f64; 2]> {
    let dy = y - center.y;
    let h_sq = radius * radius - dy * dy;
    if h_sq < 0.0 || radius < 0.0 {
        return None;
    }
    let h = h_sq.sqrt();
    Some([center.x - h, center.x + h])
}

/// Narrows `interval` to the `x` satisfying `lo <= a * x + b <= hi`.
fn clip_linear(interval: &mut [f64; 2], a: f64, b: f64, lo: f64, hi: f64) -> Option<()> {
    if a == 0.0 {
        if b < lo || b > hi {
            return None;
        }
    } else {
        let x0 = (lo - b) / a;
        let x1 = (hi - b) / a;
        interval[0] = interval[0].max(x0.min(x1));
        interval[1] = interval[1].min(x0.max(x1));
    }
    (interval[0] <= interval[1]).then(|| ())
}

/// A simple polygon filled with the even-odd rule. Closing edge is implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<DVec2>,
}

impl Polygon {
    /// Requires at least three vertices.
    pub fn new(vertices: Vec<DVec2>) -> Option<Self> {
        (vertices.len() >= 3).then(|| Self { vertices })
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    pub fn aabb(&self) -> Aabb2 {
        // Non-empty by construction.
        Aabb2::from_points(self.vertices.iter().copied())
            .unwrap_or_else(|| Aabb2::from_corners(DVec2::ZERO, DVec2::ZERO))
    }

    /// Sorted x positions where the boundary crosses the horizontal line at `y`. Consecutive pairs bound the interior.
    pub fn row_crossings(&self, y: f64) -> Vec<f64> {
        let n = self.vertices.len();
        let mut crossings = Vec::new();
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            if (a.y <= y) != (b.y <= y) {
                crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(f64::total_cmp);
        crossings
    }

    pub fn contains(&self, p: DVec2) -> bool {
        let crossings = self.row_crossings(p.y);
        crossings.iter().filter(|&&x| x <= p.x).count() % 2 == 1
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
