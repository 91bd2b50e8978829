/// Range of ray parameters `[min, max]` accepted for a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Everything in front of a ray origin, excluding the self-intersection band.
    pub const FORWARD: Interval = Interval {
        min: crate::RAY_EPSILON,
        max: f32::INFINITY,
    };

    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Strictly inside: a hit exactly at either bound is rejected.
    pub fn surrounds(&self, x: f32) -> bool {
        self.min < x && x < self.max
    }

    /// Grow by `delta / 2` on each side.
    pub fn expand(&self, delta: f32) -> Interval {
        let padding = delta / 2.0;
        Interval::new(self.min - padding, self.max + padding)
    }

    /// Same range, closer far bound. Used to stop at the closest hit so far
    /// and for shadow rays.
    pub fn with_max(&self, max: f32) -> Interval {
        Interval::new(self.min, max)
    }
}
