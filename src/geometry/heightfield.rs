//! Regular height grids, collided as a field of triangular convex pillars

use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec3};

use super::aabb::Aabb;
use super::convex::ConvexPolyhedron;

/// One half of a grid cell extruded down to below the lowest sample
#[derive(Debug, Clone)]
pub struct Pillar {
    pub hull: ConvexPolyhedron,
    /// Position of the hull origin in heightfield-local space
    pub offset: Vec3,
}

/// A grid of heights over the local XY plane, rising along local +Z.
///
/// `data[xi][yi]` is the height at `(xi * element_size, yi * element_size)`.
/// Each cell is split along the diagonal from `(xi + 1, yi)` to `(xi, yi + 1)`
/// into a lower and an upper triangle.
#[derive(Debug, Clone)]
pub struct Heightfield {
    data: Vec<Vec<f32>>,
    element_size: f32,
    min_value: f32,
    max_value: f32,
    pillars: Vec<[Pillar; 2]>,
}

impl Heightfield {
    pub fn new(data: Vec<Vec<f32>>, element_size: f32) -> Result<Self> {
        if !(element_size > 0.0 && element_size.is_finite()) {
            return Err(PhysicsError::InvalidHeightfield(format!(
                "element size must be positive, got {element_size}"
            )));
        }
        if data.len() < 2 {
            return Err(PhysicsError::InvalidHeightfield("need at least 2 columns".into()));
        }
        let rows = data[0].len();
        if rows < 2 {
            return Err(PhysicsError::InvalidHeightfield("need at least 2 rows".into()));
        }
        if data.iter().any(|column| column.len() != rows) {
            return Err(PhysicsError::InvalidHeightfield("columns differ in length".into()));
        }
        if data.iter().flatten().any(|h| !h.is_finite()) {
            return Err(PhysicsError::InvalidHeightfield("heights must be finite".into()));
        }

        let mut field = Self {
            data,
            element_size,
            min_value: 0.0,
            max_value: 0.0,
            pillars: Vec::new(),
        };
        field.update_limits();
        field.rebuild_pillars()?;
        Ok(field)
    }

    /// Number of samples along x and y
    pub fn size(&self) -> (usize, usize) {
        (self.data.len(), self.data[0].len())
    }

    pub fn element_size(&self) -> f32 {
        self.element_size
    }

    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    pub fn height_at_index(&self, xi: usize, yi: usize) -> Option<f32> {
        self.data.get(xi)?.get(yi).copied()
    }

    /// Replaces one sample and rebuilds the pillars that touch it. A change
    /// of the global minimum rebuilds everything since every pillar hangs
    /// down to it.
    pub fn set_height(&mut self, xi: usize, yi: usize, value: f32) -> Result<()> {
        let (nx, ny) = self.size();
        if xi >= nx || yi >= ny {
            return Err(PhysicsError::InvalidHeightfield(format!(
                "sample ({xi}, {yi}) outside {nx}x{ny} grid"
            )));
        }
        if !value.is_finite() {
            return Err(PhysicsError::InvalidHeightfield("heights must be finite".into()));
        }

        self.data[xi][yi] = value;
        let old_min = self.min_value;
        self.update_limits();
        if self.min_value != old_min {
            return self.rebuild_pillars();
        }

        for cx in xi.saturating_sub(1)..xi.min(nx - 2) + 1 {
            for cy in yi.saturating_sub(1)..yi.min(ny - 2) + 1 {
                let index = self.cell_index(cx, cy);
                self.pillars[index] = [self.build_pillar(cx, cy, false)?, self.build_pillar(cx, cy, true)?];
            }
        }
        Ok(())
    }

    /// Cached pillar for one triangle of a cell
    pub fn pillar(&self, xi: usize, yi: usize, upper: bool) -> Option<&Pillar> {
        let (nx, ny) = self.size();
        if xi + 1 >= nx || yi + 1 >= ny {
            return None;
        }
        self.pillars.get(self.cell_index(xi, yi)).map(|p| &p[upper as usize])
    }

    /// Range of cell indices whose footprint overlaps the local bounds
    pub fn cell_range(&self, local: Aabb) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
        let (nx, ny) = self.size();
        if local.max.z < self.min_value - 1.0 || local.min.z > self.max_value {
            return None;
        }
        let clamp = |v: f32, cells: usize| -> usize { (v / self.element_size).floor().clamp(0.0, cells as f32) as usize };
        let x0 = clamp(local.min.x, nx - 1);
        let x1 = clamp(local.max.x, nx - 2) + 1;
        let y0 = clamp(local.min.y, ny - 1);
        let y1 = clamp(local.max.y, ny - 2) + 1;
        if local.max.x < 0.0 || local.max.y < 0.0 || x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0..x1, y0..y1))
    }

    /// The lower and upper triangles of a cell in local space
    pub fn cell_triangles(&self, xi: usize, yi: usize) -> [[Vec3; 3]; 2] {
        let corner = |x: usize, y: usize| {
            Vec3::new(
                x as f32 * self.element_size,
                y as f32 * self.element_size,
                self.data[x][y],
            )
        };
        [
            [corner(xi, yi), corner(xi + 1, yi), corner(xi, yi + 1)],
            [corner(xi + 1, yi + 1), corner(xi, yi + 1), corner(xi + 1, yi)],
        ]
    }

    /// Interpolated surface height at a local (x, y) position
    pub fn height_at(&self, x: f32, y: f32) -> Option<f32> {
        let (nx, ny) = self.size();
        let fx = x / self.element_size;
        let fy = y / self.element_size;
        if fx < 0.0 || fy < 0.0 || fx > (nx - 1) as f32 || fy > (ny - 1) as f32 {
            return None;
        }
        let xi = (fx.floor() as usize).min(nx - 2);
        let yi = (fy.floor() as usize).min(ny - 2);
        let u = fx - xi as f32;
        let v = fy - yi as f32;

        let [lower, upper] = self.cell_triangles(xi, yi);
        let h = if u + v <= 1.0 {
            lower[0].z + u * (lower[1].z - lower[0].z) + v * (lower[2].z - lower[0].z)
        } else {
            // Upper triangle measured from the (xi + 1, yi + 1) corner
            let (s, t) = (1.0 - u, 1.0 - v);
            upper[0].z + s * (upper[1].z - upper[0].z) + t * (upper[2].z - upper[0].z)
        };
        Some(h)
    }

    pub fn bounding_radius(&self) -> f32 {
        let (nx, ny) = self.size();
        Vec3::new(
            nx as f32 * self.element_size,
            ny as f32 * self.element_size,
            self.max_value.abs().max(self.min_value.abs()),
        )
        .length()
    }

    pub fn local_aabb(&self) -> Aabb {
        let (nx, ny) = self.size();
        Aabb::new(
            Vec3::new(0.0, 0.0, self.min_value),
            Vec3::new(
                (nx - 1) as f32 * self.element_size,
                (ny - 1) as f32 * self.element_size,
                self.max_value,
            ),
        )
    }

    pub fn world_aabb(&self, frame: Transform) -> Aabb {
        self.local_aabb().transformed(frame)
    }

    fn cell_index(&self, xi: usize, yi: usize) -> usize {
        xi * (self.size().1 - 1) + yi
    }

    fn update_limits(&mut self) {
        let (min, max) = self
            .data
            .iter()
            .flatten()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
        self.min_value = min;
        self.max_value = max;
    }

    fn rebuild_pillars(&mut self) -> Result<()> {
        let (nx, ny) = self.size();
        let mut pillars = Vec::with_capacity((nx - 1) * (ny - 1));
        for xi in 0..nx - 1 {
            for yi in 0..ny - 1 {
                pillars.push([self.build_pillar(xi, yi, false)?, self.build_pillar(xi, yi, true)?]);
            }
        }
        self.pillars = pillars;
        Ok(())
    }

    fn build_pillar(&self, xi: usize, yi: usize, upper: bool) -> Result<Pillar> {
        let [lower_tri, upper_tri] = self.cell_triangles(xi, yi);
        let tri = if upper { upper_tri } else { lower_tri };

        let bottom = self.min_value - 1.0;
        let lowest_top = tri.iter().map(|p| p.z).fold(f32::MAX, f32::min);
        let centroid = (tri[0] + tri[1] + tri[2]) / 3.0;
        let offset = Vec3::new(centroid.x, centroid.y, (lowest_top + bottom) * 0.5);

        let mut vertices = Vec::with_capacity(6);
        for p in tri {
            vertices.push(p - offset);
        }
        for p in tri {
            vertices.push(Vec3::new(p.x, p.y, bottom) - offset);
        }

        // Top triangle, bottom triangle and three side quads
        let faces = vec![
            vec![0, 1, 2],
            vec![5, 4, 3],
            vec![0, 3, 4, 1],
            vec![1, 4, 5, 2],
            vec![2, 5, 3, 0],
        ];
        let hull = ConvexPolyhedron::new(vertices, faces).map_err(|e| {
            PhysicsError::InvalidHeightfield(format!("pillar ({xi}, {yi}, upper={upper}): {e}"))
        })?;
        Ok(Pillar { hull, offset })
    }
}
