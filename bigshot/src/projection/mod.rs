//! Rectilinear face rendering from a panoramic source
//!
//! A [`Projector`] owns the worker pool. Each render splits the output rows
//! into bands, renders every band as an independent pool task and reassembles
//! the bands in order. Shared state ([`FaceMapping`] and the source image) is
//! read-only behind `Arc`; a band owns only its own rows.
//!
//! # Example
//! ```ignore
//! let projector = Projector::new()?;
//! let face = projector.render(&source, &ProjectionConfig::default())?;
//! ```

pub mod faces;
pub mod model;

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{BigshotError, Result};
use crate::math::{Orientation, Point3, RotationTransform};
use crate::raster::Image;
use crate::sampler::Sampler;
use crate::trig::{FastAcos, FastAtan};

pub use faces::{carousel_views, CubeFace};
pub use model::{CylindricalModel, ProjectionModel, SourcePosition};

use model::SourceMapping;

/// Minimum number of rows per band.
pub const MIN_BAND_HEIGHT: u32 = 256;

/// Default bound on waiting for all bands of one render.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Parameters of one rendered face. Angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub model: ProjectionModel,
    /// Camera orientation
    pub view: Orientation,
    /// Calibration offset applied after the view rotation
    pub offset: Orientation,
    /// Vertical field of view of the output
    pub vfov: f64,
    pub width: u32,
    pub height: u32,
    /// Sub-samples per output pixel along each axis
    pub oversampling: u32,
    /// Random sub-sample offset in `[0, jitter)`; 0 disables jitter
    pub jitter: f64,
    /// Makes jittered renders reproducible
    pub seed: Option<u64>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            model: ProjectionModel::Equirectangular,
            view: Orientation::default(),
            offset: Orientation::default(),
            vfov: 60.0,
            width: 640,
            height: 480,
            oversampling: 1,
            jitter: 0.0,
            seed: None,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.vfov > 0.0 && self.vfov < 180.0) {
            return Err(BigshotError::config(format!(
                "vertical FOV must be in (0, 180) degrees, got {}",
                self.vfov
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(BigshotError::config(format!(
                "output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.oversampling < 1 {
            return Err(BigshotError::config("oversampling must be at least 1"));
        }
        if !(self.jitter.is_finite() && self.jitter >= 0.0) {
            return Err(BigshotError::config(format!(
                "jitter must be finite and non-negative, got {}",
                self.jitter
            )));
        }
        for (name, o) in [("view", &self.view), ("offset", &self.offset)] {
            if !(o.yaw.is_finite() && o.pitch.is_finite() && o.roll.is_finite()) {
                return Err(BigshotError::config(format!("{name} angles must be finite")));
            }
        }
        if let ProjectionModel::Cylindrical(c) = &self.model {
            c.validate()?;
        }
        Ok(())
    }
}

/// Output sub-sample -> source position, for one face and one source size.
#[derive(Debug, Clone)]
pub struct FaceMapping {
    rotation: RotationTransform,
    acos: FastAcos,
    atan: FastAtan,
    source: SourceMapping,
    top_left: Point3,
    uv: Point3,
    width: u32,
    height: u32,
    oversampling: u32,
    jitter: f64,
}

impl FaceMapping {
    /// `config` must already be validated.
    pub fn new(source_width: u32, source_height: u32, config: &ProjectionConfig) -> Self {
        let n = config.oversampling.max(1);
        let (w, h) = (config.width as f64, config.height as f64);
        let half = (config.vfov.to_radians() / 2.0).tan();
        let top_left = Point3::new(-half * w / h, -half, 1.0);
        let uv = Point3::new(-2.0 * top_left.x / w, -2.0 * top_left.y / h, 0.0) / n as f64;

        Self {
            rotation: RotationTransform::for_view(config.view, config.offset),
            acos: FastAcos::new(2 * source_width as usize * n as usize),
            atan: FastAtan::new(2 * source_height as usize * n as usize),
            source: SourceMapping::new(&config.model, source_width, source_height),
            top_left,
            uv,
            width: config.width,
            height: config.height,
            oversampling: n,
            jitter: config.jitter,
        }
    }

    /// Rotated view ray through sub-sample `(sx, sy)` of the oversampled grid.
    #[inline]
    pub fn ray(&self, sx: f64, sy: f64) -> Point3 {
        let p = self.top_left + Point3::new(sx * self.uv.x, sy * self.uv.y, 0.0);
        self.rotation.apply(p)
    }

    /// Longitude and latitude of a ray, in radians.
    #[inline]
    pub fn angles(&self, ray: Point3) -> (f64, f64) {
        let nxz = (ray.x * ray.x + ray.z * ray.z).sqrt();
        if nxz < f64::MIN_POSITIVE {
            let phi = if ray.y > 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                -std::f64::consts::FRAC_PI_2
            };
            return (0.0, phi);
        }
        let phi = self.atan.atan(ray.y / nxz);
        let theta = self.acos.acos(ray.z / nxz);
        (if ray.x < 0.0 { -theta } else { theta }, phi)
    }

    #[inline]
    pub fn locate(&self, sx: f64, sy: f64) -> SourcePosition {
        let (theta, phi) = self.angles(self.ray(sx, sy));
        self.source.locate(theta, phi)
    }

    /// Source position of output pixel `(x, y)`, first sub-sample, no jitter.
    pub fn pixel_source(&self, x: u32, y: u32) -> SourcePosition {
        let n = self.oversampling;
        self.locate((x * n) as f64, (y * n) as f64)
    }

    /// Colour components of one sub-sample.
    #[inline]
    pub fn sample(&self, sampler: &Sampler<'_>, sx: f64, sy: f64) -> [u32; 3] {
        match self.locate(sx, sy) {
            SourcePosition::Outside => [0; 3],
            SourcePosition::Nearest { x, y } => sampler.nearest(x, y),
            SourcePosition::Bilinear { x, y } => sampler.bilinear(x, y),
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn oversampling(&self) -> u32 {
        self.oversampling
    }
}

/// Rows per band for an output of `height` rows on `parallelism` workers.
pub fn band_height(height: u32, parallelism: usize) -> u32 {
    let per_worker = height / (2 * parallelism.max(1)) as u32;
    per_worker.max(MIN_BAND_HEIGHT)
}

fn bands(height: u32, band: u32) -> Vec<Range<u32>> {
    (0..height)
        .step_by(band as usize)
        .map(|start| start..(start + band).min(height))
        .collect()
}

/// Render the rows of one band. Returns `rows.len() * width` packed samples.
///
/// Jitter for row `y` comes from a generator seeded with `jitter_seed + y`,
/// so the result does not depend on how rows are split into bands.
fn render_band(
    mapping: &FaceMapping,
    source: &Image,
    rows: Range<u32>,
    jitter_seed: Option<u64>,
) -> Vec<u32> {
    let sampler = Sampler::new(source);
    let layout = source.layout();
    let n = mapping.oversampling;
    let divisor = n * n;
    let width = mapping.width as usize;

    let mut out = Vec::with_capacity(width * rows.len());
    let mut acc = vec![[0u32; 3]; width];
    for y in rows {
        let mut rng = jitter_seed.map(|seed| Pcg64::seed_from_u64(seed.wrapping_add(y as u64)));
        acc.fill([0; 3]);
        for sy in y * n..(y + 1) * n {
            for sx in 0..mapping.width * n {
                let (jx, jy) = match rng.as_mut() {
                    Some(rng) => (
                        rng.random::<f64>() * mapping.jitter,
                        rng.random::<f64>() * mapping.jitter,
                    ),
                    None => (0.0, 0.0),
                };
                let c = mapping.sample(&sampler, sx as f64 + jx, sy as f64 + jy);
                let a = &mut acc[(sx / n) as usize];
                a[0] += c[0];
                a[1] += c[1];
                a[2] += c[2];
            }
        }
        out.extend(acc.iter().map(|a| layout.pack(a.map(|c| c / divisor))));
    }
    out
}

/// Base seed for jittered sampling; `None` when jitter is off.
fn jitter_seed(jitter: f64, seed: Option<u64>) -> Option<u64> {
    (jitter > 0.0).then(|| seed.unwrap_or_else(rand::random))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

type BandResult = (usize, std::result::Result<Vec<u32>, String>);

/// Parallel face renderer.
pub struct Projector {
    pool: Arc<ThreadPool>,
    timeout: Duration,
}

impl Projector {
    /// Pool sized to the available hardware parallelism.
    pub fn new() -> Result<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_threads(threads)
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("bigshot-render-{i}"))
            .build()
            .map_err(|e| BigshotError::Computation(format!("failed to start worker pool: {e}")))?;
        Ok(Self::with_pool(Arc::new(pool)))
    }

    /// Use a caller-provided pool.
    pub fn with_pool(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render one face. All bands complete or the call fails.
    pub fn render(&self, source: &Arc<Image>, config: &ProjectionConfig) -> Result<Image> {
        config.validate()?;
        if source.is_empty() {
            return Err(BigshotError::config("source image is empty"));
        }

        let mapping = FaceMapping::new(source.width(), source.height(), config);
        let bands = bands(config.height, band_height(config.height, self.parallelism()));
        debug!(
            "Rendering {}x{} face in {} band(s), view {:?}",
            config.width,
            config.height,
            bands.len(),
            config.view
        );

        let data = self.run_bands(&bands, config.width as usize, {
            let source = Arc::clone(source);
            let seed = jitter_seed(config.jitter, config.seed);
            move |rows| render_band(&mapping, &source, rows, seed)
        })?;

        Image::from_packed(config.width, config.height, source.layout(), data)
            .ok_or_else(|| BigshotError::Computation("band rows do not cover the face".into()))
    }

    /// Run `render` for every band on the pool and assemble the rows in order.
    ///
    /// Fails if any band panics, returns the wrong number of samples, or the
    /// timeout passes before every band has reported.
    fn run_bands<F>(&self, bands: &[Range<u32>], width: usize, render: F) -> Result<Vec<u32>>
    where
        F: Fn(Range<u32>) -> Vec<u32> + Send + Sync + 'static,
    {
        let render = Arc::new(render);
        let (tx, rx) = mpsc::channel::<BandResult>();
        for (index, rows) in bands.iter().cloned().enumerate() {
            let tx = tx.clone();
            let render = Arc::clone(&render);
            self.pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| render(rows)))
                    .map_err(panic_message);
                // Receiver gone means the render already failed
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let height = bands.last().map_or(0, |b| b.end as usize);
        let mut data = vec![0u32; width * height];
        let deadline = Instant::now() + self.timeout;
        let mut remaining = bands.len();
        while remaining > 0 {
            let wait = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok((index, Ok(pixels))) => {
                    let rows = &bands[index];
                    if pixels.len() != rows.len() * width {
                        return Err(BigshotError::Computation(format!(
                            "render band {index} returned {} samples, expected {}",
                            pixels.len(),
                            rows.len() * width
                        )));
                    }
                    let start = rows.start as usize * width;
                    data[start..start + pixels.len()].copy_from_slice(&pixels);
                    remaining -= 1;
                }
                Ok((index, Err(msg))) => {
                    return Err(BigshotError::Computation(format!(
                        "render band {index} failed: {msg}"
                    )));
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BigshotError::Computation(format!(
                        "timed out after {:?} with {remaining} of {} band(s) unfinished",
                        self.timeout,
                        bands.len()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BigshotError::Computation(
                        "render workers exited without a result".to_string(),
                    ));
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ChannelLayout;

    fn gradient(w: u32, h: u32) -> Arc<Image> {
        Arc::new(Image::from_fn(w, h, ChannelLayout::TEN_BIT, |x, y| {
            [x * 255 / w, y * 255 / h, (x + y) % 256]
        }))
    }

    fn small_config() -> ProjectionConfig {
        ProjectionConfig {
            vfov: 90.0,
            width: 48,
            height: 32,
            ..ProjectionConfig::default()
        }
    }

    #[test]
    fn test_centre_pixel_hits_source_centre() {
        let config = ProjectionConfig {
            vfov: 90.0,
            width: 1024,
            height: 1024,
            ..ProjectionConfig::default()
        };
        let mapping = FaceMapping::new(4096, 2048, &config);
        let (x, y) = mapping.pixel_source(512, 512).coordinates().unwrap();
        assert!((x - 2048.0).abs() < 1e-6, "x = {x}");
        assert!((y - 1024.0).abs() < 1e-6, "y = {y}");
    }

    #[test]
    fn test_pole_ray() {
        let mapping = FaceMapping::new(64, 32, &small_config());
        assert_eq!(
            mapping.angles(Point3::new(0.0, 1.0, 0.0)),
            (0.0, std::f64::consts::FRAC_PI_2)
        );
        assert_eq!(
            mapping.angles(Point3::new(0.0, -1.0, 0.0)),
            (0.0, -std::f64::consts::FRAC_PI_2)
        );
    }

    #[test]
    fn test_band_partition() {
        assert_eq!(band_height(100, 8), MIN_BAND_HEIGHT);
        assert_eq!(band_height(8192, 4), 1024);
        let b = bands(600, 256);
        assert_eq!(b, vec![0..256, 256..512, 512..600]);
    }

    #[test]
    fn test_uniform_source_renders_uniform_face() {
        let source = Arc::new(Image::from_fn(64, 32, ChannelLayout::TEN_BIT, |_, _| {
            [200, 100, 50]
        }));
        let projector = Projector::with_threads(2).unwrap();
        let config = ProjectionConfig {
            oversampling: 3,
            ..small_config()
        };
        let face = projector.render(&source, &config).unwrap();
        assert_eq!(face.dimensions(), (48, 32));
        assert!(face.data().iter().all(|&v| v == face.data()[0]));
        assert_eq!(face.components(0, 0), [200, 100, 50]);
    }

    #[test]
    fn test_oversampling_is_box_filter() {
        let source = gradient(128, 64);
        let config = ProjectionConfig {
            oversampling: 2,
            view: Orientation::new(30.0, 10.0, 5.0),
            ..small_config()
        };
        let projector = Projector::with_threads(3).unwrap();
        let face = projector.render(&source, &config).unwrap();
        let again = projector.render(&source, &config).unwrap();
        assert_eq!(face, again);

        let mapping = FaceMapping::new(128, 64, &config);
        let sampler = Sampler::new(&source);
        for &(x, y) in &[(0u32, 0u32), (17, 9), (47, 31)] {
            let mut acc = [0u32; 3];
            for sy in 2 * y..2 * y + 2 {
                for sx in 2 * x..2 * x + 2 {
                    let c = mapping.sample(&sampler, sx as f64, sy as f64);
                    for i in 0..3 {
                        acc[i] += c[i];
                    }
                }
            }
            assert_eq!(face.components(x, y), acc.map(|c| c / 4), "pixel ({x}, {y})");
        }
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let source = gradient(256, 128);
        // Tall enough that 1 and 4 workers split it into different bands
        let config = ProjectionConfig {
            width: 32,
            height: 2048,
            oversampling: 2,
            jitter: 1.0,
            seed: Some(42),
            ..small_config()
        };
        let one = Projector::with_threads(1).unwrap();
        let four = Projector::with_threads(4).unwrap();
        assert_ne!(
            bands(2048, band_height(2048, one.parallelism())).len(),
            bands(2048, band_height(2048, four.parallelism())).len()
        );
        let a = one.render(&source, &config).unwrap();
        let b = four.render(&source, &config).unwrap();
        assert_eq!(a, b);

        let other_seed = ProjectionConfig { seed: Some(43), ..config };
        assert_ne!(a, four.render(&source, &other_seed).unwrap());
    }

    #[test]
    fn test_jitter_seed() {
        assert_eq!(jitter_seed(0.0, Some(7)), None);
        assert_eq!(jitter_seed(0.5, Some(7)), Some(7));
        assert!(jitter_seed(0.5, None).is_some());
    }

    #[test]
    fn test_cylindrical_outside_is_black() {
        let source = Arc::new(Image::from_fn(64, 32, ChannelLayout::TEN_BIT, |_, _| {
            [255, 255, 255]
        }));
        let config = ProjectionConfig {
            model: ProjectionModel::Cylindrical(CylindricalModel {
                hfov: 90.0,
                vfov: 30.0,
                horizon: None,
                wrap: false,
            }),
            // Looking backwards: nothing of a 90° cylinder is visible
            view: Orientation::new(180.0, 0.0, 0.0),
            ..small_config()
        };
        let face = Projector::with_threads(1).unwrap().render(&source, &config).unwrap();
        assert!(face.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_invalid_configs() {
        let source = gradient(8, 4);
        let projector = Projector::with_threads(1).unwrap();
        let cases = [
            ProjectionConfig { vfov: 0.0, ..small_config() },
            ProjectionConfig { vfov: 180.0, ..small_config() },
            ProjectionConfig { width: 0, ..small_config() },
            ProjectionConfig { oversampling: 0, ..small_config() },
            ProjectionConfig { jitter: -1.0, ..small_config() },
            ProjectionConfig { jitter: f64::NAN, ..small_config() },
        ];
        for config in cases {
            let err = projector.render(&source, &config).unwrap_err();
            assert_eq!(err.category(), crate::ErrorCategory::Configuration, "{config:?}");
        }

        let empty = Arc::new(Image::new(0, 0, ChannelLayout::TEN_BIT));
        assert!(projector.render(&empty, &small_config()).is_err());
    }

    #[test]
    fn test_timeout_is_computation_failure() {
        let projector = Projector::with_threads(1)
            .unwrap()
            .with_timeout(Duration::from_millis(50));

        // Occupy the only worker until the render has given up
        let (release_tx, release_rx) = mpsc::channel::<()>();
        projector.pool.spawn(move || {
            let _ = release_rx.recv();
        });

        let err = projector.render(&gradient(16, 8), &small_config()).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Computation);
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_panicking_band_is_computation_failure() {
        let projector = Projector::with_threads(2).unwrap();
        let width = 3;
        let err = projector
            .run_bands(&bands(10, 4), width, move |rows| {
                if rows.start == 4 {
                    panic!("band broke");
                }
                vec![0; rows.len() * width]
            })
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Computation);
        assert!(err.to_string().contains("band broke"), "{err}");

        // Wrong sample count is rejected rather than copied
        let err = projector
            .run_bands(&bands(10, 4), width, |_| vec![0; 1])
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Computation);

        let ok = projector
            .run_bands(&bands(10, 4), width, move |rows| vec![rows.start; rows.len() * width])
            .unwrap();
        assert_eq!(ok.len(), 30);
        assert_eq!(ok[3 * 5], 4);
        assert_eq!(ok[3 * 9], 8);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
