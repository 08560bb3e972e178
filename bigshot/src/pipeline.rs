//! Running a resolved [`Job`] end to end: read, render, tile, write, pack

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::archive;
use crate::codec::ImageCodec;
use crate::config::{FolderLayout, Job, OutputMode, Transform};
use crate::error::{BigshotError, IoContext, Result};
use crate::math::Orientation;
use crate::projection::{carousel_views, CubeFace, ProjectionConfig, ProjectionModel, Projector};
use crate::pyramid::{make_pyramid, Descriptor, DescriptorFormat};
use crate::raster::Image;

/// Read `input` and write the job's products at `output`.
pub fn run_job(job: &Job, input: &Path, output: &Path, codec: &dyn ImageCodec) -> Result<()> {
    info!("{} {} -> {}", job.transform, input.display(), output.display());
    if descriptor_outside_archive(job) {
        warn!("The Deep Zoom descriptor is written beside the tile folder and will not be packed");
    }
    match job.transform {
        Transform::Pyramid => {
            let image = codec.read(input)?;
            write_tree(job.output, output, |root| {
                let folder = match job.folder_layout {
                    FolderLayout::Bigshot => root.to_path_buf(),
                    FolderLayout::Dzi => root.join(output_name(output)?),
                };
                make_pyramid(image, &folder, &job.pyramid, codec).map(|_| ())
            })
        }
        Transform::Facemap | Transform::CylinderFacemap => {
            let source = Arc::new(codec.read(input)?);
            let projector = projector(job)?;
            write_tree(job.output, output, |root| {
                facemap(job, &projector, &source, root, codec)
            })
        }
        Transform::Face => {
            let source = Arc::new(codec.read(input)?);
            let face = projector(job)?.render(&source, &job.face)?;
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).at(parent)?;
            }
            codec.write(&face, job.pyramid.format, output)
        }
        Transform::Carousel => {
            let source = Arc::new(codec.read(input)?);
            let projector = projector(job)?;
            write_tree(job.output, output, |root| {
                carousel(job, &projector, &source, root, codec)
            })
        }
    }
}

/// Deep Zoom XML lands next to the packed root for these jobs.
fn descriptor_outside_archive(job: &Job) -> bool {
    job.output == OutputMode::Archive
        && job.pyramid.descriptor == DescriptorFormat::Dzi
        && match job.transform {
            Transform::Pyramid => job.folder_layout == FolderLayout::Bigshot,
            Transform::Carousel => true,
            _ => false,
        }
}

fn projector(job: &Job) -> Result<Projector> {
    Ok(Projector::new()?.with_timeout(job.timeout))
}

fn output_name(output: &Path) -> Result<&std::ffi::OsStr> {
    output.file_name().ok_or_else(|| {
        BigshotError::config(format!("output {} has no file name", output.display()))
    })
}

/// Build a tree at `output`, or in a staging directory packed into `output`.
fn write_tree(mode: OutputMode, output: &Path, build: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    match mode {
        OutputMode::Folders => {
            fs::create_dir_all(output).at(output)?;
            build(output)
        }
        OutputMode::Archive => {
            let staging = tempfile::Builder::new()
                .prefix("bigshot")
                .tempdir()
                .at(&std::env::temp_dir())?;
            // Files written next to the root (e.g. Deep Zoom XML) stay in staging
            let root = staging.path().join("tree");
            fs::create_dir(&root).at(&root)?;
            build(&root)?;
            let entries = archive::pack(&root, output)?;
            info!("Packed {} files into {}", entries.len(), output.display());
            Ok(())
        }
    }
}

/// Projection parameters for one cube face of the job.
pub fn cube_face_config(job: &Job, face: CubeFace) -> ProjectionConfig {
    let size = job.face_size + job.pyramid.overlap;
    ProjectionConfig {
        model: job.model,
        view: face.view(),
        offset: Orientation::new(job.front_at, 0.0, 0.0),
        vfov: CubeFace::FOV,
        width: size,
        height: size,
        ..job.face.clone()
    }
}

fn facemap(
    job: &Job,
    projector: &Projector,
    source: &Arc<Image>,
    base: &Path,
    codec: &dyn ImageCodec,
) -> Result<()> {
    // Face pyramids always use the plain layout inside their own folder
    for face in CubeFace::ALL {
        info!("Making pyramid for {}", face.name());
        let image = projector.render(source, &cube_face_config(job, face))?;
        make_pyramid(image, &base.join(face.name()), &job.pyramid, codec)?;
    }
    Ok(())
}

fn carousel(
    job: &Job,
    projector: &Projector,
    source: &Arc<Image>,
    root: &Path,
    codec: &dyn ImageCodec,
) -> Result<()> {
    let format = job.pyramid.format;
    let c = &job.carousel;
    for (i, view) in carousel_views(c.steps).into_iter().enumerate() {
        let config = ProjectionConfig {
            model: ProjectionModel::Equirectangular,
            view,
            offset: Orientation::new(job.front_at, 0.0, 0.0),
            vfov: c.fov,
            width: c.width,
            height: c.height,
            ..job.face.clone()
        };
        let frame = projector.render(source, &config)?;
        let path: PathBuf = root.join(format!("{i}{}", format.suffix()));
        codec.write(&frame, format, &path)?;
        info!("Carousel view {i} at yaw {:.2}", view.yaw);
    }

    Descriptor {
        suffix: format.suffix().to_string(),
        width: c.width,
        height: c.height,
        tile_size: 0,
        overlap: 0,
        min_zoom: 0,
        poster_size: 0,
        poster_width: 0,
        poster_height: 0,
    }
    .write(job.pyramid.descriptor, root)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobOptions;

    #[test]
    fn test_descriptor_outside_archive() {
        let job = |transform, layout| {
            JobOptions {
                transform: Some(transform),
                format: Some(OutputMode::Archive),
                descriptor_format: Some(DescriptorFormat::Dzi),
                folder_layout: Some(layout),
                ..JobOptions::default()
            }
            .resolve()
            .unwrap()
        };
        assert!(descriptor_outside_archive(&job(Transform::Pyramid, FolderLayout::Bigshot)));
        assert!(!descriptor_outside_archive(&job(Transform::Pyramid, FolderLayout::Dzi)));
        assert!(!descriptor_outside_archive(&job(Transform::Facemap, FolderLayout::Bigshot)));
        assert!(descriptor_outside_archive(&job(Transform::Carousel, FolderLayout::Dzi)));
    }

    #[test]
    fn test_cube_face_config() {
        let job = JobOptions {
            face_size: Some(512),
            overlap: Some(2),
            front_at: Some(45.0),
            oversampling: Some(2),
            ..JobOptions::default()
        }
        .resolve()
        .unwrap();
        let config = cube_face_config(&job, CubeFace::Up);
        assert_eq!((config.width, config.height), (514, 514));
        assert_eq!(config.vfov, 90.0);
        assert_eq!(config.view, Orientation::new(0.0, 90.0, 0.0));
        assert_eq!(config.offset.yaw, 45.0);
        assert_eq!(config.oversampling, 2);
    }

    #[test]
    fn test_front_at_turns_the_front_face() {
        let job = JobOptions {
            face_size: Some(64),
            front_at: Some(45.0),
            ..JobOptions::default()
        }
        .resolve()
        .unwrap();
        let (w, h) = (4096, 2048);
        let locate = |face| {
            crate::projection::FaceMapping::new(w, h, &cube_face_config(&job, face))
                .pixel_source(32, 32)
                .coordinates()
                .unwrap()
        };

        // Front centre moves from W/2 to W/2 + W/8
        let (x, y) = locate(CubeFace::Front);
        assert!((x - 2560.0).abs() < 1.0, "x = {x}");
        assert!((y - 1024.0).abs() < 1.0, "y = {y}");

        // Right face stays 90 degrees further round
        let (x, _) = locate(CubeFace::Right);
        assert!((x - 3584.0).abs() < 1.0, "x = {x}");
    }
}
