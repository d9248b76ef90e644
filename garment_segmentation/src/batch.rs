use crate::{
    config::BatchConfig,
    error::{Result, SegmentationError},
    fetcher::decode_image,
    model_service::SegmentationModel,
    pipeline::SegmentationPipeline,
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const INPUT_DIR_MISSING: &str = "Input directory does not exist.";
pub const NO_IMAGES_FOUND: &str = "No images found in the input directory.";

const SUPPORTED_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".bmp", ".gif"];

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum BatchEntry {
    Processed { image: String, output_image: String },
    Failed { image_name: String, error: String },
}

impl BatchEntry {
    pub fn is_processed(&self) -> bool {
        matches!(self, BatchEntry::Processed { .. })
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            let name = name.to_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        })
        .unwrap_or(false)
}

/// Top-level image files of `input_dir`, sorted by name.
pub fn collect_image_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .map_err(|e| SegmentationError::io("Failed to read input directory", e))?;

    let mut image_files = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect::<Vec<_>>();
    image_files.sort();

    Ok(image_files)
}

pub fn output_path_for(input_file: &Path, output_dir: &Path) -> PathBuf {
    let name = input_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("output_{}", name))
}

pub fn process_directory<M: SegmentationModel>(
    pipeline: &SegmentationPipeline<M>,
    config: &BatchConfig,
) -> Result<Vec<BatchEntry>> {
    if !config.input_dir.is_dir() {
        return Err(SegmentationError::io(
            INPUT_DIR_MISSING,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    fs::create_dir_all(&config.output_dir)
        .map_err(|e| SegmentationError::io("Failed to create output directory", e))?;

    let image_files = collect_image_files(&config.input_dir)?;
    if image_files.is_empty() {
        return Err(SegmentationError::validation(NO_IMAGES_FOUND));
    }

    tracing::info!(
        "Processing {} images from {:?}",
        image_files.len(),
        config.input_dir
    );

    let entries = image_files
        .iter()
        .map(|input_file| {
            let image_name = input_file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::info!("Processing image: {}", image_name);

            match process_file(pipeline, input_file, &config.output_dir) {
                Ok((image, output_path)) => BatchEntry::Processed {
                    image,
                    output_image: output_path.display().to_string(),
                },
                Err(e) => {
                    tracing::warn!("Failed to process {}: {}", image_name, e);
                    BatchEntry::Failed {
                        image_name,
                        error: e.to_string(),
                    }
                }
            }
        })
        .collect();

    Ok(entries)
}

fn process_file<M: SegmentationModel>(
    pipeline: &SegmentationPipeline<M>,
    input_file: &Path,
    output_dir: &Path,
) -> Result<(String, PathBuf)> {
    let data = fs::read(input_file).map_err(|e| {
        SegmentationError::io(format!("Failed to read {}", input_file.display()), e)
    })?;
    let image = decode_image(&data)?;
    let segmented = pipeline.segment(&image)?;

    let output_path = output_path_for(input_file, output_dir);
    segmented.colorized.save(&output_path).map_err(|e| {
        SegmentationError::io(
            format!("Failed to write {}", output_path.display()),
            std::io::Error::other(e),
        )
    })?;

    Ok((segmented.to_base64(), output_path))
}
