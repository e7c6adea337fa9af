//! Color management for decoded frames

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use imgseq_utils::Raster;
use lcms2::{Intent, PixelFormat, Profile, Transform};

use crate::Error;

/// Transformation applied to the colors of every displayed frame
pub trait ColorTransform: Debug + Send + Sync {
    /// Transforms RGBA pixels in place, alpha is left as it is
    fn transform_pixels(&self, pixels: &mut [[u8; 4]]);
}

/// Applies `transform` to the colors of `raster`
///
/// Indexed rasters only have their palette transformed.
pub fn apply_transform(transform: &dyn ColorTransform, raster: &mut Raster) {
    match raster {
        Raster::Indexed(img) => {
            let mut entries: Vec<[u8; 4]> = img.palette().entries().iter().map(|c| c.0).collect();
            transform.transform_pixels(&mut entries);
            for (entry, transformed) in img.palette_entries_mut().iter_mut().zip(entries) {
                entry.0 = transformed;
            }
        }
        Raster::Rgba(img) => transform_rgba(transform, img),
    }
}

fn transform_rgba(transform: &dyn ColorTransform, img: &mut RgbaImage) {
    let mut pixels: Vec<[u8; 4]> = img.pixels().map(|px| px.0).collect();
    transform.transform_pixels(&mut pixels);
    for (px, transformed) in img.pixels_mut().zip(pixels) {
        px.0 = transformed;
    }
}

/// ICC based transformation using lcms2
pub struct IccTransform {
    transform: Mutex<Transform<[u8; 4], [u8; 4]>>,
}

impl IccTransform {
    pub fn new(source: &Profile, target: &Profile) -> Result<Self, Error> {
        let transform = Transform::new(
            source,
            PixelFormat::RGBA_8,
            target,
            PixelFormat::RGBA_8,
            Intent::Perceptual,
        )?;

        Ok(Self {
            transform: Mutex::new(transform),
        })
    }
}

impl Debug for IccTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IccTransform").finish_non_exhaustive()
    }
}

impl ColorTransform for IccTransform {
    fn transform_pixels(&self, pixels: &mut [[u8; 4]]) {
        self.transform
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transform_in_place(pixels);
    }
}

/// Picks the transformation from an image's colors to the display's colors
///
/// Without a display profile sRGB is assumed for the display.
#[derive(Debug, Clone, Default)]
pub struct ColorManager {
    display_profile: Option<Arc<Vec<u8>>>,
}

impl ColorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given ICC profile for the display
    pub fn with_display_profile(iccp: Vec<u8>) -> Result<Self, Error> {
        // Reject broken profiles early
        Profile::new_icc(&iccp)?;

        Ok(Self {
            display_profile: Some(Arc::new(iccp)),
        })
    }

    /// Transformation for an image with the optional embedded profile
    ///
    /// Returns `None` if no transformation is needed. An embedded profile
    /// that can't be used is reported and the image treated as sRGB.
    pub fn transform_for(
        &self,
        embedded: Option<&[u8]>,
    ) -> Result<Option<Arc<dyn ColorTransform>>, Error> {
        let source = match embedded.map(Profile::new_icc) {
            Some(Ok(profile)) => Some(profile),
            Some(Err(err)) => {
                tracing::warn!("Ignoring unusable embedded ICC profile: {err}");
                None
            }
            None => None,
        };

        let target = match &self.display_profile {
            Some(iccp) => Profile::new_icc(iccp)?,
            None if source.is_none() => return Ok(None),
            None => Profile::new_srgb(),
        };
        let source = source.unwrap_or_else(Profile::new_srgb);

        Ok(Some(Arc::new(IccTransform::new(&source, &target)?)))
    }
}

#[cfg(test)]
mod test {
    use image::Rgba;
    use imgseq_utils::{IndexedImage, Palette};

    use super::*;

    #[derive(Debug)]
    struct Invert;

    impl ColorTransform for Invert {
        fn transform_pixels(&self, pixels: &mut [[u8; 4]]) {
            for px in pixels {
                for c in &mut px[..3] {
                    *c = u8::MAX ^ *c;
                }
            }
        }
    }

    #[test]
    fn indexed_only_palette_changes() {
        let palette = Palette::new(vec![Rgba([0, 0, 0, 255]), Rgba([255, 0, 0, 10])]).unwrap();
        let mut raster = Raster::Indexed(IndexedImage::new(2, 1, palette, vec![1, 0]).unwrap());
        apply_transform(&Invert, &mut raster);

        let Raster::Indexed(img) = &raster else {
            panic!("encoding changed");
        };
        assert_eq!(img.pixels(), &[1, 0]);
        assert_eq!(img.palette().get(0), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(img.palette().get(1), Some(Rgba([0, 255, 255, 10])));
    }

    #[test]
    fn srgb_without_profiles_needs_no_transform() {
        assert!(ColorManager::new().transform_for(None).unwrap().is_none());
    }

    #[test]
    fn srgb_to_srgb_keeps_colors() {
        let srgb = Profile::new_srgb();
        let transform = IccTransform::new(&srgb, &srgb).unwrap();
        let mut raster = Raster::Rgba(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])));
        apply_transform(&transform, &mut raster);
        assert_eq!(raster.color_at(0, 0), Some(Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn broken_profiles() {
        assert!(ColorManager::with_display_profile(vec![1, 2, 3]).is_err());
        // Broken embedded profiles fall back to no transformation
        assert!(ColorManager::new()
            .transform_for(Some(&[1u8, 2, 3][..]))
            .unwrap()
            .is_none());
    }
}
