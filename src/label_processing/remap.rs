use image::{DynamicImage, GrayImage, RgbImage};
use rayon::prelude::*;
use std::borrow::Cow;

use super::class_mapping::ClassMapping;
use super::colormap::Colormap;
use crate::error::LabelError;

/// The table applied to every image of a run
///
/// Either a colormap (RGB annotation in, class IDs out) or a class
/// consolidation (class IDs in, fewer class IDs out). Built once and shared
/// read-only between workers.
#[derive(Debug, Clone)]
pub enum LabelTable {
    Colormap(Colormap),
    ClassMapping(ClassMapping),
}

impl LabelTable {
    /// Transform a decoded image into a single-channel label image
    ///
    /// Every pixel without an entry in the table becomes background (0).
    pub fn apply(&self, img: &DynamicImage) -> Result<GrayImage, LabelError> {
        let layout = img.color();
        if layout.bits_per_pixel() / layout.channel_count() as u16 != 8 {
            return Err(LabelError::UnsupportedLayout {
                layout,
                expected: "an 8-bit label image",
            });
        }

        match self {
            LabelTable::ClassMapping(mapping) => match img {
                DynamicImage::ImageLuma8(gray) => Ok(remap_gray(gray, mapping)),
                _ => Err(LabelError::UnsupportedLayout {
                    layout,
                    expected: "an 8-bit single-channel class-ID image",
                }),
            },
            LabelTable::Colormap(colormap) => {
                let rgb: Cow<RgbImage> = match img {
                    DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
                    other => Cow::Owned(other.to_rgb8()),
                };
                Ok(colormap_to_gray(&rgb, colormap))
            }
        }
    }

    /// Short human-readable description for banners and logs
    pub fn describe(&self) -> String {
        match self {
            LabelTable::Colormap(colormap) => format!(
                "colormap ({} colors, {} classes)",
                colormap.len(),
                colormap.class_ids().len()
            ),
            LabelTable::ClassMapping(mapping) => format!(
                "class mapping ({} original IDs into {} classes)",
                mapping.len(),
                mapping.class_names().len()
            ),
        }
    }

    /// Name of an output class, when the table knows it
    pub fn class_name(&self, class_id: u8) -> Option<&str> {
        match self {
            LabelTable::Colormap(colormap) => colormap.class_name(class_id),
            LabelTable::ClassMapping(mapping) => {
                mapping.class_names().get(class_id as usize).map(String::as_str)
            }
        }
    }
}

/// Consolidate class IDs of a single-channel label image
pub fn remap_gray(img: &GrayImage, mapping: &ClassMapping) -> GrayImage {
    apply_lookup(img, &mapping.lookup_table())
}

/// Run a dense 256-entry lookup table over the whole buffer, row-parallel
pub fn apply_lookup(img: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    let row_len = width as usize;
    output
        .par_chunks_mut(row_len)
        .zip(img.as_raw().par_chunks(row_len))
        .for_each(|(dst, src)| {
            for (out, &value) in dst.iter_mut().zip(src) {
                *out = lut[value as usize];
            }
        });

    output
}

/// Convert an RGB annotation image to class IDs
///
/// Each colormap entry is applied as a masked assignment over every row:
/// pixels equal to the entry's color receive its class ID, everything else
/// keeps the background value it started with.
pub fn colormap_to_gray(img: &RgbImage, colormap: &Colormap) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    let row_len = width as usize;
    output
        .par_chunks_mut(row_len)
        .zip(img.as_raw().par_chunks(row_len * 3))
        .for_each(|(dst, src)| {
            for (rgb, class_id) in colormap.iter() {
                for (out, pixel) in dst.iter_mut().zip(src.chunks_exact(3)) {
                    if pixel == rgb.as_slice() {
                        *out = class_id;
                    }
                }
            }
        });

    output
}

/// Pixel count per class ID
pub fn class_histogram(img: &GrayImage) -> [u64; 256] {
    img.as_raw()
        .par_chunks(64 * 1024)
        .fold(
            || [0u64; 256],
            |mut counts, chunk| {
                for &value in chunk {
                    counts[value as usize] += 1;
                }
                counts
            },
        )
        .reduce(
            || [0u64; 256],
            |mut total, partial| {
                for (sum, count) in total.iter_mut().zip(partial.iter()) {
                    *sum += count;
                }
                total
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_processing::class_mapping::DuplicatePolicy;
    use image::{ImageBuffer, Luma, Rgb};

    fn rellis_mapping() -> ClassMapping {
        ClassMapping::from_yaml_str("water: [6, 31]\nobstacle: [15, 34]\n", DuplicatePolicy::Reject)
            .unwrap()
    }

    #[test]
    fn test_colormap_lookup() {
        let colormap = Colormap::parse("0 background 0 0 0\n1 water 0 0 255\n").unwrap();
        let img = ImageBuffer::from_fn(3, 1, |x, _| match x {
            0 => Rgb([0, 0, 255]),
            1 => Rgb([10, 10, 10]),
            _ => Rgb([0, 0, 0]),
        });

        let result = colormap_to_gray(&img, &colormap);

        assert_eq!(result.get_pixel(0, 0)[0], 1);
        assert_eq!(result.get_pixel(1, 0)[0], 0);
        assert_eq!(result.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_colormap_channel_order_is_rgb() {
        let colormap = Colormap::parse("4 sky 0 0 255\n5 mud 255 0 0\n").unwrap();
        let img = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });

        let result = colormap_to_gray(&img, &colormap);

        assert_eq!(result.get_pixel(0, 0)[0], 5);
        assert_eq!(result.get_pixel(1, 0)[0], 4);
    }

    #[test]
    fn test_remap_consolidates_and_drops_unlisted() {
        let values = [6u8, 31, 15, 34, 99, 0, 255, 7];
        let img = ImageBuffer::from_fn(4, 2, |x, y| Luma([values[(y * 4 + x) as usize]]));

        let result = remap_gray(&img, &rellis_mapping());

        let expected = [0u8, 0, 1, 1, 0, 0, 0, 0];
        assert_eq!(result.as_raw().as_slice(), &expected);
    }

    #[test]
    fn test_unmapped_values_become_background_at_any_magnitude() {
        let mapping = rellis_mapping();
        let img = ImageBuffer::from_fn(16, 16, |x, y| Luma([(y * 16 + x) as u8]));

        let result = remap_gray(&img, &mapping);

        for (value, out) in img.as_raw().iter().zip(result.as_raw()) {
            let expected = mapping.get(*value).unwrap_or(0);
            assert_eq!(*out, expected, "value {}", value);
        }
    }

    #[test]
    fn test_shape_is_preserved() {
        let gray = GrayImage::new(37, 11);
        assert_eq!(remap_gray(&gray, &rellis_mapping()).dimensions(), (37, 11));

        let colormap = Colormap::parse("1 water 0 0 255\n").unwrap();
        let rgb = RgbImage::new(5, 23);
        assert_eq!(colormap_to_gray(&rgb, &colormap).dimensions(), (5, 23));

        let empty = GrayImage::new(0, 4);
        assert_eq!(remap_gray(&empty, &rellis_mapping()).dimensions(), (0, 4));
    }

    #[test]
    fn test_table_rejects_rgb_for_class_mapping() {
        let table = LabelTable::ClassMapping(rellis_mapping());
        let img = DynamicImage::ImageRgb8(RgbImage::new(2, 2));

        let err = table.apply(&img).unwrap_err();
        assert!(matches!(err, LabelError::UnsupportedLayout { .. }));
    }

    #[test]
    fn test_table_rejects_sixteen_bit_input() {
        let table = LabelTable::Colormap(Colormap::parse("1 water 0 0 255\n").unwrap());
        let img = DynamicImage::ImageRgb16(ImageBuffer::new(2, 2));

        assert!(table.apply(&img).is_err());
    }

    #[test]
    fn test_table_converts_gray_for_colormap() {
        let table = LabelTable::Colormap(Colormap::parse("3 gray 50 50 50\n").unwrap());
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(2, 2, Luma([50])));

        let result = table.apply(&img).unwrap();
        assert!(result.pixels().all(|p| p[0] == 3));
    }

    #[test]
    fn test_class_names() {
        let table = LabelTable::ClassMapping(rellis_mapping());
        assert_eq!(table.class_name(1), Some("obstacle"));
        assert_eq!(table.class_name(2), None);
    }

    #[test]
    fn test_class_histogram() {
        let img = ImageBuffer::from_fn(10, 10, |x, _| Luma([if x < 3 { 1 } else { 0 }]));
        let counts = class_histogram(&img);

        assert_eq!(counts[1], 30);
        assert_eq!(counts[0], 70);
        assert_eq!(counts.iter().sum::<u64>(), 100);
    }
}
