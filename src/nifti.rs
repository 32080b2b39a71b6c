//! NIfTI header access.
//!
//! Headers are decoded by the `nifti` crate; gzip-compressed files are
//! recognised by their `.gz` extension. Only the header is read, never the
//! voxel data.

use std::path::Path;

use ::nifti::{Endianness, NiftiHeader};

use crate::error::{Error, Result};

/// Summary of an image header.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    /// Raw `dim` field: `dim[0]` is the number of dimensions.
    pub dim: [u16; 8],
    /// Voxel size along x, y, z.
    pub voxel_size: [f32; 3],
    pub endianness: Endianness,
}

impl From<&NiftiHeader> for ImageHeader {
    fn from(header: &NiftiHeader) -> Self {
        Self {
            dim: header.dim,
            voxel_size: [header.pixdim[1], header.pixdim[2], header.pixdim[3]],
            endianness: header.endianness,
        }
    }
}

impl ImageHeader {
    /// Number of dimensions, clamped to the 7 the format allows.
    pub fn ndim(&self) -> usize {
        usize::from(self.dim[0]).min(7)
    }

    /// Image shape, one entry per dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.dim[1..=self.ndim()]
            .iter()
            .map(|&d| usize::from(d))
            .collect()
    }

    /// Length of the time axis (fourth dimension).
    pub fn volumes(&self) -> Result<usize> {
        if self.ndim() < 4 {
            return Err(Error::Image(format!(
                "expected a 4-D image, header has {} dimensions",
                self.ndim()
            )));
        }
        Ok(usize::from(self.dim[4]))
    }
}

/// Read the header of a `.nii` or `.nii.gz` file.
pub fn read_header(path: &Path) -> Result<ImageHeader> {
    let header = NiftiHeader::from_file(path)
        .map_err(|e| Error::Image(format!("{}: {}", path.display(), e)))?;
    Ok(ImageHeader::from(&header))
}

/// Strip a NIfTI extension (`.nii.gz`, `.nii`, `.img.gz`, `.img`, `.hdr`)
/// from a file name.
pub fn split_ext(file_name: &str) -> (&str, &str) {
    for ext in [".nii.gz", ".img.gz", ".nii", ".img", ".hdr"] {
        if let Some(stem) = file_name.strip_suffix(ext) {
            return (stem, ext);
        }
    }
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;

    /// Little-endian single-file NIfTI-1 header (`n+1`) with the given shape
    /// and 2 mm isotropic voxels.
    pub(crate) fn nifti1_header(shape: &[i16]) -> Vec<u8> {
        let mut bytes = vec![0u8; 348];
        bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
        bytes[40..42].copy_from_slice(&(shape.len() as i16).to_le_bytes());
        for (i, d) in shape.iter().enumerate() {
            let off = 42 + i * 2;
            bytes[off..off + 2].copy_from_slice(&d.to_le_bytes());
        }
        // datatype FLOAT32, bitpix 32
        bytes[70..72].copy_from_slice(&16i16.to_le_bytes());
        bytes[72..74].copy_from_slice(&32i16.to_le_bytes());
        // pixdim[0..4]
        for (i, v) in [1.0f32, 2.0, 2.0, 2.0].iter().enumerate() {
            let off = 76 + i * 4;
            bytes[off..off + 4].copy_from_slice(&v.to_le_bytes());
        }
        // vox_offset
        bytes[108..112].copy_from_slice(&352f32.to_le_bytes());
        bytes[344..348].copy_from_slice(b"n+1\0");
        bytes
    }

    /// Write a gzip-compressed header-only image to `path`.
    pub(crate) fn write_nii_gz(path: &Path, shape: &[i16]) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&nifti1_header(shape)).unwrap();
        encoder.write_all(&[0u8; 4]).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_read_plain_nifti1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("func.nii");
        let mut bytes = nifti1_header(&[64, 64, 30, 12]);
        bytes.extend_from_slice(&[0u8; 4]);
        std::fs::write(&path, bytes).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.endianness, Endianness::Little);
        assert_eq!(header.shape(), vec![64, 64, 30, 12]);
        assert_eq!(header.voxel_size, [2.0, 2.0, 2.0]);
        assert_eq!(header.volumes().unwrap(), 12);
    }

    #[test]
    fn test_read_gzipped_nifti1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fmap.nii.gz");
        write_nii_gz(&path, &[80, 80, 40, 5]);

        let header = read_header(&path).unwrap();
        assert_eq!(header.volumes().unwrap(), 5);
    }

    #[test]
    fn test_three_dimensional_image_has_no_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1w.nii.gz");
        write_nii_gz(&path, &[64, 64, 30]);

        let err = read_header(&path).unwrap().volumes().unwrap_err();
        assert_eq!(err.code(), "IMAGE_ERROR");
    }

    #[test]
    fn test_rejects_non_nifti() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.nii");
        std::fs::write(&path, [0u8; 400]).unwrap();

        let err = read_header(&path).unwrap_err();
        assert_eq!(err.code(), "IMAGE_ERROR");
        assert!(err.to_string().contains("notes.nii"));
    }

    #[test]
    fn test_missing_file() {
        assert!(read_header(Path::new("/nonexistent/func.nii.gz")).is_err());
    }

    #[test]
    fn test_split_ext() {
        assert_eq!(split_ext("func.nii.gz"), ("func", ".nii.gz"));
        assert_eq!(split_ext("func.nii"), ("func", ".nii"));
        assert_eq!(split_ext("movpar.txt"), ("movpar", ".txt"));
        assert_eq!(split_ext("noext"), ("noext", ""));
    }
}
