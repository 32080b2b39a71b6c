//! Acquisition-parameters files for topup/applytopup.
//!
//! Each line holds the phase-encoding vector (x y z) followed by the total
//! readout time, one line per volume.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::nifti;

/// File name written by [`write_acquisition_parameters`].
pub const ACQ_PARAMS_FILE: &str = "acquisition_parameters.txt";

/// Phase encoding along -y, readout time 1.
pub const PE_NEGATIVE_Y: &str = "0 -1 0 1";

/// Phase encoding along +y, readout time 1.
pub const PE_POSITIVE_Y: &str = "0 1 0 1";

/// Write one `0 -1 0 1` line per volume of `in_file` into
/// `<output_dir>/acquisition_parameters.txt` and return the absolute path.
pub fn write_acquisition_parameters(in_file: &Path, output_dir: &Path) -> Result<PathBuf> {
    let n_volumes = nifti::read_header(in_file)?.volumes()?;

    let output_dir = std::path::absolute(output_dir)?;
    let path = output_dir.join(ACQ_PARAMS_FILE);
    write_lines(&path, std::iter::repeat(PE_NEGATIVE_Y).take(n_volumes))?;

    debug!(
        in_file = %in_file.display(),
        volumes = n_volumes,
        path = %path.display(),
        "Wrote acquisition parameters"
    );
    Ok(path)
}

/// Write newline-terminated records to `path`.
pub fn write_lines<'a>(path: &Path, lines: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nifti::tests::write_nii_gz;

    #[test]
    fn test_one_line_per_volume() {
        let dir = tempfile::tempdir().unwrap();
        let func = dir.path().join("func.nii.gz");
        write_nii_gz(&func, &[64, 64, 30, 7]);

        let path = write_acquisition_parameters(&func, dir.path()).unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.file_name().unwrap(), ACQ_PARAMS_FILE);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines.iter().all(|l| *l == "0 -1 0 1"));
    }

    #[test]
    fn test_single_volume() {
        let dir = tempfile::tempdir().unwrap();
        let func = dir.path().join("single.nii.gz");
        write_nii_gz(&func, &[8, 8, 8, 1]);

        let path = write_acquisition_parameters(&func, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "0 -1 0 1\n");
    }

    #[test]
    fn test_missing_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_acquisition_parameters(&dir.path().join("nope.nii.gz"), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_three_dimensional_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let anat = dir.path().join("t1w.nii.gz");
        write_nii_gz(&anat, &[64, 64, 30]);

        assert!(write_acquisition_parameters(&anat, dir.path()).is_err());
        assert!(!dir.path().join(ACQ_PARAMS_FILE).exists());
    }
}
