//! Topup distortion-correction workflow.
//!
//! Motion-corrects the field map, averages it and the functional run, merges
//! the two means into one 4-D image for `topup`, then resamples the
//! functional run with `applytopup`.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::acqparams::{write_lines, PE_NEGATIVE_Y, PE_POSITIVE_Y};
use crate::engine::Execution;
use crate::error::{Error, Result};
use crate::workflow::{NodeSpec, Workflow};

pub const WORKFLOW_NAME: &str = "topup";

/// Node whose `func` and `fmap` fields the caller binds.
pub const INPUT_NODE: &str = "input";

/// Node whose `func` field holds the corrected image after a run.
pub const OUTPUT_NODE: &str = "output";

/// Encoding file named by [`topup_layout`].
pub const ENCODING_FILE_PLACEHOLDER: &str = "acqparams.txt";

/// Build the topup workflow.
///
/// Nothing runs here apart from writing the two-line encoding file used as
/// topup's `--datain` (see [`generate_acqparams`]).
pub fn make_w_topup() -> Result<Workflow> {
    let encoding_file = generate_acqparams()?;
    Ok(make_w_topup_with(&encoding_file))
}

/// The topup workflow with [`ENCODING_FILE_PLACEHOLDER`] as topup's encoding
/// file. For drawing and inspecting the graph; nothing is written.
pub fn topup_layout() -> Workflow {
    make_w_topup_with(Path::new(ENCODING_FILE_PLACEHOLDER))
}

/// Build the topup workflow around an existing encoding file.
pub fn make_w_topup_with(encoding_file: &Path) -> Workflow {
    let mut w = Workflow::new(WORKFLOW_NAME);
    w.description = "Field-map based distortion correction with FSL topup".to_string();

    w.add_node(
        NodeSpec::new(INPUT_NODE, "identity").with_config(json!({"fields": ["func", "fmap"]})),
    )
    .add_node(NodeSpec::new(OUTPUT_NODE, "identity").with_config(json!({"fields": ["func"]})))
    .add_node(NodeSpec::new("mean_func", "fsl.mean_image"))
    .add_node(NodeSpec::new("motion_correction_fmap", "fsl.mcflirt"))
    .add_node(NodeSpec::new("mean_fmap", "fsl.mean_image"))
    .add_node(NodeSpec::new("list", "list_merge").with_config(json!({"numinputs": 2})))
    .add_node(NodeSpec::new("merge", "fsl.merge").with_input("dimension", "t"))
    .add_node(
        NodeSpec::new("topup", "fsl.topup")
            .with_input("encoding_file", encoding_file.to_string_lossy().into_owned())
            // full resolution copes with an odd number of slices
            .with_input("subsamp", 1),
    )
    .add_node(NodeSpec::new("acquisition_parameters", "acquisition_parameters"))
    .add_node(NodeSpec::new("topup_apply", "fsl.apply_topup").with_input("method", "jac"));

    w.connect(INPUT_NODE, "fmap", "motion_correction_fmap", "in_file")
        .connect("motion_correction_fmap", "out_file", "mean_fmap", "in_file")
        .connect(INPUT_NODE, "func", "mean_func", "in_file")
        .connect("mean_func", "out_file", "list", "in1")
        .connect("mean_fmap", "out_file", "list", "in2")
        .connect("list", "out", "merge", "in_files")
        .connect("merge", "merged_file", "topup", "in_file");

    w.connect(INPUT_NODE, "func", "topup_apply", "in_files")
        .connect("topup", "out_fieldcoef", "topup_apply", "in_topup_fieldcoef")
        .connect("topup", "out_movpar", "topup_apply", "in_topup_movpar")
        .connect(INPUT_NODE, "func", "acquisition_parameters", "in_file")
        .connect(
            "acquisition_parameters",
            "encoding_file",
            "topup_apply",
            "encoding_file",
        );

    w.connect("topup_apply", "out_corrected", OUTPUT_NODE, "func");

    w
}

/// Write the two-line encoding file (one line per merged mean image) to a
/// fresh `.txt` file in the temp directory and return its path. The file is
/// kept after return.
pub fn generate_acqparams() -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("acqparams")
        .suffix(".txt")
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    write_encoding_file(&path)?;
    Ok(path)
}

/// Write the two-line encoding file to `path`.
pub fn write_encoding_file(path: &Path) -> Result<()> {
    write_lines(path, [PE_NEGATIVE_Y, PE_POSITIVE_Y])
}

/// Bind the functional run and the field map to the input node.
pub fn bind_topup_inputs(workflow: &mut Workflow, func: &Path, fmap: &Path) -> Result<()> {
    workflow.set_input(INPUT_NODE, "func", func.to_string_lossy().into_owned())?;
    workflow.set_input(INPUT_NODE, "fmap", fmap.to_string_lossy().into_owned())?;
    Ok(())
}

/// Corrected image of a finished run.
pub fn corrected_image(execution: &Execution) -> Result<PathBuf> {
    execution
        .output(OUTPUT_NODE, "func")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| {
            Error::Execution(format!(
                "Run {} has no corrected image at {}.func",
                execution.id, OUTPUT_NODE
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeRegistry;
    use crate::workflow::validate_ports;
    use std::collections::BTreeSet;

    fn built() -> Workflow {
        make_w_topup_with(Path::new("/tmp/acqparams.txt"))
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = make_w_topup().unwrap();
        let second = make_w_topup().unwrap();

        assert_eq!(first.node_names(), second.node_names());
        assert_eq!(first.edges(), second.edges());

        for w in [first, second] {
            let encoding_file = &w.get_node("topup").unwrap().inputs["encoding_file"];
            std::fs::remove_file(encoding_file.as_str().unwrap()).unwrap();
        }
    }

    #[test]
    fn test_node_set() {
        let w = built();
        let expected: BTreeSet<&str> = [
            "input",
            "output",
            "mean_func",
            "motion_correction_fmap",
            "mean_fmap",
            "list",
            "merge",
            "topup",
            "acquisition_parameters",
            "topup_apply",
        ]
        .into_iter()
        .collect();
        assert_eq!(w.node_names(), expected);
    }

    #[test]
    fn test_edge_set() {
        let w = built();
        let expected: BTreeSet<(&str, &str, &str, &str)> = [
            ("input", "fmap", "motion_correction_fmap", "in_file"),
            ("motion_correction_fmap", "out_file", "mean_fmap", "in_file"),
            ("input", "func", "mean_func", "in_file"),
            ("mean_func", "out_file", "list", "in1"),
            ("mean_fmap", "out_file", "list", "in2"),
            ("list", "out", "merge", "in_files"),
            ("merge", "merged_file", "topup", "in_file"),
            ("input", "func", "topup_apply", "in_files"),
            ("topup", "out_fieldcoef", "topup_apply", "in_topup_fieldcoef"),
            ("topup", "out_movpar", "topup_apply", "in_topup_movpar"),
            ("input", "func", "acquisition_parameters", "in_file"),
            (
                "acquisition_parameters",
                "encoding_file",
                "topup_apply",
                "encoding_file",
            ),
            ("topup_apply", "out_corrected", "output", "func"),
        ]
        .into_iter()
        .collect();
        assert_eq!(w.edges(), expected);
    }

    #[test]
    fn test_static_parameters() {
        let w = built();
        assert_eq!(w.get_node("merge").unwrap().inputs["dimension"], json!("t"));
        assert_eq!(w.get_node("topup").unwrap().inputs["subsamp"], json!(1));
        assert_eq!(
            w.get_node("topup").unwrap().inputs["encoding_file"],
            json!("/tmp/acqparams.txt")
        );
        assert_eq!(w.get_node("topup_apply").unwrap().inputs["method"], json!("jac"));
    }

    #[test]
    fn test_ports_validate_against_registry() {
        let mut w = built();
        assert!(validate_ports(&w, &NodeRegistry::new()).is_ok());

        bind_topup_inputs(
            &mut w,
            Path::new("/data/func.nii.gz"),
            Path::new("/data/fmap.nii.gz"),
        )
        .unwrap();
        assert!(validate_ports(&w, &NodeRegistry::new()).is_ok());

        let input = w.get_node(INPUT_NODE).unwrap();
        assert_eq!(input.inputs["func"], json!("/data/func.nii.gz"));
        assert_eq!(input.inputs["fmap"], json!("/data/fmap.nii.gz"));
    }

    #[test]
    fn test_topup_runs_after_merge() {
        let w = built();
        let order = w.topological_sort();
        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();

        assert!(pos("merge") < pos("topup"));
        assert!(pos("topup") < pos("topup_apply"));
        assert!(pos("acquisition_parameters") < pos("topup_apply"));
        assert_eq!(order.last(), Some(&"output"));
    }

    #[test]
    fn test_generate_acqparams() {
        let path = generate_acqparams().unwrap();

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0 -1 0 1\n0 1 0 1\n"
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_layout_writes_nothing() {
        let workflow = topup_layout();

        assert_eq!(workflow.node_names(), built().node_names());
        assert_eq!(workflow.edges(), built().edges());
        let topup = workflow.get_node("topup").unwrap();
        assert_eq!(topup.inputs["encoding_file"], ENCODING_FILE_PLACEHOLDER);
        assert!(!Path::new(ENCODING_FILE_PLACEHOLDER).exists());
    }

    #[test]
    fn test_write_encoding_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topup_acqparams.txt");

        write_encoding_file(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0 -1 0 1\n0 1 0 1\n"
        );
    }
}
