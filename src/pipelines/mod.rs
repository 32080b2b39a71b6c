//! Prebuilt workflows.

pub mod topup;

pub use topup::{
    bind_topup_inputs, corrected_image, generate_acqparams, make_w_topup, make_w_topup_with,
    topup_layout, write_encoding_file,
};
