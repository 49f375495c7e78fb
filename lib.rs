#![allow(non_upper_case_globals)]
#![forbid(unsafe_code)]
#![allow(clippy::all)]

#[cfg(not(any(feature = "bitdepth_8", feature = "bitdepth_16")))]
compile_error!("No bitdepths enabled. Enable one or more of the following features: `bitdepth_8`, `bitdepth_16`");

pub mod include {
    pub mod common {
        pub mod bitdepth;
        pub mod intops;
        pub(crate) mod validate;
    } // mod common
    pub mod dav1d {
        pub mod headers;
        pub mod picture;
    } // mod dav1d
} // mod include
pub mod src {
    pub mod error;
    pub mod fg_apply;
    pub mod filmgrain;
    pub(crate) mod tables;
} // mod src

pub use include::common::bitdepth::BitDepth;
#[cfg(feature = "bitdepth_16")]
pub use include::common::bitdepth::BitDepth16;
#[cfg(feature = "bitdepth_8")]
pub use include::common::bitdepth::BitDepth8;
pub use include::dav1d::headers::Rav1dFilmGrainData;
pub use include::dav1d::headers::Rav1dMatrixCoefficients;
pub use include::dav1d::headers::Rav1dPixelLayout;
pub use include::dav1d::headers::Rav1dPixelLayoutSubSampled;
pub use include::dav1d::picture::Rav1dPictureData;
pub use include::dav1d::picture::Rav1dPictureDataMut;
pub use include::dav1d::picture::Rav1dPictureParameters;
pub use src::error::Rav1dError;
pub use src::error::Rav1dResult;
pub use src::fg_apply::generate_scaling;
pub use src::fg_apply::rav1d_apply_grain;
pub use src::fg_apply::rav1d_apply_grain_row;
pub use src::fg_apply::rav1d_prep_grain;
pub use src::fg_apply::Grain;
pub use src::fg_apply::Rav1dGrainSettings;
pub use src::filmgrain::Rav1dFilmGrainDSPContext;
