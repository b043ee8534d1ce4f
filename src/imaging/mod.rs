pub mod data_uri;
pub mod mime;
pub mod normalize;

pub use data_uri::{strip_envelope, UploadedImage};
pub use mime::detect_encoding;
pub use normalize::{fit_within, normalize_image, NormalizeOptions};
