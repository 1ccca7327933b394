mod conversion;
mod literals;
mod rounding;

pub use conversion::{exact_rational, quantize, to_f64};
pub use literals::parse_exact;
pub use rounding::{round_significant, RoundBinary};
