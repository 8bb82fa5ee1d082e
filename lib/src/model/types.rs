pub const INPUT_DIMENSION: usize = 5;
pub const HIDDEN_DIMENSION: usize = 64;
pub const OUTPUT_DIMENSION: usize = 2;

/// One client-supplied input, features in positional order.
pub type FeatureRow = [f32; INPUT_DIMENSION];
/// The two regression targets predicted for one `FeatureRow`.
pub type PredictionRow = [f32; OUTPUT_DIMENSION];
